// src/models/rating.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{GrievanceError, GrievanceResult};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RatingEntry {
    pub stars: u8,
    pub complaint_id: String,
    pub citizen_id: String,
    pub at: DateTime<Utc>,
}

/// Per-officer satisfaction ledger. At most one entry per complaint.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct OfficerRatings {
    pub officer_id: String,
    pub entries: Vec<RatingEntry>,
    pub avg_rating: f64,
}

impl OfficerRatings {
    pub fn empty(officer_id: &str) -> Self {
        Self {
            officer_id: officer_id.to_string(),
            entries: Vec::new(),
            avg_rating: 0.0,
        }
    }

    pub fn has_rating_for(&self, complaint_id: &str) -> bool {
        self.entries.iter().any(|e| e.complaint_id == complaint_id)
    }

    pub fn add_rating(
        &mut self,
        stars: u8,
        complaint_id: &str,
        citizen_id: &str,
        at: DateTime<Utc>,
    ) -> GrievanceResult<()> {
        if !(1..=5).contains(&stars) {
            return Err(GrievanceError::validation_error(
                "rating",
                "Rating must be between 1 and 5",
            ));
        }
        if self.has_rating_for(complaint_id) {
            return Err(GrievanceError::bad_request(format!(
                "Complaint {} already rated",
                complaint_id
            )));
        }

        self.entries.push(RatingEntry {
            stars,
            complaint_id: complaint_id.to_string(),
            citizen_id: citizen_id.to_string(),
            at,
        });
        // Plain arithmetic mean over the whole ledger
        let total: u32 = self.entries.iter().map(|e| e.stars as u32).sum();
        self.avg_rating = total as f64 / self.entries.len() as f64;
        Ok(())
    }
}
