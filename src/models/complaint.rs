// src/models/complaint.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{GrievanceError, GrievanceResult, ValidationError};
use crate::models::account::{Actor, Role};

pub const SUBJECT_MAX_CHARS: usize = 50;
pub const DESCRIPTION_MAX_CHARS: usize = 500;
/// How many times a citizen may reopen a resolved complaint.
pub const MAX_REOPENS: u32 = 3;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum ComplaintStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "in process")]
    InProcess,
    #[serde(rename = "resolved")]
    Resolved,
}

impl fmt::Display for ComplaintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ComplaintStatus::Pending => "pending",
            ComplaintStatus::InProcess => "in process",
            ComplaintStatus::Resolved => "resolved",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
    pub captured_at: Option<DateTime<Utc>>,
}

impl Location {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(-90.0..=90.0).contains(&self.latitude) || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ValidationError {
                field: "location".to_string(),
                message: "Coordinates are out of range".to_string(),
            });
        }
        Ok(())
    }
}

/// Opaque reference to an uploaded file in the media store.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MediaRef {
    pub url: String,
    pub filename: Option<String>,
    pub duration: Option<f64>, // seconds, audio and video only
    #[serde(default = "Utc::now")]
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct ComplaintMedia {
    #[serde(default)]
    pub photos: Vec<MediaRef>,
    #[serde(default)]
    pub videos: Vec<MediaRef>,
    #[serde(default)]
    pub audio: Vec<MediaRef>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

/// Advisory triage output. Never consulted by any transition.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AiAnalysis {
    pub category: String,
    pub urgency: Urgency,
    #[serde(alias = "department")]
    pub suggested_department: Option<String>,
    pub summary: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub sentiment: Sentiment,
    #[serde(default = "Utc::now")]
    pub analyzed_at: DateTime<Utc>,
}

/// Officer-signed entry of the action history.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FeedbackEntry {
    pub time: DateTime<Utc>,
    pub officer_name: String,
    pub officer_level: u8,
    pub feedback: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimelineAction {
    Created,
    AssignedOfficer,
    AssignedServiceman,
    InProgress,
    ReportSubmitted,
    Resolved,
    Validated,
    Reopened,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TimelineEntry {
    pub action: TimelineAction,
    pub by: String,
    pub by_role: Role,
    pub at: DateTime<Utc>,
    pub note: Option<String>,
}

impl TimelineEntry {
    pub fn new(action: TimelineAction, actor: &Actor, note: Option<String>, at: DateTime<Utc>) -> Self {
        Self {
            action,
            by: actor.id.clone(),
            by_role: actor.role,
            at,
            note,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Complaint {
    pub id: String,
    pub subject: String,
    pub description: String,
    pub department: String,
    pub status: ComplaintStatus,
    pub created_by: String,
    pub contact: String,
    pub officer_id: String,
    pub assigned_service_man: Option<String>,
    pub assigned_by: Option<String>,
    pub assigned_by_role: Option<Role>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub intervention_report: Option<String>,
    pub last_reminded_at: Option<DateTime<Utc>>,
    pub is_rated: bool,
    pub rating: u8,
    pub reopen_count: u32,
    pub location: Option<Location>,
    pub media: ComplaintMedia,
    pub ai_analysis: Option<AiAnalysis>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Request Models
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ComplaintRequest {
    pub subject: String,
    pub description: String,
    pub department: String,
    pub location: Option<Location>,
    #[serde(default)]
    pub media: ComplaintMedia,
    pub ai_analysis: Option<AiAnalysis>,
}

impl ComplaintRequest {
    pub fn validate(&self) -> GrievanceResult<()> {
        let mut errors = Vec::new();

        let subject_len = self.subject.trim().chars().count();
        if subject_len == 0 {
            errors.push(field_error("subject", "Please provide subject"));
        } else if subject_len > SUBJECT_MAX_CHARS {
            errors.push(field_error(
                "subject",
                format!("Subject must be at most {} characters", SUBJECT_MAX_CHARS),
            ));
        }

        let description_len = self.description.trim().chars().count();
        if description_len == 0 {
            errors.push(field_error("description", "Please provide description"));
        } else if description_len > DESCRIPTION_MAX_CHARS {
            errors.push(field_error(
                "description",
                format!("Description must be at most {} characters", DESCRIPTION_MAX_CHARS),
            ));
        }

        if self.department.trim().is_empty() {
            errors.push(field_error("department", "Please provide department"));
        }

        if let Some(location) = &self.location {
            if let Err(e) = location.validate() {
                errors.push(e);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(GrievanceError::ValidationFailed(errors))
        }
    }
}

fn field_error(field: &str, message: impl Into<String>) -> ValidationError {
    ValidationError {
        field: field.to_string(),
        message: message.into(),
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReopenRequest {
    pub status: ComplaintStatus,
    #[serde(default)]
    pub feedback: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RatingRequest {
    pub rating: u8,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AssignRequest {
    pub service_man_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReleaseRequest {
    pub note: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub status: ComplaintStatus,
    pub note: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FeedbackRequest {
    pub feedback: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub subject: String,
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

// Response Models
#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryPage {
    pub complaint_id: String,
    pub page: usize,
    pub per_page: usize,
    pub timeline_total: usize,
    pub action_history_total: usize,
    pub timeline: Vec<TimelineEntry>,
    pub action_history: Vec<FeedbackEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ComplaintResponse {
    #[serde(flatten)]
    pub complaint: Complaint,
    pub timeline: Vec<TimelineEntry>,
    pub action_history: Vec<FeedbackEntry>,
}

#[derive(Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct DepartmentStats {
    pub department: String,
    pub total: usize,
    pub pending: usize,
    pub in_process: usize,
    pub resolved: usize,
    pub assigned: usize,
    pub servicemen_available: usize,
    pub servicemen_busy: usize,
    pub servicemen_offline: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComplaintCounts {
    pub total: usize,
    pub pending: usize,
    pub in_process: usize,
    pub resolved: usize,
}

impl ComplaintCounts {
    pub fn tally<'a>(complaints: impl IntoIterator<Item = &'a Complaint>) -> Self {
        complaints.into_iter().fold(Self::default(), |mut counts, complaint| {
            counts.total += 1;
            match complaint.status {
                ComplaintStatus::Pending => counts.pending += 1,
                ComplaintStatus::InProcess => counts.in_process += 1,
                ComplaintStatus::Resolved => counts.resolved += 1,
            }
            counts
        })
    }
}

/// Platform-wide counters for the admin dashboard.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DashboardStats {
    pub citizens: usize,
    pub departments: usize,
    pub services: usize,
    pub active_officers: usize,
    pub complaints: ComplaintCounts,
}

impl Complaint {
    /// A freshly routed complaint. The id is filled in by the id generator.
    pub fn new(
        request: ComplaintRequest,
        created_by: &str,
        contact: &str,
        officer_id: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: String::new(),
            subject: request.subject.trim().to_string(),
            description: request.description.trim().to_string(),
            department: request.department.trim().to_string(),
            status: ComplaintStatus::Pending,
            created_by: created_by.to_string(),
            contact: contact.to_string(),
            officer_id: officer_id.to_string(),
            assigned_service_man: None,
            assigned_by: None,
            assigned_by_role: None,
            assigned_at: None,
            intervention_report: None,
            last_reminded_at: None,
            is_rated: false,
            rating: 0,
            reopen_count: 0,
            location: request.location,
            media: request.media,
            ai_analysis: request.ai_analysis,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_owned_by(&self, citizen_id: &str) -> bool {
        self.created_by == citizen_id
    }

    pub fn ensure_owner(&self, citizen_id: &str) -> GrievanceResult<()> {
        if self.is_owned_by(citizen_id) {
            Ok(())
        } else {
            Err(GrievanceError::forbidden("Not authorized to update this complaint"))
        }
    }

    pub fn is_assigned_to(&self, serviceman_id: &str) -> bool {
        self.assigned_service_man.as_deref() == Some(serviceman_id)
    }

    /// pending -> in process. The caller pairs this with flipping the technician to busy.
    pub fn assign_serviceman(&mut self, serviceman_id: &str, by: &Actor, now: DateTime<Utc>) -> GrievanceResult<()> {
        if self.status == ComplaintStatus::Resolved {
            return Err(GrievanceError::invalid_transition(
                "Cannot assign a technician to a resolved complaint",
            ));
        }
        if self.assigned_service_man.is_some() {
            return Err(GrievanceError::AlreadyAssigned(self.id.clone()));
        }

        self.assigned_service_man = Some(serviceman_id.to_string());
        self.assigned_by = Some(by.id.clone());
        self.assigned_by_role = Some(by.role);
        self.assigned_at = Some(now);
        self.status = ComplaintStatus::InProcess;
        self.updated_at = now;
        Ok(())
    }

    /// Hand an in-process complaint back to the queue. Returns the released technician id.
    pub fn release_serviceman(&mut self, now: DateTime<Utc>) -> GrievanceResult<String> {
        if self.status != ComplaintStatus::InProcess {
            return Err(GrievanceError::invalid_transition(format!(
                "Only an in process complaint can be released (status is {})",
                self.status
            )));
        }
        let serviceman_id = self.assigned_service_man.take().ok_or_else(|| {
            GrievanceError::invalid_transition("Complaint has no technician assigned")
        })?;

        self.clear_assignment();
        self.status = ComplaintStatus::Pending;
        self.updated_at = now;
        Ok(serviceman_id)
    }

    fn clear_assignment(&mut self) {
        self.assigned_service_man = None;
        self.assigned_by = None;
        self.assigned_by_role = None;
        self.assigned_at = None;
        self.intervention_report = None;
    }

    /// in process -> resolved, only through report completion.
    pub fn mark_resolved(&mut self, now: DateTime<Utc>) -> GrievanceResult<()> {
        if self.status != ComplaintStatus::InProcess {
            return Err(GrievanceError::invalid_transition(format!(
                "Cannot resolve a complaint that is {}",
                self.status
            )));
        }
        self.status = ComplaintStatus::Resolved;
        self.updated_at = now;
        Ok(())
    }

    /// resolved -> pending. Guards run in a fixed order so the first violated rule is reported.
    pub fn reopen(
        &mut self,
        citizen_id: &str,
        requested: ComplaintStatus,
        feedback: Option<&str>,
        now: DateTime<Utc>,
    ) -> GrievanceResult<()> {
        self.ensure_owner(citizen_id)?;

        if self.status != ComplaintStatus::Resolved {
            return Err(GrievanceError::bad_request("Complaint is already opened"));
        }
        if self.reopen_count >= MAX_REOPENS {
            return Err(GrievanceError::bad_request(format!(
                "Cannot reopen complaint more than {} times",
                MAX_REOPENS
            )));
        }
        let has_feedback = feedback.is_some_and(|f| !f.trim().is_empty());
        if requested == self.status && !has_feedback {
            return Err(GrievanceError::bad_request(
                "Duplicate changes not allowed. Add valid feedback or change status.",
            ));
        }

        self.status = ComplaintStatus::Pending;
        self.reopen_count += 1;
        self.clear_assignment();
        self.updated_at = now;
        Ok(())
    }

    pub fn ensure_deletable(&self, citizen_id: &str) -> GrievanceResult<()> {
        self.ensure_owner(citizen_id)?;
        if self.status == ComplaintStatus::Resolved {
            return Err(GrievanceError::bad_request("Cannot delete a resolved complaint"));
        }
        if self.intervention_report.is_some() {
            return Err(GrievanceError::bad_request(
                "Cannot delete a complaint with an intervention report in progress",
            ));
        }
        Ok(())
    }

    pub fn remind(&mut self, citizen_id: &str, now: DateTime<Utc>) -> GrievanceResult<()> {
        self.ensure_owner(citizen_id)?;
        if self.status == ComplaintStatus::Resolved {
            return Err(GrievanceError::bad_request("Complaint is already resolved"));
        }
        self.last_reminded_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// One-way: once rated the rating never changes.
    pub fn rate(&mut self, citizen_id: &str, stars: u8, now: DateTime<Utc>) -> GrievanceResult<()> {
        self.ensure_owner(citizen_id)?;
        if !(1..=5).contains(&stars) {
            return Err(GrievanceError::validation_error(
                "rating",
                "Rating must be between 1 and 5",
            ));
        }
        if self.status != ComplaintStatus::Resolved {
            return Err(GrievanceError::bad_request(
                "Can't give feedback unless complaint is resolved.",
            ));
        }
        if self.is_rated {
            return Err(GrievanceError::bad_request("Complaint already rated."));
        }
        self.is_rated = true;
        self.rating = stars;
        self.updated_at = now;
        Ok(())
    }

    /// Technician progress notes keep the complaint in process.
    pub fn record_progress(
        &mut self,
        serviceman_id: &str,
        requested: ComplaintStatus,
        now: DateTime<Utc>,
    ) -> GrievanceResult<()> {
        if !self.is_assigned_to(serviceman_id) {
            return Err(GrievanceError::forbidden(
                "Complaint is not assigned to this technician",
            ));
        }
        match requested {
            ComplaintStatus::InProcess if self.status == ComplaintStatus::InProcess => {
                self.updated_at = now;
                Ok(())
            }
            ComplaintStatus::Resolved => Err(GrievanceError::bad_request(
                "A complaint is resolved by completing its intervention report",
            )),
            other => Err(GrievanceError::invalid_transition(format!(
                "Cannot move a {} complaint to {}",
                self.status, other
            ))),
        }
    }
}
