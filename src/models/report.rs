// src/models/report.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{GrievanceError, GrievanceResult, ValidationError};
use crate::models::account::{Actor, Role};
use crate::models::complaint::{Location, MediaRef};

pub const WORK_DESCRIPTION_MIN_CHARS: usize = 10;
pub const WORK_DESCRIPTION_MAX_CHARS: usize = 1000;
pub const FEEDBACK_COMMENT_MAX_CHARS: usize = 500;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    InProgress,
    Completed,
    RequiresFollowup,
    Validated,
    /// The technician was released before finishing; nothing left to review.
    Abandoned,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MaterialUsed {
    pub name: String,
    pub quantity: f64,
    pub unit: String, // "mètre", "kg", "unité"
    pub cost: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    PhotosBefore,
    PhotosAfter,
    Videos,
    AudioNotes,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct ReportMedia {
    #[serde(default)]
    pub photos_before: Vec<MediaRef>,
    #[serde(default)]
    pub photos_after: Vec<MediaRef>,
    #[serde(default)]
    pub videos: Vec<MediaRef>,
    #[serde(default)]
    pub audio_notes: Vec<MediaRef>,
}

impl ReportMedia {
    fn bucket_mut(&mut self, kind: MediaKind) -> &mut Vec<MediaRef> {
        match kind {
            MediaKind::PhotosBefore => &mut self.photos_before,
            MediaKind::PhotosAfter => &mut self.photos_after,
            MediaKind::Videos => &mut self.videos,
            MediaKind::AudioNotes => &mut self.audio_notes,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CitizenFeedback {
    pub satisfied: bool,
    pub rating: u8,
    pub comment: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct InterventionReport {
    pub id: String,
    pub complaint_id: String,
    pub serviceman_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub location: Option<Location>,
    pub media: ReportMedia,
    pub work_description: Option<String>,
    pub materials_used: Vec<MaterialUsed>,
    pub time_spent: Option<i64>, // minutes
    pub status: ReportStatus,
    pub signature: Option<String>,
    pub citizen_feedback: Option<CitizenFeedback>,
    pub validated_by: Option<String>,
    pub validated_by_role: Option<Role>,
    pub validated_at: Option<DateTime<Utc>>,
    pub validation_notes: Option<String>,
    #[serde(default)]
    pub abandoned_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub abandon_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Request Models
#[derive(Debug, Serialize, Deserialize)]
pub struct OpenReportRequest {
    pub complaint_id: String,
    pub work_description: Option<String>,
    #[serde(default)]
    pub materials_used: Vec<MaterialUsed>,
    pub location: Option<Location>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct ReportUpdate {
    pub work_description: Option<String>,
    pub materials_used: Option<Vec<MaterialUsed>>,
    pub time_spent: Option<i64>,
    pub signature: Option<String>,
    pub location: Option<Location>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MediaUpload {
    pub kind: MediaKind,
    pub files: Vec<MediaRef>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct CompleteReportRequest {
    pub time_spent: Option<i64>,
    pub work_description: Option<String>,
    pub signature: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct ReviewRequest {
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CitizenFeedbackRequest {
    pub satisfied: bool,
    pub rating: u8,
    pub comment: Option<String>,
}

fn validate_work_description(text: &str) -> Result<(), ValidationError> {
    let len = text.trim().chars().count();
    if !(WORK_DESCRIPTION_MIN_CHARS..=WORK_DESCRIPTION_MAX_CHARS).contains(&len) {
        return Err(ValidationError {
            field: "work_description".to_string(),
            message: format!(
                "Work description must be between {} and {} characters",
                WORK_DESCRIPTION_MIN_CHARS, WORK_DESCRIPTION_MAX_CHARS
            ),
        });
    }
    Ok(())
}

fn validate_materials(materials: &[MaterialUsed]) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    for (i, material) in materials.iter().enumerate() {
        let field = format!("materials_used[{}]", i);
        if material.name.trim().is_empty() || material.unit.trim().is_empty() {
            errors.push(ValidationError {
                field: field.clone(),
                message: "Material name and unit are required".to_string(),
            });
        }
        if material.quantity <= 0.0 {
            errors.push(ValidationError {
                field: field.clone(),
                message: "Quantity must be positive".to_string(),
            });
        }
        if material.cost.is_some_and(|c| c < 0.0) {
            errors.push(ValidationError {
                field,
                message: "Cost cannot be negative".to_string(),
            });
        }
    }
    errors
}

fn check(errors: Vec<ValidationError>) -> GrievanceResult<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(GrievanceError::ValidationFailed(errors))
    }
}

impl InterventionReport {
    pub fn new(
        complaint_id: &str,
        serviceman_id: &str,
        request: OpenReportRequest,
        now: DateTime<Utc>,
    ) -> GrievanceResult<Self> {
        let mut errors = validate_materials(&request.materials_used);
        if let Some(text) = &request.work_description {
            if let Err(e) = validate_work_description(text) {
                errors.push(e);
            }
        }
        check(errors)?;

        Ok(Self {
            id: String::new(),
            complaint_id: complaint_id.to_string(),
            serviceman_id: serviceman_id.to_string(),
            start_time: now,
            end_time: None,
            location: request.location,
            media: ReportMedia::default(),
            work_description: request.work_description.map(|t| t.trim().to_string()),
            materials_used: request.materials_used,
            time_spent: None,
            status: ReportStatus::InProgress,
            signature: None,
            citizen_feedback: None,
            validated_by: None,
            validated_by_role: None,
            validated_at: None,
            validation_notes: None,
            abandoned_at: None,
            abandon_note: None,
            created_at: now,
            updated_at: now,
        })
    }

    fn ensure_in_progress(&self) -> GrievanceResult<()> {
        if self.status != ReportStatus::InProgress {
            return Err(GrievanceError::invalid_transition(format!(
                "Report {} is no longer in progress",
                self.id
            )));
        }
        Ok(())
    }

    pub fn apply_update(&mut self, update: ReportUpdate, now: DateTime<Utc>) -> GrievanceResult<()> {
        self.ensure_in_progress()?;

        let mut errors = Vec::new();
        if let Some(text) = &update.work_description {
            if let Err(e) = validate_work_description(text) {
                errors.push(e);
            }
        }
        if let Some(materials) = &update.materials_used {
            errors.extend(validate_materials(materials));
        }
        if update.time_spent.is_some_and(|m| m < 0) {
            errors.push(ValidationError {
                field: "time_spent".to_string(),
                message: "Time spent cannot be negative".to_string(),
            });
        }
        check(errors)?;

        if let Some(text) = update.work_description {
            self.work_description = Some(text.trim().to_string());
        }
        if let Some(materials) = update.materials_used {
            self.materials_used = materials;
        }
        if update.time_spent.is_some() {
            self.time_spent = update.time_spent;
        }
        if update.signature.is_some() {
            self.signature = update.signature;
        }
        if update.location.is_some() {
            self.location = update.location;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Append-only per kind. Closed reports keep their evidence as filed.
    pub fn add_media(&mut self, kind: MediaKind, files: Vec<MediaRef>, now: DateTime<Utc>) -> GrievanceResult<()> {
        if matches!(self.status, ReportStatus::Validated | ReportStatus::Abandoned) {
            return Err(GrievanceError::invalid_transition(format!(
                "Cannot attach media to a {} report",
                if self.status == ReportStatus::Validated { "validated" } else { "abandoned" }
            )));
        }
        if files.is_empty() {
            return Err(GrievanceError::validation_error("files", "No media provided"));
        }
        self.media.bucket_mut(kind).extend(files);
        self.updated_at = now;
        Ok(())
    }

    /// in_progress -> completed. Returns the minutes recorded as time spent.
    pub fn complete(&mut self, time_spent: Option<i64>, now: DateTime<Utc>) -> GrievanceResult<i64> {
        self.ensure_in_progress()?;

        match &self.work_description {
            Some(text) => validate_work_description(text)
                .map_err(|e| GrievanceError::ValidationFailed(vec![e]))?,
            None => {
                return Err(GrievanceError::MissingRequiredField(
                    "work_description".to_string(),
                ));
            }
        }

        let elapsed_ms = (now - self.start_time).num_milliseconds().max(0);
        let computed = (elapsed_ms as f64 / 60_000.0).round() as i64;
        let ceiling = (elapsed_ms + 59_999) / 60_000;

        let minutes = match time_spent.or(self.time_spent) {
            Some(m) if m < 0 => {
                return Err(GrievanceError::validation_error(
                    "time_spent",
                    "Time spent cannot be negative",
                ));
            }
            Some(m) if m > ceiling => {
                return Err(GrievanceError::validation_error(
                    "time_spent",
                    format!("Time spent exceeds the {} minutes since the report was opened", ceiling),
                ));
            }
            Some(m) => m,
            None => computed,
        };

        self.end_time = Some(now);
        self.time_spent = Some(minutes);
        self.status = ReportStatus::Completed;
        self.updated_at = now;
        Ok(minutes)
    }

    fn ensure_completed(&self) -> GrievanceResult<()> {
        if self.status != ReportStatus::Completed {
            return Err(GrievanceError::invalid_transition(
                "Only a completed report can be reviewed",
            ));
        }
        Ok(())
    }

    pub fn validate(&mut self, by: &Actor, notes: Option<String>, now: DateTime<Utc>) -> GrievanceResult<()> {
        self.ensure_completed()?;
        self.validated_by = Some(by.id.clone());
        self.validated_by_role = Some(by.role);
        self.validated_at = Some(now);
        self.validation_notes = notes;
        self.status = ReportStatus::Validated;
        self.updated_at = now;
        Ok(())
    }

    pub fn flag_followup(&mut self, by: &Actor, notes: Option<String>, now: DateTime<Utc>) -> GrievanceResult<()> {
        self.ensure_completed()?;
        self.validated_by = Some(by.id.clone());
        self.validated_by_role = Some(by.role);
        self.validated_at = Some(now);
        self.validation_notes = notes;
        self.status = ReportStatus::RequiresFollowup;
        self.updated_at = now;
        Ok(())
    }

    /// in_progress -> abandoned, when the technician is released mid-work.
    /// The work never finished, so `end_time` and `time_spent` stay unset.
    pub fn abandon(&mut self, note: Option<String>, now: DateTime<Utc>) -> GrievanceResult<()> {
        self.ensure_in_progress()?;
        self.abandoned_at = Some(now);
        self.abandon_note = note;
        self.status = ReportStatus::Abandoned;
        self.updated_at = now;
        Ok(())
    }

    pub fn add_citizen_feedback(&mut self, request: CitizenFeedbackRequest, now: DateTime<Utc>) -> GrievanceResult<()> {
        if !matches!(self.status, ReportStatus::Completed | ReportStatus::Validated) {
            return Err(GrievanceError::invalid_transition(
                "Feedback is only accepted on a completed report",
            ));
        }
        if self.citizen_feedback.is_some() {
            return Err(GrievanceError::bad_request("Feedback already submitted for this report"));
        }

        let mut errors = Vec::new();
        if !(1..=5).contains(&request.rating) {
            errors.push(ValidationError {
                field: "rating".to_string(),
                message: "Rating must be between 1 and 5".to_string(),
            });
        }
        if request
            .comment
            .as_ref()
            .is_some_and(|c| c.chars().count() > FEEDBACK_COMMENT_MAX_CHARS)
        {
            errors.push(ValidationError {
                field: "comment".to_string(),
                message: format!("Comment must be at most {} characters", FEEDBACK_COMMENT_MAX_CHARS),
            });
        }
        check(errors)?;

        self.citizen_feedback = Some(CitizenFeedback {
            satisfied: request.satisfied,
            rating: request.rating,
            comment: request.comment,
            submitted_at: now,
        });
        self.updated_at = now;
        Ok(())
    }
}
