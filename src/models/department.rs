// src/models/department.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{GrievanceError, GrievanceResult, ValidationError};

const NAME_MAX_CHARS: usize = 100;
const DESCRIPTION_MAX_CHARS: usize = 500;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Department {
    pub id: String,
    pub name: String,
    pub description: String,
    pub in_charge: Option<String>, // Officer id
    pub services: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Service {
    pub id: String,
    pub name: String,
    pub department_id: String,
    pub description: Option<String>,
    pub sub_in_charge: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Request Models
#[derive(Debug, Serialize, Deserialize)]
pub struct DepartmentRequest {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct DepartmentUpdate {
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InChargeRequest {
    pub officer_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub name: String,
    pub department_id: String,
    pub description: Option<String>,
    pub sub_in_charge: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct ServiceUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub sub_in_charge: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServicesQuery {
    pub department_id: Option<String>,
}

fn check_text(field: &str, value: &str, max: usize, required: bool) -> Option<ValidationError> {
    let len = value.trim().chars().count();
    if required && len == 0 {
        return Some(ValidationError {
            field: field.to_string(),
            message: format!("{} is required", field),
        });
    }
    if len > max {
        return Some(ValidationError {
            field: field.to_string(),
            message: format!("{} must be at most {} characters", field, max),
        });
    }
    None
}

impl DepartmentRequest {
    pub fn validate(&self) -> GrievanceResult<()> {
        let errors: Vec<_> = [
            check_text("name", &self.name, NAME_MAX_CHARS, true),
            check_text("description", &self.description, DESCRIPTION_MAX_CHARS, true),
        ]
        .into_iter()
        .flatten()
        .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(GrievanceError::ValidationFailed(errors))
        }
    }
}

impl ServiceRequest {
    pub fn validate(&self) -> GrievanceResult<()> {
        let errors: Vec<_> = [
            check_text("name", &self.name, NAME_MAX_CHARS, true),
            self.description
                .as_deref()
                .and_then(|d| check_text("description", d, DESCRIPTION_MAX_CHARS, false)),
        ]
        .into_iter()
        .flatten()
        .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(GrievanceError::ValidationFailed(errors))
        }
    }
}

impl ServiceUpdate {
    pub fn validate(&self) -> GrievanceResult<()> {
        let errors: Vec<_> = [
            self.name
                .as_deref()
                .and_then(|n| check_text("name", n, NAME_MAX_CHARS, true)),
            self.description
                .as_deref()
                .and_then(|d| check_text("description", d, DESCRIPTION_MAX_CHARS, false)),
        ]
        .into_iter()
        .flatten()
        .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(GrievanceError::ValidationFailed(errors))
        }
    }
}

impl Department {
    pub fn new(request: DepartmentRequest, now: DateTime<Utc>) -> Self {
        Self {
            id: String::new(),
            name: request.name.trim().to_string(),
            description: request.description.trim().to_string(),
            in_charge: None,
            services: Vec::new(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Services still pointing at this department block its removal.
    pub fn ensure_deletable(&self) -> GrievanceResult<()> {
        if !self.services.is_empty() {
            return Err(GrievanceError::bad_request(format!(
                "Cannot delete department {}: {} service(s) still attached",
                self.name,
                self.services.len()
            )));
        }
        Ok(())
    }
}

impl Service {
    pub fn new(request: ServiceRequest, now: DateTime<Utc>) -> Self {
        Self {
            id: String::new(),
            name: request.name.trim().to_string(),
            department_id: request.department_id,
            description: request.description,
            sub_in_charge: request.sub_in_charge,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}
