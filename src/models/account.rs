// src/models/account.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{GrievanceError, GrievanceResult, ValidationError};
use crate::models::complaint::{ComplaintCounts, Location};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Citizen,
    ServiceMan,
    Officer,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Citizen => "citizen",
            Role::ServiceMan => "serviceman",
            Role::Officer => "officer",
            Role::Admin => "admin",
        };
        write!(f, "{}", name)
    }
}

/// Officer seniority. Level 1 receives new complaints automatically.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(try_from = "u8", into = "u8")]
pub enum OfficerLevel {
    FirstResponder,
    Responsable,
    DepartmentHead,
}

impl TryFrom<u8> for OfficerLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(OfficerLevel::FirstResponder),
            2 => Ok(OfficerLevel::Responsable),
            3 => Ok(OfficerLevel::DepartmentHead),
            other => Err(format!("officer level must be 1, 2 or 3 (got {})", other)),
        }
    }
}

impl From<OfficerLevel> for u8 {
    fn from(level: OfficerLevel) -> Self {
        match level {
            OfficerLevel::FirstResponder => 1,
            OfficerLevel::Responsable => 2,
            OfficerLevel::DepartmentHead => 3,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServiceManStatus {
    Available, // Free to take a complaint
    Busy,      // Working an assigned complaint
    Offline,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Citizen {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub district: String,
    #[serde(default = "active_by_default")]
    pub is_active: bool,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

fn active_by_default() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Officer {
    pub id: String,
    pub name: String,
    pub email: String,
    pub level: OfficerLevel,
    pub department: String,
    pub district: String,
    pub is_active: bool,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct ServiceManStats {
    pub total_interventions: u32,
    pub completed_interventions: u32,
    pub rated_interventions: u32,
    pub average_rating: f64,
    pub average_response_time: f64, // minutes
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServiceMan {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub department: String,
    pub district: String,
    pub specialization: Option<String>, // e.g. "Plomberie", "Voirie"
    pub status: ServiceManStatus,
    pub current_complaint: Option<String>,
    #[serde(default)]
    pub current_location: Option<Location>,
    pub stats: ServiceManStats,
    pub added_by: Option<String>,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Admin {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Any account kind, looked up through the single email index.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Account {
    Citizen(Citizen),
    ServiceMan(ServiceMan),
    Officer(Officer),
    Admin(Admin),
}

impl Account {
    pub fn role(&self) -> Role {
        match self {
            Account::Citizen(_) => Role::Citizen,
            Account::ServiceMan(_) => Role::ServiceMan,
            Account::Officer(_) => Role::Officer,
            Account::Admin(_) => Role::Admin,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Account::Citizen(a) => &a.id,
            Account::ServiceMan(a) => &a.id,
            Account::Officer(a) => &a.id,
            Account::Admin(a) => &a.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Account::Citizen(a) => &a.name,
            Account::ServiceMan(a) => &a.name,
            Account::Officer(a) => &a.name,
            Account::Admin(a) => &a.name,
        }
    }

    pub fn email(&self) -> &str {
        match self {
            Account::Citizen(a) => &a.email,
            Account::ServiceMan(a) => &a.email,
            Account::Officer(a) => &a.email,
            Account::Admin(a) => &a.email,
        }
    }

    pub fn password_hash(&self) -> &str {
        match self {
            Account::Citizen(a) => &a.password_hash,
            Account::ServiceMan(a) => &a.password_hash,
            Account::Officer(a) => &a.password_hash,
            Account::Admin(a) => &a.password_hash,
        }
    }

    pub fn profile(&self) -> AccountProfile {
        AccountProfile {
            id: self.id().to_string(),
            name: self.name().to_string(),
            email: self.email().to_string(),
            role: self.role(),
        }
    }
}

/// Entry of the email index: which collection holds the account.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AccountRef {
    pub role: Role,
    pub id: String,
}

/// The authenticated caller of a request.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Actor {
    pub id: String,
    pub role: Role,
    pub name: String,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            name: name.into(),
        }
    }

    pub fn require(&self, role: Role) -> GrievanceResult<()> {
        self.require_any(&[role])
    }

    pub fn require_any(&self, roles: &[Role]) -> GrievanceResult<()> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(GrievanceError::forbidden(format!(
                "Role {} is not allowed to perform this action",
                self.role
            )))
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Session {
    pub token: String,
    pub actor: Actor,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

// Request Models
#[derive(Debug, Serialize, Deserialize)]
pub struct CitizenRegistration {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub district: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OfficerRegistration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub level: OfficerLevel,
    pub department: String,
    pub district: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceManRegistration {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub district: String,
    pub department: Option<String>, // Filled from the officer when added by one
    pub specialization: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminRegistration {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceManStatusUpdate {
    pub status: ServiceManStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActivationRequest {
    pub is_active: bool,
}

/// Admin edit of an officer. Absent fields stay as they are.
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct OfficerUpdate {
    pub name: Option<String>,
    pub level: Option<OfficerLevel>,
    pub department: Option<String>,
    pub district: Option<String>,
    pub password: Option<String>,
}

/// Officer edit of a technician in their department.
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct ServiceManUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub district: Option<String>,
    pub specialization: Option<String>,
}

/// What a technician may change on their own profile.
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub specialization: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LocationUpdate {
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct CitizensQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

// Response Models
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AccountProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub role: Role,
    pub account: AccountProfile,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CitizenResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub district: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CitizenPage {
    pub citizens: Vec<CitizenResponse>,
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub pages: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CitizenDetail {
    pub citizen: CitizenResponse,
    pub stats: ComplaintCounts,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OfficerResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub level: OfficerLevel,
    pub department: String,
    pub district: String,
    pub is_active: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServiceManResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub department: String,
    pub district: String,
    pub specialization: Option<String>,
    pub status: ServiceManStatus,
    pub current_complaint: Option<String>,
    pub current_location: Option<Location>,
    pub stats: ServiceManStats,
}

impl From<Citizen> for CitizenResponse {
    fn from(citizen: Citizen) -> Self {
        Self {
            id: citizen.id,
            name: citizen.name,
            email: citizen.email,
            phone: citizen.phone,
            district: citizen.district,
            is_active: citizen.is_active,
            created_at: citizen.created_at,
        }
    }
}

impl From<Officer> for OfficerResponse {
    fn from(officer: Officer) -> Self {
        Self {
            id: officer.id,
            name: officer.name,
            email: officer.email,
            level: officer.level,
            department: officer.department,
            district: officer.district,
            is_active: officer.is_active,
        }
    }
}

impl From<ServiceMan> for ServiceManResponse {
    fn from(serviceman: ServiceMan) -> Self {
        Self {
            id: serviceman.id,
            name: serviceman.name,
            email: serviceman.email,
            phone: serviceman.phone,
            department: serviceman.department,
            district: serviceman.district,
            specialization: serviceman.specialization,
            status: serviceman.status,
            current_complaint: serviceman.current_complaint,
            current_location: serviceman.current_location,
            stats: serviceman.stats,
        }
    }
}

impl Officer {
    pub fn routes_new_complaints(&self) -> bool {
        self.is_active && self.level == OfficerLevel::FirstResponder
    }

    pub fn actor(&self) -> Actor {
        Actor::new(&self.id, Role::Officer, &self.name)
    }
}

impl ServiceMan {
    pub fn actor(&self) -> Actor {
        Actor::new(&self.id, Role::ServiceMan, &self.name)
    }

    /// Flip to busy on the given complaint. Only an available technician can take work.
    pub fn take_assignment(&mut self, complaint_id: &str, now: DateTime<Utc>) -> GrievanceResult<()> {
        if self.status != ServiceManStatus::Available || self.current_complaint.is_some() {
            return Err(GrievanceError::bad_request(format!(
                "ServiceMan {} is not available",
                self.id
            )));
        }
        self.status = ServiceManStatus::Busy;
        self.current_complaint = Some(complaint_id.to_string());
        self.stats.total_interventions += 1;
        self.updated_at = now;
        Ok(())
    }

    pub fn is_working_on(&self, complaint_id: &str) -> bool {
        self.current_complaint.as_deref() == Some(complaint_id)
    }

    pub fn release(&mut self, now: DateTime<Utc>) {
        self.status = ServiceManStatus::Available;
        self.current_complaint = None;
        self.updated_at = now;
    }

    /// Running stats on report completion, then back to available.
    pub fn record_completion(&mut self, response_time_minutes: Option<i64>, now: DateTime<Utc>) {
        self.stats.completed_interventions += 1;
        if let Some(minutes) = response_time_minutes.filter(|m| *m >= 0) {
            let n = self.stats.completed_interventions as f64;
            self.stats.average_response_time =
                (self.stats.average_response_time * (n - 1.0) + minutes as f64) / n;
        }
        self.release(now);
    }

    pub fn record_rating(&mut self, rating: u8) {
        self.stats.rated_interventions += 1;
        let n = self.stats.rated_interventions as f64;
        self.stats.average_rating = (self.stats.average_rating * (n - 1.0) + rating as f64) / n;
    }

    /// Busy technicians hold a complaint and can't be removed.
    pub fn ensure_removable(&self) -> GrievanceResult<()> {
        if self.status == ServiceManStatus::Busy || self.current_complaint.is_some() {
            return Err(GrievanceError::bad_request(format!(
                "ServiceMan {} is working on complaint {}",
                self.id,
                self.current_complaint.as_deref().unwrap_or("unknown")
            )));
        }
        Ok(())
    }

    pub fn apply_profile(&mut self, update: ProfileUpdate, now: DateTime<Utc>) -> GrievanceResult<()> {
        self.apply_update(
            ServiceManUpdate {
                name: update.name,
                phone: update.phone,
                district: None,
                specialization: update.specialization,
            },
            now,
        )
    }

    pub fn apply_update(&mut self, update: ServiceManUpdate, now: DateTime<Utc>) -> GrievanceResult<()> {
        let mut errors = Vec::new();
        for (field, value) in [
            ("name", &update.name),
            ("phone", &update.phone),
            ("district", &update.district),
        ] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                errors.push(ValidationError {
                    field: field.to_string(),
                    message: format!("{} cannot be empty", field),
                });
            }
        }
        if !errors.is_empty() {
            return Err(GrievanceError::ValidationFailed(errors));
        }

        if let Some(name) = update.name {
            self.name = name.trim().to_string();
        }
        if let Some(phone) = update.phone {
            self.phone = phone.trim().to_string();
        }
        if let Some(district) = update.district {
            self.district = district.trim().to_string();
        }
        if let Some(specialization) = update.specialization {
            let specialization = specialization.trim().to_string();
            self.specialization = (!specialization.is_empty()).then_some(specialization);
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn move_to(&mut self, update: LocationUpdate, now: DateTime<Utc>) -> GrievanceResult<()> {
        let location = Location {
            latitude: update.latitude,
            longitude: update.longitude,
            address: update.address,
            captured_at: Some(now),
        };
        location
            .validate()
            .map_err(|e| GrievanceError::ValidationFailed(vec![e]))?;
        self.current_location = Some(location);
        self.updated_at = now;
        Ok(())
    }

    /// Self-service availability. `busy` belongs to the assignment flow.
    pub fn set_status_manually(&mut self, status: ServiceManStatus, now: DateTime<Utc>) -> GrievanceResult<()> {
        if status == ServiceManStatus::Busy {
            return Err(GrievanceError::bad_request(
                "Status busy is set by complaint assignment",
            ));
        }
        if let Some(complaint_id) = &self.current_complaint {
            return Err(GrievanceError::bad_request(format!(
                "Finish the intervention on complaint {} first",
                complaint_id
            )));
        }
        self.status = status;
        self.updated_at = now;
        Ok(())
    }
}
