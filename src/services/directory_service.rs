// src/services/directory_service.rs
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing;

use crate::{
    errors::{GrievanceError, GrievanceResult, ValidationError},
    models::{
        account::{
            Account, AccountProfile, AccountRef, Actor, Admin, AdminRegistration, Citizen, CitizenPage,
            CitizenRegistration, CitizenResponse, CitizensQuery, LocationUpdate, LoginRequest, LoginResponse, Officer,
            OfficerLevel, OfficerRegistration, OfficerResponse, OfficerUpdate, ProfileUpdate, Role, ServiceMan,
            ServiceManRegistration, ServiceManResponse, ServiceManStats, ServiceManStatus, ServiceManUpdate, Session,
        },
        complaint::{Complaint, ComplaintStatus},
        department::Department,
    },
    services::store_service::{Snapshot, StoreKey, StoreKeys, StoreService, WriteBatch},
    utils::{
        id_generator::{IdGenerator, IdType},
        password,
    },
};

const SESSION_HOURS: i64 = 24;
const CITIZENS_PAGE_SIZE: usize = 10;
const CITIZENS_MAX_PAGE_SIZE: usize = 100;

#[async_trait]
pub trait DirectoryOperations: Send + Sync {
    async fn register_citizen(&self, registration: CitizenRegistration) -> GrievanceResult<CitizenResponse>;
    async fn register_officer(&self, registration: OfficerRegistration) -> GrievanceResult<OfficerResponse>;
    async fn register_serviceman(
        &self,
        registration: ServiceManRegistration,
        added_by: &Actor,
    ) -> GrievanceResult<ServiceManResponse>;
    async fn register_admin(&self, registration: AdminRegistration) -> GrievanceResult<AccountProfile>;
    async fn find_by_email(&self, email: &str) -> GrievanceResult<Option<Account>>;
    async fn login(&self, login: LoginRequest) -> GrievanceResult<LoginResponse>;
    async fn resolve_session(&self, token: &str) -> GrievanceResult<Actor>;
    async fn get_citizen(&self, citizen_id: &str) -> GrievanceResult<Citizen>;
    async fn get_officer(&self, officer_id: &str) -> GrievanceResult<Officer>;
    async fn get_serviceman(&self, serviceman_id: &str) -> GrievanceResult<ServiceMan>;
    async fn list_officers(&self) -> GrievanceResult<Vec<OfficerResponse>>;
    async fn list_servicemen(&self, department: &str) -> GrievanceResult<Vec<ServiceManResponse>>;
    async fn set_serviceman_status(
        &self,
        serviceman_id: &str,
        status: ServiceManStatus,
    ) -> GrievanceResult<ServiceManResponse>;
    async fn set_officer_active(&self, officer_id: &str, is_active: bool) -> GrievanceResult<OfficerResponse>;
    async fn update_officer(&self, officer_id: &str, update: OfficerUpdate) -> GrievanceResult<OfficerResponse>;
    async fn delete_officer(&self, officer_id: &str) -> GrievanceResult<()>;
    async fn officers_for_route(&self, department: &str, district: &str) -> GrievanceResult<Vec<Officer>>;
    async fn list_citizens(&self, query: CitizensQuery) -> GrievanceResult<CitizenPage>;
    async fn set_citizen_active(&self, citizen_id: &str, is_active: bool) -> GrievanceResult<CitizenResponse>;
    async fn update_serviceman(
        &self,
        actor: &Actor,
        serviceman_id: &str,
        update: ServiceManUpdate,
    ) -> GrievanceResult<ServiceManResponse>;
    async fn delete_serviceman(&self, actor: &Actor, serviceman_id: &str) -> GrievanceResult<()>;
    async fn update_profile(&self, serviceman_id: &str, update: ProfileUpdate) -> GrievanceResult<ServiceManResponse>;
    async fn update_location(&self, serviceman_id: &str, update: LocationUpdate) -> GrievanceResult<ServiceManResponse>;
}

pub struct DirectoryService {
    store_service: Arc<StoreService>,
}

impl DirectoryService {
    pub fn new(store_service: Arc<StoreService>) -> Self {
        Self { store_service }
    }

    fn account_key(account_ref: &AccountRef) -> StoreKey {
        match account_ref.role {
            Role::Citizen => StoreKeys::citizen(&account_ref.id),
            Role::Officer => StoreKeys::officer(&account_ref.id),
            Role::ServiceMan => StoreKeys::serviceman(&account_ref.id),
            Role::Admin => StoreKeys::admin(&account_ref.id),
        }
    }

    fn validate_credentials(name: &str, email: &str, password: &str) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if name.trim().is_empty() {
            errors.push(ValidationError {
                field: "name".to_string(),
                message: "Please provide name".to_string(),
            });
        }
        let email = email.trim();
        if email.len() < 3 || !email.contains('@') {
            errors.push(ValidationError {
                field: "email".to_string(),
                message: "Please provide a valid email".to_string(),
            });
        }
        if !password::is_acceptable(password) {
            errors.push(ValidationError {
                field: "password".to_string(),
                message: "Password must be at least 6 characters".to_string(),
            });
        }
        errors
    }

    fn require_field(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
        if value.trim().is_empty() {
            errors.push(ValidationError {
                field: field.to_string(),
                message: format!("Please provide {}", field),
            });
        }
    }

    async fn ensure_email_free(&self, email: &str) -> GrievanceResult<()> {
        let taken: Option<AccountRef> = self.store_service.get(&StoreKeys::account_email(email)).await?;
        if taken.is_some() {
            return Err(GrievanceError::conflict("An account already exists with this email"));
        }
        Ok(())
    }

    async fn ensure_department_exists(&self, department: &str) -> GrievanceResult<()> {
        let department_id: Option<String> = self.store_service.get(&StoreKeys::department_by_name(department)).await?;
        if department_id.is_none() {
            return Err(GrievanceError::DepartmentNotFound(department.to_string()));
        }
        Ok(())
    }

    /// Email index entry plus its must-not-exist guard.
    fn stage_email(batch: &mut WriteBatch, email: &str, role: Role, id: &str) -> GrievanceResult<()> {
        let key = StoreKeys::account_email(email);
        batch.expect_absent(&key);
        batch.set(&key, &AccountRef { role, id: id.to_string() })?;
        Ok(())
    }

    fn check(errors: Vec<ValidationError>) -> GrievanceResult<()> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(GrievanceError::ValidationFailed(errors))
        }
    }

    /// Stage the router key changes for an officer moving between (department, district, level) states.
    async fn stage_routing(&self, batch: &mut WriteBatch, before: &Officer, after: &Officer) -> GrievanceResult<()> {
        let same_route = same_department(&before.department, &after.department)
            && before.district.trim().eq_ignore_ascii_case(after.district.trim());

        if !same_route {
            batch.srem(&StoreKeys::officers_by_route(&before.department, &before.district), &before.id);
            batch.sadd(&StoreKeys::officers_by_route(&after.department, &after.district), &after.id);
        }

        if before.routes_new_complaints() && (!same_route || !after.routes_new_complaints()) {
            let router = StoreKeys::officer_router(&before.department, &before.district);
            if let Some(snapshot) = self.store_service.load::<String>(&router).await? {
                if snapshot.value == before.id {
                    batch.guard(snapshot.guard());
                    batch.delete(&router);
                }
            }
        }

        if after.routes_new_complaints() && (!same_route || !before.routes_new_complaints()) {
            let router = StoreKeys::officer_router(&after.department, &after.district);
            match self.store_service.get::<String>(&router).await? {
                None => {
                    batch.expect_absent(&router);
                    batch.set(&router, &after.id)?;
                }
                Some(existing) if existing != after.id => {
                    return Err(GrievanceError::conflict(format!(
                        "Officer {} already receives {} complaints for {}",
                        existing, after.department, after.district
                    )));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Loads a technician and checks the actor may manage them.
    async fn load_managed_serviceman(
        &self,
        actor: &Actor,
        serviceman_id: &str,
    ) -> GrievanceResult<Snapshot<ServiceMan>> {
        let scope = self.department_scope(actor).await?;
        let snapshot = self
            .store_service
            .require::<ServiceMan>(&StoreKeys::serviceman(serviceman_id), || {
                GrievanceError::serviceman_not_found(serviceman_id)
            })
            .await?;
        if let Some(department) = scope {
            if !same_department(&department, &snapshot.value.department) {
                return Err(GrievanceError::forbidden(format!(
                    "ServiceMan {} belongs to department {}",
                    serviceman_id, snapshot.value.department
                )));
            }
        }
        Ok(snapshot)
    }

    async fn save_serviceman(
        &self,
        snapshot: &Snapshot<ServiceMan>,
        serviceman: &ServiceMan,
    ) -> GrievanceResult<()> {
        let mut batch = WriteBatch::new();
        batch.guard(snapshot.guard());
        batch.set(snapshot.key(), serviceman)?;
        self.store_service.commit(batch).await
    }

    /// Department an actor is confined to: an officer's own, none for an admin.
    pub async fn department_scope(&self, actor: &Actor) -> GrievanceResult<Option<String>> {
        match actor.role {
            Role::Admin => Ok(None),
            Role::Officer => {
                let officer = self.get_officer(&actor.id).await?;
                if !officer.is_active {
                    return Err(GrievanceError::forbidden("Officer account is deactivated"));
                }
                Ok(Some(officer.department))
            }
            _ => Err(GrievanceError::InsufficientPermissions),
        }
    }
}

/// Case-insensitive department match, the way routing keys compare.
pub fn same_department(left: &str, right: &str) -> bool {
    left.trim().eq_ignore_ascii_case(right.trim())
}

#[async_trait]
impl DirectoryOperations for DirectoryService {
    async fn register_citizen(&self, registration: CitizenRegistration) -> GrievanceResult<CitizenResponse> {
        let mut errors = Self::validate_credentials(&registration.name, &registration.email, &registration.password);
        Self::require_field(&mut errors, "district", &registration.district);
        Self::require_field(&mut errors, "phone", &registration.phone);
        Self::check(errors)?;

        let email = registration.email.trim().to_lowercase();
        self.ensure_email_free(&email).await?;
        tracing::info!("Registering citizen: {}", email);

        let citizen = Citizen {
            id: IdGenerator::generate(IdType::Citizen),
            name: registration.name.trim().to_string(),
            email,
            phone: registration.phone.trim().to_string(),
            district: registration.district.trim().to_string(),
            is_active: true,
            password_hash: password::hash_password(&registration.password)?,
            created_at: Utc::now(),
        };

        let mut batch = WriteBatch::new();
        Self::stage_email(&mut batch, &citizen.email, Role::Citizen, &citizen.id)?;
        batch.set(&StoreKeys::citizen(&citizen.id), &citizen)?;
        batch.sadd(&StoreKeys::citizens_all(), &citizen.id);
        self.store_service.commit(batch).await?;

        Ok(citizen.into())
    }

    async fn register_officer(&self, registration: OfficerRegistration) -> GrievanceResult<OfficerResponse> {
        let mut errors = Self::validate_credentials(&registration.name, &registration.email, &registration.password);
        Self::require_field(&mut errors, "department", &registration.department);
        Self::require_field(&mut errors, "district", &registration.district);
        Self::check(errors)?;

        let email = registration.email.trim().to_lowercase();
        self.ensure_email_free(&email).await?;
        self.ensure_department_exists(&registration.department).await?;

        let now = Utc::now();
        let officer = Officer {
            id: IdGenerator::generate(IdType::Officer),
            name: registration.name.trim().to_string(),
            email,
            level: registration.level,
            department: registration.department.trim().to_string(),
            district: registration.district.trim().to_string(),
            is_active: true,
            password_hash: password::hash_password(&registration.password)?,
            created_at: now,
            updated_at: now,
        };

        let mut batch = WriteBatch::new();
        Self::stage_email(&mut batch, &officer.email, Role::Officer, &officer.id)?;
        batch.set(&StoreKeys::officer(&officer.id), &officer)?;
        batch.sadd(&StoreKeys::officers_by_route(&officer.department, &officer.district), &officer.id);
        batch.sadd(&StoreKeys::officers_all(), &officer.id);

        // One active first responder per (department, district)
        if officer.routes_new_complaints() {
            let router = StoreKeys::officer_router(&officer.department, &officer.district);
            let current: Option<String> = self.store_service.get(&router).await?;
            if let Some(existing) = current {
                return Err(GrievanceError::conflict(format!(
                    "Officer {} already receives {} complaints for {}",
                    existing, officer.department, officer.district
                )));
            }
            batch.expect_absent(&router);
            batch.set(&router, &officer.id)?;
        }

        self.store_service.commit(batch).await?;
        tracing::info!(
            "Officer {} registered (level {}) for {} / {}",
            officer.id,
            u8::from(officer.level),
            officer.department,
            officer.district
        );

        Ok(officer.into())
    }

    async fn register_serviceman(
        &self,
        registration: ServiceManRegistration,
        added_by: &Actor,
    ) -> GrievanceResult<ServiceManResponse> {
        added_by.require_any(&[Role::Officer, Role::Admin])?;

        let department = match added_by.role {
            Role::Officer => self.get_officer(&added_by.id).await?.department,
            _ => registration.department.clone().unwrap_or_default(),
        };

        let mut errors = Self::validate_credentials(&registration.name, &registration.email, &registration.password);
        Self::require_field(&mut errors, "department", &department);
        Self::require_field(&mut errors, "district", &registration.district);
        Self::require_field(&mut errors, "phone", &registration.phone);
        Self::check(errors)?;

        let email = registration.email.trim().to_lowercase();
        self.ensure_email_free(&email).await?;
        self.ensure_department_exists(&department).await?;

        let now = Utc::now();
        let serviceman = ServiceMan {
            id: IdGenerator::generate(IdType::ServiceMan),
            name: registration.name.trim().to_string(),
            email,
            phone: registration.phone.trim().to_string(),
            department: department.trim().to_string(),
            district: registration.district.trim().to_string(),
            specialization: registration.specialization,
            status: ServiceManStatus::Available,
            current_complaint: None,
            current_location: None,
            stats: ServiceManStats::default(),
            added_by: Some(added_by.id.clone()),
            password_hash: password::hash_password(&registration.password)?,
            created_at: now,
            updated_at: now,
        };

        let mut batch = WriteBatch::new();
        Self::stage_email(&mut batch, &serviceman.email, Role::ServiceMan, &serviceman.id)?;
        batch.set(&StoreKeys::serviceman(&serviceman.id), &serviceman)?;
        batch.sadd(&StoreKeys::servicemen_by_department(&serviceman.department), &serviceman.id);
        self.store_service.commit(batch).await?;

        tracing::info!("ServiceMan {} added to {} by {}", serviceman.id, serviceman.department, added_by.id);
        Ok(serviceman.into())
    }

    async fn register_admin(&self, registration: AdminRegistration) -> GrievanceResult<AccountProfile> {
        Self::check(Self::validate_credentials(
            &registration.name,
            &registration.email,
            &registration.password,
        ))?;

        let email = registration.email.trim().to_lowercase();
        self.ensure_email_free(&email).await?;

        let admin = Admin {
            id: IdGenerator::generate(IdType::Admin),
            name: registration.name.trim().to_string(),
            email,
            password_hash: password::hash_password(&registration.password)?,
            created_at: Utc::now(),
        };

        let mut batch = WriteBatch::new();
        Self::stage_email(&mut batch, &admin.email, Role::Admin, &admin.id)?;
        batch.set(&StoreKeys::admin(&admin.id), &admin)?;
        self.store_service.commit(batch).await?;

        tracing::info!("Admin account created: {}", admin.email);
        Ok(Account::Admin(admin).profile())
    }

    async fn find_by_email(&self, email: &str) -> GrievanceResult<Option<Account>> {
        let Some(account_ref) = self.store_service.get::<AccountRef>(&StoreKeys::account_email(email)).await? else {
            return Ok(None);
        };

        let key = Self::account_key(&account_ref);
        let account = match account_ref.role {
            Role::Citizen => self.store_service.get(&key).await?.map(Account::Citizen),
            Role::Officer => self.store_service.get(&key).await?.map(Account::Officer),
            Role::ServiceMan => self.store_service.get(&key).await?.map(Account::ServiceMan),
            Role::Admin => self.store_service.get(&key).await?.map(Account::Admin),
        };

        if account.is_none() {
            tracing::warn!("Email index for {} points at missing {}", email, key);
        }
        Ok(account)
    }

    async fn login(&self, login: LoginRequest) -> GrievanceResult<LoginResponse> {
        let account = self
            .find_by_email(&login.email)
            .await?
            .ok_or_else(|| GrievanceError::unauthorized("Invalid credentials"))?;
        if !password::verify_password(&login.password, account.password_hash())? {
            return Err(GrievanceError::unauthorized("Invalid credentials"));
        }

        match &account {
            Account::Officer(officer) if !officer.is_active => {
                return Err(GrievanceError::forbidden("Officer account is deactivated"));
            }
            Account::Citizen(citizen) if !citizen.is_active => {
                return Err(GrievanceError::forbidden("Citizen account is deactivated"));
            }
            _ => {}
        }

        let now = Utc::now();
        let session = Session {
            token: nanoid::nanoid!(32),
            actor: Actor::new(account.id(), account.role(), account.name()),
            created_at: now,
            expires_at: now + Duration::hours(SESSION_HOURS),
        };

        let mut batch = WriteBatch::new();
        batch.set(&StoreKeys::session(&session.token), &session)?;
        self.store_service.commit(batch).await?;

        tracing::info!("{} {} logged in", account.role(), account.id());
        Ok(LoginResponse {
            token: session.token,
            role: account.role(),
            account: account.profile(),
            expires_at: session.expires_at,
        })
    }

    async fn resolve_session(&self, token: &str) -> GrievanceResult<Actor> {
        let snapshot = self
            .store_service
            .load::<Session>(&StoreKeys::session(token))
            .await?
            .ok_or(GrievanceError::TokenInvalid)?;

        if snapshot.value.expires_at <= Utc::now() {
            tracing::debug!("Session for {} expired, dropping it", snapshot.value.actor.id);
            let mut batch = WriteBatch::new();
            batch.guard(snapshot.guard());
            batch.delete(snapshot.key());
            // A concurrent refresh or delete wins; the token is rejected either way
            if let Err(e) = self.store_service.commit(batch).await {
                tracing::warn!("Could not drop expired session: {}", e);
            }
            return Err(GrievanceError::TokenInvalid);
        }
        Ok(snapshot.into_inner().actor)
    }

    async fn get_citizen(&self, citizen_id: &str) -> GrievanceResult<Citizen> {
        self.store_service
            .get(&StoreKeys::citizen(citizen_id))
            .await?
            .ok_or_else(|| GrievanceError::not_found(format!("Citizen {} not found", citizen_id)))
    }

    async fn get_officer(&self, officer_id: &str) -> GrievanceResult<Officer> {
        self.store_service
            .get(&StoreKeys::officer(officer_id))
            .await?
            .ok_or_else(|| GrievanceError::officer_not_found(officer_id))
    }

    async fn get_serviceman(&self, serviceman_id: &str) -> GrievanceResult<ServiceMan> {
        self.store_service
            .get(&StoreKeys::serviceman(serviceman_id))
            .await?
            .ok_or_else(|| GrievanceError::serviceman_not_found(serviceman_id))
    }

    async fn list_officers(&self) -> GrievanceResult<Vec<OfficerResponse>> {
        let officers: Vec<Officer> = self.store_service.collect(&StoreKeys::officers_all(), StoreKeys::officer).await?;
        Ok(officers.into_iter().map(OfficerResponse::from).collect())
    }

    async fn list_servicemen(&self, department: &str) -> GrievanceResult<Vec<ServiceManResponse>> {
        tracing::debug!("Listing servicemen for department: {}", department);
        let servicemen: Vec<ServiceMan> = self
            .store_service
            .collect(&StoreKeys::servicemen_by_department(department), StoreKeys::serviceman)
            .await?;
        Ok(servicemen.into_iter().map(ServiceManResponse::from).collect())
    }

    async fn set_serviceman_status(
        &self,
        serviceman_id: &str,
        status: ServiceManStatus,
    ) -> GrievanceResult<ServiceManResponse> {
        let snapshot = self
            .store_service
            .require::<ServiceMan>(&StoreKeys::serviceman(serviceman_id), || {
                GrievanceError::serviceman_not_found(serviceman_id)
            })
            .await?;

        let mut serviceman = snapshot.value.clone();
        serviceman.set_status_manually(status, Utc::now())?;

        let mut batch = WriteBatch::new();
        batch.guard(snapshot.guard());
        batch.set(snapshot.key(), &serviceman)?;
        self.store_service.commit(batch).await?;

        tracing::info!("ServiceMan {} is now {:?}", serviceman.id, serviceman.status);
        Ok(serviceman.into())
    }

    async fn set_officer_active(&self, officer_id: &str, is_active: bool) -> GrievanceResult<OfficerResponse> {
        let snapshot = self
            .store_service
            .require::<Officer>(&StoreKeys::officer(officer_id), || GrievanceError::officer_not_found(officer_id))
            .await?;

        let mut officer = snapshot.value.clone();
        if officer.is_active == is_active {
            return Ok(officer.into());
        }
        officer.is_active = is_active;
        officer.updated_at = Utc::now();

        let mut batch = WriteBatch::new();
        batch.guard(snapshot.guard());
        batch.set(snapshot.key(), &officer)?;

        if officer.level == OfficerLevel::FirstResponder {
            let router = StoreKeys::officer_router(&officer.department, &officer.district);
            let current: Option<String> = self.store_service.get(&router).await?;
            match (is_active, current) {
                (true, None) => {
                    batch.expect_absent(&router);
                    batch.set(&router, &officer.id)?;
                }
                (true, Some(existing)) if existing != officer.id => {
                    return Err(GrievanceError::conflict(format!(
                        "Officer {} already receives complaints for this district",
                        existing
                    )));
                }
                (false, Some(existing)) if existing == officer.id => {
                    batch.delete(&router);
                }
                _ => {}
            }
        }

        self.store_service.commit(batch).await?;
        tracing::info!("Officer {} active={}", officer.id, officer.is_active);
        Ok(officer.into())
    }

    async fn update_officer(&self, officer_id: &str, update: OfficerUpdate) -> GrievanceResult<OfficerResponse> {
        let snapshot = self
            .store_service
            .require::<Officer>(&StoreKeys::officer(officer_id), || GrievanceError::officer_not_found(officer_id))
            .await?;

        let mut errors = Vec::new();
        for (field, value) in [
            ("name", &update.name),
            ("department", &update.department),
            ("district", &update.district),
        ] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                errors.push(ValidationError {
                    field: field.to_string(),
                    message: format!("{} cannot be empty", field),
                });
            }
        }
        if update.password.as_deref().is_some_and(|p| !password::is_acceptable(p)) {
            errors.push(ValidationError {
                field: "password".to_string(),
                message: "Password must be at least 6 characters".to_string(),
            });
        }
        Self::check(errors)?;

        let before = snapshot.value.clone();
        let mut officer = before.clone();
        if let Some(name) = update.name {
            officer.name = name.trim().to_string();
        }
        if let Some(level) = update.level {
            officer.level = level;
        }
        if let Some(department) = update.department {
            self.ensure_department_exists(&department).await?;
            officer.department = department.trim().to_string();
        }
        if let Some(district) = update.district {
            officer.district = district.trim().to_string();
        }
        if let Some(new_password) = update.password {
            officer.password_hash = password::hash_password(&new_password)?;
        }
        officer.updated_at = Utc::now();

        let mut batch = WriteBatch::new();
        batch.guard(snapshot.guard());
        batch.set(snapshot.key(), &officer)?;
        self.stage_routing(&mut batch, &before, &officer).await?;
        self.store_service.commit(batch).await?;

        tracing::info!("Officer {} updated", officer.id);
        Ok(officer.into())
    }

    /// Refused while the officer still owns unresolved complaints.
    async fn delete_officer(&self, officer_id: &str) -> GrievanceResult<()> {
        let snapshot = self
            .store_service
            .require::<Officer>(&StoreKeys::officer(officer_id), || GrievanceError::officer_not_found(officer_id))
            .await?;
        let officer = &snapshot.value;

        let complaints: Vec<Complaint> = self
            .store_service
            .collect(&StoreKeys::complaints_by_department(&officer.department), StoreKeys::complaint)
            .await?;
        let open = complaints
            .iter()
            .filter(|c| c.officer_id == officer.id && c.status != ComplaintStatus::Resolved)
            .count();
        if open > 0 {
            return Err(GrievanceError::bad_request(format!(
                "Officer {} still handles {} open complaint(s)",
                officer.id, open
            )));
        }

        let mut batch = WriteBatch::new();
        batch.guard(snapshot.guard());
        batch.delete(snapshot.key());
        batch.delete(&StoreKeys::account_email(&officer.email));
        batch.delete(&StoreKeys::officer_ratings(&officer.id));
        batch.srem(&StoreKeys::officers_all(), &officer.id);
        batch.srem(&StoreKeys::officers_by_route(&officer.department, &officer.district), &officer.id);

        let router = StoreKeys::officer_router(&officer.department, &officer.district);
        if let Some(route) = self.store_service.load::<String>(&router).await? {
            if route.value == officer.id {
                batch.guard(route.guard());
                batch.delete(&router);
            }
        }

        // Departments keep no dangling in-charge reference
        let departments: Vec<Department> = self
            .store_service
            .collect(&StoreKeys::departments_all(), StoreKeys::department)
            .await?;
        for department in departments.into_iter().filter(|d| d.in_charge.as_deref() == Some(officer_id)) {
            if let Some(current) = self
                .store_service
                .load::<Department>(&StoreKeys::department(&department.id))
                .await?
            {
                let mut updated = current.value.clone();
                updated.in_charge = None;
                updated.updated_at = Utc::now();
                batch.guard(current.guard());
                batch.set(current.key(), &updated)?;
            }
        }

        self.store_service.commit(batch).await?;
        tracing::info!("Officer {} deleted", officer_id);
        Ok(())
    }

    async fn officers_for_route(&self, department: &str, district: &str) -> GrievanceResult<Vec<Officer>> {
        self.store_service
            .collect(&StoreKeys::officers_by_route(department, district), StoreKeys::officer)
            .await
    }

    /// Newest first, one page at a time.
    async fn list_citizens(&self, query: CitizensQuery) -> GrievanceResult<CitizenPage> {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query
            .limit
            .unwrap_or(CITIZENS_PAGE_SIZE)
            .clamp(1, CITIZENS_MAX_PAGE_SIZE);

        let mut citizens: Vec<Citizen> = self
            .store_service
            .collect(&StoreKeys::citizens_all(), StoreKeys::citizen)
            .await?;
        citizens.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = citizens.len();
        let citizens = citizens
            .into_iter()
            .skip((page - 1) * limit)
            .take(limit)
            .map(CitizenResponse::from)
            .collect();

        Ok(CitizenPage {
            citizens,
            page,
            limit,
            total,
            pages: total.div_ceil(limit),
        })
    }

    async fn set_citizen_active(&self, citizen_id: &str, is_active: bool) -> GrievanceResult<CitizenResponse> {
        let snapshot = self
            .store_service
            .require::<Citizen>(&StoreKeys::citizen(citizen_id), || {
                GrievanceError::not_found(format!("Citizen {} not found", citizen_id))
            })
            .await?;

        let mut citizen = snapshot.value.clone();
        if citizen.is_active != is_active {
            citizen.is_active = is_active;
            let mut batch = WriteBatch::new();
            batch.guard(snapshot.guard());
            batch.set(snapshot.key(), &citizen)?;
            self.store_service.commit(batch).await?;
            tracing::info!("Citizen {} active={}", citizen.id, citizen.is_active);
        }
        Ok(citizen.into())
    }

    async fn update_serviceman(
        &self,
        actor: &Actor,
        serviceman_id: &str,
        update: ServiceManUpdate,
    ) -> GrievanceResult<ServiceManResponse> {
        let snapshot = self.load_managed_serviceman(actor, serviceman_id).await?;
        let mut serviceman = snapshot.value.clone();
        serviceman.apply_update(update, Utc::now())?;
        self.save_serviceman(&snapshot, &serviceman).await?;

        tracing::info!("ServiceMan {} updated by {}", serviceman.id, actor.id);
        Ok(serviceman.into())
    }

    /// A technician holding a complaint can't be removed until released.
    async fn delete_serviceman(&self, actor: &Actor, serviceman_id: &str) -> GrievanceResult<()> {
        let snapshot = self.load_managed_serviceman(actor, serviceman_id).await?;
        let serviceman = &snapshot.value;
        serviceman.ensure_removable()?;

        let mut batch = WriteBatch::new();
        batch.guard(snapshot.guard());
        batch.delete(snapshot.key());
        batch.delete(&StoreKeys::account_email(&serviceman.email));
        batch.srem(&StoreKeys::servicemen_by_department(&serviceman.department), &serviceman.id);
        self.store_service.commit(batch).await?;

        tracing::info!("ServiceMan {} deleted by {}", serviceman_id, actor.id);
        Ok(())
    }

    async fn update_profile(&self, serviceman_id: &str, update: ProfileUpdate) -> GrievanceResult<ServiceManResponse> {
        let snapshot = self
            .store_service
            .require::<ServiceMan>(&StoreKeys::serviceman(serviceman_id), || {
                GrievanceError::serviceman_not_found(serviceman_id)
            })
            .await?;
        let mut serviceman = snapshot.value.clone();
        serviceman.apply_profile(update, Utc::now())?;
        self.save_serviceman(&snapshot, &serviceman).await?;
        Ok(serviceman.into())
    }

    async fn update_location(&self, serviceman_id: &str, update: LocationUpdate) -> GrievanceResult<ServiceManResponse> {
        let snapshot = self
            .store_service
            .require::<ServiceMan>(&StoreKeys::serviceman(serviceman_id), || {
                GrievanceError::serviceman_not_found(serviceman_id)
            })
            .await?;
        let mut serviceman = snapshot.value.clone();
        serviceman.move_to(update, Utc::now())?;
        self.save_serviceman(&snapshot, &serviceman).await?;

        tracing::debug!("ServiceMan {} location updated", serviceman.id);
        Ok(serviceman.into())
    }
}
