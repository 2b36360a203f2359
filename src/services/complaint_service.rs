// src/services/complaint_service.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::{
    errors::{GrievanceError, GrievanceResult},
    models::{
        account::{Actor, Officer, Role, ServiceMan, ServiceManStatus},
        complaint::{
            AiAnalysis, Complaint, ComplaintRequest, ComplaintResponse, ComplaintStatus, DepartmentStats,
            FeedbackEntry, HistoryPage, MAX_REOPENS, ProgressUpdate, ReopenRequest, TimelineAction, TimelineEntry,
        },
    },
    services::{
        assignment_service::{AssignmentOperations, AssignmentService},
        directory_service::{DirectoryOperations, DirectoryService, same_department},
        messaging_service::NotificationService,
        rating_service::{RatingOperations, RatingService},
        store_service::{Snapshot, StoreKeys, StoreService, WriteBatch},
        triage_service::TriageAdvisor,
    },
    utils::id_generator::{IdType, WithGeneratedId},
};

const MAX_PAGE_SIZE: usize = 100;

/// Tunables of the complaint listings.
#[derive(Debug, Clone, Copy)]
pub struct LifecyclePolicy {
    pub history_page_size: usize,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            history_page_size: 20,
        }
    }
}

#[async_trait]
pub trait ComplaintOperations: Send + Sync {
    async fn create_complaint(&self, citizen: &Actor, request: ComplaintRequest) -> GrievanceResult<Complaint>;
    async fn list_for_citizen(&self, citizen: &Actor) -> GrievanceResult<Vec<Complaint>>;
    async fn get_for_citizen(&self, citizen: &Actor, complaint_id: &str) -> GrievanceResult<Complaint>;
    async fn reopen(&self, citizen: &Actor, complaint_id: &str, request: ReopenRequest) -> GrievanceResult<Complaint>;
    async fn delete(&self, citizen: &Actor, complaint_id: &str) -> GrievanceResult<()>;
    async fn send_reminder(&self, citizen: &Actor, complaint_id: &str) -> GrievanceResult<Complaint>;
    async fn rate_officer(&self, citizen: &Actor, complaint_id: &str, stars: u8) -> GrievanceResult<Complaint>;
    async fn add_feedback(&self, officer: &Actor, complaint_id: &str, feedback: &str) -> GrievanceResult<FeedbackEntry>;
    async fn record_progress(
        &self,
        serviceman: &Actor,
        complaint_id: &str,
        update: ProgressUpdate,
    ) -> GrievanceResult<Complaint>;
    async fn history(
        &self,
        actor: &Actor,
        complaint_id: &str,
        page: Option<usize>,
        per_page: Option<usize>,
    ) -> GrievanceResult<HistoryPage>;
    async fn list_for_department(&self, officer: &Actor) -> GrievanceResult<Vec<Complaint>>;
    async fn get_for_department(&self, officer: &Actor, complaint_id: &str) -> GrievanceResult<Complaint>;
    async fn department_stats(&self, officer: &Actor) -> GrievanceResult<DepartmentStats>;
    async fn list_for_serviceman(&self, serviceman: &Actor) -> GrievanceResult<Vec<Complaint>>;
    async fn get_for_serviceman(&self, serviceman: &Actor, complaint_id: &str) -> GrievanceResult<Complaint>;
    async fn annotate(&self, actor: &Actor, complaint_id: &str, analysis: AiAnalysis) -> GrievanceResult<Complaint>;
    async fn analyze(&self, subject: &str, description: &str) -> GrievanceResult<AiAnalysis>;
    async fn respond(&self, complaint: Complaint) -> GrievanceResult<ComplaintResponse>;
}

pub struct ComplaintService {
    store_service: Arc<StoreService>,
    directory_service: Arc<DirectoryService>,
    assignment_service: Arc<AssignmentService>,
    rating_service: Arc<RatingService>,
    notification_service: Arc<dyn NotificationService>,
    triage_advisor: Arc<dyn TriageAdvisor>,
    policy: LifecyclePolicy,
}

impl ComplaintService {
    pub fn new(
        store_service: Arc<StoreService>,
        directory_service: Arc<DirectoryService>,
        assignment_service: Arc<AssignmentService>,
        rating_service: Arc<RatingService>,
        notification_service: Arc<dyn NotificationService>,
        triage_advisor: Arc<dyn TriageAdvisor>,
        policy: LifecyclePolicy,
    ) -> Self {
        Self {
            store_service,
            directory_service,
            assignment_service,
            rating_service,
            notification_service,
            triage_advisor,
            policy,
        }
    }

    async fn load(&self, complaint_id: &str) -> GrievanceResult<Snapshot<Complaint>> {
        self.store_service
            .require(&StoreKeys::complaint(complaint_id), || {
                GrievanceError::complaint_not_found(complaint_id)
            })
            .await
    }

    /// Owner-only read: someone else's complaint looks missing.
    async fn load_owned(&self, citizen: &Actor, complaint_id: &str) -> GrievanceResult<Snapshot<Complaint>> {
        let snapshot = self.load(complaint_id).await?;
        if !snapshot.value.is_owned_by(&citizen.id) {
            return Err(GrievanceError::complaint_not_found(complaint_id));
        }
        Ok(snapshot)
    }

    async fn officer_department(&self, officer: &Actor) -> GrievanceResult<String> {
        officer.require(Role::Officer)?;
        self.directory_service
            .department_scope(officer)
            .await?
            .ok_or(GrievanceError::InsufficientPermissions)
    }

    async fn ensure_can_view(&self, actor: &Actor, complaint: &Complaint) -> GrievanceResult<()> {
        let visible = match actor.role {
            Role::Citizen => complaint.is_owned_by(&actor.id),
            Role::ServiceMan => complaint.is_assigned_to(&actor.id),
            Role::Officer => {
                let department = self.officer_department(actor).await?;
                same_department(&department, &complaint.department)
            }
            Role::Admin => true,
        };
        if visible {
            Ok(())
        } else {
            Err(GrievanceError::complaint_not_found(&complaint.id))
        }
    }

    fn action_entry(officer: &Officer, feedback: &str, at: DateTime<Utc>) -> FeedbackEntry {
        FeedbackEntry {
            time: at,
            officer_name: officer.name.clone(),
            officer_level: u8::from(officer.level),
            feedback: feedback.to_string(),
        }
    }

    /// Advisory only: a failing advisor never blocks creation.
    async fn triage(&self, request: &ComplaintRequest) -> Option<AiAnalysis> {
        if request.ai_analysis.is_some() || !self.triage_advisor.is_enabled() {
            return request.ai_analysis.clone();
        }
        match self.triage_advisor.analyze(&request.subject, &request.description).await {
            Ok(analysis) => analysis,
            Err(e) => {
                tracing::warn!("Triage failed, creating complaint without analysis: {}", e);
                None
            }
        }
    }

    fn sort_oldest_first(mut complaints: Vec<Complaint>) -> Vec<Complaint> {
        complaints.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        complaints
    }
}

#[async_trait]
impl ComplaintOperations for ComplaintService {
    async fn create_complaint(&self, citizen: &Actor, request: ComplaintRequest) -> GrievanceResult<Complaint> {
        citizen.require(Role::Citizen)?;
        request.validate()?;

        let account = self.directory_service.get_citizen(&citizen.id).await?;
        let officer = self
            .assignment_service
            .route_officer(&account.district, &request.department)
            .await?;

        let analysis = self.triage(&request).await;
        let now = Utc::now();
        let mut complaint =
            Complaint::new(request, &account.id, &account.email, &officer.id, now).with_generated_id(IdType::Complaint);
        complaint.ai_analysis = analysis;

        let complaint_key = StoreKeys::complaint(&complaint.id);
        let mut batch = WriteBatch::new();
        batch.expect_absent(&complaint_key);
        batch.set(&complaint_key, &complaint)?;
        batch.sadd(&StoreKeys::complaints_by_citizen(&account.id), &complaint.id);
        batch.sadd(&StoreKeys::complaints_by_department(&complaint.department), &complaint.id);
        batch.sadd(&StoreKeys::complaints_all(), &complaint.id);
        batch.push(
            &StoreKeys::complaint_action_history(&complaint.id),
            &Self::action_entry(&officer, "Complaint received", now),
        )?;
        batch.push(
            &StoreKeys::complaint_timeline(&complaint.id),
            &TimelineEntry::new(
                TimelineAction::Created,
                citizen,
                Some(format!("Routed to officer {}", officer.name)),
                now,
            ),
        )?;
        self.store_service.commit(batch).await?;

        tracing::info!(
            "Complaint {} created by {} and routed to officer {}",
            complaint.id,
            account.id,
            officer.id
        );
        Ok(complaint)
    }

    async fn list_for_citizen(&self, citizen: &Actor) -> GrievanceResult<Vec<Complaint>> {
        citizen.require(Role::Citizen)?;
        tracing::debug!("Listing complaints for citizen {}", citizen.id);
        let complaints = self
            .store_service
            .collect(&StoreKeys::complaints_by_citizen(&citizen.id), StoreKeys::complaint)
            .await?;
        Ok(Self::sort_oldest_first(complaints))
    }

    async fn get_for_citizen(&self, citizen: &Actor, complaint_id: &str) -> GrievanceResult<Complaint> {
        citizen.require(Role::Citizen)?;
        Ok(self.load_owned(citizen, complaint_id).await?.into_inner())
    }

    async fn reopen(&self, citizen: &Actor, complaint_id: &str, request: ReopenRequest) -> GrievanceResult<Complaint> {
        citizen.require(Role::Citizen)?;
        let snapshot = self.load(complaint_id).await?;

        let now = Utc::now();
        let mut complaint = snapshot.value.clone();
        complaint.reopen(
            &citizen.id,
            request.status,
            request.feedback.as_deref(),
            now,
        )?;

        let officer = self.directory_service.get_officer(&complaint.officer_id).await?;
        let note = request
            .feedback
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty());

        let mut batch = WriteBatch::new();
        batch.guard(snapshot.guard());
        batch.set(snapshot.key(), &complaint)?;
        if let Some(serviceman_id) = &snapshot.value.assigned_service_man {
            batch.srem(&StoreKeys::complaints_by_serviceman(serviceman_id), complaint_id);
        }
        batch.push(
            &StoreKeys::complaint_action_history(complaint_id),
            &Self::action_entry(&officer, "Complaint reopened by citizen.", now),
        )?;
        batch.push(
            &StoreKeys::complaint_timeline(complaint_id),
            &TimelineEntry::new(TimelineAction::Reopened, citizen, note, now),
        )?;
        self.store_service.commit(batch).await?;

        tracing::info!(
            "Complaint {} reopened by {} ({} of {})",
            complaint_id,
            citizen.id,
            complaint.reopen_count,
            MAX_REOPENS
        );

        if let Err(e) = self.notification_service.notify_officer_reopened(&officer, &complaint).await {
            tracing::warn!("Failed to notify officer {} of reopen: {}", officer.id, e);
        }
        Ok(complaint)
    }

    async fn delete(&self, citizen: &Actor, complaint_id: &str) -> GrievanceResult<()> {
        citizen.require(Role::Citizen)?;
        let snapshot = self.load(complaint_id).await?;
        let complaint = &snapshot.value;
        complaint.ensure_deletable(&citizen.id)?;

        let mut batch = WriteBatch::new();
        batch.guard(snapshot.guard());
        batch.delete(snapshot.key());
        batch.srem(&StoreKeys::complaints_by_citizen(&complaint.created_by), complaint_id);
        batch.srem(&StoreKeys::complaints_by_department(&complaint.department), complaint_id);
        batch.srem(&StoreKeys::complaints_all(), complaint_id);
        batch.delete(&StoreKeys::complaint_timeline(complaint_id));
        batch.delete(&StoreKeys::complaint_action_history(complaint_id));

        // A technician still on the job goes back to the pool
        if let Some(serviceman_id) = &complaint.assigned_service_man {
            batch.srem(&StoreKeys::complaints_by_serviceman(serviceman_id), complaint_id);
            if let Some(tech) = self
                .store_service
                .load::<ServiceMan>(&StoreKeys::serviceman(serviceman_id))
                .await?
            {
                if tech.value.is_working_on(complaint_id) {
                    let mut released = tech.value.clone();
                    released.release(Utc::now());
                    batch.guard(tech.guard());
                    batch.set(tech.key(), &released)?;
                }
            }
        }

        self.store_service.commit(batch).await?;
        tracing::info!("Complaint {} deleted by {}", complaint_id, citizen.id);
        Ok(())
    }

    async fn send_reminder(&self, citizen: &Actor, complaint_id: &str) -> GrievanceResult<Complaint> {
        citizen.require(Role::Citizen)?;
        let snapshot = self.load(complaint_id).await?;

        let now = Utc::now();
        let mut complaint = snapshot.value.clone();
        complaint.remind(&citizen.id, now)?;
        let officer = self.directory_service.get_officer(&complaint.officer_id).await?;

        let mut batch = WriteBatch::new();
        batch.guard(snapshot.guard());
        batch.set(snapshot.key(), &complaint)?;
        batch.push(
            &StoreKeys::complaint_action_history(complaint_id),
            &Self::action_entry(&officer, "Reminder mail received by assigned officer.", now),
        )?;
        self.store_service.commit(batch).await?;

        tracing::info!("Reminder sent on complaint {} to officer {}", complaint_id, officer.id);
        if let Err(e) = self.notification_service.notify_officer_reminder(&officer, &complaint).await {
            tracing::warn!("Failed to deliver reminder to officer {}: {}", officer.id, e);
        }
        Ok(complaint)
    }

    async fn rate_officer(&self, citizen: &Actor, complaint_id: &str, stars: u8) -> GrievanceResult<Complaint> {
        citizen.require(Role::Citizen)?;
        let snapshot = self.load(complaint_id).await?;

        let now = Utc::now();
        let mut complaint = snapshot.value.clone();
        complaint.rate(&citizen.id, stars, now)?;

        let mut batch = WriteBatch::new();
        batch.guard(snapshot.guard());
        batch.set(snapshot.key(), &complaint)?;
        let ledger = self
            .rating_service
            .stage_rating(&mut batch, &complaint.officer_id, stars, complaint_id, &citizen.id, now)
            .await?;
        self.store_service.commit(batch).await?;

        tracing::info!(
            "Officer {} rated {} on complaint {} (avg {:.2})",
            complaint.officer_id,
            stars,
            complaint_id,
            ledger.avg_rating
        );

        match self.directory_service.get_officer(&complaint.officer_id).await {
            Ok(officer) => {
                if let Err(e) = self
                    .notification_service
                    .notify_officer_rated(&officer, &complaint, stars)
                    .await
                {
                    tracing::warn!("Failed to notify officer {} of rating: {}", officer.id, e);
                }
            }
            Err(e) => tracing::warn!("Rated officer {} not found: {}", complaint.officer_id, e),
        }
        Ok(complaint)
    }

    async fn add_feedback(&self, officer: &Actor, complaint_id: &str, feedback: &str) -> GrievanceResult<FeedbackEntry> {
        let department = self.officer_department(officer).await?;
        if feedback.trim().is_empty() {
            return Err(GrievanceError::validation_error("feedback", "Please provide feedback"));
        }

        let snapshot = self.load(complaint_id).await?;
        if !same_department(&department, &snapshot.value.department) {
            return Err(GrievanceError::complaint_not_found(complaint_id));
        }

        let now = Utc::now();
        let account = self.directory_service.get_officer(&officer.id).await?;
        let entry = Self::action_entry(&account, feedback.trim(), now);
        let mut complaint = snapshot.value.clone();
        complaint.updated_at = now;

        // Entries are never deduplicated
        let mut batch = WriteBatch::new();
        batch.guard(snapshot.guard());
        batch.set(snapshot.key(), &complaint)?;
        batch.push(&StoreKeys::complaint_action_history(complaint_id), &entry)?;
        self.store_service.commit(batch).await?;

        tracing::info!("Officer {} added feedback on complaint {}", officer.id, complaint_id);
        Ok(entry)
    }

    async fn record_progress(
        &self,
        serviceman: &Actor,
        complaint_id: &str,
        update: ProgressUpdate,
    ) -> GrievanceResult<Complaint> {
        serviceman.require(Role::ServiceMan)?;
        let snapshot = self.load(complaint_id).await?;

        let now = Utc::now();
        let mut complaint = snapshot.value.clone();
        complaint.record_progress(&serviceman.id, update.status, now)?;

        let mut batch = WriteBatch::new();
        batch.guard(snapshot.guard());
        batch.set(snapshot.key(), &complaint)?;
        batch.push(
            &StoreKeys::complaint_timeline(complaint_id),
            &TimelineEntry::new(TimelineAction::InProgress, serviceman, update.note, now),
        )?;
        self.store_service.commit(batch).await?;

        tracing::info!("Serviceman {} logged progress on complaint {}", serviceman.id, complaint_id);
        Ok(complaint)
    }

    async fn history(
        &self,
        actor: &Actor,
        complaint_id: &str,
        page: Option<usize>,
        per_page: Option<usize>,
    ) -> GrievanceResult<HistoryPage> {
        let complaint = self.load(complaint_id).await?.into_inner();
        self.ensure_can_view(actor, &complaint).await?;

        let page = page.unwrap_or(1).max(1);
        let per_page = per_page
            .unwrap_or(self.policy.history_page_size)
            .clamp(1, MAX_PAGE_SIZE);

        let (timeline, timeline_total) = self
            .store_service
            .page(&StoreKeys::complaint_timeline(complaint_id), page, per_page)
            .await?;
        let (action_history, action_history_total) = self
            .store_service
            .page(&StoreKeys::complaint_action_history(complaint_id), page, per_page)
            .await?;

        Ok(HistoryPage {
            complaint_id: complaint_id.to_string(),
            page,
            per_page,
            timeline_total,
            action_history_total,
            timeline,
            action_history,
        })
    }

    async fn list_for_department(&self, officer: &Actor) -> GrievanceResult<Vec<Complaint>> {
        let department = self.officer_department(officer).await?;
        tracing::debug!("Listing complaints for department {}", department);
        let complaints = self
            .store_service
            .collect(&StoreKeys::complaints_by_department(&department), StoreKeys::complaint)
            .await?;
        Ok(Self::sort_oldest_first(complaints))
    }

    async fn get_for_department(&self, officer: &Actor, complaint_id: &str) -> GrievanceResult<Complaint> {
        let department = self.officer_department(officer).await?;
        let complaint = self.load(complaint_id).await?.into_inner();
        if !same_department(&department, &complaint.department) {
            return Err(GrievanceError::complaint_not_found(complaint_id));
        }
        Ok(complaint)
    }

    async fn department_stats(&self, officer: &Actor) -> GrievanceResult<DepartmentStats> {
        let department = self.officer_department(officer).await?;
        let complaints: Vec<Complaint> = self
            .store_service
            .collect(&StoreKeys::complaints_by_department(&department), StoreKeys::complaint)
            .await?;
        let servicemen = self.directory_service.list_servicemen(&department).await?;

        let mut stats = DepartmentStats {
            department,
            total: complaints.len(),
            ..Default::default()
        };
        for complaint in &complaints {
            match complaint.status {
                ComplaintStatus::Pending => stats.pending += 1,
                ComplaintStatus::InProcess => stats.in_process += 1,
                ComplaintStatus::Resolved => stats.resolved += 1,
            }
            if complaint.assigned_service_man.is_some() {
                stats.assigned += 1;
            }
        }
        for serviceman in &servicemen {
            match serviceman.status {
                ServiceManStatus::Available => stats.servicemen_available += 1,
                ServiceManStatus::Busy => stats.servicemen_busy += 1,
                ServiceManStatus::Offline => stats.servicemen_offline += 1,
            }
        }
        Ok(stats)
    }

    async fn list_for_serviceman(&self, serviceman: &Actor) -> GrievanceResult<Vec<Complaint>> {
        serviceman.require(Role::ServiceMan)?;
        let complaints = self
            .store_service
            .collect(&StoreKeys::complaints_by_serviceman(&serviceman.id), StoreKeys::complaint)
            .await?;
        Ok(Self::sort_oldest_first(complaints))
    }

    async fn get_for_serviceman(&self, serviceman: &Actor, complaint_id: &str) -> GrievanceResult<Complaint> {
        serviceman.require(Role::ServiceMan)?;
        let complaint = self.load(complaint_id).await?.into_inner();
        if !complaint.is_assigned_to(&serviceman.id) {
            return Err(GrievanceError::complaint_not_found(complaint_id));
        }
        Ok(complaint)
    }

    async fn annotate(&self, actor: &Actor, complaint_id: &str, analysis: AiAnalysis) -> GrievanceResult<Complaint> {
        let snapshot = self.load(complaint_id).await?;
        self.ensure_can_view(actor, &snapshot.value).await?;

        let mut complaint = snapshot.value.clone();
        complaint.ai_analysis = Some(analysis);
        complaint.updated_at = Utc::now();

        let mut batch = WriteBatch::new();
        batch.guard(snapshot.guard());
        batch.set(snapshot.key(), &complaint)?;
        self.store_service.commit(batch).await?;

        tracing::info!("Complaint {} annotated by {}", complaint_id, actor.id);
        Ok(complaint)
    }

    async fn analyze(&self, subject: &str, description: &str) -> GrievanceResult<AiAnalysis> {
        if !self.triage_advisor.is_enabled() {
            return Err(GrievanceError::TriageUnavailable(
                "AI triage is not configured".to_string(),
            ));
        }
        self.triage_advisor
            .analyze(subject, description)
            .await?
            .ok_or_else(|| GrievanceError::TriageUnavailable("No analysis produced".to_string()))
    }

    async fn respond(&self, complaint: Complaint) -> GrievanceResult<ComplaintResponse> {
        let count = self.policy.history_page_size;
        let timeline = self
            .store_service
            .latest(&StoreKeys::complaint_timeline(&complaint.id), count)
            .await?;
        let action_history = self
            .store_service
            .latest(&StoreKeys::complaint_action_history(&complaint.id), count)
            .await?;
        Ok(ComplaintResponse {
            complaint,
            timeline,
            action_history,
        })
    }
}
