// src/services/report_service.rs
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing;

use crate::{
    errors::{GrievanceError, GrievanceResult},
    models::{
        account::{Actor, Role, ServiceMan},
        complaint::{Complaint, ComplaintStatus, TimelineAction, TimelineEntry},
        report::{
            CitizenFeedbackRequest, CompleteReportRequest, InterventionReport, MediaUpload, OpenReportRequest,
            ReportUpdate, ReviewRequest,
        },
    },
    services::{
        directory_service::{DirectoryService, same_department},
        store_service::{Snapshot, StoreKeys, StoreService, WriteBatch},
    },
    utils::id_generator::{IdType, WithGeneratedId},
};

#[async_trait]
pub trait ReportOperations: Send + Sync {
    async fn open_report(&self, serviceman: &Actor, request: OpenReportRequest) -> GrievanceResult<InterventionReport>;
    async fn update_report(
        &self,
        serviceman: &Actor,
        report_id: &str,
        update: ReportUpdate,
    ) -> GrievanceResult<InterventionReport>;
    async fn add_media(&self, serviceman: &Actor, report_id: &str, upload: MediaUpload) -> GrievanceResult<InterventionReport>;
    async fn complete(
        &self,
        serviceman: &Actor,
        report_id: &str,
        request: CompleteReportRequest,
    ) -> GrievanceResult<InterventionReport>;
    async fn validate(&self, actor: &Actor, report_id: &str, review: ReviewRequest) -> GrievanceResult<InterventionReport>;
    async fn flag_followup(&self, actor: &Actor, report_id: &str, review: ReviewRequest) -> GrievanceResult<InterventionReport>;
    async fn citizen_feedback(
        &self,
        citizen: &Actor,
        report_id: &str,
        request: CitizenFeedbackRequest,
    ) -> GrievanceResult<InterventionReport>;
    async fn list_for_serviceman(&self, serviceman: &Actor) -> GrievanceResult<Vec<InterventionReport>>;
    async fn get_for_serviceman(&self, serviceman: &Actor, report_id: &str) -> GrievanceResult<InterventionReport>;
    async fn get_for_complaint(&self, actor: &Actor, complaint_id: &str) -> GrievanceResult<InterventionReport>;
}

pub struct ReportService {
    store_service: Arc<StoreService>,
    directory_service: Arc<DirectoryService>,
}

impl ReportService {
    pub fn new(store_service: Arc<StoreService>, directory_service: Arc<DirectoryService>) -> Self {
        Self {
            store_service,
            directory_service,
        }
    }

    async fn load_report(&self, report_id: &str) -> GrievanceResult<Snapshot<InterventionReport>> {
        self.store_service
            .require(&StoreKeys::report(report_id), || GrievanceError::report_not_found(report_id))
            .await
    }

    async fn load_complaint(&self, complaint_id: &str) -> GrievanceResult<Snapshot<Complaint>> {
        self.store_service
            .require(&StoreKeys::complaint(complaint_id), || {
                GrievanceError::complaint_not_found(complaint_id)
            })
            .await
    }

    /// The technician's own report, guarded for a write.
    async fn load_own(&self, serviceman: &Actor, report_id: &str) -> GrievanceResult<Snapshot<InterventionReport>> {
        serviceman.require(Role::ServiceMan)?;
        let snapshot = self.load_report(report_id).await?;
        if snapshot.value.serviceman_id != serviceman.id {
            return Err(GrievanceError::forbidden("Report belongs to another technician"));
        }
        Ok(snapshot)
    }

    async fn save(&self, snapshot: &Snapshot<InterventionReport>, report: &InterventionReport) -> GrievanceResult<()> {
        let mut batch = WriteBatch::new();
        batch.guard(snapshot.guard());
        batch.set(snapshot.key(), report)?;
        self.store_service.commit(batch).await
    }

    /// Officers review reports of their own department only.
    async fn load_for_review(
        &self,
        actor: &Actor,
        report_id: &str,
    ) -> GrievanceResult<(Snapshot<InterventionReport>, Complaint)> {
        actor.require_any(&[Role::Officer, Role::Admin])?;
        let scope = self.directory_service.department_scope(actor).await?;
        let snapshot = self.load_report(report_id).await?;
        let complaint = self.load_complaint(&snapshot.value.complaint_id).await?.into_inner();
        if let Some(department) = scope {
            if !same_department(&department, &complaint.department) {
                return Err(GrievanceError::forbidden(format!(
                    "Report {} belongs to department {}",
                    report_id, complaint.department
                )));
            }
        }
        Ok((snapshot, complaint))
    }
}

#[async_trait]
impl ReportOperations for ReportService {
    async fn open_report(&self, serviceman: &Actor, request: OpenReportRequest) -> GrievanceResult<InterventionReport> {
        serviceman.require(Role::ServiceMan)?;
        let complaint_snapshot = self.load_complaint(&request.complaint_id).await?;
        let complaint = &complaint_snapshot.value;

        if !complaint.is_assigned_to(&serviceman.id) {
            return Err(GrievanceError::forbidden("Complaint is not assigned to this technician"));
        }
        if complaint.status != ComplaintStatus::InProcess {
            return Err(GrievanceError::invalid_transition(format!(
                "Cannot open a report on a {} complaint",
                complaint.status
            )));
        }
        if let Some(existing) = &complaint.intervention_report {
            return Err(GrievanceError::bad_request(format!(
                "Complaint {} already has report {}",
                complaint.id, existing
            )));
        }

        let now = Utc::now();
        let complaint_id = complaint.id.clone();
        let report = InterventionReport::new(&complaint_id, &serviceman.id, request, now)?
            .with_generated_id(IdType::Report);
        let mut updated = complaint.clone();
        updated.intervention_report = Some(report.id.clone());
        updated.updated_at = now;

        let report_key = StoreKeys::report(&report.id);
        let mut batch = WriteBatch::new();
        batch.guard(complaint_snapshot.guard());
        batch.expect_absent(&report_key);
        batch.set(&report_key, &report)?;
        batch.set(complaint_snapshot.key(), &updated)?;
        batch.sadd(&StoreKeys::reports_by_serviceman(&serviceman.id), &report.id);
        batch.push(
            &StoreKeys::complaint_timeline(&complaint_id),
            &TimelineEntry::new(
                TimelineAction::ReportSubmitted,
                serviceman,
                Some(format!("Report {} opened", report.id)),
                now,
            ),
        )?;
        self.store_service.commit(batch).await?;

        tracing::info!("Serviceman {} opened report {} on complaint {}", serviceman.id, report.id, complaint_id);
        Ok(report)
    }

    async fn update_report(
        &self,
        serviceman: &Actor,
        report_id: &str,
        update: ReportUpdate,
    ) -> GrievanceResult<InterventionReport> {
        let snapshot = self.load_own(serviceman, report_id).await?;
        let mut report = snapshot.value.clone();
        report.apply_update(update, Utc::now())?;
        self.save(&snapshot, &report).await?;

        tracing::info!("Report {} updated", report_id);
        Ok(report)
    }

    async fn add_media(&self, serviceman: &Actor, report_id: &str, upload: MediaUpload) -> GrievanceResult<InterventionReport> {
        let snapshot = self.load_own(serviceman, report_id).await?;
        let count = upload.files.len();
        let mut report = snapshot.value.clone();
        report.add_media(upload.kind, upload.files, Utc::now())?;
        self.save(&snapshot, &report).await?;

        tracing::info!("{} {:?} file(s) attached to report {}", count, upload.kind, report_id);
        Ok(report)
    }

    async fn complete(
        &self,
        serviceman: &Actor,
        report_id: &str,
        request: CompleteReportRequest,
    ) -> GrievanceResult<InterventionReport> {
        let report_snapshot = self.load_own(serviceman, report_id).await?;
        let now = Utc::now();

        let mut report = report_snapshot.value.clone();
        if let Some(text) = request.work_description {
            report.work_description = Some(text.trim().to_string());
        }
        if request.signature.is_some() {
            report.signature = request.signature;
        }
        let minutes = report.complete(request.time_spent, now)?;

        let complaint_snapshot = self.load_complaint(&report.complaint_id).await?;
        let mut complaint = complaint_snapshot.value.clone();
        complaint.mark_resolved(now)?;

        let response_minutes = complaint
            .assigned_at
            .map(|assigned| ((now - assigned).num_milliseconds() as f64 / 60_000.0).round() as i64);

        // Report, complaint and technician move as one unit
        let mut batch = WriteBatch::new();
        batch.guard(report_snapshot.guard());
        batch.guard(complaint_snapshot.guard());
        batch.set(report_snapshot.key(), &report)?;
        batch.set(complaint_snapshot.key(), &complaint)?;

        let tech_snapshot = self
            .store_service
            .require::<ServiceMan>(&StoreKeys::serviceman(&serviceman.id), || {
                GrievanceError::serviceman_not_found(&serviceman.id)
            })
            .await?;
        let mut tech = tech_snapshot.value.clone();
        if tech.is_working_on(&complaint.id) {
            tech.record_completion(response_minutes, now);
            batch.guard(tech_snapshot.guard());
            batch.set(tech_snapshot.key(), &tech)?;
        } else {
            tracing::warn!(
                "Serviceman {} completed complaint {} while recorded on {:?}",
                tech.id,
                complaint.id,
                tech.current_complaint
            );
        }

        batch.push(
            &StoreKeys::complaint_timeline(&complaint.id),
            &TimelineEntry::new(
                TimelineAction::Resolved,
                serviceman,
                Some(format!("Intervention completed in {} min", minutes)),
                now,
            ),
        )?;
        self.store_service.commit(batch).await?;

        tracing::info!(
            "Report {} completed ({} min), complaint {} resolved, serviceman {} available",
            report_id,
            minutes,
            complaint.id,
            tech.id
        );
        Ok(report)
    }

    async fn validate(&self, actor: &Actor, report_id: &str, review: ReviewRequest) -> GrievanceResult<InterventionReport> {
        let (snapshot, complaint) = self.load_for_review(actor, report_id).await?;
        let now = Utc::now();
        let mut report = snapshot.value.clone();
        report.validate(actor, review.notes.clone(), now)?;

        let mut batch = WriteBatch::new();
        batch.guard(snapshot.guard());
        batch.set(snapshot.key(), &report)?;
        batch.push(
            &StoreKeys::complaint_timeline(&complaint.id),
            &TimelineEntry::new(TimelineAction::Validated, actor, review.notes, now),
        )?;
        self.store_service.commit(batch).await?;

        tracing::info!("Report {} validated by {} {}", report_id, actor.role, actor.id);
        Ok(report)
    }

    async fn flag_followup(&self, actor: &Actor, report_id: &str, review: ReviewRequest) -> GrievanceResult<InterventionReport> {
        let (snapshot, _) = self.load_for_review(actor, report_id).await?;
        let mut report = snapshot.value.clone();
        report.flag_followup(actor, review.notes, Utc::now())?;
        self.save(&snapshot, &report).await?;

        tracing::info!("Report {} flagged for follow-up by {}", report_id, actor.id);
        Ok(report)
    }

    async fn citizen_feedback(
        &self,
        citizen: &Actor,
        report_id: &str,
        request: CitizenFeedbackRequest,
    ) -> GrievanceResult<InterventionReport> {
        citizen.require(Role::Citizen)?;
        let snapshot = self.load_report(report_id).await?;
        let complaint = self.load_complaint(&snapshot.value.complaint_id).await?.into_inner();
        if !complaint.is_owned_by(&citizen.id) {
            return Err(GrievanceError::forbidden("Only the complaint author can rate this intervention"));
        }

        let stars = request.rating;
        let mut report = snapshot.value.clone();
        report.add_citizen_feedback(request, Utc::now())?;

        let mut batch = WriteBatch::new();
        batch.guard(snapshot.guard());
        batch.set(snapshot.key(), &report)?;
        if let Some(tech_snapshot) = self
            .store_service
            .load::<ServiceMan>(&StoreKeys::serviceman(&report.serviceman_id))
            .await?
        {
            let mut tech = tech_snapshot.value.clone();
            tech.record_rating(stars);
            batch.guard(tech_snapshot.guard());
            batch.set(tech_snapshot.key(), &tech)?;
        }
        self.store_service.commit(batch).await?;

        tracing::info!("Citizen {} left {} star feedback on report {}", citizen.id, stars, report_id);
        Ok(report)
    }

    async fn list_for_serviceman(&self, serviceman: &Actor) -> GrievanceResult<Vec<InterventionReport>> {
        serviceman.require(Role::ServiceMan)?;
        let mut reports: Vec<InterventionReport> = self
            .store_service
            .collect(&StoreKeys::reports_by_serviceman(&serviceman.id), StoreKeys::report)
            .await?;
        reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reports)
    }

    async fn get_for_serviceman(&self, serviceman: &Actor, report_id: &str) -> GrievanceResult<InterventionReport> {
        serviceman.require(Role::ServiceMan)?;
        let report = self.load_report(report_id).await?.into_inner();
        if report.serviceman_id != serviceman.id {
            return Err(GrievanceError::report_not_found(report_id));
        }
        Ok(report)
    }

    async fn get_for_complaint(&self, actor: &Actor, complaint_id: &str) -> GrievanceResult<InterventionReport> {
        let complaint = self.load_complaint(complaint_id).await?.into_inner();
        let visible = match actor.role {
            Role::Citizen => complaint.is_owned_by(&actor.id),
            Role::ServiceMan => complaint.is_assigned_to(&actor.id),
            Role::Officer | Role::Admin => match self.directory_service.department_scope(actor).await? {
                Some(department) => same_department(&department, &complaint.department),
                None => true,
            },
        };
        if !visible {
            return Err(GrievanceError::complaint_not_found(complaint_id));
        }

        let report_id = complaint
            .intervention_report
            .ok_or_else(|| GrievanceError::not_found(format!("No report for complaint {}", complaint_id)))?;
        Ok(self.load_report(&report_id).await?.into_inner())
    }
}
