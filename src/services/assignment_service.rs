// src/services/assignment_service.rs
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing;

use crate::{
    errors::{GrievanceError, GrievanceResult},
    models::{
        account::{Actor, Officer, Role, ServiceMan},
        complaint::{Complaint, TimelineAction, TimelineEntry},
        report::{InterventionReport, ReportStatus},
    },
    services::{
        directory_service::{DirectoryOperations, DirectoryService, same_department},
        messaging_service::NotificationService,
        store_service::{StoreKeys, StoreService, WriteBatch},
    },
};

#[async_trait]
pub trait AssignmentOperations: Send + Sync {
    async fn route_officer(&self, district: &str, department: &str) -> GrievanceResult<Officer>;
    async fn assign_technician(
        &self,
        actor: &Actor,
        complaint_id: &str,
        serviceman_id: &str,
    ) -> GrievanceResult<Complaint>;
    async fn release_technician(
        &self,
        actor: &Actor,
        complaint_id: &str,
        note: Option<String>,
    ) -> GrievanceResult<Complaint>;
}

pub struct AssignmentService {
    store_service: Arc<StoreService>,
    directory_service: Arc<DirectoryService>,
    notification_service: Arc<dyn NotificationService>,
}

impl AssignmentService {
    pub fn new(
        store_service: Arc<StoreService>,
        directory_service: Arc<DirectoryService>,
        notification_service: Arc<dyn NotificationService>,
    ) -> Self {
        Self {
            store_service,
            directory_service,
            notification_service,
        }
    }

    fn ensure_in_scope(scope: &Option<String>, department: &str, what: &str) -> GrievanceResult<()> {
        match scope {
            Some(own) if !same_department(own, department) => Err(GrievanceError::forbidden(format!(
                "{} belongs to department {}, not {}",
                what, department, own
            ))),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl AssignmentOperations for AssignmentService {
    async fn route_officer(&self, district: &str, department: &str) -> GrievanceResult<Officer> {
        let mut candidates: Vec<Officer> = self
            .directory_service
            .officers_for_route(department, district)
            .await?
            .into_iter()
            .filter(Officer::routes_new_complaints)
            .collect();

        if candidates.is_empty() {
            return Err(GrievanceError::not_found("No officer in this district"));
        }
        if candidates.len() > 1 {
            let ids: Vec<&str> = candidates.iter().map(|o| o.id.as_str()).collect();
            tracing::warn!(
                "Several level-1 officers route {} / {}: {:?}, using the first",
                department,
                district,
                ids
            );
        }

        candidates.sort_by(|a, b| a.id.cmp(&b.id));
        let officer = candidates.swap_remove(0);
        tracing::debug!("Routing {} / {} to officer {}", department, district, officer.id);
        Ok(officer)
    }

    async fn assign_technician(
        &self,
        actor: &Actor,
        complaint_id: &str,
        serviceman_id: &str,
    ) -> GrievanceResult<Complaint> {
        actor.require_any(&[Role::Officer, Role::Admin])?;
        let scope = self.directory_service.department_scope(actor).await?;

        let complaint_snapshot = self
            .store_service
            .require::<Complaint>(&StoreKeys::complaint(complaint_id), || {
                GrievanceError::complaint_not_found(complaint_id)
            })
            .await?;
        Self::ensure_in_scope(&scope, &complaint_snapshot.value.department, "Complaint")?;

        let now = Utc::now();
        let mut complaint = complaint_snapshot.value.clone();
        complaint.assign_serviceman(serviceman_id, actor, now)?;

        let serviceman_snapshot = self
            .store_service
            .require::<ServiceMan>(&StoreKeys::serviceman(serviceman_id), || {
                GrievanceError::serviceman_not_found(serviceman_id)
            })
            .await?;
        Self::ensure_in_scope(&scope, &serviceman_snapshot.value.department, "ServiceMan")?;

        let mut serviceman = serviceman_snapshot.value.clone();
        serviceman.take_assignment(complaint_id, now)?;

        // Both documents flip together or not at all
        let mut batch = WriteBatch::new();
        batch.guard(complaint_snapshot.guard());
        batch.guard(serviceman_snapshot.guard());
        batch.set(complaint_snapshot.key(), &complaint)?;
        batch.set(serviceman_snapshot.key(), &serviceman)?;
        batch.sadd(&StoreKeys::complaints_by_serviceman(serviceman_id), complaint_id);
        batch.push(
            &StoreKeys::complaint_timeline(complaint_id),
            &TimelineEntry::new(
                TimelineAction::AssignedServiceman,
                actor,
                Some(format!("Assigned to {}", serviceman.name)),
                now,
            ),
        )?;
        self.store_service.commit(batch).await?;

        tracing::info!(
            "Complaint {} assigned to serviceman {} by {} {}",
            complaint_id,
            serviceman_id,
            actor.role,
            actor.id
        );

        if let Err(e) = self
            .notification_service
            .notify_serviceman_assigned(&serviceman, &complaint)
            .await
        {
            tracing::warn!("Failed to notify serviceman {}: {}", serviceman_id, e);
        }

        Ok(complaint)
    }

    async fn release_technician(
        &self,
        actor: &Actor,
        complaint_id: &str,
        note: Option<String>,
    ) -> GrievanceResult<Complaint> {
        actor.require_any(&[Role::Officer, Role::Admin])?;
        let scope = self.directory_service.department_scope(actor).await?;

        let complaint_snapshot = self
            .store_service
            .require::<Complaint>(&StoreKeys::complaint(complaint_id), || {
                GrievanceError::complaint_not_found(complaint_id)
            })
            .await?;
        Self::ensure_in_scope(&scope, &complaint_snapshot.value.department, "Complaint")?;

        let now = Utc::now();
        let mut complaint = complaint_snapshot.value.clone();
        let report_id = complaint.intervention_report.clone();
        let serviceman_id = complaint.release_serviceman(now)?;

        let mut batch = WriteBatch::new();
        batch.guard(complaint_snapshot.guard());
        batch.set(complaint_snapshot.key(), &complaint)?;
        batch.srem(&StoreKeys::complaints_by_serviceman(&serviceman_id), complaint_id);

        if let Some(snapshot) = self
            .store_service
            .load::<ServiceMan>(&StoreKeys::serviceman(&serviceman_id))
            .await?
        {
            if snapshot.value.is_working_on(complaint_id) {
                let mut serviceman = snapshot.value.clone();
                serviceman.release(now);
                batch.guard(snapshot.guard());
                batch.set(snapshot.key(), &serviceman)?;
            }
        }

        if let Some(report_id) = report_id {
            if let Some(snapshot) = self
                .store_service
                .load::<InterventionReport>(&StoreKeys::report(&report_id))
                .await?
            {
                if snapshot.value.status == ReportStatus::InProgress {
                    let mut report = snapshot.value.clone();
                    report.abandon(note.clone(), now)?;
                    batch.guard(snapshot.guard());
                    batch.set(snapshot.key(), &report)?;
                }
            }
        }

        batch.push(
            &StoreKeys::complaint_timeline(complaint_id),
            &TimelineEntry::new(
                TimelineAction::AssignedOfficer,
                actor,
                Some(note.unwrap_or_else(|| format!("Released serviceman {}", serviceman_id))),
                now,
            ),
        )?;
        self.store_service.commit(batch).await?;

        tracing::info!(
            "Serviceman {} released from complaint {} by {}",
            serviceman_id,
            complaint_id,
            actor.id
        );
        Ok(complaint)
    }
}
