// src/services/admin_service.rs
use async_trait::async_trait;
use std::sync::Arc;
use tracing;

use crate::{
    errors::{GrievanceError, GrievanceResult},
    models::{
        account::{Citizen, CitizenDetail, Officer},
        complaint::{Complaint, ComplaintCounts, DashboardStats},
    },
    services::store_service::{StoreKeys, StoreService},
};

/// Read-only reporting across collections for the admin console.
#[async_trait]
pub trait AdminOperations: Send + Sync {
    async fn dashboard_stats(&self) -> GrievanceResult<DashboardStats>;
    async fn citizen_detail(&self, citizen_id: &str) -> GrievanceResult<CitizenDetail>;
}

pub struct AdminService {
    store_service: Arc<StoreService>,
}

impl AdminService {
    pub fn new(store_service: Arc<StoreService>) -> Self {
        Self { store_service }
    }

    async fn count_services(&self, department_ids: &[String]) -> GrievanceResult<usize> {
        let mut total = 0;
        for id in department_ids {
            total += self
                .store_service
                .members(&StoreKeys::services_by_department(id))
                .await?
                .len();
        }
        Ok(total)
    }
}

#[async_trait]
impl AdminOperations for AdminService {
    async fn dashboard_stats(&self) -> GrievanceResult<DashboardStats> {
        let citizens = self.store_service.members(&StoreKeys::citizens_all()).await?.len();
        let department_ids = self.store_service.members(&StoreKeys::departments_all()).await?;
        let services = self.count_services(&department_ids).await?;

        let officers: Vec<Officer> = self
            .store_service
            .collect(&StoreKeys::officers_all(), StoreKeys::officer)
            .await?;
        let complaints: Vec<Complaint> = self
            .store_service
            .collect(&StoreKeys::complaints_all(), StoreKeys::complaint)
            .await?;

        let stats = DashboardStats {
            citizens,
            departments: department_ids.len(),
            services,
            active_officers: officers.iter().filter(|o| o.is_active).count(),
            complaints: ComplaintCounts::tally(&complaints),
        };
        tracing::debug!("Dashboard: {} complaints over {} departments", stats.complaints.total, stats.departments);
        Ok(stats)
    }

    async fn citizen_detail(&self, citizen_id: &str) -> GrievanceResult<CitizenDetail> {
        let citizen: Citizen = self
            .store_service
            .get(&StoreKeys::citizen(citizen_id))
            .await?
            .ok_or_else(|| GrievanceError::not_found(format!("Citizen {} not found", citizen_id)))?;
        let complaints: Vec<Complaint> = self
            .store_service
            .collect(&StoreKeys::complaints_by_citizen(citizen_id), StoreKeys::complaint)
            .await?;

        Ok(CitizenDetail {
            citizen: citizen.into(),
            stats: ComplaintCounts::tally(&complaints),
        })
    }
}
