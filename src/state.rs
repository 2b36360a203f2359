// src/state.rs
use std::sync::Arc;

use crate::{
    config::{AppConfig, StoreBackend},
    errors::GrievanceResult,
    models::account::AdminRegistration,
    services::{
        admin_service::AdminService,
        assignment_service::AssignmentService,
        catalog_service::CatalogService,
        complaint_service::{ComplaintService, LifecyclePolicy},
        directory_service::{DirectoryOperations, DirectoryService},
        messaging_service::{MailRelayNotificationService, MockNotificationService, NotificationService},
        rating_service::RatingService,
        report_service::ReportService,
        store_service::{StoreConfig, StoreService},
        triage_service::{DisabledTriageAdvisor, GeminiConfig, GeminiTriageAdvisor, TriageAdvisor},
    },
};

pub struct AppState {
    pub store_service: Arc<StoreService>,
    pub directory_service: Arc<DirectoryService>,
    pub catalog_service: Arc<CatalogService>,
    pub rating_service: Arc<RatingService>,
    pub assignment_service: Arc<AssignmentService>,
    pub complaint_service: Arc<ComplaintService>,
    pub report_service: Arc<ReportService>,
    pub admin_service: Arc<AdminService>,
    pub notification_service: Arc<dyn NotificationService>,
    pub config: AppConfig,
}

impl AppState {
    pub async fn new(config: AppConfig) -> GrievanceResult<Self> {
        let store_service = match config.store_backend {
            StoreBackend::Redis => Arc::new(
                StoreService::new_redis(StoreConfig {
                    redis_url: config.redis_url.clone(),
                })
                .await?,
            ),
            StoreBackend::Memory => {
                tracing::warn!("STORE_BACKEND=memory, data is lost on restart");
                Arc::new(StoreService::memory())
            }
        };

        let notification_service: Arc<dyn NotificationService> = match &config.mail_relay_url {
            Some(relay_url) => Arc::new(MailRelayNotificationService::with_relay_url(
                relay_url.clone(),
                config.mail_from.clone(),
                config.http_timeout(),
            )?),
            None => {
                tracing::warn!("MAIL_RELAY_URL not set, using mock notification service");
                Arc::new(MockNotificationService::new())
            }
        };

        let triage_advisor: Arc<dyn TriageAdvisor> = match &config.gemini_api_key {
            Some(api_key) => Arc::new(GeminiTriageAdvisor::new(GeminiConfig::new(
                api_key.clone(),
                config.gemini_model.clone(),
                config.http_timeout(),
            ))?),
            None => {
                tracing::warn!("GEMINI_API_KEY not set, AI triage disabled");
                Arc::new(DisabledTriageAdvisor)
            }
        };

        let state = Self::with_services(config, store_service, notification_service, triage_advisor);
        state.bootstrap_admin().await?;
        Ok(state)
    }

    /// Wire every service over the given collaborators.
    pub fn with_services(
        config: AppConfig,
        store_service: Arc<StoreService>,
        notification_service: Arc<dyn NotificationService>,
        triage_advisor: Arc<dyn TriageAdvisor>,
    ) -> Self {
        let directory_service = Arc::new(DirectoryService::new(store_service.clone()));
        let catalog_service = Arc::new(CatalogService::new(store_service.clone()));
        let rating_service = Arc::new(RatingService::new(store_service.clone()));
        let assignment_service = Arc::new(AssignmentService::new(
            store_service.clone(),
            directory_service.clone(),
            notification_service.clone(),
        ));
        let report_service = Arc::new(ReportService::new(store_service.clone(), directory_service.clone()));
        let admin_service = Arc::new(AdminService::new(store_service.clone()));
        let complaint_service = Arc::new(ComplaintService::new(
            store_service.clone(),
            directory_service.clone(),
            assignment_service.clone(),
            rating_service.clone(),
            notification_service.clone(),
            triage_advisor,
            LifecyclePolicy {
                history_page_size: config.history_page_size,
            },
        ));

        Self {
            store_service,
            directory_service,
            catalog_service,
            rating_service,
            assignment_service,
            complaint_service,
            report_service,
            admin_service,
            notification_service,
            config,
        }
    }

    /// Create the first admin from the environment unless the email is taken.
    async fn bootstrap_admin(&self) -> GrievanceResult<()> {
        let (Some(email), Some(password)) = (
            &self.config.bootstrap_admin_email,
            &self.config.bootstrap_admin_password,
        ) else {
            return Ok(());
        };

        if self.directory_service.find_by_email(email).await?.is_some() {
            tracing::debug!("Bootstrap admin {} already present", email);
            return Ok(());
        }

        self.directory_service
            .register_admin(AdminRegistration {
                name: "Administrator".to_string(),
                email: email.clone(),
                password: password.clone(),
            })
            .await?;
        tracing::info!("Bootstrap admin {} created", email);
        Ok(())
    }
}
