// src/services/messaging_service.rs
use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing;

use crate::{
    errors::{GrievanceError, GrievanceResult},
    models::{account::{Officer, ServiceMan}, complaint::Complaint},
};

#[derive(Debug, Clone)]
pub struct MailRelayConfig {
    pub relay_url: String,
    pub from: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for MailRelayConfig {
    fn default() -> Self {
        Self {
            relay_url: "http://127.0.0.1:8025/send".to_string(),
            from: "Grievance Portal <no-reply@grievance.local>".to_string(),
            api_key: None,
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub heading: String,
    pub body: String,
}

impl EmailMessage {
    pub fn new(to: &str, subject: &str, heading: &str, body: impl Into<String>) -> Self {
        Self {
            to: to.to_string(),
            subject: subject.to_string(),
            heading: heading.to_string(),
            body: body.into(),
        }
    }
}

/// Out-of-band delivery. Callers treat every method as best-effort.
#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn send_email(&self, message: EmailMessage) -> GrievanceResult<()>;

    async fn notify_officer_reopened(&self, officer: &Officer, complaint: &Complaint) -> GrievanceResult<()> {
        let body = format!(
            "The complaint \"{}\" has been reopened by the citizen. Please resolve it as soon as possible!",
            complaint.subject
        );
        self.send_email(EmailMessage::new(&officer.email, &complaint.subject, "Reopened Grievance", body))
            .await
    }

    async fn notify_officer_reminder(&self, officer: &Officer, complaint: &Complaint) -> GrievanceResult<()> {
        let body = format!(
            "Gentle reminder regarding the complaint \"{}\". Please resolve it as soon as possible!",
            complaint.subject
        );
        self.send_email(EmailMessage::new(&officer.email, &complaint.subject, "Reminder about Grievance", body))
            .await
    }

    async fn notify_officer_rated(&self, officer: &Officer, complaint: &Complaint, stars: u8) -> GrievanceResult<()> {
        let body = format!(
            "You have been rated! \nComplaint subject : {} \nRating : {}",
            complaint.subject, stars
        );
        self.send_email(EmailMessage::new(&officer.email, &complaint.subject, "You have been rated!", body))
            .await
    }

    async fn notify_serviceman_assigned(&self, serviceman: &ServiceMan, complaint: &Complaint) -> GrievanceResult<()> {
        let body = format!(
            "You have been assigned the complaint \"{}\" ({}). Open an intervention report when you start the work.",
            complaint.subject, complaint.id
        );
        self.send_email(EmailMessage::new(&serviceman.email, &complaint.subject, "New Intervention", body))
            .await
    }
}

pub struct MailRelayNotificationService {
    config: MailRelayConfig,
    client: reqwest::Client,
}

impl MailRelayNotificationService {
    pub fn new(config: MailRelayConfig) -> GrievanceResult<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    pub fn with_relay_url(relay_url: String, from: String, timeout: Duration) -> GrievanceResult<Self> {
        Self::new(MailRelayConfig {
            relay_url,
            from,
            api_key: None,
            timeout,
        })
    }
}

#[async_trait]
impl NotificationService for MailRelayNotificationService {
    async fn send_email(&self, message: EmailMessage) -> GrievanceResult<()> {
        if message.to.trim().is_empty() {
            return Err(GrievanceError::NotificationDelivery("Empty recipient".to_string()));
        }

        tracing::info!("Relaying email to {}: {}", message.to, message.heading);

        let payload = json!({
            "from": self.config.from,
            "to": message.to,
            "subject": message.subject,
            "html": format!("<h3>{}</h3><p>{}</p>", message.heading, message.body.replace('\n', "<br>")),
            "text": message.body,
        });

        let mut request = self.client.post(&self.config.relay_url).json(&payload);
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!("Mail relay request failed ({}): {}", status, error_text);
            return Err(GrievanceError::NotificationDelivery(format!("{}: {}", status, error_text)));
        }

        tracing::debug!("Email relayed successfully");
        Ok(())
    }
}

// Mock service for development and testing
#[derive(Debug, Default)]
pub struct MockNotificationService {
    outbox: Mutex<Vec<EmailMessage>>,
    failing: bool,
}

impl MockNotificationService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects every message, for exercising best-effort delivery.
    pub fn failing() -> Self {
        Self {
            outbox: Mutex::new(Vec::new()),
            failing: true,
        }
    }

    pub async fn sent(&self) -> Vec<EmailMessage> {
        self.outbox.lock().await.clone()
    }
}

#[async_trait]
impl NotificationService for MockNotificationService {
    async fn send_email(&self, message: EmailMessage) -> GrievanceResult<()> {
        if self.failing {
            return Err(GrievanceError::NotificationDelivery(format!(
                "mock refused mail to {}",
                message.to
            )));
        }
        tracing::info!("[MOCK] Would email {}: {} - {}", message.to, message.heading, message.subject);
        self.outbox.lock().await.push(message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> MailRelayConfig {
        MailRelayConfig {
            relay_url: format!("{}/send", server.uri()),
            from: "Mairie <no-reply@mairie.bf>".to_string(),
            api_key: Some("relay-key".to_string()),
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_relay_posts_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/send"))
            .and(header("authorization", "Bearer relay-key"))
            .and(body_partial_json(json!({
                "to": "awa@mairie.bf",
                "subject": "Nid de poule",
                "text": "hello"
            })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let relay = MailRelayNotificationService::new(config(&server)).unwrap();
        relay
            .send_email(EmailMessage::new("awa@mairie.bf", "Nid de poule", "Reminder", "hello"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_relay_failure_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("smtp down"))
            .mount(&server)
            .await;

        let relay = MailRelayNotificationService::new(config(&server)).unwrap();
        let err = relay
            .send_email(EmailMessage::new("awa@mairie.bf", "s", "h", "b"))
            .await
            .unwrap_err();
        assert!(matches!(err, GrievanceError::NotificationDelivery(msg) if msg.contains("smtp down")));
    }

    #[tokio::test]
    async fn test_slow_relay_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(202).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let relay = MailRelayNotificationService::new(MailRelayConfig {
            timeout: Duration::from_millis(200),
            ..config(&server)
        })
        .unwrap();
        let err = relay
            .send_email(EmailMessage::new("awa@mairie.bf", "s", "h", "b"))
            .await
            .unwrap_err();
        assert!(matches!(err, GrievanceError::NetworkTimeout));
    }

    #[tokio::test]
    async fn test_mock_records_outbox() {
        let mock = MockNotificationService::new();
        mock.send_email(EmailMessage::new("a@b.c", "s", "h", "b")).await.unwrap();
        assert_eq!(mock.sent().await.len(), 1);

        let failing = MockNotificationService::failing();
        assert!(failing.send_email(EmailMessage::new("a@b.c", "s", "h", "b")).await.is_err());
        assert!(failing.sent().await.is_empty());
    }
}
