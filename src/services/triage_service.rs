// src/services/triage_service.rs
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing;

use crate::{
    errors::{GrievanceError, GrievanceResult},
    models::complaint::AiAnalysis,
};

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Self {
        Self {
            api_key,
            model,
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            timeout,
        }
    }
}

/// Advisory classifier. Its output annotates a complaint and nothing more.
#[async_trait]
pub trait TriageAdvisor: Send + Sync {
    async fn analyze(&self, subject: &str, description: &str) -> GrievanceResult<Option<AiAnalysis>>;

    fn is_enabled(&self) -> bool {
        true
    }
}

pub struct DisabledTriageAdvisor;

#[async_trait]
impl TriageAdvisor for DisabledTriageAdvisor {
    async fn analyze(&self, _subject: &str, _description: &str) -> GrievanceResult<Option<AiAnalysis>> {
        Ok(None)
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

pub struct GeminiTriageAdvisor {
    config: GeminiConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GeminiTriageAdvisor {
    pub fn new(config: GeminiConfig) -> GrievanceResult<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    fn prompt(subject: &str, description: &str) -> String {
        format!(
            r#"Analyse this citizen complaint and answer with a structured JSON object.

Complaint: "{subject}. {description}"

Provide:
1. category: one of Voirie, Assainissement, Éclairage Public, Espaces Verts, Santé, Éducation, Transport, Autre
2. urgency: low, medium, high or critical
3. department: recommended department
4. summary: one sentence summary
5. keywords: array of 3 to 5 keywords
6. sentiment: positive, neutral or negative

Answer ONLY with a valid JSON object, no text before or after."#
        )
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

/// The reply often wraps the object in prose or code fences.
fn extract_analysis(text: &str) -> GrievanceResult<AiAnalysis> {
    let start = text.find('{');
    let end = text.rfind('}');
    match (start, end) {
        (Some(start), Some(end)) if start < end => Ok(serde_json::from_str(&text[start..=end])?),
        _ => Err(GrievanceError::TriageUnavailable(
            "Advisor reply did not contain a JSON object".to_string(),
        )),
    }
}

#[async_trait]
impl TriageAdvisor for GeminiTriageAdvisor {
    async fn analyze(&self, subject: &str, description: &str) -> GrievanceResult<Option<AiAnalysis>> {
        tracing::debug!("Requesting triage from model {}", self.config.model);

        let body = json!({
            "contents": [{ "parts": [{ "text": Self::prompt(subject, description) }] }]
        });

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.config.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    tracing::warn!("Triage request timed out after {:?}", self.config.timeout);
                }
                GrievanceError::TriageUnavailable(e.to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!("Triage request failed ({}): {}", status, error_text);
            return Err(GrievanceError::TriageUnavailable(format!("{}: {}", status, error_text)));
        }

        let reply: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| GrievanceError::TriageUnavailable(e.to_string()))?;

        let text = reply
            .candidates
            .into_iter()
            .flat_map(|c| c.content.parts)
            .find_map(|p| p.text)
            .ok_or_else(|| GrievanceError::TriageUnavailable("Empty advisor reply".to_string()))?;

        let analysis = extract_analysis(&text)
            .map_err(|e| GrievanceError::TriageUnavailable(e.to_string()))?;
        tracing::info!("Triage suggests {} ({:?})", analysis.category, analysis.urgency);
        Ok(Some(analysis))
    }
}
