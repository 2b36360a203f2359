// src/config.rs
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::{GrievanceError, GrievanceResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Redis,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = GrievanceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "redis" => Ok(StoreBackend::Redis),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(GrievanceError::InvalidConfiguration(format!(
                "STORE_BACKEND must be redis or memory, got {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub store_backend: StoreBackend,
    pub redis_url: String,
    pub mail_relay_url: Option<String>,
    pub mail_from: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub history_page_size: usize,
    pub http_timeout_secs: u64,
    pub bootstrap_admin_email: Option<String>,
    pub bootstrap_admin_password: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            store_backend: StoreBackend::Memory,
            redis_url: "redis://127.0.0.1/".to_string(),
            mail_relay_url: None,
            mail_from: "Grievance Portal <no-reply@grievance.local>".to_string(),
            gemini_api_key: None,
            gemini_model: "gemini-1.5-flash".to_string(),
            history_page_size: 20,
            http_timeout_secs: 10,
            bootstrap_admin_email: None,
            bootstrap_admin_password: None,
        }
    }
}

impl AppConfig {
    /// Read the process environment, honouring a `.env` file when present.
    pub fn from_env() -> GrievanceResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> GrievanceResult<Self> {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let store_backend = match var("STORE_BACKEND") {
            Some(value) => value.parse()?,
            None => defaults.store_backend,
        };

        Ok(Self {
            bind_addr: var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            store_backend,
            redis_url: var("REDIS_URL").unwrap_or(defaults.redis_url),
            mail_relay_url: var("MAIL_RELAY_URL"),
            mail_from: var("MAIL_FROM").unwrap_or(defaults.mail_from),
            gemini_api_key: var("GEMINI_API_KEY"),
            gemini_model: var("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            history_page_size: parse_number(
                "HISTORY_PAGE_SIZE",
                var("HISTORY_PAGE_SIZE"),
                defaults.history_page_size,
            )?,
            http_timeout_secs: parse_number(
                "HTTP_TIMEOUT_SECS",
                var("HTTP_TIMEOUT_SECS"),
                defaults.http_timeout_secs,
            )?,
            bootstrap_admin_email: var("BOOTSTRAP_ADMIN_EMAIL"),
            bootstrap_admin_password: var("BOOTSTRAP_ADMIN_PASSWORD"),
        })
    }

    /// Upper bound on any outbound call to the mail relay or the triage model.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn parse_number<T: FromStr + PartialOrd + Default>(name: &str, raw: Option<String>, default: T) -> GrievanceResult<T> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.parse::<T>() {
        Ok(value) if value > T::default() => Ok(value),
        _ => Err(GrievanceError::InvalidConfiguration(format!(
            "{} must be a positive integer, got {}",
            name, raw
        ))),
    }
}
