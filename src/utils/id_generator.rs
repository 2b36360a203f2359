// src/utils/id_generator.rs
use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdType {
    Citizen,
    Officer,
    ServiceMan,
    Admin,
    Complaint,
    Report,
    Department,
    Service,
}

impl IdType {
    pub fn to_prefix(&self) -> &'static str {
        match self {
            IdType::Citizen => "cit",
            IdType::Officer => "off",
            IdType::ServiceMan => "svm",
            IdType::Admin => "adm",
            IdType::Complaint => "cmp",
            IdType::Report => "rpt",
            IdType::Department => "dep",
            IdType::Service => "srv",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        let id_type = match prefix {
            "cit" => IdType::Citizen,
            "off" => IdType::Officer,
            "svm" => IdType::ServiceMan,
            "adm" => IdType::Admin,
            "cmp" => IdType::Complaint,
            "rpt" => IdType::Report,
            "dep" => IdType::Department,
            "srv" => IdType::Service,
            _ => return None,
        };
        Some(id_type)
    }
}

impl fmt::Display for IdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_prefix())
    }
}

pub struct IdGenerator;

impl IdGenerator {
    /// Generate a unique ID with format: {prefix}-{date}-{random_suffix}
    /// Where random_suffix is 5 characters: 3 hexchars + 2 alphanumeric or 3 alphanumeric + 2 hexchars
    pub fn generate(id_type: IdType) -> String {
        let date_part = Utc::now().format("%y%m%d").to_string();
        let random_suffix = Self::generate_random_suffix();

        format!("{}-{}-{}", id_type.to_prefix(), date_part, random_suffix)
    }

    fn generate_random_suffix() -> String {
        if rand::random::<bool>() {
            format!(
                "{}{}",
                Self::generate_hex_chars(3),
                Self::generate_alphanumeric_chars(2)
            )
        } else {
            format!(
                "{}{}",
                Self::generate_alphanumeric_chars(3),
                Self::generate_hex_chars(2)
            )
        }
    }

    fn generate_hex_chars(n: usize) -> String {
        const HEX_CHARS: &[u8] = b"0123456789abcdef";
        Self::generate_from_chars(HEX_CHARS, n)
    }

    fn generate_alphanumeric_chars(n: usize) -> String {
        const ALPHANUMERIC_CHARS: &[u8] =
            b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
        Self::generate_from_chars(ALPHANUMERIC_CHARS, n)
    }

    fn generate_from_chars(charset: &[u8], n: usize) -> String {
        let mut rng = rand::rng();
        (0..n)
            .map(|_| charset[rng.random_range(0..charset.len())] as char)
            .collect()
    }

    /// Validate if an ID matches the expected format and type
    pub fn validate_id(id: &str, expected_type: Option<IdType>) -> bool {
        let mut parts = id.split('-');
        let (Some(prefix), Some(date_part), Some(random_suffix), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return false;
        };

        let Some(id_type) = IdType::from_prefix(prefix) else {
            return false;
        };
        if expected_type.is_some_and(|expected| expected != id_type) {
            return false;
        }
        if random_suffix.len() != 5 || !random_suffix.chars().all(|c| c.is_ascii_alphanumeric()) {
            return false;
        }
        Self::is_date_part(date_part)
    }

    /// `yymmdd` with a plausible month and day.
    fn is_date_part(date_part: &str) -> bool {
        if date_part.len() != 6 || !date_part.chars().all(|c| c.is_ascii_digit()) {
            return false;
        }
        let month = date_part[2..4].parse::<u32>().unwrap_or(0);
        let day = date_part[4..6].parse::<u32>().unwrap_or(0);
        (1..=12).contains(&month) && (1..=31).contains(&day)
    }
}

pub trait WithGeneratedId {
    fn set_generated_id(&mut self, id_type: IdType);

    fn with_generated_id(mut self, id_type: IdType) -> Self
    where
        Self: Sized,
    {
        self.set_generated_id(id_type);
        self
    }
}

impl WithGeneratedId for crate::models::complaint::Complaint {
    fn set_generated_id(&mut self, id_type: IdType) {
        self.id = IdGenerator::generate(id_type);
    }
}

impl WithGeneratedId for crate::models::report::InterventionReport {
    fn set_generated_id(&mut self, id_type: IdType) {
        self.id = IdGenerator::generate(id_type);
    }
}

impl WithGeneratedId for crate::models::department::Department {
    fn set_generated_id(&mut self, id_type: IdType) {
        self.id = IdGenerator::generate(id_type);
    }
}

impl WithGeneratedId for crate::models::department::Service {
    fn set_generated_id(&mut self, id_type: IdType) {
        self.id = IdGenerator::generate(id_type);
    }
}
