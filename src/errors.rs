use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Main error type for the grievance service
#[derive(Debug)]
pub enum GrievanceError {
    // HTTP and API errors
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    InternalServer(String),

    // Store errors
    StoreConnection(String),
    StoreQuery(String),
    StoreSerialization(String),
    WriteConflict(String),

    // External collaborator errors
    NotificationDelivery(String),
    TriageUnavailable(String),

    // Network and HTTP client errors
    NetworkTimeout,
    NetworkConnection(String),
    HttpClient(String),

    // Serialization and parsing errors
    JsonParsing(String),

    // Business logic errors
    ComplaintNotFound(String),
    OfficerNotFound(String),
    ServiceManNotFound(String),
    ReportNotFound(String),
    DepartmentNotFound(String),
    AlreadyAssigned(String),
    InvalidTransition(String),

    // Validation errors
    ValidationFailed(Vec<ValidationError>),
    MissingRequiredField(String),
    InvalidFieldValue { field: String, value: String, reason: String },

    // Configuration and setup errors
    InvalidConfiguration(String),

    // Security and authentication errors
    TokenInvalid,
    InsufficientPermissions,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl fmt::Display for GrievanceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrievanceError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            GrievanceError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            GrievanceError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            GrievanceError::NotFound(msg) => write!(f, "Not found: {}", msg),
            GrievanceError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            GrievanceError::InternalServer(msg) => write!(f, "Internal server error: {}", msg),

            GrievanceError::StoreConnection(msg) => write!(f, "Store connection error: {}", msg),
            GrievanceError::StoreQuery(msg) => write!(f, "Store query error: {}", msg),
            GrievanceError::StoreSerialization(msg) => write!(f, "Store serialization error: {}", msg),
            GrievanceError::WriteConflict(msg) => write!(f, "Concurrent modification: {}", msg),

            GrievanceError::NotificationDelivery(msg) => write!(f, "Notification delivery error: {}", msg),
            GrievanceError::TriageUnavailable(msg) => write!(f, "Triage advisor unavailable: {}", msg),

            GrievanceError::NetworkTimeout => write!(f, "Network request timed out"),
            GrievanceError::NetworkConnection(msg) => write!(f, "Network connection error: {}", msg),
            GrievanceError::HttpClient(msg) => write!(f, "HTTP client error: {}", msg),

            GrievanceError::JsonParsing(msg) => write!(f, "JSON parsing error: {}", msg),

            GrievanceError::ComplaintNotFound(id) => write!(f, "Complaint not found: {}", id),
            GrievanceError::OfficerNotFound(id) => write!(f, "Officer not found: {}", id),
            GrievanceError::ServiceManNotFound(id) => write!(f, "ServiceMan not found: {}", id),
            GrievanceError::ReportNotFound(id) => write!(f, "Report not found: {}", id),
            GrievanceError::DepartmentNotFound(id) => write!(f, "Department not found: {}", id),
            GrievanceError::AlreadyAssigned(id) => {
                write!(f, "Complaint {} already has a technician assigned", id)
            }
            GrievanceError::InvalidTransition(msg) => write!(f, "Invalid transition: {}", msg),

            GrievanceError::ValidationFailed(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            GrievanceError::MissingRequiredField(field) => write!(f, "Missing required field: {}", field),
            GrievanceError::InvalidFieldValue { field, value, reason } => {
                write!(f, "Invalid value '{}' for field '{}': {}", value, field, reason)
            }

            GrievanceError::InvalidConfiguration(msg) => write!(f, "Invalid configuration: {}", msg),

            GrievanceError::TokenInvalid => write!(f, "Authentication token is invalid"),
            GrievanceError::InsufficientPermissions => write!(f, "Insufficient permissions for this operation"),
        }
    }
}

impl std::error::Error for GrievanceError {}

impl GrievanceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GrievanceError::BadRequest(_)
            | GrievanceError::ValidationFailed(_)
            | GrievanceError::MissingRequiredField(_)
            | GrievanceError::InvalidFieldValue { .. }
            | GrievanceError::InvalidTransition(_)
            | GrievanceError::AlreadyAssigned(_)
            | GrievanceError::JsonParsing(_) => StatusCode::BAD_REQUEST,

            GrievanceError::Unauthorized(_) | GrievanceError::TokenInvalid => StatusCode::UNAUTHORIZED,
            GrievanceError::Forbidden(_) | GrievanceError::InsufficientPermissions => StatusCode::FORBIDDEN,

            GrievanceError::NotFound(_)
            | GrievanceError::ComplaintNotFound(_)
            | GrievanceError::OfficerNotFound(_)
            | GrievanceError::ServiceManNotFound(_)
            | GrievanceError::ReportNotFound(_)
            | GrievanceError::DepartmentNotFound(_) => StatusCode::NOT_FOUND,

            GrievanceError::Conflict(_) | GrievanceError::WriteConflict(_) => StatusCode::CONFLICT,

            GrievanceError::TriageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,

            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            GrievanceError::BadRequest(_) => "bad_request",
            GrievanceError::Unauthorized(_) => "unauthorized",
            GrievanceError::Forbidden(_) => "forbidden",
            GrievanceError::NotFound(_) => "not_found",
            GrievanceError::Conflict(_) => "conflict",
            GrievanceError::WriteConflict(_) => "write_conflict",
            GrievanceError::ValidationFailed(_) => "validation_failed",
            GrievanceError::MissingRequiredField(_) => "missing_field",
            GrievanceError::InvalidFieldValue { .. } => "invalid_field",
            GrievanceError::JsonParsing(_) => "invalid_format",
            GrievanceError::InvalidTransition(_) => "invalid_transition",
            GrievanceError::ComplaintNotFound(_) => "complaint_not_found",
            GrievanceError::OfficerNotFound(_) => "officer_not_found",
            GrievanceError::ServiceManNotFound(_) => "serviceman_not_found",
            GrievanceError::ReportNotFound(_) => "report_not_found",
            GrievanceError::DepartmentNotFound(_) => "department_not_found",
            GrievanceError::AlreadyAssigned(_) => "already_assigned",
            GrievanceError::TokenInvalid => "token_invalid",
            GrievanceError::InsufficientPermissions => "insufficient_permissions",
            GrievanceError::TriageUnavailable(_) => "service_unavailable",
            _ => "internal_error",
        }
    }
}

impl IntoResponse for GrievanceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_type = self.kind();

        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        let (message, details) = match self {
            GrievanceError::ValidationFailed(errors) => {
                let details = serde_json::to_value(&errors).ok();
                ("Validation errors occurred".to_string(), details)
            }
            GrievanceError::BadRequest(msg)
            | GrievanceError::Unauthorized(msg)
            | GrievanceError::Forbidden(msg)
            | GrievanceError::NotFound(msg)
            | GrievanceError::Conflict(msg)
            | GrievanceError::InvalidTransition(msg) => (msg, None),
            other => {
                // Internal details stay in the logs
                let message = if status.is_server_error() {
                    "An internal error occurred".to_string()
                } else {
                    other.to_string()
                };
                (message, None)
            }
        };

        let error_response = ErrorResponse {
            error: error_type.to_string(),
            message,
            details,
        };

        (status, axum::Json(error_response)).into_response()
    }
}

// Convenience type alias for Results
pub type GrievanceResult<T> = Result<T, GrievanceError>;

impl From<redis::RedisError> for GrievanceError {
    fn from(err: redis::RedisError) -> Self {
        match err.kind() {
            redis::ErrorKind::IoError => GrievanceError::StoreConnection(err.to_string()),
            redis::ErrorKind::AuthenticationFailed => {
                GrievanceError::StoreConnection("Authentication failed".to_string())
            }
            _ => GrievanceError::StoreQuery(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for GrievanceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GrievanceError::NetworkTimeout
        } else if err.is_connect() {
            GrievanceError::NetworkConnection(err.to_string())
        } else {
            GrievanceError::HttpClient(err.to_string())
        }
    }
}

impl From<serde_json::Error> for GrievanceError {
    fn from(err: serde_json::Error) -> Self {
        GrievanceError::JsonParsing(err.to_string())
    }
}

// Helper functions for creating common errors
impl GrievanceError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        GrievanceError::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        GrievanceError::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        GrievanceError::Forbidden(msg.into())
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        GrievanceError::NotFound(resource.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        GrievanceError::Conflict(msg.into())
    }

    pub fn internal_error(msg: impl Into<String>) -> Self {
        GrievanceError::InternalServer(msg.into())
    }

    pub fn invalid_transition(msg: impl Into<String>) -> Self {
        GrievanceError::InvalidTransition(msg.into())
    }

    pub fn validation_error(field: impl Into<String>, message: impl Into<String>) -> Self {
        GrievanceError::ValidationFailed(vec![ValidationError {
            field: field.into(),
            message: message.into(),
        }])
    }

    pub fn complaint_not_found(id: impl Into<String>) -> Self {
        GrievanceError::ComplaintNotFound(id.into())
    }

    pub fn officer_not_found(id: impl Into<String>) -> Self {
        GrievanceError::OfficerNotFound(id.into())
    }

    pub fn serviceman_not_found(id: impl Into<String>) -> Self {
        GrievanceError::ServiceManNotFound(id.into())
    }

    pub fn report_not_found(id: impl Into<String>) -> Self {
        GrievanceError::ReportNotFound(id.into())
    }

    /// True for the caller-error class: bad input or an invalid state transition.
    pub fn is_bad_request(&self) -> bool {
        self.status_code() == StatusCode::BAD_REQUEST
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code() == StatusCode::NOT_FOUND
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(
            self.status_code(),
            StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = GrievanceError::ComplaintNotFound("cmp-250101-abc12".to_string());
        assert_eq!(error.to_string(), "Complaint not found: cmp-250101-abc12");
    }

    #[test]
    fn test_validation_error() {
        let error = GrievanceError::validation_error("subject", "Subject is too long");
        match error {
            GrievanceError::ValidationFailed(errors) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].field, "subject");
                assert_eq!(errors[0].message, "Subject is too long");
            }
            _ => panic!("Expected ValidationFailed error"),
        }
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(GrievanceError::bad_request("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(GrievanceError::invalid_transition("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(GrievanceError::report_not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(GrievanceError::forbidden("x").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(GrievanceError::TokenInvalid.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            GrievanceError::WriteConflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            GrievanceError::StoreQuery("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_json_errors_map_to_parsing() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let mapped: GrievanceError = err.into();
        assert!(matches!(mapped, GrievanceError::JsonParsing(_)));
        assert_eq!(mapped.status_code(), StatusCode::BAD_REQUEST);

        let err = serde_json::from_str::<u8>("\"text\"").unwrap_err();
        assert!(matches!(GrievanceError::from(err), GrievanceError::JsonParsing(_)));
    }

    #[test]
    fn test_helper_classes() {
        assert!(GrievanceError::validation_error("a", "b").is_bad_request());
        assert!(GrievanceError::officer_not_found("x").is_not_found());
        assert!(GrievanceError::unauthorized("x").is_forbidden());
        assert!(!GrievanceError::conflict("x").is_bad_request());
    }
}
