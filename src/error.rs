/// Unified Error Handling Module
///
/// Provides the error taxonomy for the authentication core:
/// 1. Control flow errors (Result-based)
/// 2. HTTP responses with structured context
/// 3. Structured error logging
///
/// Malformed and forged credentials always collapse to a single generic
/// "not authenticated" outcome so the error surface never works as a
/// verification oracle.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::error::Error as StdError;
use std::fmt;

/// Validation errors for input data
#[derive(Debug, Clone)]
pub enum ValidationError {
    EmptyField(String),
    TooShort(String, usize),
    TooLong(String, usize),
    InvalidFormat(String),
    /// Every password rule the candidate violated, not just the first.
    PasswordPolicy(Vec<String>),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyField(field) => write!(f, "{} is empty", field),
            ValidationError::TooShort(field, min) => {
                write!(f, "{} is too short (minimum {} characters)", field, min)
            }
            ValidationError::TooLong(field, max) => {
                write!(f, "{} is too long (maximum {} characters)", field, max)
            }
            ValidationError::InvalidFormat(field) => write!(f, "{} has invalid format", field),
            ValidationError::PasswordPolicy(errors) => {
                write!(f, "password does not meet policy: {}", errors.join("; "))
            }
        }
    }
}

impl StdError for ValidationError {}

/// Authentication and authorization errors
#[derive(Debug, Clone)]
pub enum AuthError {
    /// Unknown email or wrong password. One variant for both, so responses
    /// cannot be used for user enumeration.
    InvalidCredentials,
    /// No verifiable session: missing, malformed, forged, or expired tokens
    /// all land here.
    NotAuthenticated,
    /// Missing or invalid anti-forgery token on a state-mutating request.
    CsrfRejected,
    /// The caller is authenticated but lacks a required permission.
    PermissionDenied,
    /// Rate-limit budget exceeded; the hint is safe to reveal.
    RateLimited { retry_after_ms: u64 },
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidCredentials => write!(f, "Invalid email or password"),
            AuthError::NotAuthenticated => write!(f, "Not authenticated"),
            AuthError::CsrfRejected => write!(f, "Missing or invalid CSRF token"),
            AuthError::PermissionDenied => write!(f, "Insufficient permissions"),
            AuthError::RateLimited { retry_after_ms } => {
                write!(f, "Too many requests, retry after {}ms", retry_after_ms)
            }
        }
    }
}

impl StdError for AuthError {}

/// Central error type that all application errors map to
#[derive(Debug)]
pub enum AppError {
    Validation(ValidationError),
    Auth(AuthError),
    Conflict(String),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(e) => write!(f, "{}", e),
            AppError::Auth(e) => write!(f, "{}", e),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl StdError for AppError {}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

/// Error response structure for HTTP responses
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    /// Unique error ID for tracking (request ID or trace ID)
    pub error_id: String,
    /// Human-readable error message
    pub message: String,
    /// Error code for client-side handling
    pub code: String,
    /// HTTP status code
    pub status: u16,
    /// Timestamp when error occurred
    pub timestamp: String,
    /// Field-level details (password policy violations)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String, status: u16) -> Self {
        Self {
            error_id,
            message,
            code,
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = Some(details);
        self
    }
}

impl AppError {
    fn response_parts(&self) -> (StatusCode, String, String, Option<Vec<String>>) {
        match self {
            AppError::Validation(ValidationError::PasswordPolicy(errors)) => (
                StatusCode::BAD_REQUEST,
                "PASSWORD_POLICY".to_string(),
                "Password does not meet the policy".to_string(),
                Some(errors.clone()),
            ),
            AppError::Validation(e) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR".to_string(),
                e.to_string(),
                None,
            ),
            AppError::Auth(e) => match e {
                AuthError::InvalidCredentials => (
                    StatusCode::UNAUTHORIZED,
                    "INVALID_CREDENTIALS".to_string(),
                    e.to_string(),
                    None,
                ),
                AuthError::NotAuthenticated => (
                    StatusCode::UNAUTHORIZED,
                    "NOT_AUTHENTICATED".to_string(),
                    e.to_string(),
                    None,
                ),
                AuthError::CsrfRejected => (
                    StatusCode::FORBIDDEN,
                    "CSRF_REJECTED".to_string(),
                    e.to_string(),
                    None,
                ),
                AuthError::PermissionDenied => (
                    StatusCode::FORBIDDEN,
                    "PERMISSION_DENIED".to_string(),
                    e.to_string(),
                    None,
                ),
                AuthError::RateLimited { .. } => (
                    StatusCode::TOO_MANY_REQUESTS,
                    "RATE_LIMITED".to_string(),
                    e.to_string(),
                    None,
                ),
            },
            AppError::Conflict(msg) => (
                StatusCode::CONFLICT,
                "CONFLICT".to_string(),
                msg.clone(),
                None,
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR".to_string(),
                "Internal server error".to_string(),
                None,
            ),
        }
    }

    fn log(&self, error_id: &str) {
        match self {
            AppError::Validation(e) => {
                tracing::warn!(error_id = error_id, error = %e, "Validation error");
            }
            AppError::Auth(AuthError::InvalidCredentials) => {
                tracing::warn!(error_id = error_id, "Invalid credentials attempt");
            }
            AppError::Auth(AuthError::RateLimited { retry_after_ms }) => {
                tracing::warn!(
                    error_id = error_id,
                    retry_after_ms = retry_after_ms,
                    "Rate limit exceeded"
                );
            }
            AppError::Auth(e) => {
                tracing::warn!(error_id = error_id, error = %e, "Authentication error");
            }
            AppError::Conflict(msg) => {
                tracing::warn!(error_id = error_id, error = %msg, "Conflict");
            }
            AppError::Internal(msg) => {
                tracing::error!(error_id = error_id, error = %msg, "Internal error");
            }
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let error_id = uuid::Uuid::new_v4().to_string();
        self.log(&error_id);

        let (status, code, message, details) = self.response_parts();
        let mut body = ErrorResponse::new(error_id, message, code, status.as_u16());
        if let Some(details) = details {
            body = body.with_details(details);
        }

        let mut builder = HttpResponse::build(status);
        if let AppError::Auth(AuthError::RateLimited { retry_after_ms }) = self {
            builder.insert_header(("Retry-After", retry_after_ms.div_ceil(1000).to_string()));
        }
        builder.json(body)
    }

    fn status_code(&self) -> StatusCode {
        self.response_parts().0
    }
}
