/// Error Handling Module
///
/// Unified error handling for the token service:
/// 1. Domain-specific error types (validation, auth, token, store, password)
/// 2. A single `AppError` used for control flow inside the core
/// 3. HTTP response mapping that never leaks internal detail
/// 4. Structured error logging keyed by an error id

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::error::Error as StdError;
use std::fmt;

/// ============================================================================
/// 1. DOMAIN-SPECIFIC ERROR TYPES
/// ============================================================================

/// Validation errors for request fields (the `InvalidInput` kind)
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    EmptyField(String),
    TooShort(String, usize),
    TooLong(String, usize),
    InvalidFormat(String),
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
        }
    }
}

impl StdError for ValidationError {}

/// Authentication errors.
///
/// `TokenExpired` is an internal signal for the refresh path. Over HTTP every
/// variant except `UserAlreadyExists` renders as the same 401 body.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthError {
    Unauthorized,
    MissingToken,
    InvalidToken,
    TokenExpired,
    UserAlreadyExists,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::Unauthorized => write!(f, "Unauthorized"),
            AuthError::MissingToken => write!(f, "Missing authentication token"),
            AuthError::InvalidToken => write!(f, "Invalid token"),
            AuthError::TokenExpired => write!(f, "Token has expired"),
            AuthError::UserAlreadyExists => write!(f, "User already exists"),
        }
    }
}

impl StdError for AuthError {}

/// Token minting failures
#[derive(Debug, Clone, PartialEq)]
pub enum TokenError {
    InvalidLength(usize),
    RandomSource(String),
    Signing(String),
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::InvalidLength(len) => write!(f, "Invalid refresh token length: {}", len),
            TokenError::RandomSource(msg) => write!(f, "Random source failure: {}", msg),
            TokenError::Signing(msg) => write!(f, "Token signing failed: {}", msg),
        }
    }
}

impl StdError for TokenError {}

/// Errors reported by the user directory and token store
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    UniqueViolation(String),
    NotFound(String),
    Timeout(String),
    Unavailable(String),
    Unexpected(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::UniqueViolation(msg) => write!(f, "Duplicate entry: {}", msg),
            StoreError::NotFound(msg) => write!(f, "Not found: {}", msg),
            StoreError::Timeout(msg) => write!(f, "Store call timed out: {}", msg),
            StoreError::Unavailable(msg) => write!(f, "Store unavailable: {}", msg),
            StoreError::Unexpected(msg) => write!(f, "Store error: {}", msg),
        }
    }
}

impl StdError for StoreError {}

/// ============================================================================
/// 2. UNIFIED APPLICATION ERROR TYPE
/// ============================================================================

/// Central error type that all core errors map to
#[derive(Debug)]
pub enum AppError {
    Validation(ValidationError),
    Auth(AuthError),
    Token(TokenError),
    Store(StoreError),
    Password(String),
    Config(String),
    Internal(String),
}

impl AppError {
    /// True when the error is an authentication failure of any kind
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, AppError::Auth(e) if *e != AuthError::UserAlreadyExists)
    }

    /// True only for a correctly signed access token whose expiry has passed
    pub fn is_token_expired(&self) -> bool {
        matches!(self, AppError::Auth(AuthError::TokenExpired))
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(e) => write!(f, "{}", e),
            AppError::Auth(e) => write!(f, "{}", e),
            AppError::Token(e) => write!(f, "{}", e),
            AppError::Store(e) => write!(f, "{}", e),
            AppError::Password(msg) => write!(f, "Password hashing failed: {}", msg),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl StdError for AppError {}

// ============================================================================
// FROM IMPLEMENTATIONS
// ============================================================================

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

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        AppError::Token(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Store(err)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                StoreError::UniqueViolation(db_err.message().to_string())
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            _ => StoreError::Unexpected(err.to_string()),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Store(err.into())
    }
}

// ============================================================================
// 3. HTTP RESPONSE MAPPING
// ============================================================================

/// Error response body
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    /// Unique error ID, matches the `error_id` field of the log event
    pub error_id: String,
    /// Human-readable error message
    pub message: String,
    /// Error code for client-side handling
    pub code: String,
    /// HTTP status code
    pub status: u16,
    /// Timestamp when error occurred
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String, status: u16) -> Self {
        Self {
            error_id,
            message,
            code,
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Converts errors to HTTP responses with proper logging
pub trait ErrorHandler {
    fn error_response(&self, error_id: &str) -> (StatusCode, ErrorResponse);
    fn log_error(&self, error_id: &str);
}

impl ErrorHandler for AppError {
    fn error_response(&self, error_id: &str) -> (StatusCode, ErrorResponse) {
        let (status, code, message) = match self {
            AppError::Validation(e) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                e.to_string(),
            ),

            AppError::Auth(AuthError::UserAlreadyExists) => (
                StatusCode::CONFLICT,
                "USER_ALREADY_EXISTS",
                "User already exists".to_string(),
            ),

            // Expired, invalid, missing and wrong credentials look identical
            AppError::Auth(_) => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Unauthorized".to_string(),
            ),

            AppError::Store(StoreError::Timeout(_)) | AppError::Store(StoreError::Unavailable(_)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                "Service temporarily unavailable".to_string(),
            ),

            AppError::Token(_)
            | AppError::Store(_)
            | AppError::Password(_)
            | AppError::Config(_)
            | AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error".to_string(),
            ),
        };

        let error_response = ErrorResponse::new(
            error_id.to_string(),
            message,
            code.to_string(),
            status.as_u16(),
        );

        (status, error_response)
    }

    fn log_error(&self, error_id: &str) {
        match self {
            AppError::Validation(e) => {
                tracing::warn!(error_id = error_id, error = %e, "Validation error");
            }
            AppError::Auth(AuthError::UserAlreadyExists) => {
                tracing::warn!(error_id = error_id, error = %self, "Duplicate registration attempt");
            }
            AppError::Auth(e) => {
                tracing::warn!(error_id = error_id, error = %e, "Authentication error");
            }
            AppError::Store(StoreError::Timeout(_)) | AppError::Store(StoreError::Unavailable(_)) => {
                tracing::error!(error_id = error_id, error = %self, "Store unavailable");
            }
            _ => {
                tracing::error!(error_id = error_id, error = %self, "Internal error");
            }
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let error_id = uuid::Uuid::new_v4().to_string();
        self.log_error(&error_id);

        let (status, error_response) = <Self as ErrorHandler>::error_response(self, &error_id);

        HttpResponse::build(status).json(error_response)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Auth(AuthError::UserAlreadyExists) => StatusCode::CONFLICT,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Store(StoreError::Timeout(_)) | AppError::Store(StoreError::Unavailable(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::EmptyField("email".to_string());
        assert_eq!(err.to_string(), "email is empty");
    }

    #[test]
    fn test_expired_token_is_indistinguishable_over_http() {
        let (expired_status, expired) = <AppError as ErrorHandler>::error_response(
            &AppError::Auth(AuthError::TokenExpired),
            "a",
        );
        let (invalid_status, invalid) = <AppError as ErrorHandler>::error_response(
            &AppError::Auth(AuthError::InvalidToken),
            "b",
        );

        assert_eq!(expired_status, StatusCode::UNAUTHORIZED);
        assert_eq!(expired_status, invalid_status);
        assert_eq!(expired.code, invalid.code);
        assert_eq!(expired.message, invalid.message);
    }

    #[test]
    fn test_internal_errors_are_opaque() {
        let err = AppError::Store(StoreError::Unexpected("relation users does not exist".into()));
        let (status, body) = <AppError as ErrorHandler>::error_response(&err, "id");

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.message.contains("users"));
    }

    #[test]
    fn test_store_timeout_maps_to_service_unavailable() {
        let err = AppError::Store(StoreError::Timeout("get_token".into()));
        assert_eq!(ResponseError::status_code(&err), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_duplicate_registration_maps_to_conflict() {
        let err: AppError = AuthError::UserAlreadyExists.into();
        assert_eq!(ResponseError::status_code(&err), StatusCode::CONFLICT);
        assert!(!err.is_unauthorized());
    }

    #[test]
    fn test_error_classification_helpers() {
        assert!(AppError::Auth(AuthError::TokenExpired).is_token_expired());
        assert!(AppError::Auth(AuthError::TokenExpired).is_unauthorized());
        assert!(!AppError::Auth(AuthError::InvalidToken).is_token_expired());
        assert!(!AppError::Internal("x".into()).is_unauthorized());
    }
}
