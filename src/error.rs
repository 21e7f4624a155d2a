//! Error types for the EAMS server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Stable numeric error codes returned to clients alongside the HTTP status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    NotAuthenticated = 2,
    NotAuthorized = 3,
    DbFailure = 4,
    NotFound = 5,
    BadValue = 6,
    Duplicate = 7,
    InvalidQrCode = 10,
    QrCodeExpired = 11,
    QrCodeInactive = 12,
    QrCodeExhausted = 13,
    NotEnrolled = 14,
    AlreadyCheckedIn = 15,
    EnrollmentClosed = 16,
    ActivityFull = 17,
}

/// Reasons a QR scan is refused, in validation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScanRejection {
    /// Unknown token, or token issued for another activity
    InvalidToken,
    /// Token was deactivated (a newer one was issued, or it was revoked)
    InactiveToken,
    ExpiredToken,
    /// Token reached its `max_uses`
    ExhaustedToken,
    NotEnrolled,
    AlreadyCheckedIn,
}

impl ScanRejection {
    pub fn code(&self) -> ErrorCode {
        match self {
            ScanRejection::InvalidToken => ErrorCode::InvalidQrCode,
            ScanRejection::InactiveToken => ErrorCode::QrCodeInactive,
            ScanRejection::ExpiredToken => ErrorCode::QrCodeExpired,
            ScanRejection::ExhaustedToken => ErrorCode::QrCodeExhausted,
            ScanRejection::NotEnrolled => ErrorCode::NotEnrolled,
            ScanRejection::AlreadyCheckedIn => ErrorCode::AlreadyCheckedIn,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ScanRejection::InvalidToken => "Invalid QR code for this activity",
            ScanRejection::InactiveToken => "QR code is no longer active",
            ScanRejection::ExpiredToken => "QR code has expired",
            ScanRejection::ExhaustedToken => "QR code has reached its maximum number of uses",
            ScanRejection::NotEnrolled => "You are not enrolled in this activity",
            ScanRejection::AlreadyCheckedIn => "Attendance already marked for this activity",
        }
    }
}

impl std::fmt::Display for ScanRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Business rule violation: {1}")]
    BusinessRule(ErrorCode, String),

    #[error("Scan rejected: {0}")]
    Scan(ScanRejection),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

/// Postgres SQLSTATE for unique_violation
const UNIQUE_VIOLATION: &str = "23505";

pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|e| e.code())
        .map(|code| code == UNIQUE_VIOLATION)
        .unwrap_or(false)
}

impl AppError {
    fn parts(&self) -> (StatusCode, ErrorCode, String) {
        match self {
            AppError::Authentication(msg) => {
                (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthenticated, msg.clone())
            }
            AppError::Authorization(msg) => {
                (StatusCode::FORBIDDEN, ErrorCode::NotAuthorized, msg.clone())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorCode::NotFound, msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone()),
            AppError::Database(e) if is_unique_violation(e) => (
                StatusCode::BAD_REQUEST,
                ErrorCode::Duplicate,
                "Record already exists".to_string(),
            ),
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::DbFailure,
                    "Database error".to_string(),
                )
            }
            // Duplicates are reported as 400 with an explanatory message
            AppError::Conflict(msg) => (StatusCode::BAD_REQUEST, ErrorCode::Duplicate, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone()),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::Failure,
                    "Internal server error".to_string(),
                )
            }
            AppError::BusinessRule(code, msg) => (StatusCode::BAD_REQUEST, *code, msg.clone()),
            AppError::Scan(reason) => {
                (StatusCode::BAD_REQUEST, reason.code(), reason.message().to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::Authentication("x".into()), StatusCode::UNAUTHORIZED),
            (AppError::Authorization("x".into()), StatusCode::FORBIDDEN),
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Conflict("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (AppError::Scan(ScanRejection::AlreadyCheckedIn), StatusCode::BAD_REQUEST),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_internal_message_is_generic() {
        let (_, code, message) = AppError::Internal("pool exhausted at 10.0.0.3".into()).parts();
        assert_eq!(code, ErrorCode::Failure);
        assert_eq!(message, "Internal server error");
    }

    #[test]
    fn test_scan_rejection_codes_are_distinct() {
        let (_, expired, _) = AppError::Scan(ScanRejection::ExpiredToken).parts();
        let (_, enrolled, msg) = AppError::Scan(ScanRejection::NotEnrolled).parts();
        assert_eq!(expired, ErrorCode::QrCodeExpired);
        assert_eq!(enrolled, ErrorCode::NotEnrolled);
        assert_eq!(msg, "You are not enrolled in this activity");
    }

    #[test]
    fn test_business_rule_displays_its_message() {
        let err = AppError::BusinessRule(ErrorCode::ActivityFull, "Activity is full".to_string());
        assert_eq!(err.to_string(), "Business rule violation: Activity is full");

        let (status, code, message) = err.parts();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(code, ErrorCode::ActivityFull);
        assert_eq!(message, "Activity is full");
    }

    #[test]
    fn test_row_not_found_is_not_a_duplicate() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }
}
