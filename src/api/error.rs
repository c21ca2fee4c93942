//! Structured API error responses with stable error codes.
//!
//! Clients program against `code`/`numeric_code`; `message` is for
//! humans and may change.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::infra::EnrollmentError;

// ============================================================================
// Error Codes
// ============================================================================

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Access errors (1xxx)
    /// Ownership check failed
    Forbidden,
    /// Identity headers missing or malformed
    MissingIdentity,

    // Validation errors (3xxx)
    /// Request body is malformed
    InvalidRequestBody,
    /// Field value is invalid (negative counts, empty ids, ...)
    InvalidFieldValue,

    // Resource errors (4xxx)
    /// Enrollment not found
    EnrollmentNotFound,
    /// Learning progress not found
    LearningProgressNotFound,
    /// Course progress roll-up not found
    CourseProgressNotFound,

    // Conflict errors (5xxx)
    /// Student already enrolled in the course
    DuplicateEnrollment,

    // State errors (7xxx)
    /// Illegal enrollment lifecycle transition
    InvalidStatusTransition,
    /// Illegal payment status transition
    InvalidPaymentStatusTransition,
    /// Lesson operation while the enrollment is not active
    EnrollmentNotActive,
    /// Lesson operation before payment completed
    PaymentRequired,

    // Infrastructure errors (8xxx)
    /// Database operation failed
    DatabaseError,
    /// Course catalog unavailable
    CatalogUnavailable,
    /// Creation race retry budget exhausted; safe to retry
    TransientConflict,
    /// Internal server error
    InternalError,
}

impl ErrorCode {
    /// Stable numeric code for this error.
    pub fn numeric_code(&self) -> u32 {
        match self {
            // Access (1xxx)
            ErrorCode::Forbidden => 1001,
            ErrorCode::MissingIdentity => 1002,

            // Validation (3xxx)
            ErrorCode::InvalidRequestBody => 3001,
            ErrorCode::InvalidFieldValue => 3002,

            // Resource (4xxx)
            ErrorCode::EnrollmentNotFound => 4001,
            ErrorCode::LearningProgressNotFound => 4002,
            ErrorCode::CourseProgressNotFound => 4003,

            // Conflict (5xxx)
            ErrorCode::DuplicateEnrollment => 5001,

            // State (7xxx)
            ErrorCode::InvalidStatusTransition => 7001,
            ErrorCode::InvalidPaymentStatusTransition => 7002,
            ErrorCode::EnrollmentNotActive => 7003,
            ErrorCode::PaymentRequired => 7004,

            // Infrastructure (8xxx)
            ErrorCode::DatabaseError => 8001,
            ErrorCode::CatalogUnavailable => 8002,
            ErrorCode::TransientConflict => 8003,
            ErrorCode::InternalError => 8999,
        }
    }

    /// HTTP status for this error.
    pub fn http_status(&self) -> StatusCode {
        match self {
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::MissingIdentity => StatusCode::BAD_REQUEST,

            ErrorCode::InvalidRequestBody => StatusCode::BAD_REQUEST,
            ErrorCode::InvalidFieldValue => StatusCode::BAD_REQUEST,

            ErrorCode::EnrollmentNotFound => StatusCode::NOT_FOUND,
            ErrorCode::LearningProgressNotFound => StatusCode::NOT_FOUND,
            ErrorCode::CourseProgressNotFound => StatusCode::NOT_FOUND,

            ErrorCode::DuplicateEnrollment => StatusCode::CONFLICT,

            ErrorCode::InvalidStatusTransition => StatusCode::CONFLICT,
            ErrorCode::InvalidPaymentStatusTransition => StatusCode::CONFLICT,
            ErrorCode::EnrollmentNotActive => StatusCode::CONFLICT,
            ErrorCode::PaymentRequired => StatusCode::PAYMENT_REQUIRED,

            ErrorCode::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::CatalogUnavailable => StatusCode::BAD_GATEWAY,
            ErrorCode::TransientConflict => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// ============================================================================
// API Error
// ============================================================================

/// Error returned by every API endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub numeric_code: u32,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            numeric_code: code.numeric_code(),
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.code.http_status();
        (status, Json(ErrorEnvelope { error: self })).into_response()
    }
}

impl From<EnrollmentError> for ApiError {
    fn from(err: EnrollmentError) -> Self {
        let code = match &err {
            EnrollmentError::EnrollmentNotFound(_) => ErrorCode::EnrollmentNotFound,
            EnrollmentError::LearningProgressNotFound { .. } => ErrorCode::LearningProgressNotFound,
            EnrollmentError::CourseProgressNotFound(_) => ErrorCode::CourseProgressNotFound,
            EnrollmentError::InvalidRequest(_) => ErrorCode::InvalidFieldValue,
            EnrollmentError::DuplicateEnrollment { .. } => ErrorCode::DuplicateEnrollment,
            EnrollmentError::InvalidStatusTransition { .. } => ErrorCode::InvalidStatusTransition,
            EnrollmentError::InvalidPaymentStatusTransition { .. } => {
                ErrorCode::InvalidPaymentStatusTransition
            }
            EnrollmentError::EnrollmentNotActive(_) => ErrorCode::EnrollmentNotActive,
            EnrollmentError::PaymentRequired(_) => ErrorCode::PaymentRequired,
            EnrollmentError::Forbidden(_) => ErrorCode::Forbidden,
            EnrollmentError::TransientUpsertFailure { .. } => ErrorCode::TransientConflict,
            EnrollmentError::Database(_) => ErrorCode::DatabaseError,
            EnrollmentError::Catalog(_) => ErrorCode::CatalogUnavailable,
            EnrollmentError::Internal(_) => ErrorCode::InternalError,
        };

        // Internal details stay out of client-visible messages.
        let message = match &err {
            EnrollmentError::Database(_) => "database operation failed".to_string(),
            EnrollmentError::Internal(_) => "internal error".to_string(),
            other => other.to_string(),
        };

        ApiError::new(code, message)
    }
}
