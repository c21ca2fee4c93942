//! Error types for the enrollment service.

use thiserror::Error;

use crate::domain::{CourseId, EnrollmentId, EnrollmentStatus, LessonId, PaymentStatus, StudentId};

/// Errors that can occur in the enrollment service.
#[derive(Error, Debug)]
pub enum EnrollmentError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Enrollment not found
    #[error("enrollment not found: {0}")]
    EnrollmentNotFound(EnrollmentId),

    /// Learning progress not found for a (lesson, enrollment) pair
    #[error("learning progress not found for lesson {lesson_id} in enrollment {enrollment_id}")]
    LearningProgressNotFound {
        enrollment_id: EnrollmentId,
        lesson_id: LessonId,
    },

    /// Course progress roll-up not found
    #[error("course progress not found for enrollment {0}")]
    CourseProgressNotFound(EnrollmentId),

    /// Malformed input (negative counts, empty required fields, ...)
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Student already enrolled in the course
    #[error("student {student_id} is already enrolled in course {course_id}")]
    DuplicateEnrollment {
        course_id: CourseId,
        student_id: StudentId,
    },

    /// Illegal enrollment lifecycle transition
    #[error("invalid enrollment status transition: {from} -> {to}")]
    InvalidStatusTransition {
        from: EnrollmentStatus,
        to: EnrollmentStatus,
    },

    /// Illegal payment status transition
    #[error("invalid payment status transition: {from} -> {to}")]
    InvalidPaymentStatusTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    /// Lesson operation attempted while the enrollment is not ACTIVE
    #[error("enrollment is not active (status: {0})")]
    EnrollmentNotActive(EnrollmentStatus),

    /// Lesson operation attempted before payment completed
    #[error("payment required (payment status: {0})")]
    PaymentRequired(PaymentStatus),

    /// Ownership check failed
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Get-or-create retry budget exhausted without observing a winner
    #[error(
        "transient upsert failure for lesson {lesson_id} in enrollment {enrollment_id} \
         after {attempts} attempts"
    )]
    TransientUpsertFailure {
        enrollment_id: EnrollmentId,
        lesson_id: LessonId,
        attempts: u32,
    },

    /// Course catalog collaborator error
    #[error("course catalog error: {0}")]
    Catalog(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl EnrollmentError {
    /// Whether a consumer should redeliver the triggering message.
    ///
    /// Validation and state-machine violations are poison (retrying the
    /// same payload can never succeed); infrastructure and race-budget
    /// failures are worth another delivery.
    pub fn is_transient(&self) -> bool {
        match self {
            EnrollmentError::Database(e) => crate::infra::retry::is_retryable_db_error(e),
            EnrollmentError::TransientUpsertFailure { .. } => true,
            EnrollmentError::Catalog(_) => true,
            EnrollmentError::Internal(_) => true,
            _ => false,
        }
    }
}

/// Result type for enrollment service operations.
pub type Result<T> = std::result::Result<T, EnrollmentError>;
