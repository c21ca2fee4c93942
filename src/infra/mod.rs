//! Infrastructure layer for the enrollment service.
//!
//! Contains trait definitions and implementations for:
//! - Enrollment, learning-progress and course-progress storage
//!   (PostgreSQL)
//! - Bounded retry for the first-access creation race
//! - The course catalog collaborator (HTTP)

mod catalog;
mod error;
pub mod postgres;
pub mod retry;
mod traits;

pub use catalog::HttpCourseCatalog;
pub use error::*;
pub use postgres::{PgCourseProgressStore, PgEnrollmentStore, PgLearningProgressStore};
pub use retry::{is_retryable_db_error, is_unique_violation, UpsertRetry};
pub use traits::*;
