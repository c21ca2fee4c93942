//! PostgreSQL store implementations.

mod course_progress_store;
mod enrollment_store;
mod progress_store;

pub use course_progress_store::PgCourseProgressStore;
pub use enrollment_store::PgEnrollmentStore;
pub use progress_store::PgLearningProgressStore;

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::domain::{CourseProgress, EnrollmentId};
use crate::infra::{EnrollmentError, Result};

/// Row shape shared by every query touching `course_progress`.
#[derive(Debug, FromRow)]
pub(crate) struct CourseProgressRow {
    pub enrollment_id: Uuid,
    pub lessons_completed: i32,
    pub total_lessons: i32,
    pub overall_progress: f64,
    pub is_course_completed: bool,
    pub course_completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CourseProgressRow {
    pub(crate) fn into_domain(self) -> CourseProgress {
        CourseProgress {
            enrollment_id: EnrollmentId::from_uuid(self.enrollment_id),
            lessons_completed: self.lessons_completed,
            total_lessons: self.total_lessons,
            overall_progress: self.overall_progress,
            is_course_completed: self.is_course_completed,
            course_completed_at: self.course_completed_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Persist the roll-up inside an open transaction. Shared by every
/// writer path so the synchronization routine stays the sole writer of
/// `course_progress`.
pub(crate) async fn update_roll_up_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    roll_up: &CourseProgress,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE course_progress
        SET lessons_completed = $2, total_lessons = $3, overall_progress = $4,
            is_course_completed = $5, course_completed_at = $6, updated_at = $7
        WHERE enrollment_id = $1
        "#,
    )
    .bind(roll_up.enrollment_id.0)
    .bind(roll_up.lessons_completed)
    .bind(roll_up.total_lessons)
    .bind(roll_up.overall_progress)
    .bind(roll_up.is_course_completed)
    .bind(roll_up.course_completed_at)
    .bind(roll_up.updated_at)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(EnrollmentError::CourseProgressNotFound(roll_up.enrollment_id));
    }
    Ok(())
}

pub(crate) fn decode_status<T>(
    parse: impl Fn(&str) -> Option<T>,
    raw: &str,
    column: &str,
) -> Result<T> {
    parse(raw).ok_or_else(|| {
        EnrollmentError::Internal(format!("unknown {column} value in database: {raw:?}"))
    })
}
