//! PostgreSQL course-progress read store.

use async_trait::async_trait;
use sqlx::postgres::PgPool;

use crate::domain::{CourseProgress, EnrollmentId};
use crate::infra::{CourseProgressStore, Result};

use super::CourseProgressRow;

/// Read-only access to the derived roll-up; writes go through the
/// transactional paths of the enrollment and learning-progress stores.
pub struct PgCourseProgressStore {
    pool: PgPool,
}

impl PgCourseProgressStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CourseProgressStore for PgCourseProgressStore {
    async fn find(&self, enrollment_id: EnrollmentId) -> Result<Option<CourseProgress>> {
        let row: Option<CourseProgressRow> = sqlx::query_as(
            r#"
            SELECT enrollment_id, lessons_completed, total_lessons, overall_progress,
                   is_course_completed, course_completed_at, created_at, updated_at
            FROM course_progress
            WHERE enrollment_id = $1
            "#,
        )
        .bind(enrollment_id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(CourseProgressRow::into_domain))
    }
}
