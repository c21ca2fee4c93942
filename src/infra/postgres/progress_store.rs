//! PostgreSQL learning-progress store.
//!
//! `try_insert` is the storage half of the race-tolerant upsert: the
//! unique index on (enrollment_id, lesson_id) rejects the losing
//! writer, which this store reports as `Ok(false)` rather than an
//! error so the service layer can re-read and retry.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPool, FromRow};
use uuid::Uuid;

use crate::domain::{CourseProgress, EnrollmentId, LearningProgress, LessonId};
use crate::infra::retry::is_unique_violation;
use crate::infra::{EnrollmentError, LearningProgressStore, Result};

use super::update_roll_up_tx;

/// PostgreSQL-backed learning-progress store.
pub struct PgLearningProgressStore {
    pool: PgPool,
}

impl PgLearningProgressStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(Debug, FromRow)]
struct LearningProgressRow {
    progress_id: Uuid,
    enrollment_id: Uuid,
    lesson_id: Uuid,
    is_completed: bool,
    last_accessed_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl LearningProgressRow {
    fn into_domain(self) -> LearningProgress {
        LearningProgress {
            progress_id: self.progress_id,
            enrollment_id: EnrollmentId::from_uuid(self.enrollment_id),
            lesson_id: LessonId::from_uuid(self.lesson_id),
            is_completed: self.is_completed,
            last_accessed_at: self.last_accessed_at,
            completed_at: self.completed_at,
        }
    }
}

const SELECT_PROGRESS: &str = r#"
    SELECT progress_id, enrollment_id, lesson_id,
           is_completed, last_accessed_at, completed_at
    FROM learning_progress
"#;

async fn update_progress_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    progress: &LearningProgress,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE learning_progress
        SET is_completed = $2, last_accessed_at = $3, completed_at = $4
        WHERE progress_id = $1
        "#,
    )
    .bind(progress.progress_id)
    .bind(progress.is_completed)
    .bind(progress.last_accessed_at)
    .bind(progress.completed_at)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(EnrollmentError::LearningProgressNotFound {
            enrollment_id: progress.enrollment_id,
            lesson_id: progress.lesson_id,
        });
    }
    Ok(())
}

#[async_trait]
impl LearningProgressStore for PgLearningProgressStore {
    async fn find(
        &self,
        enrollment_id: EnrollmentId,
        lesson_id: LessonId,
    ) -> Result<Option<LearningProgress>> {
        let row: Option<LearningProgressRow> = sqlx::query_as(&format!(
            "{SELECT_PROGRESS} WHERE enrollment_id = $1 AND lesson_id = $2"
        ))
        .bind(enrollment_id.0)
        .bind(lesson_id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(LearningProgressRow::into_domain))
    }

    async fn list_by_enrollment(
        &self,
        enrollment_id: EnrollmentId,
    ) -> Result<Vec<LearningProgress>> {
        let rows: Vec<LearningProgressRow> = sqlx::query_as(&format!(
            "{SELECT_PROGRESS} WHERE enrollment_id = $1 ORDER BY last_accessed_at DESC"
        ))
        .bind(enrollment_id.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(LearningProgressRow::into_domain)
            .collect())
    }

    async fn try_insert(&self, progress: &LearningProgress) -> Result<bool> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO learning_progress (
                progress_id, enrollment_id, lesson_id,
                is_completed, last_accessed_at, completed_at
            ) VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(progress.progress_id)
        .bind(progress.enrollment_id.0)
        .bind(progress.lesson_id.0)
        .bind(progress.is_completed)
        .bind(progress.last_accessed_at)
        .bind(progress.completed_at)
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => Ok(true),
            Err(e) if is_unique_violation(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn update(&self, progress: &LearningProgress) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        update_progress_tx(&mut tx, progress).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update_with_roll_up(
        &self,
        progress: &LearningProgress,
        roll_up: &CourseProgress,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        update_progress_tx(&mut tx, progress).await?;
        update_roll_up_tx(&mut tx, roll_up).await?;
        tx.commit().await?;
        Ok(())
    }
}
