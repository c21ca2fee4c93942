//! PostgreSQL enrollment store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPool, FromRow, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::{
    CourseId, CourseProgress, Enrollment, EnrollmentId, EnrollmentStatus, InstructorId,
    PaymentStatus, StudentId,
};
use crate::infra::retry::is_unique_violation;
use crate::infra::{EnrollmentError, EnrollmentStore, Result};

use super::{decode_status, update_roll_up_tx};

/// PostgreSQL-backed enrollment store.
pub struct PgEnrollmentStore {
    pool: PgPool,
}

impl PgEnrollmentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create from connection string.
    pub async fn from_url(url: &str) -> Result<Self> {
        let pool = PgPool::connect(url).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(Debug, FromRow)]
struct EnrollmentRow {
    enrollment_id: Uuid,
    course_id: Uuid,
    course_slug: String,
    student_id: Uuid,
    instructor_id: Uuid,
    status: String,
    payment_status: String,
    total_lessons: i32,
    enrolled_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl EnrollmentRow {
    fn into_domain(self) -> Result<Enrollment> {
        Ok(Enrollment {
            enrollment_id: EnrollmentId::from_uuid(self.enrollment_id),
            course_id: CourseId::from_uuid(self.course_id),
            course_slug: self.course_slug,
            student_id: StudentId::from_uuid(self.student_id),
            instructor_id: InstructorId::from_uuid(self.instructor_id),
            status: decode_status(EnrollmentStatus::parse, &self.status, "status")?,
            payment_status: decode_status(
                PaymentStatus::parse,
                &self.payment_status,
                "payment_status",
            )?,
            total_lessons: self.total_lessons,
            enrolled_at: self.enrolled_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const SELECT_ENROLLMENT: &str = r#"
    SELECT enrollment_id, course_id, course_slug, student_id, instructor_id,
           status, payment_status, total_lessons,
           enrolled_at, created_at, updated_at
    FROM enrollments
"#;

async fn update_enrollment_tx(
    tx: &mut Transaction<'_, Postgres>,
    enrollment: &Enrollment,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE enrollments
        SET status = $2, payment_status = $3, total_lessons = $4, updated_at = $5
        WHERE enrollment_id = $1
        "#,
    )
    .bind(enrollment.enrollment_id.0)
    .bind(enrollment.status.as_str())
    .bind(enrollment.payment_status.as_str())
    .bind(enrollment.total_lessons)
    .bind(enrollment.updated_at)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(EnrollmentError::EnrollmentNotFound(enrollment.enrollment_id));
    }
    Ok(())
}

#[async_trait]
impl EnrollmentStore for PgEnrollmentStore {
    async fn create(&self, enrollment: &Enrollment, roll_up: &CourseProgress) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO enrollments (
                enrollment_id, course_id, course_slug, student_id, instructor_id,
                status, payment_status, total_lessons,
                enrolled_at, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(enrollment.enrollment_id.0)
        .bind(enrollment.course_id.0)
        .bind(&enrollment.course_slug)
        .bind(enrollment.student_id.0)
        .bind(enrollment.instructor_id.0)
        .bind(enrollment.status.as_str())
        .bind(enrollment.payment_status.as_str())
        .bind(enrollment.total_lessons)
        .bind(enrollment.enrolled_at)
        .bind(enrollment.created_at)
        .bind(enrollment.updated_at)
        .execute(&mut *tx)
        .await;

        if let Err(e) = inserted {
            // The unique index on (course_id, student_id) is the real
            // duplicate guard; the service-level pre-check only covers
            // the common case.
            if is_unique_violation(&e) {
                return Err(EnrollmentError::DuplicateEnrollment {
                    course_id: enrollment.course_id,
                    student_id: enrollment.student_id,
                });
            }
            return Err(e.into());
        }

        sqlx::query(
            r#"
            INSERT INTO course_progress (
                enrollment_id, lessons_completed, total_lessons, overall_progress,
                is_course_completed, course_completed_at, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(roll_up.enrollment_id.0)
        .bind(roll_up.lessons_completed)
        .bind(roll_up.total_lessons)
        .bind(roll_up.overall_progress)
        .bind(roll_up.is_course_completed)
        .bind(roll_up.course_completed_at)
        .bind(roll_up.created_at)
        .bind(roll_up.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find(&self, enrollment_id: EnrollmentId) -> Result<Option<Enrollment>> {
        let row: Option<EnrollmentRow> =
            sqlx::query_as(&format!("{SELECT_ENROLLMENT} WHERE enrollment_id = $1"))
                .bind(enrollment_id.0)
                .fetch_optional(&self.pool)
                .await?;

        row.map(EnrollmentRow::into_domain).transpose()
    }

    async fn find_by_course_and_student(
        &self,
        course_id: CourseId,
        student_id: StudentId,
    ) -> Result<Option<Enrollment>> {
        let row: Option<EnrollmentRow> = sqlx::query_as(&format!(
            "{SELECT_ENROLLMENT} WHERE course_id = $1 AND student_id = $2"
        ))
        .bind(course_id.0)
        .bind(student_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(EnrollmentRow::into_domain).transpose()
    }

    async fn list_by_student(&self, student_id: StudentId) -> Result<Vec<Enrollment>> {
        let rows: Vec<EnrollmentRow> = sqlx::query_as(&format!(
            "{SELECT_ENROLLMENT} WHERE student_id = $1 ORDER BY enrolled_at DESC"
        ))
        .bind(student_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(EnrollmentRow::into_domain).collect()
    }

    async fn list_by_course(&self, course_id: CourseId) -> Result<Vec<Enrollment>> {
        let rows: Vec<EnrollmentRow> = sqlx::query_as(&format!(
            "{SELECT_ENROLLMENT} WHERE course_id = $1 ORDER BY enrolled_at DESC"
        ))
        .bind(course_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(EnrollmentRow::into_domain).collect()
    }

    async fn update(&self, enrollment: &Enrollment) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        update_enrollment_tx(&mut tx, enrollment).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update_with_roll_up(
        &self,
        enrollment: &Enrollment,
        roll_up: &CourseProgress,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        update_enrollment_tx(&mut tx, enrollment).await?;
        update_roll_up_tx(&mut tx, roll_up).await?;
        tx.commit().await?;
        Ok(())
    }
}
