//! Lesson progress tracking and the incremental roll-up sync.
//!
//! Every inbound signal runs one logical unit: resolve the enrollment,
//! resolve or create the lesson record, apply the transition, persist,
//! and synchronize the roll-up - the flipped record and the adjusted
//! roll-up commit in the same transaction.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::domain::{
    Actor, CompletionFlip, CourseProgress, Enrollment, EnrollmentId, LearningProgress, LessonId,
};
use crate::infra::{
    CourseProgressStore, EnrollmentError, EnrollmentStore, LearningProgressStore, Result,
    UpsertRetry,
};
use crate::service::AccessPolicy;

/// Lesson-level progress service; sole writer of `CourseProgress`.
pub struct ProgressService {
    enrollments: Arc<dyn EnrollmentStore>,
    progress: Arc<dyn LearningProgressStore>,
    roll_ups: Arc<dyn CourseProgressStore>,
    access: AccessPolicy,
    retry: UpsertRetry,
}

impl ProgressService {
    pub fn new(
        enrollments: Arc<dyn EnrollmentStore>,
        progress: Arc<dyn LearningProgressStore>,
        roll_ups: Arc<dyn CourseProgressStore>,
        access: AccessPolicy,
    ) -> Self {
        Self {
            enrollments,
            progress,
            roll_ups,
            access,
            retry: UpsertRetry::default(),
        }
    }

    pub fn with_retry(mut self, retry: UpsertRetry) -> Self {
        self.retry = retry;
        self
    }

    /// Race-tolerant get-or-create for a (enrollment, lesson) record.
    ///
    /// Optimistic, not locked: the storage uniqueness constraint is the
    /// arbiter. Losing an insert means another writer created the row,
    /// so back off (50ms x attempt) and re-read. The budget is 3 insert
    /// attempts plus one final read; if the row still cannot be
    /// observed the failure is surfaced instead of fabricating state.
    pub async fn get_or_create(
        &self,
        enrollment_id: EnrollmentId,
        lesson_id: LessonId,
    ) -> Result<LearningProgress> {
        if let Some(existing) = self.progress.find(enrollment_id, lesson_id).await? {
            return Ok(existing);
        }

        let mut attempts = 0;
        while attempts < self.retry.max_attempts {
            attempts += 1;

            let fresh = LearningProgress::start(enrollment_id, lesson_id, Utc::now());
            if self.progress.try_insert(&fresh).await? {
                debug!(
                    enrollment_id = %enrollment_id,
                    lesson_id = %lesson_id,
                    "learning progress created"
                );
                return Ok(fresh);
            }

            debug!(
                enrollment_id = %enrollment_id,
                lesson_id = %lesson_id,
                attempt = attempts,
                max_attempts = self.retry.max_attempts,
                "lost learning-progress creation race"
            );

            if attempts >= self.retry.max_attempts {
                break;
            }

            tokio::time::sleep(self.retry.delay_for_attempt(attempts)).await;
            if let Some(existing) = self.progress.find(enrollment_id, lesson_id).await? {
                return Ok(existing);
            }
        }

        // The winner's row should be visible by now; one last read
        // before giving up.
        if let Some(existing) = self.progress.find(enrollment_id, lesson_id).await? {
            return Ok(existing);
        }

        warn!(
            enrollment_id = %enrollment_id,
            lesson_id = %lesson_id,
            attempts,
            "get-or-create exhausted its retry budget"
        );
        Err(EnrollmentError::TransientUpsertFailure {
            enrollment_id,
            lesson_id,
            attempts,
        })
    }

    /// Record that the student opened a lesson.
    pub async fn record_access(
        &self,
        actor: Actor,
        enrollment_id: EnrollmentId,
        lesson_id: LessonId,
    ) -> Result<LearningProgress> {
        let enrollment = self.load_enrollment(enrollment_id).await?;
        self.access.ensure_student_owns(actor, &enrollment)?;
        enrollment.ensure_accessible()?;

        let mut record = self.get_or_create(enrollment_id, lesson_id).await?;
        record.record_access(Utc::now());
        self.progress.update(&record).await?;
        Ok(record)
    }

    /// Mark a lesson completed. Duplicate calls are no-ops.
    pub async fn mark_completed(
        &self,
        actor: Actor,
        enrollment_id: EnrollmentId,
        lesson_id: LessonId,
    ) -> Result<(LearningProgress, CourseProgress)> {
        let enrollment = self.load_enrollment(enrollment_id).await?;
        self.access.ensure_student_owns(actor, &enrollment)?;
        enrollment.ensure_accessible()?;

        self.set_completed(enrollment_id, lesson_id, true).await
    }

    /// Un-mark a completed lesson (correction/oversight path).
    pub async fn mark_uncompleted(
        &self,
        actor: Actor,
        enrollment_id: EnrollmentId,
        lesson_id: LessonId,
    ) -> Result<(LearningProgress, CourseProgress)> {
        let enrollment = self.load_enrollment(enrollment_id).await?;
        self.access
            .ensure_owner_or_instructor(actor, &enrollment)
            .await?;
        enrollment.ensure_accessible()?;

        self.set_completed(enrollment_id, lesson_id, false).await
    }

    /// Apply a completion-flag change and synchronize the roll-up.
    ///
    /// Only an actual flip touches the roll-up: the counter moves by
    /// exactly one and both rows commit together. A no-flip call just
    /// stamps the access time.
    async fn set_completed(
        &self,
        enrollment_id: EnrollmentId,
        lesson_id: LessonId,
        completed: bool,
    ) -> Result<(LearningProgress, CourseProgress)> {
        let mut record = self.get_or_create(enrollment_id, lesson_id).await?;

        let now = Utc::now();
        let flip = record.set_completed(completed, now);

        match flip {
            CompletionFlip::None => {
                self.progress.update(&record).await?;
                let roll_up = self.load_roll_up(enrollment_id).await?;
                Ok((record, roll_up))
            }
            _ => {
                let mut roll_up = self.load_roll_up(enrollment_id).await?;
                roll_up.apply_flip(flip, now);
                self.progress.update_with_roll_up(&record, &roll_up).await?;

                info!(
                    enrollment_id = %enrollment_id,
                    lesson_id = %lesson_id,
                    completed,
                    lessons_completed = roll_up.lessons_completed,
                    total_lessons = roll_up.total_lessons,
                    overall_progress = roll_up.overall_progress,
                    "lesson completion synchronized"
                );
                Ok((record, roll_up))
            }
        }
    }

    /// Refresh the lesson-count snapshot when course content changes.
    pub async fn set_total_lessons(
        &self,
        actor: Actor,
        enrollment_id: EnrollmentId,
        total_lessons: i32,
    ) -> Result<CourseProgress> {
        let mut enrollment = self.load_enrollment(enrollment_id).await?;
        self.access
            .ensure_owner_or_instructor(actor, &enrollment)
            .await?;

        let now = Utc::now();
        let mut roll_up = self.load_roll_up(enrollment_id).await?;
        roll_up.set_total_lessons(total_lessons, now)?;
        enrollment.set_total_lessons(total_lessons, now)?;

        self.enrollments
            .update_with_roll_up(&enrollment, &roll_up)
            .await?;

        info!(
            enrollment_id = %enrollment_id,
            total_lessons,
            overall_progress = roll_up.overall_progress,
            "total lessons updated"
        );
        Ok(roll_up)
    }

    /// One lesson record, for the student or the course's instructor.
    pub async fn get_progress(
        &self,
        actor: Actor,
        enrollment_id: EnrollmentId,
        lesson_id: LessonId,
    ) -> Result<LearningProgress> {
        let enrollment = self.load_enrollment(enrollment_id).await?;
        self.access
            .ensure_owner_or_instructor(actor, &enrollment)
            .await?;

        self.progress
            .find(enrollment_id, lesson_id)
            .await?
            .ok_or(EnrollmentError::LearningProgressNotFound {
                enrollment_id,
                lesson_id,
            })
    }

    /// All lesson records of an enrollment.
    pub async fn list_progress(
        &self,
        actor: Actor,
        enrollment_id: EnrollmentId,
    ) -> Result<Vec<LearningProgress>> {
        let enrollment = self.load_enrollment(enrollment_id).await?;
        self.access
            .ensure_owner_or_instructor(actor, &enrollment)
            .await?;
        self.progress.list_by_enrollment(enrollment_id).await
    }

    /// The derived roll-up of an enrollment.
    pub async fn course_progress(
        &self,
        actor: Actor,
        enrollment_id: EnrollmentId,
    ) -> Result<CourseProgress> {
        let enrollment = self.load_enrollment(enrollment_id).await?;
        self.access
            .ensure_owner_or_instructor(actor, &enrollment)
            .await?;
        self.load_roll_up(enrollment_id).await
    }

    async fn load_enrollment(&self, enrollment_id: EnrollmentId) -> Result<Enrollment> {
        self.enrollments
            .find(enrollment_id)
            .await?
            .ok_or(EnrollmentError::EnrollmentNotFound(enrollment_id))
    }

    async fn load_roll_up(&self, enrollment_id: EnrollmentId) -> Result<CourseProgress> {
        self.roll_ups
            .find(enrollment_id)
            .await?
            .ok_or(EnrollmentError::CourseProgressNotFound(enrollment_id))
    }
}
