//! Lesson-level completion records and the per-enrollment roll-up.
//!
//! `LearningProgress` is the per-(enrollment, lesson) record;
//! `CourseProgress` is derived from it one counter delta at a time.
//! The roll-up is never recomputed by rescanning lesson records: each
//! completion flip is applied as a +1/−1 delta, which keeps the update
//! O(1) and makes interleaved flips across different lessons commute.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{EnrollmentId, LessonId};
use crate::infra::{EnrollmentError, Result};

/// Outcome of setting a completion flag.
///
/// Only actual flips trigger roll-up synchronization; `None` means the
/// record was already in the requested state (idempotent no-op).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionFlip {
    None,
    Completed,
    Uncompleted,
}

/// One record per (enrollment, lesson) pair.
///
/// At most one row exists per pair; the storage layer's uniqueness
/// constraint is what enforces this under concurrent first access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningProgress {
    pub progress_id: uuid::Uuid,
    pub enrollment_id: EnrollmentId,
    pub lesson_id: LessonId,
    pub is_completed: bool,
    pub last_accessed_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl LearningProgress {
    /// Fresh record for the first access to a lesson.
    pub fn start(enrollment_id: EnrollmentId, lesson_id: LessonId, now: DateTime<Utc>) -> Self {
        Self {
            progress_id: uuid::Uuid::new_v4(),
            enrollment_id,
            lesson_id,
            is_completed: false,
            last_accessed_at: now,
            completed_at: None,
        }
    }

    /// Stamp an access without changing completion state.
    pub fn record_access(&mut self, now: DateTime<Utc>) {
        self.last_accessed_at = now;
    }

    /// Set the completion flag, reporting whether it actually flipped.
    ///
    /// `completed_at` is non-null exactly while the record is
    /// completed.
    pub fn set_completed(&mut self, completed: bool, now: DateTime<Utc>) -> CompletionFlip {
        self.last_accessed_at = now;

        match (self.is_completed, completed) {
            (false, true) => {
                self.is_completed = true;
                self.completed_at = Some(now);
                CompletionFlip::Completed
            }
            (true, false) => {
                self.is_completed = false;
                self.completed_at = None;
                CompletionFlip::Uncompleted
            }
            _ => CompletionFlip::None,
        }
    }
}

/// Derived completion roll-up, 1:1 with an enrollment.
///
/// Invariants:
/// - `0 <= lessons_completed <= total_lessons`
/// - `overall_progress == lessons_completed / total_lessons`
///   (0 when `total_lessons` is 0), rounded to 2 decimals
/// - `is_course_completed` iff `overall_progress >= 1.0`
/// - `course_completed_at` is non-null iff `is_course_completed`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseProgress {
    pub enrollment_id: EnrollmentId,
    pub lessons_completed: i32,
    pub total_lessons: i32,
    pub overall_progress: f64,
    pub is_course_completed: bool,
    pub course_completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CourseProgress {
    /// Zero-progress roll-up created alongside its enrollment.
    pub fn new_for(
        enrollment_id: EnrollmentId,
        total_lessons: i32,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if total_lessons < 0 {
            return Err(EnrollmentError::InvalidRequest(format!(
                "total lessons cannot be negative: {total_lessons}"
            )));
        }
        Ok(Self {
            enrollment_id,
            lessons_completed: 0,
            total_lessons,
            overall_progress: 0.0,
            is_course_completed: false,
            course_completed_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply one completion flip as a counter delta.
    ///
    /// A single step moves the counter by at most one in either
    /// direction; the decrement saturates at zero. An increment at the
    /// cap means a duplicate signal slipped past flip detection and is
    /// ignored.
    pub fn apply_flip(&mut self, flip: CompletionFlip, now: DateTime<Utc>) {
        match flip {
            CompletionFlip::None => return,
            CompletionFlip::Completed => {
                if self.lessons_completed < self.total_lessons {
                    self.lessons_completed += 1;
                }
            }
            CompletionFlip::Uncompleted => {
                self.lessons_completed = (self.lessons_completed - 1).max(0);
            }
        }
        self.recompute(now);
    }

    /// Update the lesson-count snapshot when course content changes.
    ///
    /// Shrinking below the already-completed count is rejected rather
    /// than clamped.
    pub fn set_total_lessons(&mut self, total_lessons: i32, now: DateTime<Utc>) -> Result<()> {
        if total_lessons < 0 {
            return Err(EnrollmentError::InvalidRequest(format!(
                "total lessons cannot be negative: {total_lessons}"
            )));
        }
        if total_lessons < self.lessons_completed {
            return Err(EnrollmentError::InvalidRequest(format!(
                "cannot set total lessons to {total_lessons}: {} lessons already completed",
                self.lessons_completed
            )));
        }
        self.total_lessons = total_lessons;
        self.recompute(now);
        Ok(())
    }

    pub fn remaining_lessons(&self) -> i32 {
        (self.total_lessons - self.lessons_completed).max(0)
    }

    /// Re-derive the percentage and the completion pair from the
    /// counters.
    fn recompute(&mut self, now: DateTime<Utc>) {
        self.overall_progress = if self.total_lessons > 0 {
            let ratio = f64::from(self.lessons_completed) / f64::from(self.total_lessons);
            (ratio * 100.0).round() / 100.0
        } else {
            0.0
        };

        let completed = self.overall_progress >= 1.0;
        if completed && !self.is_course_completed {
            self.course_completed_at = Some(now);
        } else if !completed {
            self.course_completed_at = None;
        }
        self.is_course_completed = completed;
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roll_up(total: i32) -> CourseProgress {
        CourseProgress::new_for(EnrollmentId::new(), total, Utc::now()).unwrap()
    }

    #[test]
    fn starts_at_zero() {
        let p = roll_up(5);
        assert_eq!(p.lessons_completed, 0);
        assert_eq!(p.overall_progress, 0.0);
        assert!(!p.is_course_completed);
        assert!(p.course_completed_at.is_none());
    }

    #[test]
    fn rejects_negative_total() {
        assert!(CourseProgress::new_for(EnrollmentId::new(), -3, Utc::now()).is_err());
    }

    #[test]
    fn completing_all_lessons_completes_course() {
        let mut p = roll_up(5);
        for _ in 0..5 {
            p.apply_flip(CompletionFlip::Completed, Utc::now());
        }
        assert_eq!(p.lessons_completed, 5);
        assert_eq!(p.overall_progress, 1.0);
        assert!(p.is_course_completed);
        assert!(p.course_completed_at.is_some());
    }

    #[test]
    fn uncompleting_reopens_course() {
        let mut p = roll_up(5);
        for _ in 0..5 {
            p.apply_flip(CompletionFlip::Completed, Utc::now());
        }
        p.apply_flip(CompletionFlip::Uncompleted, Utc::now());

        assert_eq!(p.lessons_completed, 4);
        assert_eq!(p.overall_progress, 0.8);
        assert!(!p.is_course_completed);
        assert!(p.course_completed_at.is_none());
    }

    #[test]
    fn none_flip_is_a_no_op() {
        let mut p = roll_up(5);
        p.apply_flip(CompletionFlip::Completed, Utc::now());
        let before = p.clone();

        p.apply_flip(CompletionFlip::None, Utc::now());
        assert_eq!(p.lessons_completed, before.lessons_completed);
        assert_eq!(p.overall_progress, before.overall_progress);
        assert_eq!(p.updated_at, before.updated_at);
    }

    #[test]
    fn decrement_saturates_at_zero() {
        let mut p = roll_up(3);
        p.apply_flip(CompletionFlip::Uncompleted, Utc::now());
        assert_eq!(p.lessons_completed, 0);
        assert_eq!(p.overall_progress, 0.0);
    }

    #[test]
    fn increment_at_cap_is_ignored() {
        let mut p = roll_up(1);
        p.apply_flip(CompletionFlip::Completed, Utc::now());
        p.apply_flip(CompletionFlip::Completed, Utc::now());
        assert_eq!(p.lessons_completed, 1);
        assert!(p.is_course_completed);
    }

    #[test]
    fn zero_total_lessons_never_divides() {
        let mut p = roll_up(0);
        p.apply_flip(CompletionFlip::Uncompleted, Utc::now());
        assert_eq!(p.overall_progress, 0.0);
        assert!(!p.is_course_completed);
    }

    #[test]
    fn set_total_lessons_rejects_shrink_below_completed() {
        let mut p = roll_up(5);
        for _ in 0..4 {
            p.apply_flip(CompletionFlip::Completed, Utc::now());
        }
        let err = p.set_total_lessons(3, Utc::now()).unwrap_err();
        assert!(matches!(err, EnrollmentError::InvalidRequest(_)));
        // Rejected update leaves state untouched
        assert_eq!(p.total_lessons, 5);
        assert_eq!(p.lessons_completed, 4);
    }

    #[test]
    fn growing_total_lessons_reopens_completed_course() {
        let mut p = roll_up(2);
        p.apply_flip(CompletionFlip::Completed, Utc::now());
        p.apply_flip(CompletionFlip::Completed, Utc::now());
        assert!(p.is_course_completed);

        p.set_total_lessons(4, Utc::now()).unwrap();
        assert_eq!(p.overall_progress, 0.5);
        assert!(!p.is_course_completed);
        assert!(p.course_completed_at.is_none());
    }

    #[test]
    fn percentage_rounds_to_two_decimals() {
        let mut p = roll_up(3);
        p.apply_flip(CompletionFlip::Completed, Utc::now());
        assert_eq!(p.overall_progress, 0.33);
        p.apply_flip(CompletionFlip::Completed, Utc::now());
        assert_eq!(p.overall_progress, 0.67);
    }

    #[test]
    fn completion_flip_detection() {
        let mut lp = LearningProgress::start(EnrollmentId::new(), LessonId::new(), Utc::now());
        assert!(!lp.is_completed);

        assert_eq!(lp.set_completed(true, Utc::now()), CompletionFlip::Completed);
        assert!(lp.completed_at.is_some());

        // Marking completed twice does not flip again
        assert_eq!(lp.set_completed(true, Utc::now()), CompletionFlip::None);

        assert_eq!(
            lp.set_completed(false, Utc::now()),
            CompletionFlip::Uncompleted
        );
        assert!(lp.completed_at.is_none());
        assert_eq!(lp.set_completed(false, Utc::now()), CompletionFlip::None);
    }
}
