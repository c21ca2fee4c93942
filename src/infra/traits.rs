//! Trait definitions for enrollment service storage and collaborators.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::domain::{
    CourseId, CourseProgress, Enrollment, EnrollmentId, InstructorId, LearningProgress, LessonId,
    StudentId,
};

use super::Result;

/// Persistence for the enrollment aggregate.
///
/// Invariant: at most one enrollment per (course, student) pair,
/// enforced by a storage-level uniqueness constraint - the pre-insert
/// duplicate check is advisory, the constraint is the race guard.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    /// Insert an enrollment together with its zero-progress roll-up in
    /// one transaction.
    ///
    /// A uniqueness violation on (course_id, student_id) surfaces as
    /// `DuplicateEnrollment`.
    async fn create(&self, enrollment: &Enrollment, roll_up: &CourseProgress) -> Result<()>;

    async fn find(&self, enrollment_id: EnrollmentId) -> Result<Option<Enrollment>>;

    async fn find_by_course_and_student(
        &self,
        course_id: CourseId,
        student_id: StudentId,
    ) -> Result<Option<Enrollment>>;

    async fn list_by_student(&self, student_id: StudentId) -> Result<Vec<Enrollment>>;

    async fn list_by_course(&self, course_id: CourseId) -> Result<Vec<Enrollment>>;

    /// Persist status/payment/snapshot mutations of an existing row.
    async fn update(&self, enrollment: &Enrollment) -> Result<()>;

    /// Persist an enrollment mutation and its roll-up in one
    /// transaction (the set-total-lessons path).
    async fn update_with_roll_up(
        &self,
        enrollment: &Enrollment,
        roll_up: &CourseProgress,
    ) -> Result<()>;
}

/// Persistence for per-lesson completion records.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LearningProgressStore: Send + Sync {
    async fn find(
        &self,
        enrollment_id: EnrollmentId,
        lesson_id: LessonId,
    ) -> Result<Option<LearningProgress>>;

    async fn list_by_enrollment(&self, enrollment_id: EnrollmentId)
        -> Result<Vec<LearningProgress>>;

    /// Attempt the first-access insert.
    ///
    /// Returns `false` when another writer won the creation race (the
    /// uniqueness constraint rejected this insert); any other failure
    /// is an error.
    async fn try_insert(&self, progress: &LearningProgress) -> Result<bool>;

    /// Persist an access stamp (no completion flip, no roll-up sync).
    async fn update(&self, progress: &LearningProgress) -> Result<()>;

    /// Persist a flipped record and the synchronized roll-up in one
    /// transaction.
    async fn update_with_roll_up(
        &self,
        progress: &LearningProgress,
        roll_up: &CourseProgress,
    ) -> Result<()>;
}

/// Read access to the derived roll-up.
///
/// There is no public write method here on purpose: the
/// synchronization routine is the sole writer, and it goes through the
/// transactional methods above.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CourseProgressStore: Send + Sync {
    async fn find(&self, enrollment_id: EnrollmentId) -> Result<Option<CourseProgress>>;
}

/// External course catalog collaborator.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CourseCatalog: Send + Sync {
    /// Current lesson count of a course.
    async fn total_lessons(&self, course_id: CourseId) -> Result<i32>;

    /// Instructor owning a course, for oversight authorization.
    async fn instructor_id(&self, course_id: CourseId) -> Result<InstructorId>;
}
