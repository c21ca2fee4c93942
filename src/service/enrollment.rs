//! Enrollment lifecycle operations and queries.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::{
    Actor, CourseId, CourseProgress, Enrollment, EnrollmentId, EnrollmentStatus, InstructorId,
    PaymentStatus, StudentId,
};
use crate::infra::{
    CourseCatalog, CourseProgressStore, EnrollmentError, EnrollmentStore, Result,
};
use crate::service::AccessPolicy;

/// Input for creating an enrollment.
#[derive(Debug, Clone)]
pub struct NewEnrollment {
    pub course_id: CourseId,
    pub course_slug: String,
    pub student_id: StudentId,
    pub instructor_id: InstructorId,
    pub payment_status: PaymentStatus,
    /// Lesson-count snapshot; resolved from the catalog when absent.
    pub total_lessons: Option<i32>,
}

/// Per-course progress summary for a student's "my courses" view.
#[derive(Debug, Clone, Serialize)]
pub struct CourseProgressSummary {
    pub enrollment_id: EnrollmentId,
    pub course_id: CourseId,
    pub course_slug: String,
    pub status: EnrollmentStatus,
    pub lessons_completed: i32,
    pub total_lessons: i32,
    pub overall_progress: f64,
    pub is_course_completed: bool,
    pub enrolled_at: DateTime<Utc>,
}

/// Enrollment lifecycle service.
pub struct EnrollmentService {
    enrollments: Arc<dyn EnrollmentStore>,
    roll_ups: Arc<dyn CourseProgressStore>,
    catalog: Arc<dyn CourseCatalog>,
    access: AccessPolicy,
}

impl EnrollmentService {
    pub fn new(
        enrollments: Arc<dyn EnrollmentStore>,
        roll_ups: Arc<dyn CourseProgressStore>,
        catalog: Arc<dyn CourseCatalog>,
        access: AccessPolicy,
    ) -> Self {
        Self {
            enrollments,
            roll_ups,
            catalog,
            access,
        }
    }

    /// Create an enrollment with its zero-progress roll-up.
    ///
    /// The pre-insert duplicate check covers the common case; the
    /// storage uniqueness constraint covers the race, and both surface
    /// as `DuplicateEnrollment`.
    pub async fn create_enrollment(&self, request: NewEnrollment) -> Result<Enrollment> {
        if request.course_id.0.is_nil() {
            return Err(EnrollmentError::InvalidRequest(
                "course id is required".to_string(),
            ));
        }
        if request.student_id.0.is_nil() {
            return Err(EnrollmentError::InvalidRequest(
                "student id is required".to_string(),
            ));
        }

        if self
            .enrollments
            .find_by_course_and_student(request.course_id, request.student_id)
            .await?
            .is_some()
        {
            return Err(EnrollmentError::DuplicateEnrollment {
                course_id: request.course_id,
                student_id: request.student_id,
            });
        }

        let total_lessons = match request.total_lessons {
            Some(n) => n,
            None => self.catalog.total_lessons(request.course_id).await?,
        };

        let now = Utc::now();
        let enrollment = Enrollment::enroll(
            request.course_id,
            request.course_slug,
            request.student_id,
            request.instructor_id,
            request.payment_status,
            total_lessons,
            now,
        )?;
        let roll_up = CourseProgress::new_for(enrollment.enrollment_id, total_lessons, now)?;

        self.enrollments.create(&enrollment, &roll_up).await?;

        info!(
            enrollment_id = %enrollment.enrollment_id,
            course_id = %enrollment.course_id,
            student_id = %enrollment.student_id,
            total_lessons,
            "enrollment created"
        );
        Ok(enrollment)
    }

    /// Move an enrollment along its lifecycle state machine.
    pub async fn change_status(
        &self,
        actor: Actor,
        enrollment_id: EnrollmentId,
        next: EnrollmentStatus,
    ) -> Result<Enrollment> {
        let mut enrollment = self.load(enrollment_id).await?;
        self.access
            .ensure_owner_or_instructor(actor, &enrollment)
            .await?;

        let from = enrollment.status;
        enrollment.change_status(next, Utc::now())?;
        self.enrollments.update(&enrollment).await?;

        info!(
            enrollment_id = %enrollment_id,
            from = %from,
            to = %next,
            "enrollment status changed"
        );
        Ok(enrollment)
    }

    /// Move an enrollment along the payment state machine.
    pub async fn change_payment_status(
        &self,
        actor: Actor,
        enrollment_id: EnrollmentId,
        next: PaymentStatus,
    ) -> Result<Enrollment> {
        let mut enrollment = self.load(enrollment_id).await?;
        self.access
            .ensure_owner_or_instructor(actor, &enrollment)
            .await?;

        let from = enrollment.payment_status;
        enrollment.change_payment_status(next, Utc::now())?;
        self.enrollments.update(&enrollment).await?;

        info!(
            enrollment_id = %enrollment_id,
            from = %from,
            to = %next,
            "payment status changed"
        );
        Ok(enrollment)
    }

    pub async fn get(&self, actor: Actor, enrollment_id: EnrollmentId) -> Result<Enrollment> {
        let enrollment = self.load(enrollment_id).await?;
        self.access
            .ensure_owner_or_instructor(actor, &enrollment)
            .await?;
        Ok(enrollment)
    }

    pub async fn get_by_course_and_student(
        &self,
        actor: Actor,
        course_id: CourseId,
        student_id: StudentId,
    ) -> Result<Enrollment> {
        let enrollment = self
            .enrollments
            .find_by_course_and_student(course_id, student_id)
            .await?
            .ok_or_else(|| {
                EnrollmentError::InvalidRequest(format!(
                    "no enrollment for student {student_id} in course {course_id}"
                ))
            })?;
        self.access
            .ensure_owner_or_instructor(actor, &enrollment)
            .await?;
        Ok(enrollment)
    }

    /// Enrollments of the acting student.
    pub async fn my_enrollments(&self, actor: Actor) -> Result<Vec<Enrollment>> {
        self.enrollments
            .list_by_student(StudentId::from_uuid(actor.user_id))
            .await
    }

    /// All enrollments of a course (instructor oversight).
    pub async fn list_by_course(&self, actor: Actor, course_id: CourseId) -> Result<Vec<Enrollment>> {
        self.access.ensure_course_instructor(actor, course_id).await?;
        self.enrollments.list_by_course(course_id).await
    }

    /// Per-course progress summaries for the acting student.
    ///
    /// A missing roll-up degrades to zero progress with a warning; a
    /// student's course list should not 500 because one row is absent.
    pub async fn my_course_progress(&self, actor: Actor) -> Result<Vec<CourseProgressSummary>> {
        let enrollments = self
            .enrollments
            .list_by_student(StudentId::from_uuid(actor.user_id))
            .await?;

        let mut summaries = Vec::with_capacity(enrollments.len());
        for enrollment in enrollments {
            let roll_up = self.roll_ups.find(enrollment.enrollment_id).await?;
            if roll_up.is_none() {
                warn!(
                    enrollment_id = %enrollment.enrollment_id,
                    "course progress missing, reporting zero progress"
                );
            }

            let (lessons_completed, total_lessons, overall_progress, is_course_completed) =
                match &roll_up {
                    Some(p) => (
                        p.lessons_completed,
                        p.total_lessons,
                        p.overall_progress,
                        p.is_course_completed,
                    ),
                    None => (0, enrollment.total_lessons, 0.0, false),
                };

            summaries.push(CourseProgressSummary {
                enrollment_id: enrollment.enrollment_id,
                course_id: enrollment.course_id,
                course_slug: enrollment.course_slug,
                status: enrollment.status,
                lessons_completed,
                total_lessons,
                overall_progress,
                is_course_completed,
                enrolled_at: enrollment.enrolled_at,
            });
        }
        Ok(summaries)
    }

    async fn load(&self, enrollment_id: EnrollmentId) -> Result<Enrollment> {
        self.enrollments
            .find(enrollment_id)
            .await?
            .ok_or(EnrollmentError::EnrollmentNotFound(enrollment_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{MockCourseCatalog, MockCourseProgressStore, MockEnrollmentStore};

    fn service(
        enrollments: MockEnrollmentStore,
        catalog: MockCourseCatalog,
    ) -> EnrollmentService {
        let catalog = Arc::new(catalog);
        EnrollmentService::new(
            Arc::new(enrollments),
            Arc::new(MockCourseProgressStore::new()),
            catalog.clone(),
            AccessPolicy::new(catalog),
        )
    }

    fn request(course_id: CourseId, student_id: StudentId) -> NewEnrollment {
        NewEnrollment {
            course_id,
            course_slug: "intro-to-rust".to_string(),
            student_id,
            instructor_id: InstructorId::new(),
            payment_status: PaymentStatus::Paid,
            total_lessons: Some(5),
        }
    }

    #[tokio::test]
    async fn create_enrollment_persists_zero_progress() {
        let mut enrollments = MockEnrollmentStore::new();
        enrollments
            .expect_find_by_course_and_student()
            .returning(|_, _| Ok(None));
        enrollments
            .expect_create()
            .withf(|e, p| {
                e.status == EnrollmentStatus::Active
                    && p.lessons_completed == 0
                    && p.total_lessons == 5
                    && !p.is_course_completed
            })
            .returning(|_, _| Ok(()));

        let svc = service(enrollments, MockCourseCatalog::new());
        let enrollment = svc
            .create_enrollment(request(CourseId::new(), StudentId::new()))
            .await
            .unwrap();
        assert_eq!(enrollment.total_lessons, 5);
    }

    #[tokio::test]
    async fn create_enrollment_rejects_duplicate_pair() {
        let course_id = CourseId::new();
        let student_id = StudentId::new();

        let mut enrollments = MockEnrollmentStore::new();
        enrollments
            .expect_find_by_course_and_student()
            .returning(move |c, s| {
                Ok(Some(
                    Enrollment::enroll(
                        c,
                        "intro-to-rust",
                        s,
                        InstructorId::new(),
                        PaymentStatus::Paid,
                        5,
                        Utc::now(),
                    )
                    .unwrap(),
                ))
            });

        let svc = service(enrollments, MockCourseCatalog::new());
        let err = svc
            .create_enrollment(request(course_id, student_id))
            .await
            .unwrap_err();
        assert!(matches!(err, EnrollmentError::DuplicateEnrollment { .. }));
    }

    #[tokio::test]
    async fn create_enrollment_resolves_lesson_count_from_catalog() {
        let mut enrollments = MockEnrollmentStore::new();
        enrollments
            .expect_find_by_course_and_student()
            .returning(|_, _| Ok(None));
        enrollments
            .expect_create()
            .withf(|e, p| e.total_lessons == 12 && p.total_lessons == 12)
            .returning(|_, _| Ok(()));

        let mut catalog = MockCourseCatalog::new();
        catalog.expect_total_lessons().returning(|_| Ok(12));

        let svc = service(enrollments, catalog);
        let mut req = request(CourseId::new(), StudentId::new());
        req.total_lessons = None;
        let enrollment = svc.create_enrollment(req).await.unwrap();
        assert_eq!(enrollment.total_lessons, 12);
    }

    #[tokio::test]
    async fn change_status_enforces_transition_table() {
        let student_id = StudentId::new();
        let mut stored = Enrollment::enroll(
            CourseId::new(),
            "intro-to-rust",
            student_id,
            InstructorId::new(),
            PaymentStatus::Paid,
            5,
            Utc::now(),
        )
        .unwrap();
        stored.status = EnrollmentStatus::Completed;
        let enrollment_id = stored.enrollment_id;

        let mut enrollments = MockEnrollmentStore::new();
        let snapshot = stored.clone();
        enrollments
            .expect_find()
            .returning(move |_| Ok(Some(snapshot.clone())));

        let svc = service(enrollments, MockCourseCatalog::new());
        let err = svc
            .change_status(
                Actor::student(student_id),
                enrollment_id,
                EnrollmentStatus::Active,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EnrollmentError::InvalidStatusTransition { .. }));
    }

    #[tokio::test]
    async fn missing_enrollment_is_not_found() {
        let mut enrollments = MockEnrollmentStore::new();
        enrollments.expect_find().returning(|_| Ok(None));

        let svc = service(enrollments, MockCourseCatalog::new());
        let err = svc
            .change_status(
                Actor::system(),
                EnrollmentId::new(),
                EnrollmentStatus::Cancelled,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EnrollmentError::EnrollmentNotFound(_)));
    }
}
