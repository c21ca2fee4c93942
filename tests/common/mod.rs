//! Common test utilities and fixtures for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use opencourse_enrollment::domain::{
    Actor, CourseId, CourseProgress, Enrollment, EnrollmentId, InstructorId, LearningProgress,
    LessonId, PaymentStatus, StudentId,
};
use opencourse_enrollment::infra::{
    CourseCatalog, CourseProgressStore, EnrollmentError, EnrollmentStore, LearningProgressStore,
    Result,
};
use opencourse_enrollment::service::{
    AccessPolicy, EnrollmentService, NewEnrollment, ProgressService,
};
use opencourse_enrollment::UpsertRetry;

/// Test instructor ID
pub fn test_instructor_id() -> InstructorId {
    InstructorId::from_uuid(Uuid::parse_str("11111111-1111-1111-1111-111111111111").unwrap())
}

/// Test student ID
pub fn test_student_id() -> StudentId {
    StudentId::from_uuid(Uuid::parse_str("22222222-2222-2222-2222-222222222222").unwrap())
}

#[derive(Default)]
struct State {
    enrollments: HashMap<Uuid, Enrollment>,
    progress: HashMap<(Uuid, Uuid), LearningProgress>,
    roll_ups: HashMap<Uuid, CourseProgress>,
}

/// In-memory backing store implementing every persistence trait plus
/// the catalog, with the same uniqueness semantics as the real schema.
pub struct TestStore {
    state: Mutex<State>,
    pub catalog_instructor: InstructorId,
    pub catalog_total_lessons: i32,
}

impl TestStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State::default()),
            catalog_instructor: test_instructor_id(),
            catalog_total_lessons: 5,
        })
    }

    pub fn with_catalog(instructor: InstructorId, total_lessons: i32) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State::default()),
            catalog_instructor: instructor,
            catalog_total_lessons: total_lessons,
        })
    }

    pub fn progress_row_count(&self) -> usize {
        self.state.lock().unwrap().progress.len()
    }

    pub fn enrollment_count(&self) -> usize {
        self.state.lock().unwrap().enrollments.len()
    }
}

#[async_trait]
impl EnrollmentStore for TestStore {
    async fn create(&self, enrollment: &Enrollment, roll_up: &CourseProgress) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let duplicate = state.enrollments.values().any(|e| {
            e.course_id == enrollment.course_id && e.student_id == enrollment.student_id
        });
        if duplicate {
            return Err(EnrollmentError::DuplicateEnrollment {
                course_id: enrollment.course_id,
                student_id: enrollment.student_id,
            });
        }
        state
            .enrollments
            .insert(enrollment.enrollment_id.0, enrollment.clone());
        state
            .roll_ups
            .insert(roll_up.enrollment_id.0, roll_up.clone());
        Ok(())
    }

    async fn find(&self, enrollment_id: EnrollmentId) -> Result<Option<Enrollment>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .enrollments
            .get(&enrollment_id.0)
            .cloned())
    }

    async fn find_by_course_and_student(
        &self,
        course_id: CourseId,
        student_id: StudentId,
    ) -> Result<Option<Enrollment>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .enrollments
            .values()
            .find(|e| e.course_id == course_id && e.student_id == student_id)
            .cloned())
    }

    async fn list_by_student(&self, student_id: StudentId) -> Result<Vec<Enrollment>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .enrollments
            .values()
            .filter(|e| e.student_id == student_id)
            .cloned()
            .collect())
    }

    async fn list_by_course(&self, course_id: CourseId) -> Result<Vec<Enrollment>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .enrollments
            .values()
            .filter(|e| e.course_id == course_id)
            .cloned()
            .collect())
    }

    async fn update(&self, enrollment: &Enrollment) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.enrollments.contains_key(&enrollment.enrollment_id.0) {
            return Err(EnrollmentError::EnrollmentNotFound(enrollment.enrollment_id));
        }
        state
            .enrollments
            .insert(enrollment.enrollment_id.0, enrollment.clone());
        Ok(())
    }

    async fn update_with_roll_up(
        &self,
        enrollment: &Enrollment,
        roll_up: &CourseProgress,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.enrollments.contains_key(&enrollment.enrollment_id.0) {
            return Err(EnrollmentError::EnrollmentNotFound(enrollment.enrollment_id));
        }
        state
            .enrollments
            .insert(enrollment.enrollment_id.0, enrollment.clone());
        state
            .roll_ups
            .insert(roll_up.enrollment_id.0, roll_up.clone());
        Ok(())
    }
}

#[async_trait]
impl LearningProgressStore for TestStore {
    async fn find(
        &self,
        enrollment_id: EnrollmentId,
        lesson_id: LessonId,
    ) -> Result<Option<LearningProgress>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .progress
            .get(&(enrollment_id.0, lesson_id.0))
            .cloned())
    }

    async fn list_by_enrollment(
        &self,
        enrollment_id: EnrollmentId,
    ) -> Result<Vec<LearningProgress>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .progress
            .values()
            .filter(|p| p.enrollment_id == enrollment_id)
            .cloned()
            .collect())
    }

    async fn try_insert(&self, progress: &LearningProgress) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let key = (progress.enrollment_id.0, progress.lesson_id.0);
        if state.progress.contains_key(&key) {
            // Same signal as the unique index rejecting the insert.
            return Ok(false);
        }
        state.progress.insert(key, progress.clone());
        Ok(true)
    }

    async fn update(&self, progress: &LearningProgress) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let key = (progress.enrollment_id.0, progress.lesson_id.0);
        if !state.progress.contains_key(&key) {
            return Err(EnrollmentError::LearningProgressNotFound {
                enrollment_id: progress.enrollment_id,
                lesson_id: progress.lesson_id,
            });
        }
        state.progress.insert(key, progress.clone());
        Ok(())
    }

    async fn update_with_roll_up(
        &self,
        progress: &LearningProgress,
        roll_up: &CourseProgress,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let key = (progress.enrollment_id.0, progress.lesson_id.0);
        if !state.progress.contains_key(&key) {
            return Err(EnrollmentError::LearningProgressNotFound {
                enrollment_id: progress.enrollment_id,
                lesson_id: progress.lesson_id,
            });
        }
        state.progress.insert(key, progress.clone());
        state
            .roll_ups
            .insert(roll_up.enrollment_id.0, roll_up.clone());
        Ok(())
    }
}

#[async_trait]
impl CourseProgressStore for TestStore {
    async fn find(&self, enrollment_id: EnrollmentId) -> Result<Option<CourseProgress>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .roll_ups
            .get(&enrollment_id.0)
            .cloned())
    }
}

#[async_trait]
impl CourseCatalog for TestStore {
    async fn total_lessons(&self, _course_id: CourseId) -> Result<i32> {
        Ok(self.catalog_total_lessons)
    }

    async fn instructor_id(&self, _course_id: CourseId) -> Result<InstructorId> {
        Ok(self.catalog_instructor)
    }
}

/// Service graph wired onto a single in-memory store.
pub struct TestHarness {
    pub store: Arc<TestStore>,
    pub enrollments: Arc<EnrollmentService>,
    pub progress: Arc<ProgressService>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_store(TestStore::new())
    }

    pub fn with_store(store: Arc<TestStore>) -> Self {
        let catalog: Arc<dyn CourseCatalog> = store.clone();
        let access = AccessPolicy::new(catalog.clone());

        let enrollments = Arc::new(EnrollmentService::new(
            store.clone(),
            store.clone(),
            catalog,
            access.clone(),
        ));
        let progress = Arc::new(
            ProgressService::new(store.clone(), store.clone(), store.clone(), access)
                .with_retry(UpsertRetry::immediate()),
        );

        Self {
            store,
            enrollments,
            progress,
        }
    }

    /// Create an active, paid enrollment ready for lesson operations.
    pub async fn enroll_active_paid(&self, total_lessons: i32) -> Enrollment {
        self.enrollments
            .create_enrollment(NewEnrollment {
                course_id: CourseId::new(),
                course_slug: format!("course-{}", &Uuid::new_v4().to_string()[..8]),
                student_id: test_student_id(),
                instructor_id: test_instructor_id(),
                payment_status: PaymentStatus::Paid,
                total_lessons: Some(total_lessons),
            })
            .await
            .expect("enrollment creation failed")
    }

    pub fn student(&self) -> Actor {
        Actor::student(test_student_id())
    }
}

/// Timestamp helper for constructing domain records directly.
pub fn now() -> chrono::DateTime<Utc> {
    Utc::now()
}
