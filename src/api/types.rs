//! Request and response DTOs for the REST surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    CourseId, CourseProgress, Enrollment, EnrollmentId, EnrollmentStatus, InstructorId,
    LearningProgress, LessonId, PaymentStatus, StudentId,
};

#[derive(Debug, Deserialize)]
pub struct CreateEnrollmentRequest {
    pub course_id: CourseId,
    pub course_slug: String,
    pub student_id: StudentId,
    pub instructor_id: InstructorId,
    #[serde(default = "default_payment_status")]
    pub payment_status: PaymentStatus,
    /// Resolved from the course catalog when omitted.
    pub total_lessons: Option<i32>,
}

fn default_payment_status() -> PaymentStatus {
    PaymentStatus::Pending
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: EnrollmentStatus,
}

#[derive(Debug, Deserialize)]
pub struct ChangePaymentStatusRequest {
    pub payment_status: PaymentStatus,
}

#[derive(Debug, Deserialize)]
pub struct SetTotalLessonsRequest {
    pub total_lessons: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EnrollmentResponse {
    pub enrollment_id: EnrollmentId,
    pub course_id: CourseId,
    pub course_slug: String,
    pub student_id: StudentId,
    pub instructor_id: InstructorId,
    pub status: EnrollmentStatus,
    pub payment_status: PaymentStatus,
    pub total_lessons: i32,
    pub enrolled_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Enrollment> for EnrollmentResponse {
    fn from(e: Enrollment) -> Self {
        Self {
            enrollment_id: e.enrollment_id,
            course_id: e.course_id,
            course_slug: e.course_slug,
            student_id: e.student_id,
            instructor_id: e.instructor_id,
            status: e.status,
            payment_status: e.payment_status,
            total_lessons: e.total_lessons,
            enrolled_at: e.enrolled_at,
            created_at: e.created_at,
            updated_at: e.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LearningProgressResponse {
    pub progress_id: uuid::Uuid,
    pub enrollment_id: EnrollmentId,
    pub lesson_id: LessonId,
    pub is_completed: bool,
    pub last_accessed_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<LearningProgress> for LearningProgressResponse {
    fn from(p: LearningProgress) -> Self {
        Self {
            progress_id: p.progress_id,
            enrollment_id: p.enrollment_id,
            lesson_id: p.lesson_id,
            is_completed: p.is_completed,
            last_accessed_at: p.last_accessed_at,
            completed_at: p.completed_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CourseProgressResponse {
    pub enrollment_id: EnrollmentId,
    pub lessons_completed: i32,
    pub total_lessons: i32,
    pub overall_progress: f64,
    pub is_course_completed: bool,
    pub course_completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl From<CourseProgress> for CourseProgressResponse {
    fn from(p: CourseProgress) -> Self {
        Self {
            enrollment_id: p.enrollment_id,
            lessons_completed: p.lessons_completed,
            total_lessons: p.total_lessons,
            overall_progress: p.overall_progress,
            is_course_completed: p.is_course_completed,
            course_completed_at: p.course_completed_at,
            updated_at: p.updated_at,
        }
    }
}

/// Combined response for lesson completion operations: the flipped
/// record plus the synchronized roll-up.
#[derive(Debug, Serialize, Deserialize)]
pub struct LessonCompletionResponse {
    pub progress: LearningProgressResponse,
    pub course_progress: CourseProgressResponse,
}
