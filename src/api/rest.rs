//! REST API endpoints for the enrollment service.

use axum::async_trait;
use axum::extract::{FromRequestParts, Path, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};

use crate::api::error::{ApiError, ErrorCode};
use crate::api::types::{
    ChangePaymentStatusRequest, ChangeStatusRequest, CourseProgressResponse,
    CreateEnrollmentRequest, EnrollmentResponse, LearningProgressResponse,
    LessonCompletionResponse, SetTotalLessonsRequest,
};
use crate::domain::{Actor, CourseId, EnrollmentId, LessonId, Role, StudentId};
use crate::server::AppState;
use crate::service::{CourseProgressSummary, NewEnrollment};

/// Build the `/api` router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/enrollments", post(create_enrollment))
        .route("/v1/enrollments/:enrollment_id", get(get_enrollment))
        .route(
            "/v1/enrollments/:enrollment_id/status",
            put(change_status),
        )
        .route(
            "/v1/enrollments/:enrollment_id/payment-status",
            put(change_payment_status),
        )
        .route(
            "/v1/enrollments/:enrollment_id/total-lessons",
            put(set_total_lessons),
        )
        .route("/v1/courses/:course_id/enrollments", get(list_by_course))
        .route(
            "/v1/courses/:course_id/enrollments/students/:student_id",
            get(get_by_course_and_student),
        )
        .route("/v1/students/me/enrollments", get(my_enrollments))
        .route("/v1/students/me/course-progress", get(my_course_progress))
        .route(
            "/v1/enrollments/:enrollment_id/lessons/:lesson_id/access",
            post(record_lesson_access),
        )
        .route(
            "/v1/enrollments/:enrollment_id/lessons/:lesson_id/complete",
            post(mark_lesson_completed).delete(unmark_lesson_completed),
        )
        .route(
            "/v1/enrollments/:enrollment_id/lessons/:lesson_id/progress",
            get(get_lesson_progress),
        )
        .route(
            "/v1/enrollments/:enrollment_id/progress",
            get(list_lesson_progress),
        )
        .route(
            "/v1/enrollments/:enrollment_id/course-progress",
            get(get_course_progress),
        )
}

// ============================================================================
// Identity extraction
// ============================================================================

/// The gateway authenticates and forwards the identity as headers;
/// here they are only parsed, never verified.
#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| uuid::Uuid::parse_str(v).ok())
            .ok_or_else(|| {
                ApiError::new(
                    ErrorCode::MissingIdentity,
                    "missing or malformed x-user-id header",
                )
            })?;

        let role = parts
            .headers
            .get("x-user-role")
            .and_then(|v| v.to_str().ok())
            .and_then(Role::parse)
            .ok_or_else(|| {
                ApiError::new(
                    ErrorCode::MissingIdentity,
                    "missing or malformed x-user-role header",
                )
            })?;

        Ok(Actor { user_id, role })
    }
}

fn require_admin(actor: Actor) -> Result<(), ApiError> {
    if actor.role == Role::Admin {
        Ok(())
    } else {
        Err(ApiError::new(
            ErrorCode::Forbidden,
            "administrative operation",
        ))
    }
}

// ============================================================================
// Enrollment handlers
// ============================================================================

async fn create_enrollment(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<CreateEnrollmentRequest>,
) -> Result<(StatusCode, Json<EnrollmentResponse>), ApiError> {
    require_admin(actor)?;

    let enrollment = state
        .enrollments
        .create_enrollment(NewEnrollment {
            course_id: request.course_id,
            course_slug: request.course_slug,
            student_id: request.student_id,
            instructor_id: request.instructor_id,
            payment_status: request.payment_status,
            total_lessons: request.total_lessons,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(enrollment.into())))
}

async fn get_enrollment(
    State(state): State<AppState>,
    actor: Actor,
    Path(enrollment_id): Path<EnrollmentId>,
) -> Result<Json<EnrollmentResponse>, ApiError> {
    let enrollment = state.enrollments.get(actor, enrollment_id).await?;
    Ok(Json(enrollment.into()))
}

async fn change_status(
    State(state): State<AppState>,
    actor: Actor,
    Path(enrollment_id): Path<EnrollmentId>,
    Json(request): Json<ChangeStatusRequest>,
) -> Result<Json<EnrollmentResponse>, ApiError> {
    let enrollment = state
        .enrollments
        .change_status(actor, enrollment_id, request.status)
        .await?;
    Ok(Json(enrollment.into()))
}

async fn change_payment_status(
    State(state): State<AppState>,
    actor: Actor,
    Path(enrollment_id): Path<EnrollmentId>,
    Json(request): Json<ChangePaymentStatusRequest>,
) -> Result<Json<EnrollmentResponse>, ApiError> {
    let enrollment = state
        .enrollments
        .change_payment_status(actor, enrollment_id, request.payment_status)
        .await?;
    Ok(Json(enrollment.into()))
}

async fn set_total_lessons(
    State(state): State<AppState>,
    actor: Actor,
    Path(enrollment_id): Path<EnrollmentId>,
    Json(request): Json<SetTotalLessonsRequest>,
) -> Result<Json<CourseProgressResponse>, ApiError> {
    require_admin(actor)?;
    let roll_up = state
        .progress
        .set_total_lessons(actor, enrollment_id, request.total_lessons)
        .await?;
    Ok(Json(roll_up.into()))
}

async fn list_by_course(
    State(state): State<AppState>,
    actor: Actor,
    Path(course_id): Path<CourseId>,
) -> Result<Json<Vec<EnrollmentResponse>>, ApiError> {
    let enrollments = state.enrollments.list_by_course(actor, course_id).await?;
    Ok(Json(enrollments.into_iter().map(Into::into).collect()))
}

async fn get_by_course_and_student(
    State(state): State<AppState>,
    actor: Actor,
    Path((course_id, student_id)): Path<(CourseId, StudentId)>,
) -> Result<Json<EnrollmentResponse>, ApiError> {
    let enrollment = state
        .enrollments
        .get_by_course_and_student(actor, course_id, student_id)
        .await?;
    Ok(Json(enrollment.into()))
}

async fn my_enrollments(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<Vec<EnrollmentResponse>>, ApiError> {
    let enrollments = state.enrollments.my_enrollments(actor).await?;
    Ok(Json(enrollments.into_iter().map(Into::into).collect()))
}

async fn my_course_progress(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<Vec<CourseProgressSummary>>, ApiError> {
    let summaries = state.enrollments.my_course_progress(actor).await?;
    Ok(Json(summaries))
}

// ============================================================================
// Lesson progress handlers
// ============================================================================

async fn record_lesson_access(
    State(state): State<AppState>,
    actor: Actor,
    Path((enrollment_id, lesson_id)): Path<(EnrollmentId, LessonId)>,
) -> Result<Json<LearningProgressResponse>, ApiError> {
    let record = state
        .progress
        .record_access(actor, enrollment_id, lesson_id)
        .await?;
    Ok(Json(record.into()))
}

async fn mark_lesson_completed(
    State(state): State<AppState>,
    actor: Actor,
    Path((enrollment_id, lesson_id)): Path<(EnrollmentId, LessonId)>,
) -> Result<Json<LessonCompletionResponse>, ApiError> {
    let (record, roll_up) = state
        .progress
        .mark_completed(actor, enrollment_id, lesson_id)
        .await?;
    Ok(Json(LessonCompletionResponse {
        progress: record.into(),
        course_progress: roll_up.into(),
    }))
}

async fn unmark_lesson_completed(
    State(state): State<AppState>,
    actor: Actor,
    Path((enrollment_id, lesson_id)): Path<(EnrollmentId, LessonId)>,
) -> Result<Json<LessonCompletionResponse>, ApiError> {
    let (record, roll_up) = state
        .progress
        .mark_uncompleted(actor, enrollment_id, lesson_id)
        .await?;
    Ok(Json(LessonCompletionResponse {
        progress: record.into(),
        course_progress: roll_up.into(),
    }))
}

async fn get_lesson_progress(
    State(state): State<AppState>,
    actor: Actor,
    Path((enrollment_id, lesson_id)): Path<(EnrollmentId, LessonId)>,
) -> Result<Json<LearningProgressResponse>, ApiError> {
    let record = state
        .progress
        .get_progress(actor, enrollment_id, lesson_id)
        .await?;
    Ok(Json(record.into()))
}

async fn list_lesson_progress(
    State(state): State<AppState>,
    actor: Actor,
    Path(enrollment_id): Path<EnrollmentId>,
) -> Result<Json<Vec<LearningProgressResponse>>, ApiError> {
    let records = state.progress.list_progress(actor, enrollment_id).await?;
    Ok(Json(records.into_iter().map(Into::into).collect()))
}

async fn get_course_progress(
    State(state): State<AppState>,
    actor: Actor,
    Path(enrollment_id): Path<EnrollmentId>,
) -> Result<Json<CourseProgressResponse>, ApiError> {
    let roll_up = state
        .progress
        .course_progress(actor, enrollment_id)
        .await?;
    Ok(Json(roll_up.into()))
}
