//! Transport-agnostic event consumption.
//!
//! The message queue delivers course/payment/lesson signals
//! at-least-once and unordered across topics. Handlers here are
//! idempotent with respect to duplicate delivery: enrollment creation
//! dedupes on the (course, student) uniqueness constraint, lesson
//! completion on completion-flip detection. The transport adapter
//! acks, drops, or redelivers based on the returned [`Disposition`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::domain::{Actor, CourseId, EnrollmentId, InstructorId, LessonId, StudentId};
use crate::infra::EnrollmentError;
use crate::service::{EnrollmentService, NewEnrollment, ProgressService};

/// What the transport should do with the message after handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Processed (or idempotently skipped); acknowledge.
    Ack,
    /// Poison message - validation or state-machine violation that
    /// will fail identically on every redelivery. Drop it.
    Drop { reason: String },
    /// Transient failure (infrastructure, race budget); redeliver.
    Redeliver { reason: String },
}

/// Events consumed from the platform bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlatformEvent {
    /// Payment settled; create the enrollment.
    PaymentCompleted {
        course_id: CourseId,
        student_id: StudentId,
        instructor_id: InstructorId,
        course_slug: String,
    },
    /// Course content changed; refresh every enrollment's snapshot.
    TotalLessonsChanged {
        course_id: CourseId,
        total_lessons: i32,
    },
    /// A lesson was finished (e.g. reported by the content player).
    LessonCompleted {
        enrollment_id: EnrollmentId,
        lesson_id: LessonId,
    },
}

/// Consumer wiring the platform events into the services.
pub struct EventConsumer {
    enrollments: Arc<EnrollmentService>,
    progress: Arc<ProgressService>,
}

impl EventConsumer {
    pub fn new(enrollments: Arc<EnrollmentService>, progress: Arc<ProgressService>) -> Self {
        Self {
            enrollments,
            progress,
        }
    }

    /// Parse and handle a raw message body. Undecodable payloads are
    /// poison by definition.
    pub async fn handle_raw(&self, body: &[u8]) -> Disposition {
        match serde_json::from_slice::<PlatformEvent>(body) {
            Ok(event) => self.handle(event).await,
            Err(e) => {
                error!(error = %e, "undecodable event payload");
                Disposition::Drop {
                    reason: format!("undecodable payload: {e}"),
                }
            }
        }
    }

    pub async fn handle(&self, event: PlatformEvent) -> Disposition {
        match event {
            PlatformEvent::PaymentCompleted {
                course_id,
                student_id,
                instructor_id,
                course_slug,
            } => {
                self.handle_payment_completed(course_id, student_id, instructor_id, course_slug)
                    .await
            }
            PlatformEvent::TotalLessonsChanged {
                course_id,
                total_lessons,
            } => {
                self.handle_total_lessons_changed(course_id, total_lessons)
                    .await
            }
            PlatformEvent::LessonCompleted {
                enrollment_id,
                lesson_id,
            } => self.handle_lesson_completed(enrollment_id, lesson_id).await,
        }
    }

    async fn handle_payment_completed(
        &self,
        course_id: CourseId,
        student_id: StudentId,
        instructor_id: InstructorId,
        course_slug: String,
    ) -> Disposition {
        let request = NewEnrollment {
            course_id,
            course_slug,
            student_id,
            instructor_id,
            payment_status: crate::domain::PaymentStatus::Paid,
            total_lessons: None,
        };

        match self.enrollments.create_enrollment(request).await {
            Ok(enrollment) => {
                info!(
                    enrollment_id = %enrollment.enrollment_id,
                    course_id = %course_id,
                    student_id = %student_id,
                    "enrollment created from payment event"
                );
                Disposition::Ack
            }
            // Duplicate delivery of the same payment event: the
            // enrollment already exists, which is the desired state.
            Err(EnrollmentError::DuplicateEnrollment { .. }) => {
                info!(
                    course_id = %course_id,
                    student_id = %student_id,
                    "enrollment already exists, acking duplicate payment event"
                );
                Disposition::Ack
            }
            Err(e) => classify(e, "payment_completed"),
        }
    }

    async fn handle_total_lessons_changed(
        &self,
        course_id: CourseId,
        total_lessons: i32,
    ) -> Disposition {
        if total_lessons < 0 {
            return Disposition::Drop {
                reason: format!("negative total_lessons: {total_lessons}"),
            };
        }

        let enrollments = match self
            .enrollments
            .list_by_course(Actor::system(), course_id)
            .await
        {
            Ok(list) => list,
            Err(e) => return classify(e, "total_lessons_changed"),
        };

        if enrollments.is_empty() {
            info!(course_id = %course_id, "no enrollments to update, acking");
            return Disposition::Ack;
        }

        let mut updated = 0usize;
        let mut skipped = 0usize;
        let mut transient: Option<EnrollmentError> = None;

        for enrollment in enrollments {
            match self
                .progress
                .set_total_lessons(Actor::system(), enrollment.enrollment_id, total_lessons)
                .await
            {
                Ok(_) => updated += 1,
                Err(e) if e.is_transient() => {
                    error!(
                        enrollment_id = %enrollment.enrollment_id,
                        error = %e,
                        "transient failure while updating lesson count"
                    );
                    transient = Some(e);
                }
                // Shrinking below an enrollment's completed count is a
                // per-enrollment validation failure; skip it rather than
                // blocking the rest of the sweep.
                Err(e) => {
                    skipped += 1;
                    warn!(
                        enrollment_id = %enrollment.enrollment_id,
                        error = %e,
                        "skipping enrollment during lesson-count sweep"
                    );
                }
            }
        }

        info!(
            course_id = %course_id,
            total_lessons,
            updated,
            skipped,
            "lesson-count sweep finished"
        );

        // Redelivery re-runs the sweep; set_total_lessons is idempotent
        // so already-updated enrollments are unaffected.
        match transient {
            Some(e) => Disposition::Redeliver {
                reason: e.to_string(),
            },
            None => Disposition::Ack,
        }
    }

    async fn handle_lesson_completed(
        &self,
        enrollment_id: EnrollmentId,
        lesson_id: LessonId,
    ) -> Disposition {
        match self
            .progress
            .mark_completed(Actor::system(), enrollment_id, lesson_id)
            .await
        {
            Ok((_, roll_up)) => {
                info!(
                    enrollment_id = %enrollment_id,
                    lesson_id = %lesson_id,
                    lessons_completed = roll_up.lessons_completed,
                    "lesson completion event applied"
                );
                Disposition::Ack
            }
            Err(e) => classify(e, "lesson_completed"),
        }
    }
}

/// Map a handler error to a transport disposition.
fn classify(err: EnrollmentError, context: &str) -> Disposition {
    if err.is_transient() {
        warn!(context, error = %err, "transient consumer failure, requesting redelivery");
        Disposition::Redeliver {
            reason: err.to_string(),
        }
    } else {
        error!(context, error = %err, "poison event, dropping");
        Disposition::Drop {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_separates_poison_from_transient() {
        let poison = classify(
            EnrollmentError::InvalidRequest("negative count".to_string()),
            "test",
        );
        assert!(matches!(poison, Disposition::Drop { .. }));

        let transient = classify(
            EnrollmentError::TransientUpsertFailure {
                enrollment_id: EnrollmentId::new(),
                lesson_id: LessonId::new(),
                attempts: 3,
            },
            "test",
        );
        assert!(matches!(transient, Disposition::Redeliver { .. }));

        let catalog = classify(EnrollmentError::Catalog("timeout".to_string()), "test");
        assert!(matches!(catalog, Disposition::Redeliver { .. }));
    }

    #[test]
    fn event_decoding_round_trip() {
        let event = PlatformEvent::TotalLessonsChanged {
            course_id: CourseId::new(),
            total_lessons: 7,
        };
        let body = serde_json::to_vec(&event).unwrap();
        let decoded: PlatformEvent = serde_json::from_slice(&body).unwrap();
        match decoded {
            PlatformEvent::TotalLessonsChanged { total_lessons, .. } => {
                assert_eq!(total_lessons, 7)
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
