//! Ownership checks for enrollment data.
//!
//! Authentication is the gateway's job; here we only compare the
//! acting identity against ownership. Instructor checks delegate to
//! the course catalog and fail closed: if ownership cannot be
//! verified, access is denied.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::{Actor, CourseId, Enrollment, Role};
use crate::infra::{CourseCatalog, EnrollmentError, Result};

/// Cross-aggregate authorization policy.
#[derive(Clone)]
pub struct AccessPolicy {
    catalog: Arc<dyn CourseCatalog>,
}

impl AccessPolicy {
    pub fn new(catalog: Arc<dyn CourseCatalog>) -> Self {
        Self { catalog }
    }

    /// Self-service operations: the actor must be the enrolled student.
    pub fn ensure_student_owns(&self, actor: Actor, enrollment: &Enrollment) -> Result<()> {
        if actor.role == Role::Admin {
            return Ok(());
        }
        if actor.role == Role::Student && actor.user_id == enrollment.student_id.0 {
            return Ok(());
        }

        warn!(
            user_id = %actor.user_id,
            role = %actor.role,
            enrollment_id = %enrollment.enrollment_id,
            "ownership check failed: actor is not the enrolled student"
        );
        Err(EnrollmentError::Forbidden(format!(
            "user {} does not own enrollment {}",
            actor.user_id, enrollment.enrollment_id
        )))
    }

    /// Oversight operations: the enrolled student, the course's
    /// instructor, or an internal caller.
    pub async fn ensure_owner_or_instructor(
        &self,
        actor: Actor,
        enrollment: &Enrollment,
    ) -> Result<()> {
        match actor.role {
            Role::Admin => Ok(()),
            Role::Student if actor.user_id == enrollment.student_id.0 => Ok(()),
            Role::Instructor => self.ensure_instructor_owns_course(actor, enrollment).await,
            _ => {
                warn!(
                    user_id = %actor.user_id,
                    role = %actor.role,
                    enrollment_id = %enrollment.enrollment_id,
                    "ownership check failed"
                );
                Err(EnrollmentError::Forbidden(format!(
                    "user {} cannot access enrollment {}",
                    actor.user_id, enrollment.enrollment_id
                )))
            }
        }
    }

    /// Verify the actor is the instructor the catalog reports for the
    /// enrollment's course. Catalog failures deny access rather than
    /// granting it.
    async fn ensure_instructor_owns_course(
        &self,
        actor: Actor,
        enrollment: &Enrollment,
    ) -> Result<()> {
        let actual = match self.catalog.instructor_id(enrollment.course_id).await {
            Ok(id) => id,
            Err(e) => {
                warn!(
                    user_id = %actor.user_id,
                    course_id = %enrollment.course_id,
                    error = %e,
                    "unable to verify course ownership, denying access"
                );
                return Err(EnrollmentError::Forbidden(
                    "unable to verify course ownership".to_string(),
                ));
            }
        };

        if actual.0 != actor.user_id {
            warn!(
                user_id = %actor.user_id,
                course_id = %enrollment.course_id,
                owner = %actual,
                "instructor does not own course"
            );
            return Err(EnrollmentError::Forbidden(format!(
                "instructor {} does not own course {}",
                actor.user_id, enrollment.course_id
            )));
        }

        debug!(
            user_id = %actor.user_id,
            course_id = %enrollment.course_id,
            "instructor ownership verified"
        );
        Ok(())
    }

    /// Instructor-or-admin check against a course (used for listings
    /// that are not tied to a single enrollment).
    pub async fn ensure_course_instructor(&self, actor: Actor, course_id: CourseId) -> Result<()> {
        match actor.role {
            Role::Admin => Ok(()),
            Role::Instructor => {
                let actual = self.catalog.instructor_id(course_id).await.map_err(|e| {
                    warn!(course_id = %course_id, error = %e, "unable to verify course ownership");
                    EnrollmentError::Forbidden("unable to verify course ownership".to_string())
                })?;
                if actual.0 == actor.user_id {
                    Ok(())
                } else {
                    Err(EnrollmentError::Forbidden(format!(
                        "instructor {} does not own course {course_id}",
                        actor.user_id
                    )))
                }
            }
            _ => Err(EnrollmentError::Forbidden(format!(
                "user {} cannot list enrollments of course {course_id}",
                actor.user_id
            ))),
        }
    }
}
