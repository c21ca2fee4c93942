//! Enrollment aggregate and its lifecycle state machines.
//!
//! Both status fields move along explicit transition tables; every
//! mutation validates the requested edge before touching state, so an
//! illegal transition can never be partially applied.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::{CourseId, EnrollmentId, InstructorId, StudentId};
use crate::infra::{EnrollmentError, Result};

/// Enrollment lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Active,
    Suspended,
    Completed,
    Cancelled,
}

impl EnrollmentStatus {
    /// Transition table for the enrollment lifecycle.
    ///
    /// COMPLETED and CANCELLED are terminal; self-transitions are not
    /// legal edges.
    pub fn can_transition_to(self, next: EnrollmentStatus) -> bool {
        use EnrollmentStatus::*;
        matches!(
            (self, next),
            (Active, Completed)
                | (Active, Cancelled)
                | (Active, Suspended)
                | (Suspended, Active)
                | (Suspended, Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, EnrollmentStatus::Completed | EnrollmentStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::Active => "active",
            EnrollmentStatus::Suspended => "suspended",
            EnrollmentStatus::Completed => "completed",
            EnrollmentStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(EnrollmentStatus::Active),
            "suspended" => Some(EnrollmentStatus::Suspended),
            "completed" => Some(EnrollmentStatus::Completed),
            "cancelled" => Some(EnrollmentStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payment status of an enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
    Cancelled,
}

impl PaymentStatus {
    /// Transition table for payment status.
    ///
    /// REFUNDED and CANCELLED are terminal.
    pub fn can_transition_to(self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, next),
            (Pending, Paid) | (Pending, Refunded) | (Pending, Cancelled) | (Paid, Refunded)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PaymentStatus::Refunded | PaymentStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "paid" => Some(PaymentStatus::Paid),
            "refunded" => Some(PaymentStatus::Refunded),
            "cancelled" => Some(PaymentStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A student's relationship to a course.
///
/// Never hard-deleted; cancellation is a status, not a removal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub enrollment_id: EnrollmentId,
    pub course_id: CourseId,
    pub course_slug: String,
    pub student_id: StudentId,
    pub instructor_id: InstructorId,
    pub status: EnrollmentStatus,
    pub payment_status: PaymentStatus,
    /// Snapshot of the course's lesson count; refreshed when course
    /// content changes.
    pub total_lessons: i32,
    pub enrolled_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Enrollment {
    /// Create a new ACTIVE enrollment.
    pub fn enroll(
        course_id: CourseId,
        course_slug: impl Into<String>,
        student_id: StudentId,
        instructor_id: InstructorId,
        payment_status: PaymentStatus,
        total_lessons: i32,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let course_slug = course_slug.into();
        if course_slug.trim().is_empty() {
            return Err(EnrollmentError::InvalidRequest(
                "course slug cannot be empty".to_string(),
            ));
        }
        if total_lessons < 0 {
            return Err(EnrollmentError::InvalidRequest(format!(
                "total lessons cannot be negative: {total_lessons}"
            )));
        }

        Ok(Self {
            enrollment_id: EnrollmentId::new(),
            course_id,
            course_slug,
            student_id,
            instructor_id,
            status: EnrollmentStatus::Active,
            payment_status,
            total_lessons,
            enrolled_at: now,
            created_at: now,
            updated_at: now,
        })
    }

    /// Move the enrollment to a new lifecycle status.
    pub fn change_status(&mut self, next: EnrollmentStatus, now: DateTime<Utc>) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(EnrollmentError::InvalidStatusTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    /// Move the enrollment to a new payment status.
    pub fn change_payment_status(&mut self, next: PaymentStatus, now: DateTime<Utc>) -> Result<()> {
        if !self.payment_status.can_transition_to(next) {
            return Err(EnrollmentError::InvalidPaymentStatusTransition {
                from: self.payment_status,
                to: next,
            });
        }
        self.payment_status = next;
        self.updated_at = now;
        Ok(())
    }

    /// Precondition for every lesson-level operation: the enrollment
    /// must be ACTIVE and paid for. Pure check, no side effects.
    pub fn ensure_accessible(&self) -> Result<()> {
        if self.status != EnrollmentStatus::Active {
            return Err(EnrollmentError::EnrollmentNotActive(self.status));
        }
        if self.payment_status != PaymentStatus::Paid {
            return Err(EnrollmentError::PaymentRequired(self.payment_status));
        }
        Ok(())
    }

    /// Refresh the lesson-count snapshot.
    pub fn set_total_lessons(&mut self, total_lessons: i32, now: DateTime<Utc>) -> Result<()> {
        if total_lessons < 0 {
            return Err(EnrollmentError::InvalidRequest(format!(
                "total lessons cannot be negative: {total_lessons}"
            )));
        }
        self.total_lessons = total_lessons;
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enrollment() -> Enrollment {
        Enrollment::enroll(
            CourseId::new(),
            "intro-to-rust",
            StudentId::new(),
            InstructorId::new(),
            PaymentStatus::Paid,
            10,
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn enroll_starts_active() {
        let e = enrollment();
        assert_eq!(e.status, EnrollmentStatus::Active);
        assert_eq!(e.total_lessons, 10);
    }

    #[test]
    fn enroll_rejects_empty_slug() {
        let err = Enrollment::enroll(
            CourseId::new(),
            "  ",
            StudentId::new(),
            InstructorId::new(),
            PaymentStatus::Pending,
            0,
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, EnrollmentError::InvalidRequest(_)));
    }

    #[test]
    fn enroll_rejects_negative_lesson_count() {
        let err = Enrollment::enroll(
            CourseId::new(),
            "intro-to-rust",
            StudentId::new(),
            InstructorId::new(),
            PaymentStatus::Pending,
            -1,
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, EnrollmentError::InvalidRequest(_)));
    }

    #[test]
    fn status_transition_table() {
        use EnrollmentStatus::*;

        assert!(Active.can_transition_to(Completed));
        assert!(Active.can_transition_to(Cancelled));
        assert!(Active.can_transition_to(Suspended));
        assert!(Suspended.can_transition_to(Active));
        assert!(Suspended.can_transition_to(Cancelled));

        // Self-transitions are not edges
        assert!(!Active.can_transition_to(Active));
        assert!(!Suspended.can_transition_to(Suspended));

        // Terminal states
        for next in [Active, Suspended, Completed, Cancelled] {
            assert!(!Completed.can_transition_to(next));
            assert!(!Cancelled.can_transition_to(next));
        }

        assert!(!Suspended.can_transition_to(Completed));
    }

    #[test]
    fn payment_transition_table() {
        use PaymentStatus::*;

        assert!(Pending.can_transition_to(Paid));
        assert!(Pending.can_transition_to(Refunded));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Paid.can_transition_to(Refunded));

        assert!(!Paid.can_transition_to(Pending));
        assert!(!Paid.can_transition_to(Paid));
        for next in [Pending, Paid, Refunded, Cancelled] {
            assert!(!Refunded.can_transition_to(next));
            assert!(!Cancelled.can_transition_to(next));
        }
    }

    #[test]
    fn change_status_rejects_illegal_edge() {
        let mut e = enrollment();
        e.change_status(EnrollmentStatus::Completed, Utc::now())
            .unwrap();

        let err = e
            .change_status(EnrollmentStatus::Active, Utc::now())
            .unwrap_err();
        assert!(matches!(
            err,
            EnrollmentError::InvalidStatusTransition {
                from: EnrollmentStatus::Completed,
                to: EnrollmentStatus::Active,
            }
        ));
        // State untouched after rejection
        assert_eq!(e.status, EnrollmentStatus::Completed);
    }

    #[test]
    fn payment_cannot_round_trip_back_to_pending() {
        let mut e = enrollment();
        let err = e
            .change_payment_status(PaymentStatus::Pending, Utc::now())
            .unwrap_err();
        assert!(matches!(
            err,
            EnrollmentError::InvalidPaymentStatusTransition { .. }
        ));
    }

    #[test]
    fn accessibility_requires_active_and_paid() {
        let mut e = enrollment();
        assert!(e.ensure_accessible().is_ok());

        e.change_status(EnrollmentStatus::Suspended, Utc::now())
            .unwrap();
        assert!(matches!(
            e.ensure_accessible().unwrap_err(),
            EnrollmentError::EnrollmentNotActive(EnrollmentStatus::Suspended)
        ));
    }

    #[test]
    fn accessibility_requires_payment() {
        let e = Enrollment::enroll(
            CourseId::new(),
            "intro-to-rust",
            StudentId::new(),
            InstructorId::new(),
            PaymentStatus::Pending,
            5,
            Utc::now(),
        )
        .unwrap();
        assert!(matches!(
            e.ensure_accessible().unwrap_err(),
            EnrollmentError::PaymentRequired(PaymentStatus::Pending)
        ));
    }

    #[test]
    fn status_string_round_trip() {
        for s in [
            EnrollmentStatus::Active,
            EnrollmentStatus::Suspended,
            EnrollmentStatus::Completed,
            EnrollmentStatus::Cancelled,
        ] {
            assert_eq!(EnrollmentStatus::parse(s.as_str()), Some(s));
        }
        for p in [
            PaymentStatus::Pending,
            PaymentStatus::Paid,
            PaymentStatus::Refunded,
            PaymentStatus::Cancelled,
        ] {
            assert_eq!(PaymentStatus::parse(p.as_str()), Some(p));
        }
        assert_eq!(EnrollmentStatus::parse("unknown"), None);
    }
}
