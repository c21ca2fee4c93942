//! OpenCourse Enrollment Service Library
//!
//! Enrollment lifecycle, per-lesson learning progress, and the derived
//! course-progress roll-up, kept consistent under concurrent
//! at-least-once event delivery without a global lock.
//!
//! ## Modules
//!
//! - [`domain`] - Core domain types (enrollment, progress records,
//!   state machines)
//! - [`infra`] - Infrastructure implementations (PostgreSQL stores,
//!   retry, catalog client)
//! - [`service`] - Orchestration (one logical transaction per signal)
//! - [`consumer`] - Transport-agnostic event consumption
//! - [`api`] - REST API routes
//! - [`server`] - HTTP server bootstrap

pub mod api;
pub mod consumer;
pub mod domain;
pub mod infra;
pub mod migrations;
pub mod server;
pub mod service;

// Re-export commonly used types
pub use domain::{
    Actor, CompletionFlip, CourseId, CourseProgress, Enrollment, EnrollmentId, EnrollmentStatus,
    InstructorId, LearningProgress, LessonId, PaymentStatus, Role, StudentId,
};

pub use infra::{
    CourseCatalog, CourseProgressStore, EnrollmentError, EnrollmentStore, LearningProgressStore,
    Result, UpsertRetry,
};

pub use service::{AccessPolicy, EnrollmentService, NewEnrollment, ProgressService};
