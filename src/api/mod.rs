//! REST API surface.

pub mod error;
mod rest;
mod types;

pub use error::{ApiError, ErrorCode};
pub use rest::router;
pub use types::*;
