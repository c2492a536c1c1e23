//! API route definitions
//!
//! `POST /extract-audio` streams the extracted audio back to the caller.
//! Health endpoints live alongside it at the root.

pub mod error;
pub mod extract;
pub mod health;

pub use error::{ApiError, ErrorResponse};
