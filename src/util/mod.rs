//! Shared types for the viewer core.
//!
//! - [`Error`] / [`Result`] - Error handling
//! - [`Bounds`] - Axis-aligned boxes used for depth sorting and framing
//! - [`content_hash`] - Cheap fingerprint of geometry arrays

mod error;
mod math;

pub use error::*;
pub use math::*;
