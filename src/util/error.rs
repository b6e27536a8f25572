//! Error types for the viewer core.

use thiserror::Error;

use crate::scene::ObjectId;

/// Main error type for viewer operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Geometry arrays are inconsistent (bad arity, index out of range, color/position mismatch)
    #[error("Malformed geometry in object {object} ({kind}): {reason}")]
    MalformedGeometry {
        object: ObjectId,
        kind: &'static str,
        reason: String,
    },

    /// Object id not present in the scene
    #[error("Unknown object: {0}")]
    UnknownObject(ObjectId),

    /// WGSL failed validation at pipeline creation
    #[error("Shader compilation failed: {0}")]
    ShaderCompilation(String),

    /// Operation needs a GPU device that has not been attached
    #[error("No GPU device attached")]
    NoGpu,

    /// Mapping the read-back buffer failed
    #[error("Pixel read-back failed: {0}")]
    Readback(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings (de)serialization error
    #[error("Settings format error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a malformed-geometry error.
    pub fn malformed(object: ObjectId, kind: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedGeometry {
            object,
            kind,
            reason: reason.into(),
        }
    }
}

impl From<flat_shading::ShaderError> for Error {
    fn from(e: flat_shading::ShaderError) -> Self {
        Self::ShaderCompilation(e.to_string())
    }
}

/// Result type alias for viewer operations.
pub type Result<T> = std::result::Result<T, Error>;
