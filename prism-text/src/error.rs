//! Error types.
//!
//! Only [`AtlasError`] ever reaches a caller. [`BackendError`] is what the
//! external collaborators (rasterizer, bidi analyzer) report; it is logged
//! and absorbed by the layer that called them.

use thiserror::Error;

/// The glyph atlas could not provide the requested bytes.
///
/// Treat as fatal for the current frame. The operation that failed leaves
/// no partially-acquired state behind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AtlasError {
    #[error("atlas needs {requested} bytes but is limited to {limit} bytes")]
    CapacityLimit { requested: usize, limit: usize },
    #[error("failed to reserve {requested} bytes for the glyph atlas")]
    OutOfMemory { requested: usize },
}

/// Failure reported by an external library (rasterizer, bidi analyzer).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("[{library} error] code {code}: {description}")]
pub struct BackendError {
    pub library: &'static str,
    pub code: i32,
    pub description: String,
}

impl BackendError {
    pub fn new(library: &'static str, code: i32, description: impl Into<String>) -> Self {
        Self {
            library,
            code,
            description: description.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_display() {
        let err = BackendError::new("Rasterizer", 6, "invalid glyph index");
        assert_eq!(err.to_string(), "[Rasterizer error] code 6: invalid glyph index");
    }

    #[test]
    fn test_atlas_error_display() {
        let err = AtlasError::CapacityLimit {
            requested: 300,
            limit: 256,
        };
        assert!(err.to_string().contains("300"));
        assert!(err.to_string().contains("256"));
    }
}
