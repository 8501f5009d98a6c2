//! Errors surfaced at the renderer boundary.
//!
//! Geometry problems (parallel rays, degenerate triangles, unloaded meshes)
//! are never errors; they simply produce misses. Only caller input that
//! would lead to degenerate buffers or invalid parameters ends up here.

use thiserror::Error;

/// Errors returned by the renderer orchestrator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("Invalid resolution {width}x{height}")]
    InvalidResolution { width: u32, height: u32 },

    #[error("Invalid pixel density {0}")]
    InvalidPixelDensity(f32),

    #[error("Invalid camera: {0}")]
    InvalidCamera(String),

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Unknown mode: {0}")]
    UnknownMode(String),

    #[error("Parameters for {patch} cannot be applied to active mode '{active}'")]
    ModeMismatch { patch: &'static str, active: String },
}

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RenderError>;

impl RenderError {
    pub(crate) fn parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = RenderError::InvalidResolution { width: 0, height: 10 };
        assert_eq!(err.to_string(), "Invalid resolution 0x10");

        let err = RenderError::parameter("ior", "must be at least 1");
        assert_eq!(err.to_string(), "Invalid parameter 'ior': must be at least 1");
    }
}
