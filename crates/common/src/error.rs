//! Error types shared across Framecap crates.

/// Top-level error type for Framecap operations.
#[derive(Debug, thiserror::Error)]
pub enum FramecapError {
    #[error("A capture session needs at least one camera")]
    NoCameras,

    #[error("Frame sink cannot report a frame size: {reason}")]
    FrameSizeUnavailable { reason: String },

    #[error("Failed to allocate a {bytes} byte frame buffer")]
    Allocation { bytes: usize },

    #[error("Camera '{camera}' failed to render: {message}")]
    Render { camera: String, message: String },

    #[error("Frame commit failed: {message}")]
    Commit { message: String },

    #[error("Frame loop error: {message}")]
    FrameLoop { message: String },

    #[error("Frame sink has been disposed")]
    Disposed,

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using FramecapError.
pub type FramecapResult<T> = Result<T, FramecapError>;

impl FramecapError {
    pub fn frame_size_unavailable(reason: impl Into<String>) -> Self {
        Self::FrameSizeUnavailable {
            reason: reason.into(),
        }
    }

    pub fn render(camera: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Render {
            camera: camera.into(),
            message: msg.into(),
        }
    }

    pub fn commit(msg: impl Into<String>) -> Self {
        Self::Commit {
            message: msg.into(),
        }
    }

    pub fn frame_loop(msg: impl Into<String>) -> Self {
        Self::FrameLoop {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Whether the error is a construction-time precondition failure.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::NoCameras | Self::FrameSizeUnavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_errors_are_classified() {
        assert!(FramecapError::NoCameras.is_precondition());
        assert!(FramecapError::frame_size_unavailable("zero width").is_precondition());
        assert!(!FramecapError::Allocation { bytes: 16 }.is_precondition());
        assert!(!FramecapError::commit("encoder closed").is_precondition());
    }

    #[test]
    fn render_error_names_the_camera() {
        let err = FramecapError::render("hud", "device lost");
        assert_eq!(err.to_string(), "Camera 'hud' failed to render: device lost");
    }
}
