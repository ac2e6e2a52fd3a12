//! Error types shared across RallyTrack crates.

use std::path::PathBuf;

/// Top-level error type for RallyTrack operations.
#[derive(Debug, thiserror::Error)]
pub enum RallyError {
    #[error("Video source error: {message}")]
    Source { message: String },

    #[error("Video sink error: {message}")]
    Sink { message: String },

    #[error("Detection error: {message}")]
    Detection { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using RallyError.
pub type RallyResult<T> = Result<T, RallyError>;

impl RallyError {
    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source {
            message: msg.into(),
        }
    }

    pub fn sink(msg: impl Into<String>) -> Self {
        Self::Sink {
            message: msg.into(),
        }
    }

    pub fn detection(msg: impl Into<String>) -> Self {
        Self::Detection {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    /// Whether this error must abort a tracking session.
    ///
    /// Only failures to open or drive the video source/sink are terminal;
    /// everything raised while analysing a single frame is recoverable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Source { .. } | Self::Sink { .. } | Self::FileNotFound { .. } | Self::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_errors_are_recoverable() {
        assert!(!RallyError::detection("degenerate contour").is_fatal());
        assert!(!RallyError::config("bad step").is_fatal());
    }

    #[test]
    fn test_io_side_errors_are_fatal() {
        assert!(RallyError::source("cannot open").is_fatal());
        assert!(RallyError::sink("cannot open").is_fatal());
        assert!(RallyError::FileNotFound {
            path: PathBuf::from("missing.mp4")
        }
        .is_fatal());
    }

    #[test]
    fn test_display_includes_category() {
        let err = RallyError::sink("encoder exited");
        assert_eq!(err.to_string(), "Video sink error: encoder exited");
    }
}
