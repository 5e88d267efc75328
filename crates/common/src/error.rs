//! Error types shared across Reelcap crates.

/// Top-level error type for Reelcap operations.
#[derive(Debug, thiserror::Error)]
pub enum ReelcapError {
    #[error("Invalid duration: {message}")]
    InvalidDuration { message: String },

    #[error("Invalid screen selection: {message}")]
    InvalidMonitorSelection { message: String },

    #[error("Capture error: {message}")]
    Capture { message: String },

    #[error("Encode error: {message}")]
    Encode { message: String },

    #[error("Transcode error: {message}")]
    Transcode { message: String },

    #[error("Platform error: {message}")]
    Platform { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using ReelcapError.
pub type ReelcapResult<T> = Result<T, ReelcapError>;

impl ReelcapError {
    pub fn invalid_duration(msg: impl Into<String>) -> Self {
        Self::InvalidDuration {
            message: msg.into(),
        }
    }

    pub fn invalid_monitor(msg: impl Into<String>) -> Self {
        Self::InvalidMonitorSelection {
            message: msg.into(),
        }
    }

    pub fn capture(msg: impl Into<String>) -> Self {
        Self::Capture {
            message: msg.into(),
        }
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode {
            message: msg.into(),
        }
    }

    pub fn transcode(msg: impl Into<String>) -> Self {
        Self::Transcode {
            message: msg.into(),
        }
    }

    pub fn platform(msg: impl Into<String>) -> Self {
        Self::Platform {
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

    /// Per-tick failures that the capture loop absorbs instead of ending the session.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Capture { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_errors_are_transient() {
        assert!(ReelcapError::capture("empty buffer").is_transient());
        assert!(!ReelcapError::encode("disk full").is_transient());
        assert!(!ReelcapError::invalid_monitor("index 3").is_transient());
    }

    #[test]
    fn messages_name_the_failure_class() {
        let err = ReelcapError::invalid_duration("\"abc\" is not a number");
        assert_eq!(err.to_string(), "Invalid duration: \"abc\" is not a number");
    }
}
