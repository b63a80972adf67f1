//! Error types for media analysis.

use reelscan_models::ConfigError;
use thiserror::Error;

/// Result type for media analysis operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while sampling or analyzing media.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Frame unavailable at {timestamp_ms}ms: {message}")]
    FrameUnavailable { timestamp_ms: u64, message: String },

    #[error("Audio unavailable at {timestamp_ms}ms: {message}")]
    AudioUnavailable { timestamp_ms: u64, message: String },

    #[error("End of stream")]
    EndOfStream,

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    #[error("Face detection failed: {0}")]
    DetectionFailed(String),

    #[error("Invalid media duration: {0}ms")]
    InvalidDuration(i64),

    #[error("Media source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create a frame read failure.
    pub fn frame_unavailable(timestamp_ms: u64, message: impl Into<String>) -> Self {
        Self::FrameUnavailable {
            timestamp_ms,
            message: message.into(),
        }
    }

    /// Create an audio read/seek failure.
    pub fn audio_unavailable(timestamp_ms: u64, message: impl Into<String>) -> Self {
        Self::AudioUnavailable {
            timestamp_ms,
            message: message.into(),
        }
    }

    /// Create a detection failure error.
    pub fn detection_failed(message: impl Into<String>) -> Self {
        Self::DetectionFailed(message.into())
    }

    /// Create a resource exhaustion error.
    pub fn resource_exhausted(message: impl Into<String>) -> Self {
        Self::ResourceExhausted(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Seek/read/decode failures worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::FrameUnavailable { .. }
                | Self::AudioUnavailable { .. }
                | Self::Timeout(_)
                | Self::DetectionFailed(_)
        )
    }

    /// Memory pressure while processing a sample.
    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(self, Self::ResourceExhausted(_))
    }
}

impl From<std::collections::TryReserveError> for MediaError {
    fn from(err: std::collections::TryReserveError) -> Self {
        Self::ResourceExhausted(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(MediaError::frame_unavailable(0, "decode").is_transient());
        assert!(MediaError::Timeout(100).is_transient());
        assert!(!MediaError::Cancelled.is_transient());
        assert!(!MediaError::EndOfStream.is_transient());
        assert!(MediaError::resource_exhausted("oom").is_resource_exhaustion());
    }

    #[test]
    fn test_try_reserve_maps_to_exhaustion() {
        let mut buf: Vec<u8> = Vec::new();
        let err = buf.try_reserve_exact(usize::MAX).unwrap_err();
        assert!(MediaError::from(err).is_resource_exhaustion());
    }
}
