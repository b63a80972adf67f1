//! Worker error types.

use std::path::PathBuf;

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("No frames found in {}", .0.display())]
    NoFrames(PathBuf),

    #[error("Invalid configuration: {0}")]
    Config(#[from] reelscan_models::ConfigError),

    #[error("Media error: {0}")]
    Media(#[from] reelscan_media::MediaError),

    #[error("Metrics exporter error: {0}")]
    Metrics(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
