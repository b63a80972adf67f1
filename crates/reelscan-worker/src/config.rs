//! Worker configuration.

use std::path::PathBuf;

use crate::error::{WorkerError, WorkerResult};

/// Worker configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    /// Directory holding `<timestamp_ms>.png|jpg` frames
    pub frames_dir: PathBuf,
    /// Media duration; derived from the last frame when unset
    pub duration_ms: Option<i64>,
    /// Identity used for the in-process result cache
    pub media_id: String,
    /// Install the Prometheus recorder and log its snapshot
    pub metrics_enabled: bool,
    /// Capacity of the progress channel
    pub progress_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            frames_dir: PathBuf::from("frames"),
            duration_ms: None,
            media_id: "local".to_string(),
            metrics_enabled: false,
            progress_capacity: 64,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            frames_dir: std::env::var("REELSCAN_FRAMES_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.frames_dir),
            duration_ms: std::env::var("REELSCAN_DURATION_MS")
                .ok()
                .and_then(|s| s.parse().ok()),
            media_id: std::env::var("REELSCAN_MEDIA_ID").unwrap_or(defaults.media_id),
            metrics_enabled: std::env::var("REELSCAN_METRICS")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.metrics_enabled),
            progress_capacity: std::env::var("REELSCAN_PROGRESS_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.progress_capacity),
        }
    }

    /// Apply positional arguments: `[frames_dir] [duration_ms]`.
    pub fn with_args<I>(mut self, args: I) -> WorkerResult<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        if let Some(dir) = args.next() {
            self.frames_dir = PathBuf::from(dir);
        }
        if let Some(duration) = args.next() {
            let parsed = duration
                .parse()
                .map_err(|_| WorkerError::config_error(format!("invalid duration: {duration}")))?;
            self.duration_ms = Some(parsed);
        }
        if let Some(extra) = args.next() {
            return Err(WorkerError::config_error(format!(
                "unexpected argument: {extra}"
            )));
        }
        Ok(self)
    }
}
