//! Analysis configuration.
//!
//! A single value object carries every threshold and weight used by the
//! pipeline. It is validated as a unit: a configuration that violates an
//! invariant is rejected before any analysis starts.

use std::env::VarError;
use std::fmt::Display;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Allowed deviation of the weight sum from 1.0.
pub const WEIGHT_SUM_TOLERANCE: f32 = 0.01;

/// Result type for configuration construction.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration invariant violations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Scoring weights must sum to 1.0 (±{tolerance}), got {sum:.3}")]
    WeightSum { sum: f32, tolerance: f32 },

    #[error("{name} must be within [0, 1], got {value}")]
    OutOfUnitRange { name: &'static str, value: f32 },

    #[error("Minimum segment duration {min_ms}ms exceeds maximum {max_ms}ms")]
    InvertedDurationBounds { min_ms: u64, max_ms: u64 },

    #[error("Invalid {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },

    #[error("Configuration parse error: {0}")]
    Parse(String),
}

impl ConfigError {
    pub fn invalid_value(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            name,
            reason: reason.into(),
        }
    }
}

/// Thresholds, weights and feature flags for one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AnalysisConfiguration {
    // === Selection ===
    /// Maximum number of highlights returned (default: 10)
    pub max_highlights: usize,

    /// Total duration budget of the selected highlights (default: 60s)
    pub target_duration_ms: u64,

    /// Shortest segment eligible for scoring and selection (default: 3s)
    pub min_segment_duration_ms: u64,

    /// Longest segment eligible for selection (default: 30s)
    pub max_segment_duration_ms: u64,

    /// Minimum final score for selection (default: 0.5)
    pub min_highlight_score: f32,

    // === Stage toggles ===
    pub enable_audio_analysis: bool,
    pub enable_face_detection: bool,
    pub enable_motion_analysis: bool,
    pub enable_scene_detection: bool,
    pub enable_chapters: bool,

    // === Scoring weights (must sum to 1.0) ===
    pub motion_weight: f32,
    pub audio_weight: f32,
    pub visual_weight: f32,
    pub face_weight: f32,

    // === Thresholds ===
    /// Histogram discontinuity above which a scene boundary is declared (default: 0.3)
    pub scene_change_threshold: f32,

    /// Motion intensity above which a segment counts as high-motion (default: 0.5)
    pub motion_threshold: f32,

    /// Volume above which audio counts as loud (default: 0.6)
    pub audio_threshold: f32,

    // === Chapters ===
    /// Minimum span of a main-content chapter before a new one may open (default: 30s)
    pub chapter_min_interval_ms: u64,

    // === Sampling profile ===
    /// Coarser, cheaper sampling and fewer face checkpoints
    pub quick_mode: bool,

    /// Pick the motion sampling interval from the media duration
    pub adaptive_sampling: bool,

    /// Run scene/motion/audio stages concurrently
    pub parallel_processing: bool,

    /// Only the first N milliseconds of media are sampled
    pub max_analysis_duration_ms: Option<u64>,

    /// Downscale frames before face detection
    pub low_resolution: bool,
}

impl Default for AnalysisConfiguration {
    fn default() -> Self {
        Self {
            max_highlights: 10,
            target_duration_ms: 60_000,
            min_segment_duration_ms: 3_000,
            max_segment_duration_ms: 30_000,
            min_highlight_score: 0.5,
            enable_audio_analysis: true,
            enable_face_detection: true,
            enable_motion_analysis: true,
            enable_scene_detection: true,
            enable_chapters: true,
            motion_weight: 0.3,
            audio_weight: 0.3,
            visual_weight: 0.2,
            face_weight: 0.2,
            scene_change_threshold: 0.3,
            motion_threshold: 0.5,
            audio_threshold: 0.6,
            chapter_min_interval_ms: 30_000,
            quick_mode: false,
            adaptive_sampling: true,
            parallel_processing: true,
            max_analysis_duration_ms: Some(2 * 60 * 60 * 1000),
            low_resolution: false,
        }
    }
}

impl AnalysisConfiguration {
    /// Start building a configuration from the defaults.
    pub fn builder() -> AnalysisConfigurationBuilder {
        AnalysisConfigurationBuilder::default()
    }

    /// Profile trading fidelity for speed.
    pub fn quick() -> Self {
        Self {
            quick_mode: true,
            low_resolution: true,
            max_analysis_duration_ms: Some(30 * 60 * 1000),
            ..Default::default()
        }
    }

    /// Validate every invariant of the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        let weights = [
            ("motion_weight", self.motion_weight),
            ("audio_weight", self.audio_weight),
            ("visual_weight", self.visual_weight),
            ("face_weight", self.face_weight),
        ];
        for (name, value) in weights {
            check_unit(name, value)?;
        }

        let sum: f32 = weights.iter().map(|(_, w)| w).sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ConfigError::WeightSum {
                sum,
                tolerance: WEIGHT_SUM_TOLERANCE,
            });
        }

        check_unit("min_highlight_score", self.min_highlight_score)?;
        check_unit("scene_change_threshold", self.scene_change_threshold)?;
        check_unit("motion_threshold", self.motion_threshold)?;
        check_unit("audio_threshold", self.audio_threshold)?;

        if self.min_segment_duration_ms > self.max_segment_duration_ms {
            return Err(ConfigError::InvertedDurationBounds {
                min_ms: self.min_segment_duration_ms,
                max_ms: self.max_segment_duration_ms,
            });
        }

        if self.max_highlights == 0 {
            return Err(ConfigError::invalid_value(
                "max_highlights",
                "must be at least 1",
            ));
        }

        if self.target_duration_ms == 0 {
            return Err(ConfigError::invalid_value(
                "target_duration_ms",
                "must be positive",
            ));
        }

        if self.max_analysis_duration_ms == Some(0) {
            return Err(ConfigError::invalid_value(
                "max_analysis_duration_ms",
                "must be positive when set",
            ));
        }

        Ok(())
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Create config from `REELSCAN_*` environment variables.
    ///
    /// Unset variables keep their defaults. A variable that is set but does
    /// not parse is a [`ConfigError::Parse`]. `REELSCAN_MAX_ANALYSIS_DURATION_MS`
    /// set to `none` or to an empty string removes the cap. The resulting
    /// configuration is validated as a unit.
    pub fn from_env() -> ConfigResult<Self> {
        let d = Self::default();
        let config = Self {
            max_highlights: env_or("REELSCAN_MAX_HIGHLIGHTS", d.max_highlights)?,
            target_duration_ms: env_or("REELSCAN_TARGET_DURATION_MS", d.target_duration_ms)?,
            min_segment_duration_ms: env_or(
                "REELSCAN_MIN_SEGMENT_DURATION_MS",
                d.min_segment_duration_ms,
            )?,
            max_segment_duration_ms: env_or(
                "REELSCAN_MAX_SEGMENT_DURATION_MS",
                d.max_segment_duration_ms,
            )?,
            min_highlight_score: env_or("REELSCAN_MIN_HIGHLIGHT_SCORE", d.min_highlight_score)?,
            enable_audio_analysis: env_or("REELSCAN_ENABLE_AUDIO", d.enable_audio_analysis)?,
            enable_face_detection: env_or("REELSCAN_ENABLE_FACES", d.enable_face_detection)?,
            enable_motion_analysis: env_or("REELSCAN_ENABLE_MOTION", d.enable_motion_analysis)?,
            enable_scene_detection: env_or("REELSCAN_ENABLE_SCENES", d.enable_scene_detection)?,
            enable_chapters: env_or("REELSCAN_ENABLE_CHAPTERS", d.enable_chapters)?,
            motion_weight: env_or("REELSCAN_MOTION_WEIGHT", d.motion_weight)?,
            audio_weight: env_or("REELSCAN_AUDIO_WEIGHT", d.audio_weight)?,
            visual_weight: env_or("REELSCAN_VISUAL_WEIGHT", d.visual_weight)?,
            face_weight: env_or("REELSCAN_FACE_WEIGHT", d.face_weight)?,
            scene_change_threshold: env_or(
                "REELSCAN_SCENE_CHANGE_THRESHOLD",
                d.scene_change_threshold,
            )?,
            motion_threshold: env_or("REELSCAN_MOTION_THRESHOLD", d.motion_threshold)?,
            audio_threshold: env_or("REELSCAN_AUDIO_THRESHOLD", d.audio_threshold)?,
            chapter_min_interval_ms: env_or(
                "REELSCAN_CHAPTER_MIN_INTERVAL_MS",
                d.chapter_min_interval_ms,
            )?,
            quick_mode: env_or("REELSCAN_QUICK_MODE", d.quick_mode)?,
            adaptive_sampling: env_or("REELSCAN_ADAPTIVE_SAMPLING", d.adaptive_sampling)?,
            parallel_processing: env_or("REELSCAN_PARALLEL", d.parallel_processing)?,
            max_analysis_duration_ms: env_cap(
                "REELSCAN_MAX_ANALYSIS_DURATION_MS",
                d.max_analysis_duration_ms,
            )?,
            low_resolution: env_or("REELSCAN_LOW_RESOLUTION", d.low_resolution)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Stable digest of the configuration, used as half of a cache key.
    pub fn fingerprint(&self) -> String {
        // Field order is fixed by the struct definition, so the JSON form is canonical.
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        format!("{:x}", Sha256::digest(&canonical))
    }

    /// Portion of the media that is actually sampled.
    pub fn analysis_horizon_ms(&self, duration_ms: u64) -> u64 {
        match self.max_analysis_duration_ms {
            Some(cap) => duration_ms.min(cap),
            None => duration_ms,
        }
    }
}

fn check_unit(name: &'static str, value: f32) -> ConfigResult<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::OutOfUnitRange { name, value });
    }
    Ok(())
}

fn env_var(name: &str) -> ConfigResult<Option<String>> {
    match std::env::var(name) {
        Ok(raw) => Ok(Some(raw.trim().to_string())),
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(_)) => {
            Err(ConfigError::Parse(format!("{name} is not valid unicode")))
        }
    }
}

fn parse_env<T>(name: &str, raw: &str) -> ConfigResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse()
        .map_err(|e| ConfigError::Parse(format!("{name}={raw:?}: {e}")))
}

fn env_or<T>(name: &str, default: T) -> ConfigResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env_var(name)? {
        Some(raw) => parse_env(name, &raw),
        None => Ok(default),
    }
}

/// Like [`env_or`] for an optional cap, where `none` or an empty value
/// means uncapped.
fn env_cap(name: &str, default: Option<u64>) -> ConfigResult<Option<u64>> {
    match env_var(name)? {
        None => Ok(default),
        Some(raw) if raw.is_empty() || raw.eq_ignore_ascii_case("none") => Ok(None),
        Some(raw) => parse_env(name, &raw).map(Some),
    }
}

/// Builder for [`AnalysisConfiguration`]; `build()` validates.
#[derive(Debug, Clone, Default)]
pub struct AnalysisConfigurationBuilder {
    config: AnalysisConfiguration,
}

impl AnalysisConfigurationBuilder {
    /// Start from an existing configuration (e.g. [`AnalysisConfiguration::quick`]).
    pub fn from_config(config: AnalysisConfiguration) -> Self {
        Self { config }
    }

    pub fn max_highlights(mut self, count: usize) -> Self {
        self.config.max_highlights = count;
        self
    }

    pub fn target_duration_ms(mut self, ms: u64) -> Self {
        self.config.target_duration_ms = ms;
        self
    }

    pub fn segment_duration_ms(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.config.min_segment_duration_ms = min_ms;
        self.config.max_segment_duration_ms = max_ms;
        self
    }

    pub fn min_highlight_score(mut self, score: f32) -> Self {
        self.config.min_highlight_score = score;
        self
    }

    pub fn enable_audio(mut self, enabled: bool) -> Self {
        self.config.enable_audio_analysis = enabled;
        self
    }

    pub fn enable_faces(mut self, enabled: bool) -> Self {
        self.config.enable_face_detection = enabled;
        self
    }

    pub fn enable_motion(mut self, enabled: bool) -> Self {
        self.config.enable_motion_analysis = enabled;
        self
    }

    pub fn enable_scenes(mut self, enabled: bool) -> Self {
        self.config.enable_scene_detection = enabled;
        self
    }

    pub fn enable_chapters(mut self, enabled: bool) -> Self {
        self.config.enable_chapters = enabled;
        self
    }

    /// Set all four scoring weights (motion, audio, visual, face).
    pub fn weights(mut self, motion: f32, audio: f32, visual: f32, face: f32) -> Self {
        self.config.motion_weight = motion;
        self.config.audio_weight = audio;
        self.config.visual_weight = visual;
        self.config.face_weight = face;
        self
    }

    pub fn scene_change_threshold(mut self, threshold: f32) -> Self {
        self.config.scene_change_threshold = threshold;
        self
    }

    pub fn motion_threshold(mut self, threshold: f32) -> Self {
        self.config.motion_threshold = threshold;
        self
    }

    pub fn audio_threshold(mut self, threshold: f32) -> Self {
        self.config.audio_threshold = threshold;
        self
    }

    pub fn chapter_min_interval_ms(mut self, ms: u64) -> Self {
        self.config.chapter_min_interval_ms = ms;
        self
    }

    pub fn quick_mode(mut self, enabled: bool) -> Self {
        self.config.quick_mode = enabled;
        self
    }

    pub fn adaptive_sampling(mut self, enabled: bool) -> Self {
        self.config.adaptive_sampling = enabled;
        self
    }

    pub fn parallel_processing(mut self, enabled: bool) -> Self {
        self.config.parallel_processing = enabled;
        self
    }

    pub fn max_analysis_duration_ms(mut self, cap: Option<u64>) -> Self {
        self.config.max_analysis_duration_ms = cap;
        self
    }

    pub fn low_resolution(mut self, enabled: bool) -> Self {
        self.config.low_resolution = enabled;
        self
    }

    /// Validate and return the configuration.
    pub fn build(self) -> ConfigResult<AnalysisConfiguration> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Memoization key for an analysis: media identity plus configuration digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnalysisCacheKey {
    pub media_id: String,
    pub config_fingerprint: String,
}

impl AnalysisCacheKey {
    pub fn new(media_id: impl Into<String>, config: &AnalysisConfiguration) -> Self {
        Self {
            media_id: media_id.into(),
            config_fingerprint: config.fingerprint(),
        }
    }
}

impl std::fmt::Display for AnalysisCacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let short = self
            .config_fingerprint
            .get(..12)
            .unwrap_or(&self.config_fingerprint);
        write!(f, "{}@{}", self.media_id, short)
    }
}
