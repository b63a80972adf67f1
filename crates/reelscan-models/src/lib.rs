//! Shared data models for the reelscan analysis pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Scenes and per-timestamp signal samples (motion, audio, faces)
//! - Highlight segments and chapters
//! - The validated analysis configuration and its cache key
//! - The aggregated analysis result

pub mod chapter;
pub mod config;
pub mod highlight;
pub mod result;
pub mod scene;
pub mod signal;

// Re-export common types
pub use chapter::{ChapterType, VideoChapter};
pub use config::{
    AnalysisCacheKey, AnalysisConfiguration, AnalysisConfigurationBuilder, ConfigError,
    ConfigResult,
};
pub use highlight::{HighlightReason, HighlightSegment, KeyFeature};
pub use result::AnalysisResult;
pub use scene::Scene;
pub use signal::{AudioScore, FaceDetectionSample, MotionLevel, MotionScore, VolumeLevel};
