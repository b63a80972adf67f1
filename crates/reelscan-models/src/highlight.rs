//! Highlight segment models.

use std::collections::BTreeSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Primary reason a segment was scored as a highlight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HighlightReason {
    HighMotion,
    AudioPeak,
    SceneChange,
    FaceActivity,
    /// Not assigned by the built-in scorer; available to custom scorers.
    VisualInterest,
    Combined,
}

impl HighlightReason {
    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::HighMotion => "High motion",
            Self::AudioPeak => "Audio peak",
            Self::SceneChange => "Scene change",
            Self::FaceActivity => "Face activity",
            Self::VisualInterest => "Visual interest",
            Self::Combined => "Combined signals",
        }
    }
}

/// Feature tag attached to a highlight whenever a signal crosses its
/// display threshold. A segment may carry several tags.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum KeyFeature {
    Motion,
    Audio,
    Faces,
    SceneChange,
}

impl KeyFeature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Motion => "motion",
            Self::Audio => "audio",
            Self::Faces => "faces",
            Self::SceneChange => "scene_change",
        }
    }
}

/// A scored, bounded-duration candidate for a highlight reel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HighlightSegment {
    /// Start timestamp in milliseconds
    pub start_time_ms: u64,

    /// End timestamp in milliseconds
    pub end_time_ms: u64,

    /// `end_time_ms - start_time_ms`
    pub duration_ms: u64,

    /// Final score after boosts and clamping (0.0-1.0)
    pub score: f32,

    /// Primary reason chosen by fixed priority order
    pub reason: HighlightReason,

    /// Independently attached feature tags (ordered)
    #[serde(default)]
    pub key_features: BTreeSet<KeyFeature>,
}

impl HighlightSegment {
    /// Create a new segment. Duration is derived from the bounds.
    pub fn new(
        start_time_ms: u64,
        end_time_ms: u64,
        score: f32,
        reason: HighlightReason,
        key_features: BTreeSet<KeyFeature>,
    ) -> Self {
        Self {
            start_time_ms,
            end_time_ms,
            duration_ms: end_time_ms.saturating_sub(start_time_ms),
            score: score.clamp(0.0, 1.0),
            reason,
            key_features,
        }
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.duration_ms as f64 / 1000.0
    }

    pub fn has_feature(&self, feature: KeyFeature) -> bool {
        self.key_features.contains(&feature)
    }
}
