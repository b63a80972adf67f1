//! Aggregated analysis output.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::chapter::VideoChapter;
use crate::highlight::HighlightSegment;
use crate::scene::Scene;
use crate::signal::{AudioScore, FaceDetectionSample, MotionScore};

/// The sole output of an analysis run. Not mutated after creation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisResult {
    /// Total media duration in milliseconds (0 for an empty result)
    pub duration_ms: u64,

    /// Contiguous scenes covering `[0, duration_ms]`
    pub scenes: Vec<Scene>,

    /// Selected highlights in playback order
    pub highlights: Vec<HighlightSegment>,

    /// Contiguous chapters covering `[0, duration_ms]`
    pub chapters: Vec<VideoChapter>,

    /// Sparse loudness samples
    pub audio_scores: Vec<AudioScore>,

    /// Sparse motion samples
    pub motion_scores: Vec<MotionScore>,

    /// Sparse face checkpoints
    pub face_detections: Vec<FaceDetectionSample>,
}

impl AnalysisResult {
    /// Fully empty result, returned when the media itself is unusable.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
            && self.highlights.is_empty()
            && self.chapters.is_empty()
            && self.audio_scores.is_empty()
            && self.motion_scores.is_empty()
            && self.face_detections.is_empty()
    }

    /// Sum of the selected highlight durations.
    pub fn total_highlight_duration_ms(&self) -> u64 {
        self.highlights.iter().map(|h| h.duration_ms).sum()
    }
}
