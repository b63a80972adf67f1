//! Chapter models.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Kind of chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChapterType {
    Introduction,
    MainContent,
    KeyMoment,
    Transition,
    Conclusion,
    Unknown,
}

impl ChapterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Introduction => "introduction",
            Self::MainContent => "main_content",
            Self::KeyMoment => "key_moment",
            Self::Transition => "transition",
            Self::Conclusion => "conclusion",
            Self::Unknown => "unknown",
        }
    }
}

/// A titled, contiguous section of the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoChapter {
    /// Start timestamp in milliseconds
    pub start_time_ms: u64,

    /// End timestamp in milliseconds
    pub end_time_ms: u64,

    /// Display title
    pub title: String,

    /// Chapter kind
    pub chapter_type: ChapterType,

    /// Heuristic confidence (0.0-1.0)
    pub confidence: f32,
}

impl VideoChapter {
    pub fn new(
        start_time_ms: u64,
        end_time_ms: u64,
        title: impl Into<String>,
        chapter_type: ChapterType,
        confidence: f32,
    ) -> Self {
        Self {
            start_time_ms,
            end_time_ms,
            title: title.into(),
            chapter_type,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.end_time_ms.saturating_sub(self.start_time_ms)
    }
}
