//! Highlight selection under a duration budget.
//!
//! Bounded greedy approximation of a duration-constrained knapsack:
//! candidates are ranked by score and accepted while both the count limit
//! and the duration budget hold. Ties keep source order, so selection is
//! deterministic.

use reelscan_models::{AnalysisConfiguration, HighlightSegment};
use tracing::debug;

/// Limits applied by [`select_highlights`].
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionConfig {
    pub max_highlights: usize,
    pub target_duration_ms: u64,
    pub min_highlight_score: f32,
    pub min_segment_duration_ms: u64,
    pub max_segment_duration_ms: u64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self::from_analysis(&AnalysisConfiguration::default())
    }
}

impl SelectionConfig {
    pub fn from_analysis(config: &AnalysisConfiguration) -> Self {
        Self {
            max_highlights: config.max_highlights,
            target_duration_ms: config.target_duration_ms,
            min_highlight_score: config.min_highlight_score,
            min_segment_duration_ms: config.min_segment_duration_ms,
            max_segment_duration_ms: config.max_segment_duration_ms,
        }
    }

    fn is_candidate(&self, segment: &HighlightSegment) -> bool {
        segment.score >= self.min_highlight_score
            && segment.duration_ms >= self.min_segment_duration_ms
            && segment.duration_ms <= self.max_segment_duration_ms
    }
}

/// Pick highlights and return them in playback order.
pub fn select_highlights(
    segments: &[HighlightSegment],
    config: &SelectionConfig,
) -> Vec<HighlightSegment> {
    let mut candidates: Vec<&HighlightSegment> =
        segments.iter().filter(|s| config.is_candidate(s)).collect();

    // Stable sort: equal scores keep source order.
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut selected = Vec::new();
    let mut accumulated_ms = 0u64;

    for segment in candidates {
        if selected.len() >= config.max_highlights || accumulated_ms >= config.target_duration_ms {
            break;
        }
        if accumulated_ms + segment.duration_ms > config.target_duration_ms {
            continue;
        }
        accumulated_ms += segment.duration_ms;
        selected.push(segment.clone());
    }

    selected.sort_by_key(|s| s.start_time_ms);

    debug!(
        candidates = segments.len(),
        selected = selected.len(),
        total_ms = accumulated_ms,
        "Selected highlights"
    );

    selected
}
