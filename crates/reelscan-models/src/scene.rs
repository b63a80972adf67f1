//! Scene model.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A contiguous time range with roughly uniform visual content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Scene {
    /// Start of the scene in milliseconds (inclusive)
    pub start_ms: u64,

    /// End of the scene in milliseconds (exclusive), always > `start_ms`
    pub end_ms: u64,

    /// Mean luminance of the sampled frames (0.0-1.0)
    pub average_brightness: f32,

    /// Mean frame-to-frame discontinuity inside the scene (0.0-1.0)
    pub average_motion: f32,

    /// Discontinuity at the boundary that opened this scene (0.0-1.0)
    pub change_intensity: f32,
}

impl Scene {
    /// Create a scene, clamping the float signals into [0, 1].
    pub fn new(
        start_ms: u64,
        end_ms: u64,
        average_brightness: f32,
        average_motion: f32,
        change_intensity: f32,
    ) -> Self {
        debug_assert!(end_ms > start_ms, "scene must have a positive duration");
        Self {
            start_ms,
            end_ms,
            average_brightness: clamp_unit(average_brightness),
            average_motion: clamp_unit(average_motion),
            change_intensity: clamp_unit(change_intensity),
        }
    }

    /// Synthetic scene covering the whole timeline.
    pub fn full_duration(duration_ms: u64) -> Self {
        Self::new(0, duration_ms.max(1), 0.0, 0.0, 0.0)
    }

    /// Duration of this scene in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }

    /// Whether `timestamp_ms` falls inside `[start_ms, end_ms)`.
    pub fn contains(&self, timestamp_ms: u64) -> bool {
        (self.start_ms..self.end_ms).contains(&timestamp_ms)
    }
}

pub(crate) fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
