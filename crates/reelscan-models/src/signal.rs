//! Sparse per-timestamp signal samples.
//!
//! Samples are timestamp-ordered and independent of scene boundaries; the
//! scoring stage aggregates them per scene by timestamp-range filtering.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::scene::clamp_unit;

/// Qualitative motion bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MotionLevel {
    Low,
    Medium,
    High,
}

impl MotionLevel {
    /// Bucket a normalized motion intensity.
    pub fn from_intensity(intensity: f32) -> Self {
        if intensity >= 0.6 {
            Self::High
        } else if intensity >= 0.3 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// Motion intensity sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MotionScore {
    /// Sample position in milliseconds
    pub timestamp_ms: u64,

    /// Smoothed motion intensity (0.0-1.0)
    pub intensity: f32,

    /// Qualitative bucket of `intensity`
    pub level: MotionLevel,

    /// True when the value is a decayed estimate after a read failure
    #[serde(default)]
    pub degraded: bool,
}

impl MotionScore {
    pub fn new(timestamp_ms: u64, intensity: f32) -> Self {
        let intensity = clamp_unit(intensity);
        Self {
            timestamp_ms,
            intensity,
            level: MotionLevel::from_intensity(intensity),
            degraded: false,
        }
    }

    /// Decayed estimate emitted in place of a failed sample.
    pub fn degraded(timestamp_ms: u64, intensity: f32) -> Self {
        Self {
            degraded: true,
            ..Self::new(timestamp_ms, intensity)
        }
    }
}

/// Qualitative loudness bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VolumeLevel {
    Quiet,
    Normal,
    Loud,
}

/// Audio loudness sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AudioScore {
    /// Sample position in milliseconds
    pub timestamp_ms: u64,

    /// RMS loudness normalized to the 16-bit ceiling (0.0-1.0)
    pub volume: f32,

    /// Qualitative bucket of `volume`
    pub level: VolumeLevel,

    /// Whether `volume` exceeded the configured loud threshold
    pub is_loud: bool,
}

impl AudioScore {
    /// Create a sample, flagging it loud when `volume > loud_threshold`.
    pub fn new(timestamp_ms: u64, volume: f32, loud_threshold: f32) -> Self {
        let volume = clamp_unit(volume);
        let is_loud = volume > loud_threshold;
        let level = if is_loud {
            VolumeLevel::Loud
        } else if volume < loud_threshold / 3.0 {
            VolumeLevel::Quiet
        } else {
            VolumeLevel::Normal
        };

        Self {
            timestamp_ms,
            volume,
            level,
            is_loud,
        }
    }
}

/// Face presence judgment at a sampled checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FaceDetectionSample {
    /// Checkpoint position in milliseconds
    pub timestamp_ms: u64,

    /// Whether at least one face was reported
    pub has_face: bool,

    /// Number of faces reported by the detector
    #[serde(default)]
    pub face_count: u32,
}

impl FaceDetectionSample {
    pub fn new(timestamp_ms: u64, face_count: u32) -> Self {
        Self {
            timestamp_ms,
            has_face: face_count > 0,
            face_count,
        }
    }

    /// Presence as a numeric signal (1.0 or 0.0).
    pub fn presence(&self) -> f32 {
        if self.has_face {
            1.0
        } else {
            0.0
        }
    }
}
