//! Multi-signal highlight scoring.
//!
//! Each scene long enough to be a highlight gets a weighted score over four
//! range-averaged signals, followed by compounding multiplicative boosts and
//! a clamp to [0, 1].
//!
//! The primary reason is picked by a fixed priority order
//! (motion, audio, faces, scene change, combined). The order is a
//! tie-break kept for compatibility, not an importance ranking.

use std::collections::BTreeSet;

use reelscan_models::{
    AnalysisConfiguration, AudioScore, FaceDetectionSample, HighlightReason, HighlightSegment,
    KeyFeature, MotionScore, Scene,
};
use tracing::debug;

/// Multiplier applied when motion exceeds its threshold.
pub const MOTION_BOOST: f32 = 1.2;
/// Multiplier applied when audio exceeds its threshold.
pub const AUDIO_BOOST: f32 = 1.15;
/// Multiplier applied when face presence exceeds its threshold.
pub const FACE_BOOST: f32 = 1.1;
/// Multiplier applied when the scene change exceeds its threshold.
pub const SCENE_CHANGE_BOOST: f32 = 1.1;

/// Configuration for highlight scoring.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    pub motion_weight: f32,
    pub audio_weight: f32,
    pub visual_weight: f32,
    pub face_weight: f32,

    /// Boost/reason thresholds
    pub motion_threshold: f32,
    pub audio_threshold: f32,
    pub face_threshold: f32,
    pub scene_change_threshold: f32,

    /// Lower thresholds for attaching feature tags
    pub motion_tag_threshold: f32,
    pub audio_tag_threshold: f32,
    pub face_tag_threshold: f32,
    pub visual_tag_threshold: f32,

    /// Scenes shorter than this are not scored
    pub min_segment_duration_ms: u64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self::from_analysis(&AnalysisConfiguration::default())
    }
}

impl ScoringConfig {
    pub fn from_analysis(config: &AnalysisConfiguration) -> Self {
        Self {
            motion_weight: config.motion_weight,
            audio_weight: config.audio_weight,
            visual_weight: config.visual_weight,
            face_weight: config.face_weight,
            motion_threshold: config.motion_threshold,
            audio_threshold: config.audio_threshold,
            face_threshold: 0.7,
            scene_change_threshold: config.scene_change_threshold,
            motion_tag_threshold: 0.3,
            audio_tag_threshold: 0.4,
            face_tag_threshold: 0.5,
            visual_tag_threshold: 0.2,
            min_segment_duration_ms: config.min_segment_duration_ms,
        }
    }
}

/// Range-averaged signals of one scene, each in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SegmentSignals {
    pub motion: f32,
    pub audio: f32,
    pub visual: f32,
    pub face: f32,
}

impl SegmentSignals {
    /// Average the samples whose timestamps fall in `[start, end)`.
    pub fn for_scene(
        scene: &Scene,
        motion: &[MotionScore],
        audio: &[AudioScore],
        faces: &[FaceDetectionSample],
    ) -> Self {
        Self {
            motion: range_mean(scene, motion.iter().map(|s| (s.timestamp_ms, s.intensity))),
            audio: range_mean(scene, audio.iter().map(|s| (s.timestamp_ms, s.volume))),
            visual: scene.change_intensity,
            face: range_mean(scene, faces.iter().map(|s| (s.timestamp_ms, s.presence()))),
        }
    }
}

fn range_mean(scene: &Scene, samples: impl Iterator<Item = (u64, f32)>) -> f32 {
    let (sum, count) = samples
        .filter(|(ts, _)| scene.contains(*ts))
        .fold((0.0f32, 0u32), |(sum, count), (_, v)| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f32
    }
}

/// Score one scene from its signals.
pub fn score_scene(
    scene: &Scene,
    signals: &SegmentSignals,
    config: &ScoringConfig,
) -> HighlightSegment {
    let high_motion = signals.motion > config.motion_threshold;
    let loud_audio = signals.audio > config.audio_threshold;
    let face_activity = signals.face > config.face_threshold;
    let scene_change = signals.visual > config.scene_change_threshold;

    let mut score = signals.motion * config.motion_weight
        + signals.audio * config.audio_weight
        + signals.visual * config.visual_weight
        + signals.face * config.face_weight;

    if high_motion {
        score *= MOTION_BOOST;
    }
    if loud_audio {
        score *= AUDIO_BOOST;
    }
    if face_activity {
        score *= FACE_BOOST;
    }
    if scene_change {
        score *= SCENE_CHANGE_BOOST;
    }

    let reason = if high_motion {
        HighlightReason::HighMotion
    } else if loud_audio {
        HighlightReason::AudioPeak
    } else if face_activity {
        HighlightReason::FaceActivity
    } else if scene_change {
        HighlightReason::SceneChange
    } else {
        HighlightReason::Combined
    };

    let mut features = BTreeSet::new();
    if signals.motion > config.motion_tag_threshold {
        features.insert(KeyFeature::Motion);
    }
    if signals.audio > config.audio_tag_threshold {
        features.insert(KeyFeature::Audio);
    }
    if signals.face > config.face_tag_threshold {
        features.insert(KeyFeature::Faces);
    }
    if signals.visual > config.visual_tag_threshold {
        features.insert(KeyFeature::SceneChange);
    }

    HighlightSegment::new(scene.start_ms, scene.end_ms, score, reason, features)
}

/// Score every scene at least `min_segment_duration_ms` long.
pub fn score_segments(
    scenes: &[Scene],
    motion: &[MotionScore],
    audio: &[AudioScore],
    faces: &[FaceDetectionSample],
    config: &ScoringConfig,
) -> Vec<HighlightSegment> {
    let segments: Vec<HighlightSegment> = scenes
        .iter()
        .filter(|scene| scene.duration_ms() >= config.min_segment_duration_ms)
        .map(|scene| {
            let signals = SegmentSignals::for_scene(scene, motion, audio, faces);
            score_scene(scene, &signals, config)
        })
        .collect();

    debug!(
        scenes = scenes.len(),
        scored = segments.len(),
        "Scored highlight candidates"
    );

    segments
}
