#![deny(unreachable_patterns)]
//! Video analysis pipeline.
//!
//! This crate provides:
//! - Scene segmentation from luminance histogram discontinuities
//! - Motion scoring with adaptive sampling and temporal smoothing
//! - Audio loudness scoring over short PCM windows
//! - Optional face presence sampling at scene checkpoints
//! - Multi-signal highlight scoring, budgeted selection and chapter synthesis
//! - A coordinator that runs stages in parallel or sequentially, tolerates
//!   partial failure, reports progress and supports cancellation
//! - In-process memoization keyed by media identity and configuration

pub mod audio;
pub mod cache;
pub mod cancel;
pub mod chapters;
pub mod coordinator;
pub mod error;
pub mod face;
pub mod histogram;
pub mod metrics;
pub mod motion;
pub mod progress;
pub mod providers;
pub mod retry;
pub mod sampling;
pub mod scene;
pub mod scoring;
pub mod selector;

pub use audio::{AudioScorer, AudioScorerConfig};
pub use cache::AnalysisCache;
pub use cancel::CancellationToken;
pub use chapters::{generate_chapters, normalize_chapters, ChapterConfig};
pub use coordinator::{AnalysisCoordinator, CoordinatorState, ExecutionMode, StageConfigs};
pub use error::{MediaError, MediaResult};
pub use face::{FaceSampler, FaceSamplerConfig};
pub use histogram::{average_brightness, histogram_intersection, luminance_histogram};
pub use motion::{MotionScorer, MotionScorerConfig};
pub use progress::{
    channel as progress_channel, AnalysisPhase, AnalysisStage, ProgressEvent, ProgressReceiver,
    ProgressSender,
};
pub use providers::{
    AudioProvider, AudioTrackInfo, DurationSource, FaceDetection, FaceDetector, FixedDuration,
    FrameProvider, MediaSource, NoopFaceDetector, NullAudioProvider,
};
pub use retry::{Backoff, ConsecutiveFailureBreaker, RetryPolicy};
pub use scene::{SceneSegmenter, SceneSegmenterConfig};
pub use scoring::{score_segments, ScoringConfig, SegmentSignals};
pub use selector::{select_highlights, SelectionConfig};
