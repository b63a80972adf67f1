//! Scene segmentation from luminance histogram discontinuities.
//!
//! # Algorithm
//! 1. Sample one frame every `sample_interval_ms` up to the analysis horizon
//! 2. Compare each frame's luminance histogram with the previous one
//! 3. Close the current scene when similarity drops below
//!    `1 - scene_change_threshold` and the scene is long enough
//!
//! The last scene always extends to the full media duration, so the output
//! covers `[0, duration_ms]` even when sampling stops early.

use std::time::{Duration, Instant};

use reelscan_models::{AnalysisConfiguration, Scene};
use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::error::{MediaError, MediaResult};
use crate::histogram::{FrameSignature, DEFAULT_PIXEL_BUDGET};
use crate::metrics;
use crate::progress::{AnalysisStage, StageReporter};
use crate::providers::FrameProvider;
use crate::retry::{Backoff, RetryPolicy};
use crate::sampling::{fraction, sample_count, sample_timestamps, SamplePacer};

/// Configuration for scene segmentation.
#[derive(Debug, Clone)]
pub struct SceneSegmenterConfig {
    /// Interval between sampled frames
    pub sample_interval_ms: u64,

    /// Shortest scene that may be closed by a boundary
    pub min_scene_duration_ms: u64,

    /// Discontinuity (0.0-1.0) above which a boundary is declared
    pub scene_change_threshold: f32,

    /// Maximum pixels visited per histogram
    pub pixel_budget: usize,

    /// Cap on the sampled portion of the media
    pub max_analysis_duration_ms: Option<u64>,

    /// Samples between decoder pauses
    pub batch_size: usize,

    /// Length of each decoder pause
    pub batch_pause: Duration,

    /// Backoff and breaker for frame reads
    pub retry: RetryPolicy,
}

impl Default for SceneSegmenterConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 2_000,
            min_scene_duration_ms: 1_000,
            scene_change_threshold: 0.3,
            pixel_budget: DEFAULT_PIXEL_BUDGET,
            max_analysis_duration_ms: None,
            batch_size: 10,
            batch_pause: Duration::from_millis(50),
            retry: RetryPolicy::new("scene_frame_read")
                .with_backoff(Backoff::Linear(Duration::from_millis(100)))
                .with_breaker_threshold(5),
        }
    }
}

impl SceneSegmenterConfig {
    /// Derive the segmenter settings from an analysis configuration.
    pub fn from_analysis(config: &AnalysisConfiguration) -> Self {
        let defaults = Self::default();
        Self {
            sample_interval_ms: if config.quick_mode {
                defaults.sample_interval_ms * 2
            } else {
                defaults.sample_interval_ms
            },
            scene_change_threshold: config.scene_change_threshold,
            max_analysis_duration_ms: config.max_analysis_duration_ms,
            ..defaults
        }
    }

    /// Disable pacing and backoff delays.
    pub fn without_delays(mut self) -> Self {
        self.batch_pause = Duration::ZERO;
        self.retry = self.retry.with_backoff(Backoff::None);
        self
    }

    fn horizon_ms(&self, duration_ms: u64) -> u64 {
        match self.max_analysis_duration_ms {
            Some(cap) => duration_ms.min(cap),
            None => duration_ms,
        }
    }
}

/// Running statistics of the scene currently being built.
#[derive(Debug, Default)]
struct OpenScene {
    start_ms: u64,
    change_intensity: f32,
    brightness_sum: f32,
    brightness_samples: u32,
    motion_sum: f32,
    motion_samples: u32,
}

impl OpenScene {
    fn starting_at(start_ms: u64, change_intensity: f32) -> Self {
        Self {
            start_ms,
            change_intensity,
            ..Default::default()
        }
    }

    fn add_brightness(&mut self, brightness: f32) {
        self.brightness_sum += brightness;
        self.brightness_samples += 1;
    }

    fn add_motion(&mut self, discontinuity: f32) {
        self.motion_sum += discontinuity;
        self.motion_samples += 1;
    }

    fn close(self, end_ms: u64) -> Scene {
        let mean = |sum: f32, n: u32| if n == 0 { 0.0 } else { sum / n as f32 };
        Scene::new(
            self.start_ms,
            end_ms,
            mean(self.brightness_sum, self.brightness_samples),
            mean(self.motion_sum, self.motion_samples),
            self.change_intensity,
        )
    }
}

/// Splits a timeline into scenes.
#[derive(Debug, Clone, Default)]
pub struct SceneSegmenter {
    config: SceneSegmenterConfig,
}

impl SceneSegmenter {
    pub fn new(config: SceneSegmenterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SceneSegmenterConfig {
        &self.config
    }

    /// Segment `[0, duration_ms]` into contiguous scenes.
    ///
    /// Frame read failures never fail the call; only cancellation does.
    pub async fn segment_scenes(
        &self,
        frames: &dyn FrameProvider,
        duration_ms: u64,
        cancel: &CancellationToken,
        progress: &StageReporter,
    ) -> MediaResult<Vec<Scene>> {
        let started = Instant::now();
        let config = &self.config;
        let horizon = config.horizon_ms(duration_ms);
        let total = sample_count(horizon, config.sample_interval_ms);
        let split_below = 1.0 - config.scene_change_threshold;

        let mut pacer = SamplePacer::new(config.batch_size, config.batch_pause);
        let mut breaker = config.retry.breaker();
        let mut scenes = Vec::new();
        let mut open = OpenScene::default();
        let mut previous: Option<FrameSignature> = None;
        let mut frames_read = 0usize;

        debug!(
            duration_ms,
            horizon_ms = horizon,
            interval_ms = config.sample_interval_ms,
            samples = total,
            "Starting scene segmentation"
        );

        let timestamps = sample_timestamps(horizon, config.sample_interval_ms);
        for (index, timestamp_ms) in timestamps.enumerate() {
            cancel.check()?;
            pacer.pace().await;

            let signature = match read_signature(frames, timestamp_ms, config.pixel_budget).await {
                Ok(signature) => {
                    breaker.record_success();
                    signature
                }
                Err(e) => {
                    if breaker.record_failure(&e) {
                        metrics::record_breaker_trip(AnalysisStage::Scenes);
                        warn!(
                            timestamp_ms,
                            scenes = scenes.len(),
                            "Scene segmentation aborted, closing remainder as one scene"
                        );
                        break;
                    }
                    config
                        .retry
                        .backoff_after(breaker.consecutive_failures())
                        .await;
                    progress.report(fraction(index + 1, total));
                    continue;
                }
            };
            frames_read += 1;

            if let Some(prev) = &previous {
                let similarity = signature.similarity(prev);
                let discontinuity = 1.0 - similarity;
                let scene_length = timestamp_ms.saturating_sub(open.start_ms);

                if similarity < split_below && scene_length >= config.min_scene_duration_ms {
                    debug!(
                        timestamp_ms,
                        similarity,
                        scene_length_ms = scene_length,
                        "Scene boundary detected"
                    );
                    let closed = std::mem::replace(
                        &mut open,
                        OpenScene::starting_at(timestamp_ms, discontinuity),
                    );
                    scenes.push(closed.close(timestamp_ms));
                } else {
                    open.add_motion(discontinuity);
                }
            }

            open.add_brightness(signature.brightness);
            previous = Some(signature);
            progress.report(fraction(index + 1, total));
        }

        if frames_read == 0 {
            debug!(duration_ms, "No frames readable, using full-duration scene");
            scenes.clear();
            scenes.push(Scene::full_duration(duration_ms));
        } else if open.start_ms < duration_ms {
            scenes.push(open.close(duration_ms));
        } else if let Some(last) = scenes.last_mut() {
            last.end_ms = duration_ms;
        }

        if scenes.is_empty() {
            scenes.push(Scene::full_duration(duration_ms));
        }

        progress.report(1.0);
        metrics::record_stage(AnalysisStage::Scenes, started.elapsed(), frames_read);
        info!(
            scenes = scenes.len(),
            frames_read,
            failures = breaker.total_failures(),
            "Scene segmentation complete"
        );

        Ok(scenes)
    }
}

async fn read_signature(
    frames: &dyn FrameProvider,
    timestamp_ms: u64,
    pixel_budget: usize,
) -> MediaResult<FrameSignature> {
    let image = frames.frame_at(timestamp_ms).await?;
    if image.width() == 0 || image.height() == 0 {
        return Err(MediaError::frame_unavailable(timestamp_ms, "empty frame"));
    }
    Ok(FrameSignature::compute(&image, pixel_budget))
}
