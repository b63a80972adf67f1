//! Face presence sampling at scene checkpoints.
//!
//! The detector is an optional capability. When it reports itself as
//! unavailable the sampler returns an empty list without reading a frame.

use std::time::{Duration, Instant};

use image::imageops::{self, FilterType};
use image::RgbImage;
use reelscan_models::{AnalysisConfiguration, FaceDetectionSample, Scene};
use tracing::{debug, info};

use crate::cancel::CancellationToken;
use crate::error::{MediaError, MediaResult};
use crate::metrics;
use crate::progress::{AnalysisStage, StageReporter};
use crate::providers::{FaceDetection, FaceDetector, FrameProvider};
use crate::retry::{Backoff, RetryPolicy};
use crate::sampling::fraction;

/// Configuration for face sampling.
#[derive(Debug, Clone)]
pub struct FaceSamplerConfig {
    /// Every other scene, one checkpoint per scene
    pub quick_mode: bool,

    /// Downscale images before detection
    pub low_resolution: bool,

    /// Width limit applied in low-resolution mode
    pub max_detection_width: u32,

    /// Bound on a single detection call
    pub detection_timeout: Duration,

    /// Attempts, backoff and breaker for checkpoints
    pub retry: RetryPolicy,
}

impl Default for FaceSamplerConfig {
    fn default() -> Self {
        Self {
            quick_mode: false,
            low_resolution: false,
            max_detection_width: 320,
            detection_timeout: Duration::from_secs(2),
            retry: RetryPolicy::new("face_detection")
                .with_max_attempts(2)
                .with_backoff(Backoff::Linear(Duration::from_millis(100)))
                .with_breaker_threshold(5),
        }
    }
}

impl FaceSamplerConfig {
    pub fn from_analysis(config: &AnalysisConfiguration) -> Self {
        Self {
            quick_mode: config.quick_mode,
            low_resolution: config.low_resolution,
            ..Default::default()
        }
    }

    /// Checkpoint timestamps for one scene.
    pub fn checkpoints(&self, scene: &Scene) -> Vec<u64> {
        let duration = scene.duration_ms();
        if self.quick_mode {
            vec![scene.start_ms + duration / 2]
        } else {
            vec![
                scene.start_ms + duration / 3,
                scene.start_ms + duration * 2 / 3,
            ]
        }
    }

    fn scene_step(&self) -> usize {
        if self.quick_mode {
            2
        } else {
            1
        }
    }
}

/// Samples face presence through a [`FaceDetector`].
#[derive(Debug, Clone, Default)]
pub struct FaceSampler {
    config: FaceSamplerConfig,
}

impl FaceSampler {
    pub fn new(config: FaceSamplerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FaceSamplerConfig {
        &self.config
    }

    /// Sample face presence at scene checkpoints.
    ///
    /// A checkpoint whose detection keeps failing produces no sample.
    pub async fn sample_faces(
        &self,
        frames: &dyn FrameProvider,
        detector: &dyn FaceDetector,
        scenes: &[Scene],
        cancel: &CancellationToken,
        progress: &StageReporter,
    ) -> MediaResult<Vec<FaceDetectionSample>> {
        if !detector.is_available() {
            debug!(
                detector = detector.name(),
                "Face detector unavailable, skipping"
            );
            progress.report(1.0);
            return Ok(Vec::new());
        }

        let started = Instant::now();
        let checkpoints: Vec<u64> = scenes
            .iter()
            .step_by(self.config.scene_step())
            .flat_map(|scene| self.config.checkpoints(scene))
            .collect();

        let mut breaker = self.config.retry.breaker();
        let mut samples = Vec::with_capacity(checkpoints.len());

        debug!(
            detector = detector.name(),
            scenes = scenes.len(),
            checkpoints = checkpoints.len(),
            "Starting face sampling"
        );

        for (index, &timestamp_ms) in checkpoints.iter().enumerate() {
            cancel.check()?;

            let outcome = self
                .config
                .retry
                .retry(|| self.detect_at(frames, detector, timestamp_ms))
                .await;

            match outcome {
                Ok(detection) => {
                    breaker.record_success();
                    let count = if detection.has_face {
                        detection.count.max(1)
                    } else {
                        0
                    };
                    samples.push(FaceDetectionSample::new(timestamp_ms, count));
                }
                Err(e) => {
                    debug!(timestamp_ms, error = %e, "Face checkpoint failed, scoring as no face");
                    if breaker.record_failure(&e) {
                        metrics::record_breaker_trip(AnalysisStage::Faces);
                        break;
                    }
                }
            }

            progress.report(fraction(index + 1, checkpoints.len()));
        }

        progress.report(1.0);
        metrics::record_stage(AnalysisStage::Faces, started.elapsed(), samples.len());
        info!(
            samples = samples.len(),
            with_faces = samples.iter().filter(|s| s.has_face).count(),
            failures = breaker.total_failures(),
            "Face sampling complete"
        );

        Ok(samples)
    }

    async fn detect_at(
        &self,
        frames: &dyn FrameProvider,
        detector: &dyn FaceDetector,
        timestamp_ms: u64,
    ) -> MediaResult<FaceDetection> {
        let image = frames.frame_at(timestamp_ms).await?;
        let image = if self.config.low_resolution {
            downscale_for_detection(image, self.config.max_detection_width)
        } else {
            image
        };

        let timeout = self.config.detection_timeout;
        tokio::time::timeout(timeout, detector.detect(&image))
            .await
            .map_err(|_| MediaError::Timeout(timeout.as_millis() as u64))?
    }
}

/// Shrink an image to at most `max_width` pixels wide, keeping aspect ratio.
pub fn downscale_for_detection(image: RgbImage, max_width: u32) -> RgbImage {
    let (width, height) = image.dimensions();
    if width <= max_width || max_width == 0 {
        return image;
    }
    let new_height = ((height as u64 * max_width as u64) / width as u64).max(1) as u32;
    imageops::resize(&image, max_width, new_height, FilterType::Triangle)
}
