//! Motion scoring from coarse grayscale frame differences.
//!
//! Each sampled frame is reduced to a small grayscale grid and compared
//! against the previous grid. The scorer owns exactly one retained grid;
//! concurrent analyses must use separate scorer instances.
//!
//! # Smoothing
//! `smoothed = raw * (1 - alpha) + previous * alpha`

use std::time::{Duration, Instant};

use image::imageops::{self, FilterType};
use image::RgbImage;
use reelscan_models::{AnalysisConfiguration, MotionScore};
use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::error::{MediaError, MediaResult};
use crate::metrics;
use crate::progress::{AnalysisStage, StageReporter};
use crate::providers::FrameProvider;
use crate::retry::{Backoff, RetryPolicy};
use crate::sampling::{fraction, sample_count, sample_timestamps, SamplePacer};

/// Sampling interval for a media duration when adaptive sampling is on.
///
/// | duration | interval |
/// |---|---|
/// | ≤ 1 min | 500 ms |
/// | ≤ 5 min | 1 s |
/// | ≤ 20 min | 2 s |
/// | ≤ 60 min | 5 s |
/// | longer | 10 s |
pub fn adaptive_interval_ms(duration_ms: u64) -> u64 {
    const MINUTE: u64 = 60_000;
    match duration_ms {
        d if d <= MINUTE => 500,
        d if d <= 5 * MINUTE => 1_000,
        d if d <= 20 * MINUTE => 2_000,
        d if d <= 60 * MINUTE => 5_000,
        _ => 10_000,
    }
}

/// Configuration for motion scoring.
#[derive(Debug, Clone)]
pub struct MotionScorerConfig {
    /// Pick the interval from the duration table
    pub adaptive_sampling: bool,

    /// Interval used when adaptive sampling is off
    pub fixed_interval_ms: u64,

    /// Double every interval
    pub quick_mode: bool,

    /// Side of the square grayscale grid frames are reduced to
    pub grid_size: u32,

    /// Compare every n-th grid cell
    pub pixel_stride: usize,

    /// Weight of the previous smoothed value (0.0-1.0)
    pub smoothing_alpha: f32,

    /// Cap on the sampled portion of the media
    pub max_analysis_duration_ms: Option<u64>,

    /// Samples between decoder pauses
    pub batch_size: usize,

    /// Length of each decoder pause
    pub batch_pause: Duration,

    /// Backoff and breaker for frame reads
    pub retry: RetryPolicy,
}

impl Default for MotionScorerConfig {
    fn default() -> Self {
        Self {
            adaptive_sampling: true,
            fixed_interval_ms: 1_000,
            quick_mode: false,
            grid_size: 32,
            pixel_stride: 2,
            smoothing_alpha: 0.3,
            max_analysis_duration_ms: None,
            batch_size: 20,
            batch_pause: Duration::from_millis(20),
            retry: RetryPolicy::new("motion_frame_read")
                .with_backoff(Backoff::Linear(Duration::from_millis(50)))
                .with_breaker_threshold(5),
        }
    }
}

impl MotionScorerConfig {
    pub fn from_analysis(config: &AnalysisConfiguration) -> Self {
        Self {
            adaptive_sampling: config.adaptive_sampling,
            quick_mode: config.quick_mode,
            max_analysis_duration_ms: config.max_analysis_duration_ms,
            ..Default::default()
        }
    }

    /// Disable pacing and backoff delays.
    pub fn without_delays(mut self) -> Self {
        self.batch_pause = Duration::ZERO;
        self.retry = self.retry.with_backoff(Backoff::None);
        self
    }

    /// Interval between samples for media of `duration_ms`.
    pub fn interval_for(&self, duration_ms: u64) -> u64 {
        let base = if self.adaptive_sampling {
            adaptive_interval_ms(duration_ms)
        } else {
            self.fixed_interval_ms.max(1)
        };
        if self.quick_mode {
            base * 2
        } else {
            base
        }
    }

    fn horizon_ms(&self, duration_ms: u64) -> u64 {
        match self.max_analysis_duration_ms {
            Some(cap) => duration_ms.min(cap),
            None => duration_ms,
        }
    }
}

/// Motion scorer with a single retained reference grid.
#[derive(Debug, Default)]
pub struct MotionScorer {
    config: MotionScorerConfig,
    /// Previous downscaled grayscale grid
    previous: Option<Vec<u8>>,
    /// Last emitted smoothed intensity
    smoothed: Option<f32>,
}

impl MotionScorer {
    pub fn new(config: MotionScorerConfig) -> Self {
        Self {
            config,
            previous: None,
            smoothed: None,
        }
    }

    pub fn config(&self) -> &MotionScorerConfig {
        &self.config
    }

    /// Bytes currently held by the retained reference grid.
    pub fn retained_bytes(&self) -> usize {
        self.previous.as_ref().map_or(0, Vec::len)
    }

    /// Score motion across `[0, duration_ms]`.
    ///
    /// Frame failures, and frames read while no reference grid is held,
    /// produce decayed estimates once a measured value exists. Only
    /// cancellation fails the call.
    pub async fn score_motion(
        &mut self,
        frames: &dyn FrameProvider,
        duration_ms: u64,
        cancel: &CancellationToken,
        progress: &StageReporter,
    ) -> MediaResult<Vec<MotionScore>> {
        let started = Instant::now();
        let interval = self.config.interval_for(duration_ms);
        let horizon = self.config.horizon_ms(duration_ms);
        let total = sample_count(horizon, interval);

        self.previous = None;
        self.smoothed = None;

        let mut pacer = SamplePacer::new(self.config.batch_size, self.config.batch_pause);
        let mut breaker = self.config.retry.breaker();
        let mut scores = Vec::new();

        debug!(
            duration_ms,
            interval_ms = interval,
            samples = total,
            "Starting motion scoring"
        );

        for (index, timestamp_ms) in sample_timestamps(horizon, interval).enumerate() {
            cancel.check()?;
            pacer.pace().await;

            match self.measure(frames, timestamp_ms).await {
                Ok(Some(raw)) => {
                    breaker.record_success();
                    let intensity = self.smooth(raw);
                    scores.push(MotionScore::new(timestamp_ms, intensity));
                }
                // No reference grid: the first frame, or the first after a release.
                Ok(None) => {
                    breaker.record_success();
                    let score = match self.degraded_sample(timestamp_ms) {
                        Some(score) => score,
                        None => MotionScore::new(timestamp_ms, self.smooth(0.0)),
                    };
                    scores.push(score);
                }
                Err(e) => {
                    if e.is_resource_exhaustion() {
                        warn!(timestamp_ms, error = %e, "Releasing motion reference frame");
                        self.previous = None;
                    }

                    if breaker.record_failure(&e) {
                        metrics::record_breaker_trip(AnalysisStage::Motion);
                        break;
                    }

                    scores.extend(self.degraded_sample(timestamp_ms));

                    self.config
                        .retry
                        .backoff_after(breaker.consecutive_failures())
                        .await;
                }
            }

            progress.report(fraction(index + 1, total));
        }

        progress.report(1.0);
        metrics::record_stage(AnalysisStage::Motion, started.elapsed(), scores.len());
        info!(
            samples = scores.len(),
            degraded = scores.iter().filter(|s| s.degraded).count(),
            failures = breaker.total_failures(),
            "Motion scoring complete"
        );

        Ok(scores)
    }

    /// Read one frame and return its raw difference to the reference grid.
    ///
    /// `None` when there is no reference grid yet.
    async fn measure(
        &mut self,
        frames: &dyn FrameProvider,
        timestamp_ms: u64,
    ) -> MediaResult<Option<f32>> {
        let image = frames.frame_at(timestamp_ms).await?;
        if image.width() == 0 || image.height() == 0 {
            return Err(MediaError::frame_unavailable(timestamp_ms, "empty frame"));
        }

        let grid = downscale_gray(&image, self.config.grid_size);
        let raw = self
            .previous
            .as_deref()
            .and_then(|prev| mean_abs_diff(prev, &grid, self.config.pixel_stride));

        self.retain(&grid)?;
        Ok(raw)
    }

    fn retain(&mut self, grid: &[u8]) -> MediaResult<()> {
        let buffer = self.previous.get_or_insert_with(Vec::new);
        buffer.clear();
        buffer.try_reserve_exact(grid.len())?;
        buffer.extend_from_slice(grid);
        Ok(())
    }

    /// Half the last smoothed value, standing in for a sample that could
    /// not be measured. `None` before the first measurement.
    fn degraded_sample(&mut self, timestamp_ms: u64) -> Option<MotionScore> {
        let estimate = self.smoothed? * 0.5;
        self.smoothed = Some(estimate);
        metrics::record_degraded_sample(AnalysisStage::Motion);
        Some(MotionScore::degraded(timestamp_ms, estimate))
    }

    fn smooth(&mut self, raw: f32) -> f32 {
        let alpha = self.config.smoothing_alpha;
        let value = match self.smoothed {
            Some(previous) => raw * (1.0 - alpha) + previous * alpha,
            None => raw,
        };
        self.smoothed = Some(value);
        value
    }
}

/// Reduce a frame to a `size` x `size` grayscale grid.
pub fn downscale_gray(image: &RgbImage, size: u32) -> Vec<u8> {
    let size = size.max(1);
    let small = imageops::resize(image, size, size, FilterType::Triangle);
    imageops::grayscale(&small).into_raw()
}

/// Mean absolute difference of two grids, normalized to [0, 1].
///
/// `None` when the grids differ in size.
pub fn mean_abs_diff(a: &[u8], b: &[u8], stride: usize) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let mut sum = 0u64;
    let mut count = 0u64;
    for (x, y) in a.iter().zip(b.iter()).step_by(stride.max(1)) {
        sum += x.abs_diff(*y) as u64;
        count += 1;
    }

    Some((sum as f64 / count as f64 / 255.0) as f32)
}
