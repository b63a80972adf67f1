//! Audio loudness scoring.
//!
//! At every interval the scorer seeks the first audio track to the nearest
//! sync point, reads a few consecutive short windows and averages their RMS
//! amplitude. The result is normalized against the signed 16-bit ceiling.

use std::time::{Duration, Instant};

use reelscan_models::{AnalysisConfiguration, AudioScore};
use tracing::{debug, info};

use crate::cancel::CancellationToken;
use crate::error::{MediaError, MediaResult};
use crate::metrics;
use crate::progress::{AnalysisStage, StageReporter};
use crate::providers::AudioProvider;
use crate::retry::{Backoff, RetryPolicy};
use crate::sampling::{fraction, sample_count, sample_timestamps, SamplePacer};

/// Configuration for audio scoring.
#[derive(Debug, Clone)]
pub struct AudioScorerConfig {
    /// Interval between loudness samples
    pub sample_interval_ms: u64,

    /// Consecutive windows averaged per sample
    pub windows_per_sample: usize,

    /// Offset between consecutive windows
    pub window_spacing_ms: u64,

    /// Volume (0.0-1.0) above which a sample is flagged loud
    pub loud_threshold: f32,

    /// Cap on the sampled portion of the media
    pub max_analysis_duration_ms: Option<u64>,

    /// Samples between extractor pauses
    pub batch_size: usize,

    /// Length of each extractor pause
    pub batch_pause: Duration,

    /// Seek retry and breaker
    pub retry: RetryPolicy,
}

impl Default for AudioScorerConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 10_000,
            windows_per_sample: 3,
            window_spacing_ms: 100,
            loud_threshold: 0.6,
            max_analysis_duration_ms: None,
            batch_size: 10,
            batch_pause: Duration::from_millis(20),
            retry: RetryPolicy::new("audio_seek")
                .with_max_attempts(3)
                .with_backoff(Backoff::Linear(Duration::from_millis(100)))
                .with_breaker_threshold(5),
        }
    }
}

impl AudioScorerConfig {
    pub fn from_analysis(config: &AnalysisConfiguration) -> Self {
        let defaults = Self::default();
        let (sample_interval_ms, windows_per_sample) = if config.quick_mode {
            (defaults.sample_interval_ms * 2, 1)
        } else {
            (defaults.sample_interval_ms, defaults.windows_per_sample)
        };
        Self {
            sample_interval_ms,
            windows_per_sample,
            loud_threshold: config.audio_threshold,
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

/// Root-mean-square amplitude of a window (0 for an empty window).
pub fn rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_sq / samples.len() as f64).sqrt() as f32
}

/// RMS amplitude normalized to [0, 1].
pub fn normalized_volume(rms: f32) -> f32 {
    (rms / i16::MAX as f32).clamp(0.0, 1.0)
}

/// Scores loudness of the first audio track.
#[derive(Debug, Clone, Default)]
pub struct AudioScorer {
    config: AudioScorerConfig,
}

impl AudioScorer {
    pub fn new(config: AudioScorerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AudioScorerConfig {
        &self.config
    }

    /// Score loudness across `[0, duration_ms]`.
    ///
    /// Media without audio yields an empty list.
    pub async fn score_audio(
        &self,
        audio: &dyn AudioProvider,
        duration_ms: u64,
        cancel: &CancellationToken,
        progress: &StageReporter,
    ) -> MediaResult<Vec<AudioScore>> {
        let started = Instant::now();
        let config = &self.config;

        let tracks = audio.tracks().await?;
        let Some(track) = tracks.first() else {
            debug!("No audio tracks, skipping audio scoring");
            progress.report(1.0);
            return Ok(Vec::new());
        };
        let track = track.index;

        let horizon = config.horizon_ms(duration_ms);
        let total = sample_count(horizon, config.sample_interval_ms);
        let mut pacer = SamplePacer::new(config.batch_size, config.batch_pause);
        let mut breaker = config.retry.breaker();
        let mut scores = Vec::new();

        debug!(
            track,
            duration_ms,
            interval_ms = config.sample_interval_ms,
            samples = total,
            "Starting audio scoring"
        );

        let timestamps = sample_timestamps(horizon, config.sample_interval_ms);
        for (index, timestamp_ms) in timestamps.enumerate() {
            cancel.check()?;
            pacer.pace().await;

            match self.volume_at(audio, track, timestamp_ms).await {
                Ok(volume) => {
                    breaker.record_success();
                    scores.push(AudioScore::new(timestamp_ms, volume, config.loud_threshold));
                }
                Err(MediaError::EndOfStream) => {
                    debug!(timestamp_ms, "Audio track ended before media duration");
                    break;
                }
                Err(e) => {
                    if breaker.record_failure(&e) {
                        metrics::record_breaker_trip(AnalysisStage::Audio);
                        break;
                    }
                    config
                        .retry
                        .backoff_after(breaker.consecutive_failures())
                        .await;
                }
            }

            progress.report(fraction(index + 1, total));
        }

        progress.report(1.0);
        metrics::record_stage(AnalysisStage::Audio, started.elapsed(), scores.len());
        info!(
            samples = scores.len(),
            loud = scores.iter().filter(|s| s.is_loud).count(),
            failures = breaker.total_failures(),
            "Audio scoring complete"
        );

        Ok(scores)
    }

    /// Seek near `timestamp_ms` and average the RMS of consecutive windows.
    async fn volume_at(
        &self,
        audio: &dyn AudioProvider,
        track: usize,
        timestamp_ms: u64,
    ) -> MediaResult<f32> {
        let position = self
            .config
            .retry
            .retry(|| audio.seek(track, timestamp_ms))
            .await?;

        let mut levels = Vec::with_capacity(self.config.windows_per_sample);
        for k in 0..self.config.windows_per_sample.max(1) {
            let at = position + k as u64 * self.config.window_spacing_ms;
            match audio.read_window(track, at).await {
                Ok(samples) => levels.push(rms(&samples)),
                // A short tail still yields a sample from the windows already read.
                Err(MediaError::EndOfStream) if !levels.is_empty() => break,
                Err(e) => return Err(e),
            }
        }

        let mean = levels.iter().sum::<f32>() / levels.len() as f32;
        Ok(normalized_volume(mean))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{AudioTrackInfo, NullAudioProvider};
    use async_trait::async_trait;
    use reelscan_models::VolumeLevel;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Square wave whose amplitude is chosen per timestamp.
    struct ScriptedAudio<F: Fn(u64) -> i16 + Send + Sync> {
        amplitude: F,
        length_ms: u64,
        seek_failures: AtomicU32,
        failing_seeks_per_call: u32,
        always_fail: bool,
    }

    impl<F: Fn(u64) -> i16 + Send + Sync> ScriptedAudio<F> {
        fn new(length_ms: u64, amplitude: F) -> Self {
            Self {
                amplitude,
                length_ms,
                seek_failures: AtomicU32::new(0),
                failing_seeks_per_call: 0,
                always_fail: false,
            }
        }
    }

    #[async_trait]
    impl<F: Fn(u64) -> i16 + Send + Sync> AudioProvider for ScriptedAudio<F> {
        async fn tracks(&self) -> MediaResult<Vec<AudioTrackInfo>> {
            Ok(vec![AudioTrackInfo {
                index: 0,
                sample_rate: 48_000,
                channels: 2,
            }])
        }

        async fn seek(&self, _track: usize, timestamp_ms: u64) -> MediaResult<u64> {
            if self.always_fail {
                return Err(MediaError::audio_unavailable(timestamp_ms, "seek failed"));
            }
            let failures = self.seek_failures.fetch_add(1, Ordering::SeqCst);
            if failures < self.failing_seeks_per_call {
                return Err(MediaError::audio_unavailable(
                    timestamp_ms,
                    "sync point busy",
                ));
            }
            self.seek_failures.store(0, Ordering::SeqCst);
            Ok(timestamp_ms)
        }

        async fn read_window(&self, _track: usize, timestamp_ms: u64) -> MediaResult<Vec<i16>> {
            if timestamp_ms >= self.length_ms {
                return Err(MediaError::EndOfStream);
            }
            let a = (self.amplitude)(timestamp_ms);
            Ok((0..480).map(|i| if i % 2 == 0 { a } else { -a }).collect())
        }
    }

    fn scorer() -> AudioScorer {
        AudioScorer::new(AudioScorerConfig::default().without_delays())
    }

    async fn run(audio: &dyn AudioProvider, duration_ms: u64) -> Vec<AudioScore> {
        scorer()
            .score_audio(
                audio,
                duration_ms,
                &CancellationToken::new(),
                &StageReporter::noop(AnalysisStage::Audio),
            )
            .await
            .unwrap()
    }

    #[test]
    fn test_rms() {
        assert_eq!(rms(&[]), 0.0);
        assert_eq!(rms(&[100, -100, 100, -100]), 100.0);
        assert!((normalized_volume(rms(&[i16::MAX, -i16::MAX])) - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_loud_and_quiet_samples() {
        let audio = ScriptedAudio::new(60_000, |ts| if ts < 30_000 { 1_000 } else { 30_000 });
        let scores = run(&audio, 60_000).await;

        assert_eq!(scores.len(), 6);
        assert_eq!(scores[0].timestamp_ms, 0);
        assert_eq!(scores[0].level, VolumeLevel::Quiet);
        assert!(!scores[0].is_loud);
        assert!(scores[5].is_loud);
        assert!((scores[5].volume - 30_000.0 / i16::MAX as f32).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_no_tracks_yields_empty() {
        let scores = run(&NullAudioProvider, 60_000).await;
        assert!(scores.is_empty());
    }

    #[tokio::test]
    async fn test_seek_is_retried() {
        let mut audio = ScriptedAudio::new(30_000, |_| 20_000);
        audio.failing_seeks_per_call = 2;
        let scores = run(&audio, 30_000).await;

        // Third attempt succeeds for every sample.
        assert_eq!(scores.len(), 3);
    }

    #[tokio::test]
    async fn test_breaker_aborts_stage() {
        let mut audio = ScriptedAudio::new(600_000, |_| 20_000);
        audio.always_fail = true;
        let scores = run(&audio, 600_000).await;
        assert!(scores.is_empty());
    }

    #[tokio::test]
    async fn test_huge_duration_is_not_preallocated() {
        let mut audio = ScriptedAudio::new(u64::MAX, |_| 20_000);
        audio.always_fail = true;
        let scores = run(&audio, u64::MAX / 2).await;
        assert!(scores.is_empty());
    }

    #[tokio::test]
    async fn test_track_shorter_than_media() {
        let audio = ScriptedAudio::new(25_000, |_| 5_000);
        let scores = run(&audio, 60_000).await;

        // Samples at 0s, 10s and 20s; the 30s read hits end of stream.
        assert_eq!(scores.len(), 3);
    }

    #[test]
    fn test_quick_mode_profile() {
        let config = AudioScorerConfig::from_analysis(&AnalysisConfiguration::quick());
        assert_eq!(config.sample_interval_ms, 20_000);
        assert_eq!(config.windows_per_sample, 1);
    }
}
