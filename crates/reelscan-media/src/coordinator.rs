//! Analysis coordinator.
//!
//! Runs the sampling stages (in parallel or one at a time), then the
//! strictly sequential face, scoring, selection and chapter phases, and
//! aggregates everything into one [`AnalysisResult`].
//!
//! # Failure policy
//! - A stage error or panic replaces that stage's signal with an empty list
//! - Invalid input (non-positive or unreadable duration) fails the analysis
//! - Cancellation fails the analysis with [`MediaError::Cancelled`]
//!
//! # State
//! `Idle -> Running{Parallel|Sequential} -> Complete | Failed`, observable
//! through [`AnalysisCoordinator::subscribe_state`].
//!
//! # Cancellation
//! Each analysis runs under a child of the coordinator's token. Cancelling
//! it stops that analysis only; the next one starts with a fresh token.
//! Dropping the `analyze` future aborts the spawned sampling tasks.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::Instant;

use futures::FutureExt;
use reelscan_models::{AnalysisConfiguration, AnalysisResult, AudioScore, MotionScore, Scene};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::audio::{AudioScorer, AudioScorerConfig};
use crate::cancel::CancellationToken;
use crate::chapters::{generate_chapters, ChapterConfig};
use crate::error::{MediaError, MediaResult};
use crate::face::{FaceSampler, FaceSamplerConfig};
use crate::metrics;
use crate::motion::{MotionScorer, MotionScorerConfig};
use crate::progress::{
    noop_sender, stage_channel, AnalysisPhase, AnalysisStage, ProgressSender,
    StageProgressReceiver, StageReporter,
};
use crate::providers::MediaSource;
use crate::retry::Backoff;
use crate::scene::{SceneSegmenter, SceneSegmenterConfig};
use crate::scoring::{score_segments, ScoringConfig};
use crate::selector::{select_highlights, SelectionConfig};

/// Share of overall progress spent in the sampling stages.
const ANALYZING_SPAN: f32 = 0.7;
/// Share of overall progress spent sampling faces.
const FACES_SPAN: f32 = 0.15;
/// Overall progress once scoring is done.
const SCORED_AT: f32 = 0.9;
/// Overall progress once selection is done.
const SELECTED_AT: f32 = 0.95;

/// How the sampling stages are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Parallel,
    Sequential,
}

/// Lifecycle of a coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CoordinatorState {
    Idle,
    Running { mode: ExecutionMode },
    Complete,
    Failed,
}

impl CoordinatorState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

/// Per-stage engine settings.
#[derive(Debug, Clone)]
pub struct StageConfigs {
    pub scenes: SceneSegmenterConfig,
    pub motion: MotionScorerConfig,
    pub audio: AudioScorerConfig,
    pub faces: FaceSamplerConfig,
    pub scoring: ScoringConfig,
    pub selection: SelectionConfig,
    pub chapters: ChapterConfig,
}

impl StageConfigs {
    pub fn from_analysis(config: &AnalysisConfiguration) -> Self {
        Self {
            scenes: SceneSegmenterConfig::from_analysis(config),
            motion: MotionScorerConfig::from_analysis(config),
            audio: AudioScorerConfig::from_analysis(config),
            faces: FaceSamplerConfig::from_analysis(config),
            scoring: ScoringConfig::from_analysis(config),
            selection: SelectionConfig::from_analysis(config),
            chapters: ChapterConfig::from_analysis(config),
        }
    }

    /// Disable decoder pacing and retry backoff, for in-memory sources.
    pub fn without_delays(mut self) -> Self {
        self.scenes = self.scenes.without_delays();
        self.motion = self.motion.without_delays();
        self.audio = self.audio.without_delays();
        self.faces.retry = self.faces.retry.with_backoff(Backoff::None);
        self
    }
}

/// Output of the three sampling stages.
#[derive(Debug, Default)]
struct SignalSet {
    scenes: Vec<Scene>,
    motion: Vec<MotionScore>,
    audio: Vec<AudioScore>,
}

/// Outcome of a stage future: its own result, or a panic message.
type StageOutcome<T> = Result<MediaResult<T>, String>;

/// Orchestrates one analysis at a time over a [`MediaSource`].
pub struct AnalysisCoordinator {
    config: AnalysisConfiguration,
    stages: StageConfigs,
    progress: ProgressSender,
    state: watch::Sender<CoordinatorState>,
    cancel: CancellationToken,
    /// Token of the running analysis, or of the next one when idle
    run_cancel: Mutex<CancellationToken>,
}

impl AnalysisCoordinator {
    /// Create a coordinator; the configuration is validated first.
    pub fn new(config: AnalysisConfiguration) -> MediaResult<Self> {
        config.validate()?;
        let stages = StageConfigs::from_analysis(&config);
        let (state, _) = watch::channel(CoordinatorState::Idle);
        let cancel = CancellationToken::new();
        Ok(Self {
            config,
            stages,
            progress: noop_sender(),
            state,
            run_cancel: Mutex::new(cancel.child_token()),
            cancel,
        })
    }

    /// Forward progress events to `progress`.
    pub fn with_progress(mut self, progress: ProgressSender) -> Self {
        self.progress = progress;
        self
    }

    /// Replace the derived per-stage engine settings.
    pub fn with_stage_configs(mut self, stages: StageConfigs) -> Self {
        self.stages = stages;
        self
    }

    /// Use an externally owned cancellation token. Cancelling it fails
    /// the running analysis and every later one.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.run_cancel = Mutex::new(cancel.child_token());
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &AnalysisConfiguration {
        &self.config
    }

    pub fn state(&self) -> CoordinatorState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<CoordinatorState> {
        self.state.subscribe()
    }

    /// Token of the running analysis, or of the next one when idle.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.lock_run_cancel().clone()
    }

    /// Cancel the running analysis, or the next one when idle. Observed
    /// between samples.
    pub fn cancel(&self) {
        self.cancellation_token().cancel();
    }

    /// Arm a fresh token for the next analysis.
    fn rearm_cancellation(&self) {
        *self.lock_run_cancel() = self.cancel.child_token();
    }

    fn lock_run_cancel(&self) -> MutexGuard<'_, CancellationToken> {
        self.run_cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn mode(&self) -> ExecutionMode {
        if self.config.parallel_processing {
            ExecutionMode::Parallel
        } else {
            ExecutionMode::Sequential
        }
    }

    /// Analyze a media source.
    ///
    /// Fails only on invalid input or cancellation; stage failures degrade
    /// the corresponding signal instead.
    pub async fn analyze(&self, media: &MediaSource) -> MediaResult<AnalysisResult> {
        let started = Instant::now();
        let analysis_id = Uuid::new_v4();
        let scope = RunScope {
            coordinator: self,
            cancel: self.cancellation_token(),
        };

        let outcome = self.run(media, analysis_id, &scope.cancel).await;
        drop(scope);

        match &outcome {
            Ok(result) => {
                self.state.send_replace(CoordinatorState::Complete);
                self.progress.overall(AnalysisPhase::Complete, 1.0);
                self.progress
                    .complete(result.highlights.len(), result.chapters.len());
                metrics::record_analysis("complete", started.elapsed());
                info!(
                    %analysis_id,
                    scenes = result.scenes.len(),
                    highlights = result.highlights.len(),
                    chapters = result.chapters.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Analysis complete"
                );
            }
            Err(e) => {
                self.state.send_replace(CoordinatorState::Failed);
                self.progress.failed(e.to_string());
                let outcome = if matches!(e, MediaError::Cancelled) {
                    "cancelled"
                } else {
                    "failed"
                };
                metrics::record_analysis(outcome, started.elapsed());
                error!(%analysis_id, error = %e, "Analysis failed");
            }
        }

        outcome
    }

    /// Analyze, turning any failure into [`AnalysisResult::empty`].
    pub async fn analyze_or_empty(&self, media: &MediaSource) -> AnalysisResult {
        match self.analyze(media).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "Returning empty analysis result");
                AnalysisResult::empty()
            }
        }
    }

    async fn run(
        &self,
        media: &MediaSource,
        analysis_id: Uuid,
        cancel: &CancellationToken,
    ) -> MediaResult<AnalysisResult> {
        self.progress.phase_started(AnalysisPhase::Preparing);
        let duration_ms = self.resolve_duration(media).await?;
        cancel.check()?;

        let mode = self.mode();
        self.state.send_replace(CoordinatorState::Running { mode });
        info!(
            %analysis_id,
            duration_ms,
            ?mode,
            horizon_ms = self.config.analysis_horizon_ms(duration_ms),
            "Starting analysis"
        );

        self.progress.phase_started(AnalysisPhase::Analyzing);
        let mut signals = match mode {
            ExecutionMode::Parallel => self.run_parallel(media, duration_ms, cancel).await?,
            ExecutionMode::Sequential => self.run_sequential(media, duration_ms, cancel).await?,
        };
        if signals.scenes.is_empty() {
            signals.scenes.push(Scene::full_duration(duration_ms));
        }
        cancel.check()?;

        self.progress.phase_started(AnalysisPhase::DetectingFaces);
        let faces = if self.config.enable_face_detection {
            let sampler = FaceSampler::new(self.stages.faces.clone());
            let scenes = &signals.scenes;
            let outcome = self
                .run_tracked(
                    AnalysisStage::Faces,
                    ANALYZING_SPAN,
                    FACES_SPAN,
                    |reporter| async move {
                        sampler
                            .sample_faces(
                                media.frames.as_ref(),
                                media.faces.as_ref(),
                                scenes,
                                cancel,
                                &reporter,
                            )
                            .await
                    },
                )
                .await;
            self.absorb(AnalysisStage::Faces, outcome)?
        } else {
            Vec::new()
        };
        self.progress
            .overall(AnalysisPhase::DetectingFaces, ANALYZING_SPAN + FACES_SPAN);
        cancel.check()?;

        self.progress.phase_started(AnalysisPhase::Scoring);
        let segments = score_segments(
            &signals.scenes,
            &signals.motion,
            &signals.audio,
            &faces,
            &self.stages.scoring,
        );
        self.progress.overall(AnalysisPhase::Scoring, SCORED_AT);

        self.progress.phase_started(AnalysisPhase::Selecting);
        let highlights = select_highlights(&segments, &self.stages.selection);
        self.progress.overall(AnalysisPhase::Selecting, SELECTED_AT);

        self.progress
            .phase_started(AnalysisPhase::GeneratingChapters);
        let chapters = if self.config.enable_chapters {
            generate_chapters(&signals.scenes, duration_ms, &self.stages.chapters)
        } else {
            Vec::new()
        };

        Ok(AnalysisResult {
            duration_ms,
            scenes: signals.scenes,
            highlights,
            chapters,
            audio_scores: signals.audio,
            motion_scores: signals.motion,
            face_detections: faces,
        })
    }

    async fn resolve_duration(&self, media: &MediaSource) -> MediaResult<u64> {
        match media.duration.duration_ms().await {
            Ok(duration_ms) if duration_ms > 0 => Ok(duration_ms as u64),
            Ok(duration_ms) => Err(MediaError::InvalidDuration(duration_ms)),
            Err(e @ MediaError::SourceUnavailable(_)) => Err(e),
            Err(e) => Err(MediaError::SourceUnavailable(e.to_string())),
        }
    }

    /// Scene, motion and audio as concurrent tasks with merged progress.
    async fn run_parallel(
        &self,
        media: &MediaSource,
        duration_ms: u64,
        cancel: &CancellationToken,
    ) -> MediaResult<SignalSet> {
        let (scene_reporter, scene_rx) = stage_channel(AnalysisStage::Scenes);
        let (motion_reporter, motion_rx) = stage_channel(AnalysisStage::Motion);
        let (audio_reporter, audio_rx) = stage_channel(AnalysisStage::Audio);

        let scene_task = {
            let frames = Arc::clone(&media.frames);
            let cancel = cancel.clone();
            let segmenter = SceneSegmenter::new(self.stages.scenes.clone());
            let enabled = self.config.enable_scene_detection;
            AbortOnDrop(tokio::spawn(async move {
                if !enabled {
                    return Ok(vec![Scene::full_duration(duration_ms)]);
                }
                segmenter
                    .segment_scenes(frames.as_ref(), duration_ms, &cancel, &scene_reporter)
                    .await
            }))
        };

        let motion_task = {
            let frames = Arc::clone(&media.frames);
            let cancel = cancel.clone();
            let mut scorer = MotionScorer::new(self.stages.motion.clone());
            let enabled = self.config.enable_motion_analysis;
            AbortOnDrop(tokio::spawn(async move {
                if !enabled {
                    return Ok(Vec::new());
                }
                scorer
                    .score_motion(frames.as_ref(), duration_ms, &cancel, &motion_reporter)
                    .await
            }))
        };

        let audio_task = {
            let audio = Arc::clone(&media.audio);
            let cancel = cancel.clone();
            let scorer = AudioScorer::new(self.stages.audio.clone());
            let enabled = self.config.enable_audio_analysis;
            AbortOnDrop(tokio::spawn(async move {
                if !enabled {
                    return Ok(Vec::new());
                }
                scorer
                    .score_audio(audio.as_ref(), duration_ms, &cancel, &audio_reporter)
                    .await
            }))
        };

        let (_, scenes, motion, audio) = tokio::join!(
            merge_stage_progress(self.progress.clone(), scene_rx, motion_rx, audio_rx),
            scene_task,
            motion_task,
            audio_task,
        );

        Ok(SignalSet {
            scenes: self.absorb(AnalysisStage::Scenes, scenes.map_err(|e| e.to_string()))?,
            motion: self.absorb(AnalysisStage::Motion, motion.map_err(|e| e.to_string()))?,
            audio: self.absorb(AnalysisStage::Audio, audio.map_err(|e| e.to_string()))?,
        })
    }

    /// Scene, motion and audio one after another with phase-proportional progress.
    async fn run_sequential(
        &self,
        media: &MediaSource,
        duration_ms: u64,
        cancel: &CancellationToken,
    ) -> MediaResult<SignalSet> {
        const SCENES_SPAN: f32 = 0.3;
        const MOTION_SPAN: f32 = 0.2;
        const AUDIO_SPAN: f32 = ANALYZING_SPAN - SCENES_SPAN - MOTION_SPAN;

        let scenes = if self.config.enable_scene_detection {
            let segmenter = SceneSegmenter::new(self.stages.scenes.clone());
            let outcome = self
                .run_tracked(
                    AnalysisStage::Scenes,
                    0.0,
                    SCENES_SPAN,
                    |reporter| async move {
                        segmenter
                            .segment_scenes(media.frames.as_ref(), duration_ms, cancel, &reporter)
                            .await
                    },
                )
                .await;
            self.absorb(AnalysisStage::Scenes, outcome)?
        } else {
            vec![Scene::full_duration(duration_ms)]
        };
        cancel.check()?;

        let motion = if self.config.enable_motion_analysis {
            let mut scorer = MotionScorer::new(self.stages.motion.clone());
            let outcome = self
                .run_tracked(
                    AnalysisStage::Motion,
                    SCENES_SPAN,
                    MOTION_SPAN,
                    |reporter| async move {
                        scorer
                            .score_motion(media.frames.as_ref(), duration_ms, cancel, &reporter)
                            .await
                    },
                )
                .await;
            self.absorb(AnalysisStage::Motion, outcome)?
        } else {
            Vec::new()
        };
        cancel.check()?;

        let audio = if self.config.enable_audio_analysis {
            let scorer = AudioScorer::new(self.stages.audio.clone());
            let outcome = self
                .run_tracked(
                    AnalysisStage::Audio,
                    SCENES_SPAN + MOTION_SPAN,
                    AUDIO_SPAN,
                    |reporter| async move {
                        scorer
                            .score_audio(media.audio.as_ref(), duration_ms, cancel, &reporter)
                            .await
                    },
                )
                .await;
            self.absorb(AnalysisStage::Audio, outcome)?
        } else {
            Vec::new()
        };

        Ok(SignalSet {
            scenes,
            motion,
            audio,
        })
    }

    /// Run one stage in place, forwarding its progress into
    /// `[base, base + span]` of the overall range and catching panics.
    async fn run_tracked<T, F, Fut>(
        &self,
        stage: AnalysisStage,
        base: f32,
        span: f32,
        stage_fn: F,
    ) -> StageOutcome<T>
    where
        F: FnOnce(StageReporter) -> Fut,
        Fut: Future<Output = MediaResult<T>>,
    {
        let (reporter, rx) = stage_channel(stage);
        let phase = match stage {
            AnalysisStage::Faces => AnalysisPhase::DetectingFaces,
            AnalysisStage::Scenes | AnalysisStage::Motion | AnalysisStage::Audio => {
                AnalysisPhase::Analyzing
            }
        };

        // The reporter is moved into the stage future so the forwarder ends with it.
        let guarded = AssertUnwindSafe(stage_fn(reporter)).catch_unwind();
        let (outcome, _) = tokio::join!(
            guarded,
            forward_stage_progress(self.progress.clone(), rx, stage, phase, base, span)
        );

        outcome.map_err(|panic| panic_message(panic.as_ref()))
    }

    /// Convert a stage outcome into its signal list.
    ///
    /// Cancellation propagates; any other failure becomes an empty list.
    fn absorb<T>(
        &self,
        stage: AnalysisStage,
        outcome: StageOutcome<Vec<T>>,
    ) -> MediaResult<Vec<T>> {
        let (kind, message) = match outcome {
            Ok(Ok(values)) => return Ok(values),
            Ok(Err(MediaError::Cancelled)) => return Err(MediaError::Cancelled),
            Ok(Err(e)) => ("error", e.to_string()),
            Err(panic) => ("panic", panic),
        };

        warn!(
            stage = stage.as_str(),
            kind,
            error = %message,
            "Stage failed, continuing without its signal"
        );
        metrics::record_stage_failure(stage, kind);
        self.progress.stage_degraded(stage, message);
        Ok(Vec::new())
    }
}

impl std::fmt::Debug for AnalysisCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisCoordinator")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Cancellation scope of one analysis. Dropping it, when the analysis ends
/// or its future is dropped, arms a fresh token for the next analysis.
struct RunScope<'a> {
    coordinator: &'a AnalysisCoordinator,
    cancel: CancellationToken,
}

impl Drop for RunScope<'_> {
    fn drop(&mut self) {
        self.coordinator.rearm_cancellation();
    }
}

/// Spawned stage task, aborted if dropped before it finishes.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Future for AbortOnDrop<T> {
    type Output = Result<T, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.0).poll(cx)
    }
}

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("stage panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("stage panicked: {s}")
    } else {
        "stage panicked".to_string()
    }
}

/// Merge the three sampling-stage channels into overall progress (simple mean).
///
/// A closed channel counts as a finished stage.
async fn merge_stage_progress(
    progress: ProgressSender,
    mut scenes: StageProgressReceiver,
    mut motion: StageProgressReceiver,
    mut audio: StageProgressReceiver,
) {
    const STAGES: [AnalysisStage; 3] = [
        AnalysisStage::Scenes,
        AnalysisStage::Motion,
        AnalysisStage::Audio,
    ];
    let mut fractions = [0.0f32; 3];
    let mut open = [true; 3];

    loop {
        let (index, update) = tokio::select! {
            update = scenes.recv(), if open[0] => (0, update),
            update = motion.recv(), if open[1] => (1, update),
            update = audio.recv(), if open[2] => (2, update),
            else => break,
        };

        match update {
            Some(fraction) => {
                fractions[index] = fraction;
                progress.stage_progress(STAGES[index], fraction);
            }
            None => {
                open[index] = false;
                fractions[index] = 1.0;
            }
        }

        let mean = fractions.iter().sum::<f32>() / fractions.len() as f32;
        progress.overall(AnalysisPhase::Analyzing, mean * ANALYZING_SPAN);
    }

    debug!("All sampling stages finished");
}

async fn forward_stage_progress(
    progress: ProgressSender,
    mut rx: StageProgressReceiver,
    stage: AnalysisStage,
    phase: AnalysisPhase,
    base: f32,
    span: f32,
) {
    while let Some(fraction) = rx.recv().await {
        progress.stage_progress(stage, fraction);
        progress.overall(phase, base + fraction * span);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{channel, ProgressEvent};
    use crate::providers::{FixedDuration, FrameProvider};
    use async_trait::async_trait;
    use image::{Rgb, RgbImage};

    struct Gray(u8);

    #[async_trait]
    impl FrameProvider for Gray {
        async fn frame_at(&self, _timestamp_ms: u64) -> MediaResult<RgbImage> {
            Ok(RgbImage::from_pixel(16, 16, Rgb([self.0, self.0, self.0])))
        }
    }

    struct Panicking;

    #[async_trait]
    impl FrameProvider for Panicking {
        async fn frame_at(&self, _timestamp_ms: u64) -> MediaResult<RgbImage> {
            panic!("decoder crashed");
        }
    }

    fn media(frames: Arc<dyn FrameProvider>, duration_ms: i64) -> MediaSource {
        MediaSource::new(frames, Arc::new(FixedDuration(duration_ms)))
    }

    fn coordinator(config: AnalysisConfiguration) -> AnalysisCoordinator {
        let stages = StageConfigs::from_analysis(&config).without_delays();
        AnalysisCoordinator::new(config)
            .unwrap()
            .with_stage_configs(stages)
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = AnalysisConfiguration {
            motion_weight: 0.9,
            ..Default::default()
        };
        assert!(matches!(
            AnalysisCoordinator::new(config),
            Err(MediaError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let coordinator = coordinator(AnalysisConfiguration::default());
        let states = coordinator.subscribe_state();
        assert_eq!(coordinator.state(), CoordinatorState::Idle);

        coordinator
            .analyze(&media(Arc::new(Gray(80)), 30_000))
            .await
            .unwrap();

        assert_eq!(*states.borrow(), CoordinatorState::Complete);
        assert!(coordinator.state().is_terminal());
    }

    #[tokio::test]
    async fn test_non_positive_duration_fails() {
        let coordinator = coordinator(AnalysisConfiguration::default());
        let result = coordinator.analyze(&media(Arc::new(Gray(80)), 0)).await;

        assert!(matches!(result, Err(MediaError::InvalidDuration(0))));
        assert_eq!(coordinator.state(), CoordinatorState::Failed);

        let empty = coordinator
            .analyze_or_empty(&media(Arc::new(Gray(80)), -5))
            .await;
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let coordinator = coordinator(AnalysisConfiguration::default());
        coordinator.cancel();

        let result = coordinator
            .analyze(&media(Arc::new(Gray(80)), 30_000))
            .await;
        assert!(matches!(result, Err(MediaError::Cancelled)));
        assert_eq!(coordinator.state(), CoordinatorState::Failed);
    }

    #[tokio::test]
    async fn test_cancel_only_stops_one_analysis() {
        let coordinator = coordinator(AnalysisConfiguration::default());
        let source = media(Arc::new(Gray(80)), 30_000);

        coordinator.cancel();
        let cancelled = coordinator.analyze(&source).await;
        assert!(matches!(cancelled, Err(MediaError::Cancelled)));

        let result = coordinator.analyze(&source).await.unwrap();
        assert_eq!(result.duration_ms, 30_000);
        assert_eq!(coordinator.state(), CoordinatorState::Complete);
    }

    #[tokio::test]
    async fn test_external_token_stops_every_analysis() {
        let token = CancellationToken::new();
        let config = AnalysisConfiguration::default();
        let coordinator = coordinator(config).with_cancellation(token.clone());
        let source = media(Arc::new(Gray(80)), 30_000);

        token.cancel();
        for _ in 0..2 {
            let outcome = coordinator.analyze(&source).await;
            assert!(matches!(outcome, Err(MediaError::Cancelled)));
        }
    }

    #[tokio::test]
    async fn test_panicking_stage_degrades_in_both_modes() {
        for parallel in [true, false] {
            let config = AnalysisConfiguration {
                parallel_processing: parallel,
                enable_audio_analysis: false,
                ..Default::default()
            };
            let (sender, mut receiver) = channel(4_096);
            let coordinator = coordinator(config).with_progress(sender);

            let result = coordinator
                .analyze(&media(Arc::new(Panicking), 90_000))
                .await
                .unwrap();

            assert_eq!(result.scenes, vec![Scene::full_duration(90_000)]);
            assert!(result.motion_scores.is_empty());
            assert!(result.highlights.is_empty());
            let events = receiver.drain();
            assert!(events.iter().any(|e| matches!(
                e,
                ProgressEvent::StageDegraded {
                    stage: AnalysisStage::Motion,
                    ..
                }
            )));
        }
    }

    #[tokio::test]
    async fn test_progress_reaches_completion() {
        for parallel in [true, false] {
            let config = AnalysisConfiguration {
                parallel_processing: parallel,
                ..Default::default()
            };
            let (sender, mut receiver) = channel(4_096);
            let coordinator = coordinator(config).with_progress(sender);
            coordinator
                .analyze(&media(Arc::new(Gray(80)), 20_000))
                .await
                .unwrap();

            let overall: Vec<f32> = receiver
                .drain()
                .into_iter()
                .filter_map(|e| match e {
                    ProgressEvent::Overall { fraction, .. } => Some(fraction),
                    _ => None,
                })
                .collect();

            assert_eq!(overall.last().copied(), Some(1.0));
            assert!(overall.iter().all(|f| (0.0..=1.0).contains(f)));
        }
    }
}
