//! Progress reporting for analysis runs.
//!
//! Stages never share a mutable progress value. Each stage owns a
//! [`StageReporter`] that sends fractions over its own channel; the
//! coordinator merges those channels and forwards overall progress to the
//! caller through a [`ProgressSender`].

use serde::Serialize;
use tokio::sync::mpsc;

/// Coarse phases of an analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisPhase {
    Preparing,
    Analyzing,
    DetectingFaces,
    Scoring,
    Selecting,
    GeneratingChapters,
    Complete,
}

/// Sampling stages that report fractional progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStage {
    Scenes,
    Motion,
    Audio,
    Faces,
}

impl AnalysisStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scenes => "scenes",
            Self::Motion => "motion",
            Self::Audio => "audio",
            Self::Faces => "faces",
        }
    }
}

/// Progress event emitted during an analysis run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// A new phase started
    PhaseStarted { phase: AnalysisPhase },

    /// Fraction of one sampling stage completed
    StageProgress { stage: AnalysisStage, fraction: f32 },

    /// Blended overall progress (0.0-1.0)
    Overall { phase: AnalysisPhase, fraction: f32 },

    /// A stage failed and its signal was replaced by an empty list
    StageDegraded { stage: AnalysisStage, error: String },

    /// Analysis finished
    Complete { highlights: usize, chapters: usize },

    /// Analysis failed
    Failed { error: String },
}

/// Progress sender for the caller-facing channel.
///
/// Uses a bounded channel and drops events when it is full so reporting
/// never blocks analysis.
#[derive(Debug, Clone)]
pub struct ProgressSender {
    tx: mpsc::Sender<ProgressEvent>,
}

impl ProgressSender {
    pub fn new(tx: mpsc::Sender<ProgressEvent>) -> Self {
        Self { tx }
    }

    /// Send a progress event (non-blocking).
    pub fn send(&self, event: ProgressEvent) {
        let _ = self.tx.try_send(event);
    }

    pub fn phase_started(&self, phase: AnalysisPhase) {
        self.send(ProgressEvent::PhaseStarted { phase });
    }

    pub fn stage_progress(&self, stage: AnalysisStage, fraction: f32) {
        self.send(ProgressEvent::StageProgress { stage, fraction });
    }

    pub fn overall(&self, phase: AnalysisPhase, fraction: f32) {
        self.send(ProgressEvent::Overall {
            phase,
            fraction: fraction.clamp(0.0, 1.0),
        });
    }

    pub fn stage_degraded(&self, stage: AnalysisStage, error: impl Into<String>) {
        self.send(ProgressEvent::StageDegraded {
            stage,
            error: error.into(),
        });
    }

    pub fn complete(&self, highlights: usize, chapters: usize) {
        self.send(ProgressEvent::Complete {
            highlights,
            chapters,
        });
    }

    pub fn failed(&self, error: impl Into<String>) {
        self.send(ProgressEvent::Failed {
            error: error.into(),
        });
    }
}

/// Progress receiver for collecting events.
pub struct ProgressReceiver {
    rx: mpsc::Receiver<ProgressEvent>,
}

impl ProgressReceiver {
    /// Receive the next progress event.
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.rx.recv().await
    }

    /// Try to receive a progress event without blocking.
    pub fn try_recv(&mut self) -> Option<ProgressEvent> {
        self.rx.try_recv().ok()
    }

    /// Drain every event currently buffered.
    pub fn drain(&mut self) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Create a progress channel pair.
pub fn channel(capacity: usize) -> (ProgressSender, ProgressReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ProgressSender::new(tx), ProgressReceiver { rx })
}

/// A no-op progress sender for when progress reporting is not needed.
pub fn noop_sender() -> ProgressSender {
    let (tx, _rx) = mpsc::channel(1);
    ProgressSender::new(tx)
}

/// Per-stage progress handle owned by exactly one sampling loop.
#[derive(Debug, Clone)]
pub struct StageReporter {
    stage: AnalysisStage,
    tx: Option<mpsc::Sender<f32>>,
}

impl StageReporter {
    /// Reporter that discards updates.
    pub fn noop(stage: AnalysisStage) -> Self {
        Self { stage, tx: None }
    }

    pub fn stage(&self) -> AnalysisStage {
        self.stage
    }

    /// Report `fraction` (0.0-1.0) of the stage as done.
    pub fn report(&self, fraction: f32) {
        if let Some(tx) = &self.tx {
            // A full channel only means a newer value will follow.
            let _ = tx.try_send(fraction.clamp(0.0, 1.0));
        }
    }
}

/// Receiving half of a stage progress channel.
pub type StageProgressReceiver = mpsc::Receiver<f32>;

/// Create the progress channel for one stage.
pub fn stage_channel(stage: AnalysisStage) -> (StageReporter, StageProgressReceiver) {
    let (tx, rx) = mpsc::channel(64);
    let reporter = StageReporter {
        stage,
        tx: Some(tx),
    };
    (reporter, rx)
}
