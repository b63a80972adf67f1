//! One analysis over a frame directory.

use std::sync::Arc;

use reelscan_media::{
    progress_channel, AnalysisCache, AnalysisCoordinator, FixedDuration, MediaSource,
    ProgressEvent, ProgressReceiver,
};
use reelscan_models::{AnalysisConfiguration, AnalysisResult};
use tracing::{debug, info, warn};

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::frames::DirectoryFrameProvider;

/// Analyze the frames described by `config`.
///
/// Results are memoized in `cache` under `config.media_id` and the
/// analysis configuration, so a repeated call returns the same result.
pub async fn analyze_directory(
    config: &WorkerConfig,
    analysis: AnalysisConfiguration,
    cache: &AnalysisCache,
) -> WorkerResult<Arc<AnalysisResult>> {
    let frames = Arc::new(DirectoryFrameProvider::open(&config.frames_dir).await?);
    let source = match config.duration_ms {
        Some(duration_ms) => MediaSource::new(frames, Arc::new(FixedDuration(duration_ms))),
        None => MediaSource::new(frames.clone(), frames),
    };

    let (progress, events) = progress_channel(config.progress_capacity);
    let coordinator = AnalysisCoordinator::new(analysis)?.with_progress(progress);
    let logger = tokio::spawn(log_progress(events));

    let cancel = coordinator.cancellation_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received shutdown signal, cancelling analysis");
            cancel.cancel();
        }
    });

    info!(media_id = %config.media_id, "Analyzing frame directory");
    let outcome = cache.analyze(&config.media_id, &coordinator, &source).await;

    interrupt.abort();
    // Dropping the coordinator closes the progress channel and ends the logger.
    drop(coordinator);
    logger.await.ok();

    let result = outcome?;
    log_summary(&result);
    Ok(result)
}

fn log_summary(result: &AnalysisResult) {
    for highlight in &result.highlights {
        info!(
            start_ms = highlight.start_time_ms,
            duration_secs = highlight.duration_secs(),
            score = highlight.score,
            reason = highlight.reason.label(),
            "Highlight"
        );
    }
    for chapter in &result.chapters {
        info!(
            start_ms = chapter.start_time_ms,
            kind = chapter.chapter_type.as_str(),
            title = %chapter.title,
            "Chapter"
        );
    }
    info!(
        scenes = result.scenes.len(),
        highlights = result.highlights.len(),
        chapters = result.chapters.len(),
        "Analysis summary"
    );
}

async fn log_progress(mut events: ProgressReceiver) {
    while let Some(event) = events.recv().await {
        match event {
            ProgressEvent::Overall { phase, fraction } => {
                debug!(?phase, percent = (fraction * 100.0).round() as u32, "Progress");
            }
            ProgressEvent::StageDegraded { stage, error } => {
                warn!(stage = stage.as_str(), %error, "Stage degraded");
            }
            other => debug!(event = ?other, "Progress event"),
        }
    }
}
