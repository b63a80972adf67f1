//! Sample scheduling and decoder pacing.

use std::time::Duration;

/// Timestamps `0, interval, 2*interval, ...` strictly below `horizon_ms`.
pub fn sample_timestamps(horizon_ms: u64, interval_ms: u64) -> impl Iterator<Item = u64> {
    let step = interval_ms.max(1) as usize;
    (0..horizon_ms).step_by(step)
}

/// Number of samples [`sample_timestamps`] yields.
pub fn sample_count(horizon_ms: u64, interval_ms: u64) -> usize {
    let interval = interval_ms.max(1);
    horizon_ms.div_ceil(interval) as usize
}

/// Inserts a pause every `batch_size` samples to bound decoder load.
#[derive(Debug, Clone)]
pub struct SamplePacer {
    batch_size: usize,
    pause: Duration,
    processed: usize,
}

impl SamplePacer {
    pub fn new(batch_size: usize, pause: Duration) -> Self {
        Self {
            batch_size: batch_size.max(1),
            pause,
            processed: 0,
        }
    }

    /// Pacer that never pauses.
    pub fn unpaced() -> Self {
        Self::new(usize::MAX, Duration::ZERO)
    }

    /// Call once before each sample; sleeps at batch boundaries.
    pub async fn pace(&mut self) {
        if self.processed > 0
            && self.processed.is_multiple_of(self.batch_size)
            && !self.pause.is_zero()
        {
            tokio::time::sleep(self.pause).await;
        }
        self.processed += 1;
    }

    pub fn processed(&self) -> usize {
        self.processed
    }
}

/// Fraction of a sampling loop completed, for progress reporting.
pub fn fraction(done: usize, total: usize) -> f32 {
    if total == 0 {
        1.0
    } else {
        (done as f32 / total as f32).clamp(0.0, 1.0)
    }
}
