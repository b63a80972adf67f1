//! Metrics for analysis runs.
//!
//! Emitted through the `metrics` facade; the embedding binary decides
//! whether a recorder (e.g. Prometheus) is installed.

use std::time::Duration;

use metrics::{counter, histogram};

use crate::progress::AnalysisStage;

/// Metric names as constants for consistency.
pub mod names {
    // Analysis metrics
    pub const ANALYSES_TOTAL: &str = "reelscan_analyses_total";
    pub const ANALYSIS_DURATION_SECONDS: &str = "reelscan_analysis_duration_seconds";

    // Stage metrics
    pub const STAGE_DURATION_SECONDS: &str = "reelscan_stage_duration_seconds";
    pub const STAGE_FAILURES_TOTAL: &str = "reelscan_stage_failures_total";
    pub const STAGE_SAMPLES_TOTAL: &str = "reelscan_stage_samples_total";

    // Degradation metrics
    pub const BREAKER_TRIPS_TOTAL: &str = "reelscan_breaker_trips_total";
    pub const DEGRADED_SAMPLES_TOTAL: &str = "reelscan_degraded_samples_total";

    // Cache metrics
    pub const CACHE_HITS_TOTAL: &str = "reelscan_cache_hits_total";
    pub const CACHE_MISSES_TOTAL: &str = "reelscan_cache_misses_total";
}

/// Record a finished analysis run.
pub fn record_analysis(outcome: &'static str, duration: Duration) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::ANALYSES_TOTAL, &labels).increment(1);
    histogram!(names::ANALYSIS_DURATION_SECONDS, &labels).record(duration.as_secs_f64());
}

/// Record how long one stage took and how many samples it produced.
pub fn record_stage(stage: AnalysisStage, duration: Duration, samples: usize) {
    let labels = [("stage", stage.as_str().to_string())];
    histogram!(names::STAGE_DURATION_SECONDS, &labels).record(duration.as_secs_f64());
    counter!(names::STAGE_SAMPLES_TOTAL, &labels).increment(samples as u64);
}

/// Record a stage whose output was replaced by an empty list.
pub fn record_stage_failure(stage: AnalysisStage, kind: &'static str) {
    let labels = [
        ("stage", stage.as_str().to_string()),
        ("kind", kind.to_string()),
    ];
    counter!(names::STAGE_FAILURES_TOTAL, &labels).increment(1);
}

/// Record a consecutive-failure breaker opening.
pub fn record_breaker_trip(stage: AnalysisStage) {
    let labels = [("stage", stage.as_str().to_string())];
    counter!(names::BREAKER_TRIPS_TOTAL, &labels).increment(1);
}

/// Record a sample that was estimated instead of measured.
pub fn record_degraded_sample(stage: AnalysisStage) {
    let labels = [("stage", stage.as_str().to_string())];
    counter!(names::DEGRADED_SAMPLES_TOTAL, &labels).increment(1);
}

/// Record a memoization cache lookup.
pub fn record_cache_lookup(hit: bool) {
    if hit {
        counter!(names::CACHE_HITS_TOTAL).increment(1);
    } else {
        counter!(names::CACHE_MISSES_TOTAL).increment(1);
    }
}
