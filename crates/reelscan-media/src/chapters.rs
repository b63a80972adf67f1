//! Chapter synthesis from scene boundaries.
//!
//! The timeline is split into an introduction, numbered main-content
//! chapters opened at strong scene changes, and a conclusion. A final
//! normalization pass guarantees the chapters are ordered, contiguous and
//! cover `[0, duration_ms]`.

use reelscan_models::{AnalysisConfiguration, ChapterType, Scene, VideoChapter};
use tracing::debug;

const INTRO_CONFIDENCE: f32 = 0.8;
const CONCLUSION_CONFIDENCE: f32 = 0.8;
const FIRST_MAIN_CONFIDENCE: f32 = 0.6;
const FALLBACK_CONFIDENCE: f32 = 0.5;

/// Configuration for chapter synthesis.
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterConfig {
    /// Shorter media gets no chapters
    pub min_total_duration_ms: u64,

    /// Introduction ends at this fraction of the duration
    pub intro_fraction: f64,

    /// Conclusion starts at this fraction of the duration
    pub outro_fraction: f64,

    /// Minimum span of a main chapter before a new one may open
    pub min_interval_ms: u64,

    /// No emitted chapter is shorter than this
    pub min_chapter_duration_ms: u64,

    /// Scene change intensity required to open a chapter
    pub scene_change_threshold: f32,
}

impl Default for ChapterConfig {
    fn default() -> Self {
        Self::from_analysis(&AnalysisConfiguration::default())
    }
}

impl ChapterConfig {
    pub fn from_analysis(config: &AnalysisConfiguration) -> Self {
        Self {
            min_total_duration_ms: 60_000,
            intro_fraction: 0.05,
            outro_fraction: 0.95,
            min_interval_ms: config.chapter_min_interval_ms,
            min_chapter_duration_ms: 5_000,
            scene_change_threshold: config.scene_change_threshold,
        }
    }
}

/// Build a chapter outline for `[0, duration_ms]`.
pub fn generate_chapters(
    scenes: &[Scene],
    duration_ms: u64,
    config: &ChapterConfig,
) -> Vec<VideoChapter> {
    if duration_ms < config.min_total_duration_ms {
        debug!(duration_ms, "Media too short for chapters");
        return Vec::new();
    }

    let intro_end = (duration_ms as f64 * config.intro_fraction).round() as u64;
    let outro_start = (duration_ms as f64 * config.outro_fraction).round() as u64;

    let mut ordered: Vec<&Scene> = scenes.iter().collect();
    ordered.sort_by_key(|s| s.start_ms);

    let mut chapters = vec![VideoChapter::new(
        0,
        intro_end,
        "Introduction",
        ChapterType::Introduction,
        INTRO_CONFIDENCE,
    )];

    let mut main_start = intro_end;
    let mut main_confidence = FIRST_MAIN_CONFIDENCE;
    let mut main_number = 1usize;

    for scene in ordered {
        let boundary = scene.start_ms;
        if boundary <= intro_end || boundary >= outro_start {
            continue;
        }

        let span = boundary - main_start;
        let opens_chapter = scene.change_intensity > config.scene_change_threshold
            && span >= config.min_interval_ms
            && span >= config.min_chapter_duration_ms
            && outro_start - boundary >= config.min_chapter_duration_ms;

        if opens_chapter {
            chapters.push(main_chapter(
                main_start,
                boundary,
                main_number,
                main_confidence,
            ));
            main_start = boundary;
            main_confidence = scene.change_intensity;
            main_number += 1;
        }
    }

    chapters.push(main_chapter(
        main_start,
        outro_start,
        main_number,
        main_confidence,
    ));
    chapters.push(VideoChapter::new(
        outro_start,
        duration_ms,
        "Conclusion",
        ChapterType::Conclusion,
        CONCLUSION_CONFIDENCE,
    ));

    let chapters = normalize_chapters(chapters, duration_ms, config.min_chapter_duration_ms);
    debug!(duration_ms, chapters = chapters.len(), "Generated chapters");
    chapters
}

fn main_chapter(start_ms: u64, end_ms: u64, number: usize, confidence: f32) -> VideoChapter {
    VideoChapter::new(
        start_ms,
        end_ms,
        format!("Main Content {number}"),
        ChapterType::MainContent,
        confidence,
    )
}

/// Make chapters ordered, contiguous and covering `[0, duration_ms]`.
///
/// Each start is moved to the previous end, chapters shorter than
/// `min_chapter_duration_ms` are dropped and the last one is extended to
/// the full duration. An empty outcome becomes a single "Full Video"
/// chapter.
pub fn normalize_chapters(
    mut chapters: Vec<VideoChapter>,
    duration_ms: u64,
    min_chapter_duration_ms: u64,
) -> Vec<VideoChapter> {
    chapters.sort_by_key(|c| c.start_time_ms);

    let mut normalized: Vec<VideoChapter> = Vec::with_capacity(chapters.len());
    let mut previous_end = 0u64;

    for mut chapter in chapters {
        chapter.start_time_ms = previous_end;
        chapter.end_time_ms = chapter.end_time_ms.min(duration_ms);
        if chapter.end_time_ms <= chapter.start_time_ms
            || chapter.duration_ms() < min_chapter_duration_ms
        {
            continue;
        }
        previous_end = chapter.end_time_ms;
        normalized.push(chapter);
    }

    match normalized.last_mut() {
        Some(last) => last.end_time_ms = duration_ms,
        None => normalized.push(VideoChapter::new(
            0,
            duration_ms,
            "Full Video",
            ChapterType::MainContent,
            FALLBACK_CONFIDENCE,
        )),
    }

    normalized
}
