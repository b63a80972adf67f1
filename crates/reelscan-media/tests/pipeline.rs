//! End-to-end analysis over scripted in-memory media.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{
    media, BrokenFrames, CancellingFrames, ConstantAudio, HangingDetector, OneFace, ShotFrames,
    SlowFrames,
};
use reelscan_media::{
    score_segments, AnalysisCache, AnalysisCoordinator, CancellationToken, CoordinatorState,
    MediaError, ScoringConfig, StageConfigs,
};
use reelscan_models::{
    AnalysisConfiguration, AnalysisResult, AudioScore, ChapterType, ConfigError, MotionScore,
    Scene,
};

const SHOT_MS: u64 = 16_000;
const SIX_SHOTS_MS: i64 = 96_000;

fn coordinator(config: AnalysisConfiguration) -> AnalysisCoordinator {
    let stages = StageConfigs::from_analysis(&config).without_delays();
    AnalysisCoordinator::new(config)
        .unwrap()
        .with_stage_configs(stages)
}

fn bounds_of_scenes(result: &AnalysisResult) -> Vec<(u64, u64)> {
    result
        .scenes
        .iter()
        .map(|s| (s.start_ms, s.end_ms))
        .collect()
}

fn bounds_of_chapters(result: &AnalysisResult) -> Vec<(u64, u64)> {
    result
        .chapters
        .iter()
        .map(|c| (c.start_time_ms, c.end_time_ms))
        .collect()
}

fn assert_covers<T>(items: &[T], duration_ms: u64, bounds: impl Fn(&T) -> (u64, u64)) {
    assert!(!items.is_empty());
    let spans: Vec<(u64, u64)> = items.iter().map(bounds).collect();
    assert_eq!(spans.first().map(|s| s.0), Some(0));
    assert_eq!(spans.last().map(|s| s.1), Some(duration_ms));
    for pair in spans.windows(2) {
        assert_eq!(pair[0].1, pair[1].0, "gap or overlap in {spans:?}");
    }
    assert!(spans.iter().all(|(start, end)| end > start));
}

fn six_shot_media() -> reelscan_media::MediaSource {
    media(Arc::new(ShotFrames::new(SHOT_MS)), SIX_SHOTS_MS)
        .with_audio(Arc::new(ConstantAudio::loud(SIX_SHOTS_MS as u64)))
}

#[tokio::test]
async fn test_uniform_two_minute_video() {
    let config = AnalysisConfiguration::builder()
        .enable_audio(false)
        .enable_motion(false)
        .build()
        .unwrap();
    let source = media(Arc::new(ShotFrames::uniform()), 120_000);

    let result = coordinator(config).analyze(&source).await.unwrap();

    assert_eq!(result.duration_ms, 120_000);
    assert_eq!(bounds_of_scenes(&result), vec![(0, 120_000)]);
    assert!(result.highlights.is_empty());
    assert!(result.motion_scores.is_empty());
    assert!(result.audio_scores.is_empty());
    assert_eq!(
        bounds_of_chapters(&result),
        vec![(0, 6_000), (6_000, 114_000), (114_000, 120_000)]
    );
}

#[tokio::test]
async fn test_six_shot_video() {
    let result = coordinator(AnalysisConfiguration::default())
        .analyze(&six_shot_media())
        .await
        .unwrap();

    let expected: Vec<(u64, u64)> = (0..6).map(|i| (i * SHOT_MS, (i + 1) * SHOT_MS)).collect();
    assert_eq!(bounds_of_scenes(&result), expected);
    assert_eq!(result.scenes[0].change_intensity, 0.0);
    assert!(result.scenes[1..].iter().all(|s| s.change_intensity > 0.9));

    assert!(!result.motion_scores.is_empty());
    assert!(!result.audio_scores.is_empty());
    assert!(result.audio_scores.iter().all(|a| a.is_loud));
    // The noop detector reports no capability.
    assert!(result.face_detections.is_empty());

    // Five loud shots follow a cut; three of them fit the 60s budget.
    assert_eq!(result.highlights.len(), 3);
    assert!(result.total_highlight_duration_ms() <= 60_000);
    assert!(result.highlights.iter().all(|h| h.score >= 0.5));
    assert!(result.highlights.iter().all(|h| h.start_time_ms >= SHOT_MS));
    for pair in result.highlights.windows(2) {
        assert!(pair[0].start_time_ms < pair[1].start_time_ms);
    }

    // Intro and conclusion would be 4.8s each and are dropped as too short.
    assert_eq!(
        bounds_of_chapters(&result),
        vec![(0, 48_000), (48_000, 80_000), (80_000, 96_000)]
    );
    for chapter in &result.chapters {
        assert!(chapter.duration_ms() >= 5_000);
        assert_eq!(chapter.chapter_type, ChapterType::MainContent);
    }
    let titles: Vec<&str> = result.chapters.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(
        titles,
        ["Main Content 1", "Main Content 2", "Main Content 3"]
    );
}

#[tokio::test]
async fn test_coverage_across_durations() {
    for duration_ms in [3_500_i64, 45_000, 61_000, 133_333] {
        for shot_ms in [5_000, 9_000, 40_000] {
            let source = media(Arc::new(ShotFrames::new(shot_ms)), duration_ms);
            let result = coordinator(AnalysisConfiguration::default())
                .analyze(&source)
                .await
                .unwrap();

            let duration = duration_ms as u64;
            assert_covers(&result.scenes, duration, |s| (s.start_ms, s.end_ms));
            if duration >= 60_000 {
                assert_covers(&result.chapters, duration, |c| {
                    (c.start_time_ms, c.end_time_ms)
                });
                assert!(result.chapters.iter().all(|c| c.duration_ms() >= 5_000));
            } else {
                assert!(result.chapters.is_empty());
            }
        }
    }
}

#[tokio::test]
async fn test_parallel_and_sequential_agree() {
    let parallel = coordinator(AnalysisConfiguration::default())
        .analyze(&six_shot_media())
        .await
        .unwrap();

    let sequential_config = AnalysisConfiguration::builder()
        .parallel_processing(false)
        .build()
        .unwrap();
    let sequential = coordinator(sequential_config)
        .analyze(&six_shot_media())
        .await
        .unwrap();

    assert_eq!(parallel, sequential);
}

#[tokio::test]
async fn test_repeated_runs_are_identical() {
    let analyzer = coordinator(AnalysisConfiguration::default());
    let first = analyzer.analyze(&six_shot_media()).await.unwrap();
    let second = analyzer.analyze(&six_shot_media()).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_broken_decoder_still_yields_a_result() {
    let source = media(Arc::new(BrokenFrames), 90_000);
    let analyzer = coordinator(AnalysisConfiguration::default());

    let result = analyzer.analyze(&source).await.unwrap();

    assert_eq!(bounds_of_scenes(&result), vec![(0, 90_000)]);
    assert!(result.motion_scores.is_empty());
    assert!(result.highlights.is_empty());
    assert_covers(&result.chapters, 90_000, |c| {
        (c.start_time_ms, c.end_time_ms)
    });
    assert_eq!(analyzer.state(), CoordinatorState::Complete);
}

#[tokio::test(start_paused = true)]
async fn test_hanging_face_detector_degrades_to_no_faces() {
    let detector = Arc::new(HangingDetector::default());
    let source = six_shot_media().with_face_detector(detector.clone());

    let with_faces = coordinator(AnalysisConfiguration::default())
        .analyze(&source)
        .await
        .unwrap();

    let without_faces_config = AnalysisConfiguration::builder()
        .enable_faces(false)
        .build()
        .unwrap();
    let without_faces = coordinator(without_faces_config)
        .analyze(&six_shot_media())
        .await
        .unwrap();

    assert!(detector.calls.load(Ordering::SeqCst) > 0);
    assert!(with_faces.face_detections.is_empty());
    assert_eq!(with_faces.highlights, without_faces.highlights);
}

#[tokio::test]
async fn test_faces_sampled_inside_scenes() {
    let source = six_shot_media().with_face_detector(Arc::new(OneFace));
    let result = coordinator(AnalysisConfiguration::default())
        .analyze(&source)
        .await
        .unwrap();

    // Two checkpoints per scene.
    assert_eq!(result.face_detections.len(), 12);
    assert!(result.face_detections.iter().all(|f| f.has_face));
    for face in &result.face_detections {
        assert!(result.scenes.iter().any(|s| s.contains(face.timestamp_ms)));
    }
}

#[tokio::test]
async fn test_cancellation_fails_the_analysis() {
    let token = CancellationToken::new();
    let frames = CancellingFrames {
        cancel_at_ms: 20_000,
        token: token.clone(),
    };
    let config = AnalysisConfiguration::builder()
        .parallel_processing(false)
        .build()
        .unwrap();
    let analyzer = coordinator(config).with_cancellation(token);

    let outcome = analyzer.analyze(&media(Arc::new(frames), 120_000)).await;

    assert!(matches!(outcome, Err(MediaError::Cancelled)));
    assert_eq!(analyzer.state(), CoordinatorState::Failed);
}

#[tokio::test]
async fn test_cancelled_analysis_does_not_poison_the_next() {
    let config = AnalysisConfiguration::builder()
        .parallel_processing(false)
        .build()
        .unwrap();
    let analyzer = coordinator(config);
    let source = media(Arc::new(ShotFrames::new(SHOT_MS)), SIX_SHOTS_MS);

    analyzer.cancel();
    let cancelled = analyzer.analyze(&source).await;
    assert!(matches!(cancelled, Err(MediaError::Cancelled)));

    let result = analyzer.analyze(&source).await.unwrap();
    assert_covers(&result.scenes, SIX_SHOTS_MS as u64, |s| {
        (s.start_ms, s.end_ms)
    });
    assert_eq!(analyzer.state(), CoordinatorState::Complete);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_analysis_stops_decoding() {
    let frames = Arc::new(SlowFrames::new(Duration::from_secs(1)));
    let source = media(frames.clone(), 600_000);
    let analyzer = coordinator(AnalysisConfiguration::default());

    let outcome = tokio::time::timeout(Duration::from_secs(5), analyzer.analyze(&source)).await;
    assert!(outcome.is_err());
    let reads = frames.reads();
    assert!(reads > 0);

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(frames.reads(), reads);
}

#[tokio::test]
async fn test_invalid_weights_are_rejected_up_front() {
    let err = AnalysisConfiguration::builder()
        .weights(0.4, 0.4, 0.2, 0.2)
        .build()
        .unwrap_err();
    assert!(matches!(err, ConfigError::WeightSum { .. }));

    let config = AnalysisConfiguration {
        motion_weight: 0.9,
        ..Default::default()
    };
    assert!(matches!(
        AnalysisCoordinator::new(config),
        Err(MediaError::Config(ConfigError::WeightSum { .. }))
    ));
}

#[tokio::test]
async fn test_short_scene_is_never_scored() {
    let scenes = vec![Scene::new(0, 2_000, 0.5, 0.0, 1.0)];
    let motion = vec![MotionScore::new(1_000, 1.0)];
    let audio = vec![AudioScore::new(1_000, 1.0, 0.6)];

    let segments = score_segments(&scenes, &motion, &audio, &[], &ScoringConfig::default());
    assert!(segments.is_empty());
}

#[tokio::test]
async fn test_cache_reuses_analysis() {
    let cache = AnalysisCache::new();
    let frames = Arc::new(ShotFrames::new(SHOT_MS));
    let source = media(frames.clone(), SIX_SHOTS_MS);
    let analyzer = coordinator(AnalysisConfiguration::default());

    let first = cache.analyze("video-1", &analyzer, &source).await.unwrap();
    let reads = frames.reads();
    let second = cache.analyze("video-1", &analyzer, &source).await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(frames.reads(), reads);
    assert_eq!(cache.len().await, 1);

    assert_eq!(cache.invalidate_media("video-1").await, 1);
    let third = cache.analyze("video-1", &analyzer, &source).await.unwrap();
    assert!(!Arc::ptr_eq(&first, &third));
    assert_eq!(*first, *third);
    assert!(frames.reads() > reads);
}
