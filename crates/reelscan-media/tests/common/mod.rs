//! Scripted in-memory media used by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::{Rgb, RgbImage};
use reelscan_media::{
    AudioProvider, AudioTrackInfo, CancellationToken, FaceDetection, FaceDetector, FixedDuration,
    FrameProvider, MediaError, MediaResult, MediaSource,
};

const FRAME_SIZE: u32 = 64;

/// Solid frames whose gray level changes every `shot_ms`, alternating
/// between dark and bright.
#[derive(Debug)]
pub struct ShotFrames {
    shot_ms: u64,
    reads: AtomicUsize,
}

impl ShotFrames {
    pub fn new(shot_ms: u64) -> Self {
        Self {
            shot_ms,
            reads: AtomicUsize::new(0),
        }
    }

    /// A single shot: every frame is the same.
    pub fn uniform() -> Self {
        Self::new(u64::MAX)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FrameProvider for ShotFrames {
    async fn frame_at(&self, timestamp_ms: u64) -> MediaResult<RgbImage> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let level = if (timestamp_ms / self.shot_ms).is_multiple_of(2) {
            30
        } else {
            220
        };
        Ok(RgbImage::from_pixel(
            FRAME_SIZE,
            FRAME_SIZE,
            Rgb([level; 3]),
        ))
    }
}

/// A decoder that never produces a frame.
#[derive(Debug, Default)]
pub struct BrokenFrames;

#[async_trait]
impl FrameProvider for BrokenFrames {
    async fn frame_at(&self, timestamp_ms: u64) -> MediaResult<RgbImage> {
        Err(MediaError::frame_unavailable(
            timestamp_ms,
            "decoder failure",
        ))
    }
}

/// Gray frames that each take `delay` to decode.
#[derive(Debug)]
pub struct SlowFrames {
    pub delay: Duration,
    pub reads: AtomicUsize,
}

impl SlowFrames {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            reads: AtomicUsize::new(0),
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FrameProvider for SlowFrames {
    async fn frame_at(&self, _timestamp_ms: u64) -> MediaResult<RgbImage> {
        tokio::time::sleep(self.delay).await;
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(RgbImage::from_pixel(FRAME_SIZE, FRAME_SIZE, Rgb([90; 3])))
    }
}

/// Frames that cancel an analysis once decoding passes `cancel_at_ms`.
#[derive(Debug)]
pub struct CancellingFrames {
    pub cancel_at_ms: u64,
    pub token: CancellationToken,
}

#[async_trait]
impl FrameProvider for CancellingFrames {
    async fn frame_at(&self, timestamp_ms: u64) -> MediaResult<RgbImage> {
        if timestamp_ms >= self.cancel_at_ms {
            self.token.cancel();
        }
        Ok(RgbImage::from_pixel(FRAME_SIZE, FRAME_SIZE, Rgb([90; 3])))
    }
}

/// One mono track at constant amplitude lasting `length_ms`.
#[derive(Debug)]
pub struct ConstantAudio {
    pub amplitude: i16,
    pub length_ms: u64,
}

impl ConstantAudio {
    pub fn loud(length_ms: u64) -> Self {
        Self {
            amplitude: (i16::MAX as f32 * 0.9) as i16,
            length_ms,
        }
    }
}

#[async_trait]
impl AudioProvider for ConstantAudio {
    async fn tracks(&self) -> MediaResult<Vec<AudioTrackInfo>> {
        Ok(vec![AudioTrackInfo {
            index: 0,
            sample_rate: 16_000,
            channels: 1,
        }])
    }

    async fn seek(&self, _track: usize, timestamp_ms: u64) -> MediaResult<u64> {
        if timestamp_ms >= self.length_ms {
            return Err(MediaError::EndOfStream);
        }
        Ok(timestamp_ms)
    }

    async fn read_window(&self, _track: usize, timestamp_ms: u64) -> MediaResult<Vec<i16>> {
        if timestamp_ms >= self.length_ms {
            return Err(MediaError::EndOfStream);
        }
        Ok(vec![self.amplitude; 1_600])
    }
}

/// A detector that never answers.
#[derive(Debug, Default)]
pub struct HangingDetector {
    pub calls: AtomicUsize,
}

#[async_trait]
impl FaceDetector for HangingDetector {
    async fn detect(&self, _image: &RgbImage) -> MediaResult<FaceDetection> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(3_600)).await;
        Ok(FaceDetection::with_count(1))
    }

    fn name(&self) -> &'static str {
        "hanging"
    }
}

/// A detector that sees one face everywhere.
#[derive(Debug, Default)]
pub struct OneFace;

#[async_trait]
impl FaceDetector for OneFace {
    async fn detect(&self, _image: &RgbImage) -> MediaResult<FaceDetection> {
        Ok(FaceDetection::with_count(1))
    }

    fn name(&self) -> &'static str {
        "one-face"
    }
}

pub fn media(frames: Arc<dyn FrameProvider>, duration_ms: i64) -> MediaSource {
    MediaSource::new(frames, Arc::new(FixedDuration(duration_ms)))
}
