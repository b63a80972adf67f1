//! Collaborator capabilities consumed by the pipeline.
//!
//! Decoding, audio extraction and face detection live outside this crate.
//! These traits are the only surface the analysis core needs from them.
//! Optional capabilities come with null implementations so call sites never
//! branch on presence.

use std::sync::Arc;

use async_trait::async_trait;
use image::RgbImage;

use crate::error::{MediaError, MediaResult};

/// Decoded frame access.
///
/// Nearest-sync-point semantics are acceptable. Calls may be expensive and
/// must be safe to retry.
#[async_trait]
pub trait FrameProvider: Send + Sync {
    /// Decode the frame at (or near) `timestamp_ms`.
    async fn frame_at(&self, timestamp_ms: u64) -> MediaResult<RgbImage>;
}

/// Description of one audio track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioTrackInfo {
    pub index: usize,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Raw PCM sample access.
#[async_trait]
pub trait AudioProvider: Send + Sync {
    /// Audio tracks in container order.
    async fn tracks(&self) -> MediaResult<Vec<AudioTrackInfo>>;

    /// Seek to the sync point nearest `timestamp_ms`, returning its position.
    async fn seek(&self, track: usize, timestamp_ms: u64) -> MediaResult<u64>;

    /// Read a short window of signed 16-bit samples starting at `timestamp_ms`.
    ///
    /// Returns [`MediaError::EndOfStream`] past the end of the track.
    async fn read_window(&self, track: usize, timestamp_ms: u64) -> MediaResult<Vec<i16>>;
}

/// Outcome of a face presence judgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FaceDetection {
    pub has_face: bool,
    pub count: u32,
}

impl FaceDetection {
    pub fn with_count(count: u32) -> Self {
        Self {
            has_face: count > 0,
            count,
        }
    }
}

/// Face presence detection capability.
#[async_trait]
pub trait FaceDetector: Send + Sync {
    /// Report face presence for a decoded image.
    async fn detect(&self, image: &RgbImage) -> MediaResult<FaceDetection>;

    /// Whether the capability is present. Unavailable detectors are skipped.
    fn is_available(&self) -> bool {
        true
    }

    /// Detector name for logging.
    fn name(&self) -> &'static str;
}

/// Total media duration.
#[async_trait]
pub trait DurationSource: Send + Sync {
    async fn duration_ms(&self) -> MediaResult<i64>;
}

// ============================================================================
// Null implementations
// ============================================================================

/// Face detector used when no detection capability exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopFaceDetector;

#[async_trait]
impl FaceDetector for NoopFaceDetector {
    async fn detect(&self, _image: &RgbImage) -> MediaResult<FaceDetection> {
        Ok(FaceDetection::default())
    }

    fn is_available(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

/// Audio provider for media without audio.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAudioProvider;

#[async_trait]
impl AudioProvider for NullAudioProvider {
    async fn tracks(&self) -> MediaResult<Vec<AudioTrackInfo>> {
        Ok(Vec::new())
    }

    async fn seek(&self, _track: usize, timestamp_ms: u64) -> MediaResult<u64> {
        Err(MediaError::audio_unavailable(
            timestamp_ms,
            "no audio track",
        ))
    }

    async fn read_window(&self, _track: usize, _timestamp_ms: u64) -> MediaResult<Vec<i16>> {
        Err(MediaError::EndOfStream)
    }
}

/// Duration known up front.
#[derive(Debug, Clone, Copy)]
pub struct FixedDuration(pub i64);

#[async_trait]
impl DurationSource for FixedDuration {
    async fn duration_ms(&self) -> MediaResult<i64> {
        Ok(self.0)
    }
}

/// The set of collaborators one analysis runs against.
#[derive(Clone)]
pub struct MediaSource {
    pub frames: Arc<dyn FrameProvider>,
    pub audio: Arc<dyn AudioProvider>,
    pub faces: Arc<dyn FaceDetector>,
    pub duration: Arc<dyn DurationSource>,
}

impl MediaSource {
    /// Media with frames and a duration; audio and faces are absent.
    pub fn new(frames: Arc<dyn FrameProvider>, duration: Arc<dyn DurationSource>) -> Self {
        Self {
            frames,
            audio: Arc::new(NullAudioProvider),
            faces: Arc::new(NoopFaceDetector),
            duration,
        }
    }

    pub fn with_audio(mut self, audio: Arc<dyn AudioProvider>) -> Self {
        self.audio = audio;
        self
    }

    pub fn with_face_detector(mut self, faces: Arc<dyn FaceDetector>) -> Self {
        self.faces = faces;
        self
    }
}

impl std::fmt::Debug for MediaSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaSource")
            .field("face_detector", &self.faces.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_null_implementations() {
        let detector = NoopFaceDetector;
        assert!(!detector.is_available());
        let image = RgbImage::new(4, 4);
        assert_eq!(
            detector.detect(&image).await.unwrap(),
            FaceDetection::default()
        );

        let audio = NullAudioProvider;
        assert!(audio.tracks().await.unwrap().is_empty());
        assert!(matches!(
            audio.read_window(0, 0).await,
            Err(MediaError::EndOfStream)
        ));
    }

    #[tokio::test]
    async fn test_fixed_duration() {
        assert_eq!(FixedDuration(42_000).duration_ms().await.unwrap(), 42_000);
    }
}
