//! Frames decoded ahead of time into a directory.
//!
//! Each file is named `<timestamp_ms>.<ext>` with `ext` one of `png`, `jpg`
//! or `jpeg`. Other entries are ignored. Lookups return the frame nearest
//! to the requested timestamp, the earlier one on a tie.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::RgbImage;
use reelscan_media::{DurationSource, FrameProvider, MediaError, MediaResult};
use tracing::{debug, info};

use crate::error::{WorkerError, WorkerResult};

const FRAME_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// [`FrameProvider`] over a directory of still images.
#[derive(Debug, Clone)]
pub struct DirectoryFrameProvider {
    dir: PathBuf,
    frames: BTreeMap<u64, PathBuf>,
}

impl DirectoryFrameProvider {
    /// Index the frames in `dir`. Fails when the directory holds none.
    pub async fn open(dir: impl AsRef<Path>) -> WorkerResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        let mut frames = BTreeMap::new();

        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if let Some(timestamp_ms) = frame_timestamp(&path) {
                frames.insert(timestamp_ms, path);
            }
        }

        if frames.is_empty() {
            return Err(WorkerError::NoFrames(dir));
        }

        info!(dir = %dir.display(), frames = frames.len(), "Indexed frame directory");
        Ok(Self { dir, frames })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Timestamp of the last frame.
    pub fn last_timestamp_ms(&self) -> u64 {
        self.frames.keys().next_back().copied().unwrap_or(0)
    }

    /// Path of the frame nearest `timestamp_ms`.
    pub fn nearest(&self, timestamp_ms: u64) -> Option<(u64, &Path)> {
        let before = self.frames.range(..=timestamp_ms).next_back();
        let after = self.frames.range(timestamp_ms..).next();

        let (ts, path) = match (before, after) {
            (Some(b), Some(a)) if a.0 - timestamp_ms < timestamp_ms - b.0 => a,
            (Some(b), _) => b,
            (None, Some(a)) => a,
            (None, None) => return None,
        };
        Some((*ts, path.as_path()))
    }
}

fn frame_timestamp(path: &Path) -> Option<u64> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    if !FRAME_EXTENSIONS.contains(&ext.as_str()) {
        return None;
    }
    path.file_stem()?.to_str()?.parse().ok()
}

#[async_trait]
impl FrameProvider for DirectoryFrameProvider {
    async fn frame_at(&self, timestamp_ms: u64) -> MediaResult<RgbImage> {
        let (frame_ts, path) = self.nearest(timestamp_ms).ok_or_else(|| {
            let reason = format!("no frames in {}", self.dir.display());
            MediaError::frame_unavailable(timestamp_ms, reason)
        })?;
        debug!(timestamp_ms, frame_ts, "Loading frame");

        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || image::open(&path).map(|img| img.to_rgb8()))
            .await
            .map_err(|e| MediaError::internal(format!("frame decode task failed: {e}")))?
            .map_err(|e| MediaError::frame_unavailable(timestamp_ms, e.to_string()))
    }
}

#[async_trait]
impl DurationSource for DirectoryFrameProvider {
    /// The last frame's timestamp stands in for the media duration.
    async fn duration_ms(&self) -> MediaResult<i64> {
        i64::try_from(self.last_timestamp_ms())
            .map_err(|_| MediaError::SourceUnavailable("frame timestamp out of range".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use tempfile::TempDir;

    fn write_frame(dir: &Path, name: &str, level: u8) {
        RgbImage::from_pixel(8, 8, Rgb([level; 3]))
            .save(dir.join(name))
            .unwrap();
    }

    fn frame_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        write_frame(dir.path(), "0.png", 10);
        write_frame(dir.path(), "2000.png", 120);
        write_frame(dir.path(), "4000.jpg", 240);
        std::fs::write(dir.path().join("notes.txt"), "not a frame").unwrap();
        std::fs::write(dir.path().join("cover.png"), "not a frame either").unwrap();
        dir
    }

    #[test]
    fn test_frame_timestamp() {
        assert_eq!(frame_timestamp(Path::new("/x/1500.png")), Some(1_500));
        assert_eq!(frame_timestamp(Path::new("/x/1500.JPEG")), Some(1_500));
        assert_eq!(frame_timestamp(Path::new("/x/1500.gif")), None);
        assert_eq!(frame_timestamp(Path::new("/x/intro.png")), None);
    }

    #[tokio::test]
    async fn test_indexes_only_frames() {
        let dir = frame_dir();
        let provider = DirectoryFrameProvider::open(dir.path()).await.unwrap();

        assert_eq!(provider.len(), 3);
        assert_eq!(provider.last_timestamp_ms(), 4_000);
        assert_eq!(provider.duration_ms().await.unwrap(), 4_000);
    }

    #[tokio::test]
    async fn test_nearest_lookup() {
        let dir = frame_dir();
        let provider = DirectoryFrameProvider::open(dir.path()).await.unwrap();

        let nearest = |ts| provider.nearest(ts).map(|(frame_ts, _)| frame_ts);
        assert_eq!(nearest(0), Some(0));
        assert_eq!(nearest(900), Some(0));
        assert_eq!(nearest(1_000), Some(0));
        assert_eq!(nearest(1_001), Some(2_000));
        assert_eq!(nearest(10_000), Some(4_000));
    }

    #[tokio::test]
    async fn test_frame_at_decodes_nearest_frame() {
        let dir = frame_dir();
        let provider = DirectoryFrameProvider::open(dir.path()).await.unwrap();

        let frame = provider.frame_at(2_300).await.unwrap();
        assert_eq!(frame.dimensions(), (8, 8));
        assert_eq!(frame.get_pixel(0, 0), &Rgb([120, 120, 120]));
    }

    #[tokio::test]
    async fn test_empty_directory_rejected() {
        let dir = TempDir::new().unwrap();
        let err = DirectoryFrameProvider::open(dir.path()).await.unwrap_err();
        assert!(matches!(err, WorkerError::NoFrames(_)));
    }
}
