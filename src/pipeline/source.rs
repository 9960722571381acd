//! Frame acquisition
//!
//! The live stream itself is someone else's problem: a [`StreamResolver`]
//! hands out a [`FrameSource`] and is asked for a fresh one whenever reading
//! fails. [`FrameDirectoryResolver`] replays still frames from disk.

use image::RgbImage;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::{Result, TrackerError};

/// Something frames can be read from
pub trait FrameSource: Send {
    /// Read the next frame. An error means the source is gone.
    fn read_frame(&mut self) -> Result<RgbImage>;
}

/// Resolves and re-resolves the video source
pub trait StreamResolver: Send {
    /// Open (or reopen) the source
    fn resolve(&mut self) -> Result<Box<dyn FrameSource>>;

    /// Where frames currently come from, for diagnostics
    fn current_url(&self) -> String;
}

/// Replays a directory of images in file-name order.
///
/// Re-resolving continues from the same frame, so once the directory is used
/// up the retry read fails as well and the stream ends.
pub struct FrameDirectoryResolver {
    dir: PathBuf,
    frames: Option<Arc<Vec<PathBuf>>>,
    cursor: Arc<AtomicUsize>,
}

impl FrameDirectoryResolver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            frames: None,
            cursor: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of frames handed out so far
    pub fn position(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }

    fn scan(dir: &Path) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(dir)
            .map_err(|e| TrackerError::Acquisition(format!("{}: {}", dir.display(), e)))?;

        let mut frames = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_image = path
                .extension()
                .map(|ext| ext.to_string_lossy().to_lowercase())
                .is_some_and(|ext| matches!(ext.as_str(), "png" | "bmp" | "jpg" | "jpeg"));
            if path.is_file() && is_image {
                frames.push(path);
            }
        }
        frames.sort();
        Ok(frames)
    }
}

impl StreamResolver for FrameDirectoryResolver {
    fn resolve(&mut self) -> Result<Box<dyn FrameSource>> {
        let frames = match &self.frames {
            Some(frames) => frames.clone(),
            None => {
                let frames = Arc::new(Self::scan(&self.dir)?);
                log::info!("Found {} frames in {}", frames.len(), self.dir.display());
                self.frames = Some(frames.clone());
                frames
            }
        };

        Ok(Box::new(FrameSequence {
            frames,
            cursor: self.cursor.clone(),
        }))
    }

    fn current_url(&self) -> String {
        format!("file://{}", self.dir.display())
    }
}

/// Source half of [`FrameDirectoryResolver`]
struct FrameSequence {
    frames: Arc<Vec<PathBuf>>,
    cursor: Arc<AtomicUsize>,
}

impl FrameSource for FrameSequence {
    fn read_frame(&mut self) -> Result<RgbImage> {
        let index = self.cursor.load(Ordering::SeqCst);
        let Some(path) = self.frames.get(index) else {
            return Err(TrackerError::Acquisition("no more frames".to_string()));
        };
        self.cursor.store(index + 1, Ordering::SeqCst);
        Ok(image::open(path)?.to_rgb8())
    }
}
