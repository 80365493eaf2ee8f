use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::foundation::error::{CutlineError, CutlineResult};

/// printf-style name of frame files, as understood by `ffmpeg -i`.
pub const FRAME_PATTERN: &str = "frame_%06d.png";

/// File name of frame `index`.
pub fn frame_file_name(index: u64) -> String {
    format!("frame_{index:06}.png")
}

/// Sequentially numbered frames ready for an encoder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameSequence {
    /// Directory holding the frames.
    pub dir: PathBuf,
    /// printf-style file pattern inside `dir`.
    pub pattern: String,
    /// Number of frames, numbered from 0.
    pub count: u64,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
}

impl FrameSequence {
    /// Path of frame `index`.
    pub fn frame_path(&self, index: u64) -> PathBuf {
        self.dir.join(frame_file_name(index))
    }
}

/// Intermediate storage for rendered frames.
pub trait FrameStore {
    /// Persist the next frame; `index` must be exactly the number of frames already written.
    fn write_frame(&mut self, index: u64, frame: &image::RgbaImage) -> CutlineResult<()>;

    /// Frames written so far, as an encoder input.
    fn sequence(&self) -> CutlineResult<FrameSequence>;

    /// Remove every stored frame artifact.
    fn cleanup(&mut self) -> CutlineResult<()>;
}

/// Writes PNG frames into a private working directory.
///
/// The directory is removed by [`FrameStore::cleanup`], or on drop as a fallback.
#[derive(Debug)]
pub struct DirFrameStore {
    dir: Option<PathBuf>,
    count: u64,
    size: Option<(u32, u32)>,
}

impl DirFrameStore {
    /// Create `<parent>/.cutline-frames-<pid>-<nanos>/`.
    pub fn create_in(parent: &Path) -> CutlineResult<Self> {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let dir = parent.join(format!(
            ".cutline-frames-{}-{nanos}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create frame directory '{}'", dir.display()))?;
        tracing::debug!(dir = %dir.display(), "frame directory created");
        Ok(Self {
            dir: Some(dir),
            count: 0,
            size: None,
        })
    }

    /// Working directory, until cleaned up.
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Frames written so far.
    pub fn len(&self) -> u64 {
        self.count
    }

    /// Return `true` when no frame has been written.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn live_dir(&self) -> CutlineResult<&Path> {
        self.dir
            .as_deref()
            .ok_or_else(|| CutlineError::compositing("frame store was already cleaned up"))
    }
}

impl FrameStore for DirFrameStore {
    fn write_frame(&mut self, index: u64, frame: &image::RgbaImage) -> CutlineResult<()> {
        if index != self.count {
            return Err(CutlineError::compositing(format!(
                "frame {index} written out of order (expected {})",
                self.count
            )));
        }
        let dims = frame.dimensions();
        if let Some(size) = self.size
            && size != dims
        {
            return Err(CutlineError::compositing(format!(
                "frame {index} is {}x{}, expected {}x{}",
                dims.0, dims.1, size.0, size.1
            )));
        }
        let path = self.live_dir()?.join(frame_file_name(index));
        frame
            .save_with_format(&path, image::ImageFormat::Png)
            .map_err(|e| {
                CutlineError::compositing(format!("write frame '{}': {e}", path.display()))
            })?;
        self.size = Some(dims);
        self.count += 1;
        Ok(())
    }

    fn sequence(&self) -> CutlineResult<FrameSequence> {
        let (width, height) = self
            .size
            .ok_or_else(|| CutlineError::compositing("no frames have been written"))?;
        Ok(FrameSequence {
            dir: self.live_dir()?.to_path_buf(),
            pattern: FRAME_PATTERN.to_owned(),
            count: self.count,
            width,
            height,
        })
    }

    fn cleanup(&mut self) -> CutlineResult<()> {
        let Some(dir) = self.dir.take() else {
            return Ok(());
        };
        std::fs::remove_dir_all(&dir)
            .with_context(|| format!("remove frame directory '{}'", dir.display()))?;
        tracing::debug!(dir = %dir.display(), frames = self.count, "frame directory removed");
        Ok(())
    }
}

impl Drop for DirFrameStore {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/frames.rs"]
mod tests;
