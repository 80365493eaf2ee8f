//! Encoders turning a rendered frame sequence into a video file.

/// System `ffmpeg` encoder.
pub mod ffmpeg;

use std::path::Path;

use crate::foundation::core::Fps;
use crate::foundation::error::CutlineResult;
use crate::render::frames::FrameSequence;

/// Turns a numbered frame sequence into one output file.
pub trait FrameEncoder {
    /// Encode `frames` at `fps` into `out_path`, overwriting it.
    fn encode(&mut self, frames: &FrameSequence, fps: Fps, out_path: &Path) -> CutlineResult<()>;
}
