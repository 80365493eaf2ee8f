use std::ffi::OsString;
use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::Context as _;

use crate::config::EncoderConfig;
use crate::encode::FrameEncoder;
use crate::foundation::core::Fps;
use crate::foundation::error::{CutlineError, CutlineResult};
use crate::render::frames::FrameSequence;

/// Encodes a PNG sequence with the system `ffmpeg`.
#[derive(Clone, Debug, Default)]
pub struct FfmpegEncoder {
    config: EncoderConfig,
}

impl FfmpegEncoder {
    /// Create an encoder from explicit settings.
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    /// Settings in use.
    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Full argument list passed to `ffmpeg` (binary excluded).
    pub fn args(&self, frames: &FrameSequence, fps: Fps, out_path: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-y", "-loglevel", "error", "-framerate"]
            .into_iter()
            .map(OsString::from)
            .collect();
        args.push(format!("{}/{}", fps.num, fps.den).into());
        args.push("-i".into());
        args.push(frames.dir.join(&frames.pattern).into_os_string());
        args.push("-c:v".into());
        args.push(self.config.codec.clone().into());
        args.push("-pix_fmt".into());
        args.push(self.config.pix_fmt.clone().into());
        if let Some(crf) = self.config.crf {
            args.push("-crf".into());
            args.push(crf.to_string().into());
        }
        args.extend(self.config.extra_args.iter().map(OsString::from));
        args.push(out_path.as_os_str().to_owned());
        args
    }
}

impl FrameEncoder for FfmpegEncoder {
    #[tracing::instrument(skip(self, frames), fields(frames = frames.count))]
    fn encode(&mut self, frames: &FrameSequence, fps: Fps, out_path: &Path) -> CutlineResult<()> {
        if frames.count == 0 {
            return Err(CutlineError::encoding("no frames to encode"));
        }
        if self.config.pix_fmt == "yuv420p"
            && (!frames.width.is_multiple_of(2) || !frames.height.is_multiple_of(2))
        {
            return Err(CutlineError::validation(format!(
                "frame size {}x{} must be even for yuv420p output",
                frames.width, frames.height
            )));
        }
        ensure_parent_dir(out_path)?;

        let bin = &self.config.ffmpeg_bin;
        let output = Command::new(bin)
            .args(self.args(frames, fps, out_path))
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                CutlineError::encoding(format!(
                    "failed to spawn '{bin}' (is it installed and on PATH?): {e}"
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CutlineError::encoding(format!(
                "ffmpeg exited with status {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        tracing::debug!(out = %out_path.display(), "ffmpeg finished");
        Ok(())
    }
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> CutlineResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Return `true` when `bin` can be invoked (`bin -version` exits successfully).
pub fn is_ffmpeg_on_path(bin: &str) -> bool {
    Command::new(bin)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "../../tests/unit/encode/ffmpeg.rs"]
mod tests;
