use std::path::Path;

use anyhow::Context;

use crate::foundation::error::CutlineResult;

/// Engine-wide configuration, usually loaded from a JSON file.
///
/// Every field has a default, so partial files are fine:
///
/// ```json
/// { "export": { "fps": 24 }, "encoder": { "crf": 20 } }
/// ```
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Export defaults.
    pub export: ExportDefaults,
    /// External encoder settings.
    pub encoder: EncoderConfig,
}

impl EngineConfig {
    /// Load from a JSON file.
    pub fn from_json_file(path: &Path) -> CutlineResult<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config file '{}'", path.display()))?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Defaults for export requests that do not say otherwise.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ExportDefaults {
    /// Requested output width.
    pub width: u32,
    /// Requested output height.
    pub height: u32,
    /// Integer frame rate.
    pub fps: u32,
    /// Frame background (straight RGBA8).
    pub background_rgba: [u8; 4],
    /// Report progress every N frames; 0 picks about 1% of the total.
    pub progress_every_frames: u64,
    /// Output file stem; the scene id is appended.
    pub file_stem: String,
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            fps: 30,
            background_rgba: [0, 0, 0, 255],
            progress_every_frames: 0,
            file_stem: "export".to_owned(),
        }
    }
}

/// How the system `ffmpeg` is invoked.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Binary name or path.
    pub ffmpeg_bin: String,
    /// Video codec (`-c:v`).
    pub codec: String,
    /// Output pixel format (`-pix_fmt`).
    pub pix_fmt: String,
    /// Constant rate factor (`-crf`), codec default when unset.
    pub crf: Option<u8>,
    /// Extra arguments inserted before the output path.
    pub extra_args: Vec<String>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_bin: "ffmpeg".to_owned(),
            codec: "libx264".to_owned(),
            pix_fmt: "yuv420p".to_owned(),
            crf: None,
            extra_args: Vec::new(),
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
