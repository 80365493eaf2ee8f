use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;

use crate::animation::sample::{Sampled, sample_block};
use crate::config::ExportDefaults;
use crate::encode::FrameEncoder;
use crate::foundation::core::{Canvas, Fps, SceneId};
use crate::foundation::error::{CutlineError, CutlineResult};
use crate::render::assets::{AssetStore, ImageCache};
use crate::render::compositor::{CompositeLayer, Compositor};
use crate::render::frames::{DirFrameStore, FrameStore};
use crate::render::layout::{fit_output_canvas, place, scale_length};
use crate::timeline::store::ProjectStore;
use crate::timeline::track::Timeline;

const FRAMES_PERCENT: u64 = 80;
const ENCODE_PERCENT: u8 = 85;

/// Where an export currently is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportPhase {
    /// Nothing running.
    Idle,
    /// Rendering frames to the frame store.
    GeneratingFrames,
    /// Waiting on the encoder.
    Encoding,
    /// Last export succeeded.
    Done,
    /// Last export failed or was cancelled.
    Failed,
}

/// Phase label carried by progress reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressPhase {
    /// Frame generation, 0..=80 percent.
    Frames,
    /// Encoding, 85 percent.
    Encode,
    /// Finished, 100 percent.
    Done,
}

/// One progress report.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct Progress {
    /// Phase label.
    pub phase: ProgressPhase,
    /// Overall completion, 0..=100.
    pub percent: u8,
    /// Optional human-readable detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Per-export options.
#[derive(Clone, Debug, PartialEq)]
pub struct ExportOptions {
    /// Requested output width; the frame is fitted to the scene aspect ratio inside it.
    pub width: u32,
    /// Requested output height.
    pub height: u32,
    /// Output frame rate.
    pub fps: Fps,
    /// Destination directory (current directory when `None`).
    pub output_dir: Option<PathBuf>,
    /// Opaque frame background (straight RGBA8).
    pub background_rgba: [u8; 4],
    /// Report progress every N frames; 0 picks about 1% of the total.
    pub progress_every_frames: u64,
    /// Output file stem; the file is `<stem>_<scene>.mp4`.
    pub file_stem: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            fps: Fps { num: 30, den: 1 },
            output_dir: None,
            background_rgba: [0, 0, 0, 255],
            progress_every_frames: 0,
            file_stem: "export".to_owned(),
        }
    }
}

impl ExportOptions {
    /// Build options from configured defaults.
    pub fn from_defaults(defaults: &ExportDefaults) -> CutlineResult<Self> {
        Ok(Self {
            width: defaults.width,
            height: defaults.height,
            fps: Fps::whole(defaults.fps)?,
            output_dir: None,
            background_rgba: defaults.background_rgba,
            progress_every_frames: defaults.progress_every_frames,
            file_stem: defaults.file_stem.clone(),
        })
    }

    /// Path of the encoded file for `scene`.
    pub fn output_path(&self, scene: SceneId) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(format!("{}_{}.mp4", self.file_stem, scene.0))
    }

    fn report_every(&self, total: u64) -> u64 {
        if self.progress_every_frames > 0 {
            self.progress_every_frames
        } else {
            (total / 100).max(1)
        }
    }
}

/// Cooperative cancellation shared between an export and its caller.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Create an unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; takes effect before the next frame.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Return `true` once [`CancelFlag::cancel`] was called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of a successful export.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct ExportOutput {
    /// Encoded video file.
    pub output_path: PathBuf,
    /// Frames rendered.
    pub frames: u64,
    /// Output frame width.
    pub width: u32,
    /// Output frame height.
    pub height: u32,
    /// Scene duration in seconds.
    pub duration: f64,
}

/// Opens a fresh frame store for one export, given the output directory.
pub type FrameStoreFactory<'a> =
    Box<dyn FnMut(&Path) -> CutlineResult<Box<dyn FrameStore>> + 'a>;

fn dir_frame_store(output_dir: &Path) -> CutlineResult<Box<dyn FrameStore>> {
    let store: Box<dyn FrameStore> = Box::new(DirFrameStore::create_in(output_dir)?);
    Ok(store)
}

/// Renders a scene frame by frame and hands the sequence to an encoder.
pub struct ExportPipeline<'a> {
    store: &'a dyn ProjectStore,
    assets: &'a dyn AssetStore,
    compositor: &'a mut dyn Compositor,
    encoder: &'a mut dyn FrameEncoder,
    frame_store: FrameStoreFactory<'a>,
    cancel: CancelFlag,
    phase: ExportPhase,
}

impl<'a> ExportPipeline<'a> {
    /// Wire the pipeline to its collaborators; frames go to a [`DirFrameStore`].
    pub fn new(
        store: &'a dyn ProjectStore,
        assets: &'a dyn AssetStore,
        compositor: &'a mut dyn Compositor,
        encoder: &'a mut dyn FrameEncoder,
    ) -> Self {
        Self {
            store,
            assets,
            compositor,
            encoder,
            frame_store: Box::new(dir_frame_store),
            cancel: CancelFlag::new(),
            phase: ExportPhase::Idle,
        }
    }

    /// Use `cancel` for subsequent exports.
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Persist frames through stores opened by `factory` instead.
    pub fn with_frame_store(
        mut self,
        factory: impl FnMut(&Path) -> CutlineResult<Box<dyn FrameStore>> + 'a,
    ) -> Self {
        self.frame_store = Box::new(factory);
        self
    }

    /// Current or last phase.
    pub fn phase(&self) -> ExportPhase {
        self.phase
    }

    /// Render `scene` and encode it into `<output_dir>/<file_stem>_<scene>.mp4`.
    ///
    /// Intermediate frames are removed on every path. A failed encode also removes the partially
    /// written output file.
    #[tracing::instrument(skip(self, opts, progress), fields(width = opts.width, height = opts.height))]
    pub fn export_scene(
        &mut self,
        scene: SceneId,
        opts: &ExportOptions,
        progress: &mut dyn FnMut(&Progress),
    ) -> CutlineResult<ExportOutput> {
        self.phase = ExportPhase::Idle;
        let result = self.run(scene, opts, progress);
        match &result {
            Ok(out) => {
                self.phase = ExportPhase::Done;
                tracing::info!(path = %out.output_path.display(), frames = out.frames, "export done");
            }
            Err(e) => {
                self.phase = ExportPhase::Failed;
                tracing::warn!(error = %e, "export failed");
            }
        }
        result
    }

    fn run(
        &mut self,
        scene: SceneId,
        opts: &ExportOptions,
        progress: &mut dyn FnMut(&Progress),
    ) -> CutlineResult<ExportOutput> {
        let timeline = Timeline::load(self.store, scene)?;
        let duration = timeline.duration();
        if !(duration > 0.0) {
            return Err(CutlineError::invalid_timeline("no timeline content"));
        }
        let design = Canvas::new(timeline.scene.canvas.width, timeline.scene.canvas.height)?;
        let output = fit_output_canvas(design, opts.width, opts.height)?;
        let total = opts.fps.frames_to_cover(duration);

        let output_path = opts.output_path(scene);
        let output_dir = output_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        std::fs::create_dir_all(&output_dir)
            .with_context(|| format!("create output directory '{}'", output_dir.display()))?;

        let mut frames = (self.frame_store)(&output_dir)?;
        let result = self.render_and_encode(
            &timeline,
            design,
            output,
            total,
            &output_path,
            frames.as_mut(),
            opts,
            progress,
        );
        if let Err(e) = frames.cleanup() {
            tracing::warn!(error = %e, "failed to remove intermediate frames");
        }
        result?;

        progress(&Progress {
            phase: ProgressPhase::Done,
            percent: 100,
            message: Some(output_path.display().to_string()),
        });
        Ok(ExportOutput {
            output_path,
            frames: total,
            width: output.width,
            height: output.height,
            duration,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn render_and_encode(
        &mut self,
        timeline: &Timeline,
        design: Canvas,
        output: Canvas,
        total: u64,
        output_path: &Path,
        frames: &mut dyn FrameStore,
        opts: &ExportOptions,
        progress: &mut dyn FnMut(&Progress),
    ) -> CutlineResult<()> {
        self.phase = ExportPhase::GeneratingFrames;
        tracing::info!(
            scene = %timeline.scene.id,
            frames = total,
            width = output.width,
            height = output.height,
            "generating frames"
        );
        progress(&Progress {
            phase: ProgressPhase::Frames,
            percent: 0,
            message: None,
        });

        let every = opts.report_every(total);
        let mut cache = ImageCache::default();
        for index in 0..total {
            if self.cancel.is_cancelled() {
                return Err(CutlineError::cancelled(format!(
                    "export cancelled before frame {index}"
                )));
            }
            let t = opts.fps.frame_time(index);
            let frame = self.render_frame(
                timeline,
                &mut cache,
                design,
                output,
                t,
                opts.background_rgba,
            )?;
            frames.write_frame(index, &frame)?;

            let done = index + 1;
            if done % every == 0 || done == total {
                progress(&Progress {
                    phase: ProgressPhase::Frames,
                    percent: (done * FRAMES_PERCENT / total) as u8,
                    message: Some(format!("frame {done}/{total}")),
                });
            }
        }

        self.phase = ExportPhase::Encoding;
        tracing::info!(out = %output_path.display(), "encoding");
        progress(&Progress {
            phase: ProgressPhase::Encode,
            percent: ENCODE_PERCENT,
            message: None,
        });
        let sequence = frames.sequence()?;
        if let Err(e) = self.encoder.encode(&sequence, opts.fps, output_path) {
            if output_path.exists()
                && let Err(rm) = std::fs::remove_file(output_path)
            {
                tracing::warn!(error = %rm, path = %output_path.display(), "failed to remove partial output");
            }
            return Err(e);
        }
        Ok(())
    }

    fn render_frame(
        &mut self,
        timeline: &Timeline,
        cache: &mut ImageCache,
        design: Canvas,
        output: Canvas,
        t: f64,
        background: [u8; 4],
    ) -> CutlineResult<image::RgbaImage> {
        let mut sources: Vec<(Arc<image::RgbaImage>, Sampled)> = Vec::new();
        for track in timeline
            .layers
            .iter()
            .filter(|track| track.layer.visible && track.layer.kind.is_visual())
        {
            for block in track.blocks.iter().filter(|b| b.block.is_active_at(t)) {
                let Some(asset) = block.block.asset else {
                    continue;
                };
                let Some(img) = cache.get(self.assets, asset)? else {
                    continue;
                };
                sources.push((img, sample_block(block, t)));
            }
        }

        let layers: Vec<CompositeLayer<'_>> = sources
            .iter()
            .map(|(img, s)| {
                let p = place(design, output, img.width(), img.height(), &s.transform);
                CompositeLayer {
                    image: img.as_ref(),
                    width: p.width,
                    height: p.height,
                    left: p.left,
                    top: p.top,
                    rotation: s.transform.rotation,
                    tilt_x: s.transform.rotation_x,
                    tilt_y: s.transform.rotation_y,
                    blur: scale_length(design, output, s.effects.blur),
                    opacity: s.effects.opacity,
                    tint: s.effects.color,
                }
            })
            .collect();
        self.compositor.composite(output, background, &layers)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/export.rs"]
mod tests;
