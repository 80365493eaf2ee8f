use std::cell::RefCell;
use std::io::Cursor;
use std::rc::Rc;

use super::*;
use crate::foundation::core::{AssetId, BlockId};
use crate::model::scene::{Block, BlockTransform, LayerKind};
use crate::render::assets::{AssetKind, AssetSource, InMemoryAssetStore};
use crate::render::compositor::CpuCompositor;
use crate::render::frames::{FRAME_PATTERN, FrameSequence};
use crate::timeline::editor::TrackEditor;
use crate::timeline::store::{InMemoryProjectStore, Mutation, Transaction};
use crate::timeline::track::AnimatedBlock;

const RED: [u8; 4] = [255, 0, 0, 255];
const BLUE: [u8; 4] = [0, 0, 255, 255];
const IMAGE: AssetId = AssetId(1);
const VIDEO: AssetId = AssetId(2);
const BLUE_IMAGE: AssetId = AssetId(3);

#[derive(Default)]
struct RecordingEncoder {
    calls: Vec<(u64, Fps)>,
    first_frame: Option<image::RgbaImage>,
    fail: bool,
}

impl FrameEncoder for RecordingEncoder {
    fn encode(&mut self, frames: &FrameSequence, fps: Fps, out_path: &Path) -> CutlineResult<()> {
        for i in 0..frames.count {
            assert!(frames.frame_path(i).exists());
        }
        self.first_frame = Some(image::open(frames.frame_path(0)).unwrap().to_rgba8());
        self.calls.push((frames.count, fps));
        std::fs::write(out_path, b"partial").unwrap();
        if self.fail {
            return Err(CutlineError::encoding("encoder crashed"));
        }
        Ok(())
    }
}

/// What a [`MemoryFrames`] store saw during one export.
#[derive(Default)]
struct FrameLog {
    indices: Vec<u64>,
    centers: Vec<[u8; 4]>,
    cleanups: usize,
}

/// Keeps only the center pixel of each frame.
struct MemoryFrames {
    log: Rc<RefCell<FrameLog>>,
    dir: PathBuf,
    size: Option<(u32, u32)>,
}

impl FrameStore for MemoryFrames {
    fn write_frame(&mut self, index: u64, frame: &image::RgbaImage) -> CutlineResult<()> {
        let mut log = self.log.borrow_mut();
        log.indices.push(index);
        log.centers.push(frame.get_pixel(frame.width() / 2, frame.height() / 2).0);
        self.size = Some(frame.dimensions());
        Ok(())
    }

    fn sequence(&self) -> CutlineResult<FrameSequence> {
        let (width, height) = self.size.ok_or_else(|| CutlineError::compositing("no frames"))?;
        Ok(FrameSequence {
            dir: self.dir.clone(),
            pattern: FRAME_PATTERN.to_owned(),
            count: self.log.borrow().indices.len() as u64,
            width,
            height,
        })
    }

    fn cleanup(&mut self) -> CutlineResult<()> {
        self.log.borrow_mut().cleanups += 1;
        Ok(())
    }
}

fn memory_frames(
    log: &Rc<RefCell<FrameLog>>,
) -> impl FnMut(&Path) -> CutlineResult<Box<dyn FrameStore>> {
    let log = Rc::clone(log);
    move |dir: &Path| {
        let store: Box<dyn FrameStore> = Box::new(MemoryFrames {
            log: Rc::clone(&log),
            dir: dir.to_path_buf(),
            size: None,
        });
        Ok(store)
    }
}

/// Accepts any sequence without reading it back.
#[derive(Default)]
struct CountingEncoder {
    counts: Vec<u64>,
    fail: bool,
}

impl FrameEncoder for CountingEncoder {
    fn encode(&mut self, frames: &FrameSequence, _fps: Fps, _out_path: &Path) -> CutlineResult<()> {
        self.counts.push(frames.count);
        if self.fail {
            return Err(CutlineError::encoding("encoder crashed"));
        }
        Ok(())
    }
}

fn temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "cutline_export_{tag}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn leftover_frame_dirs(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .unwrap()
        .filter(|e| {
            e.as_ref()
                .unwrap()
                .file_name()
                .to_string_lossy()
                .starts_with(".cutline-frames")
        })
        .count()
}

fn png(px: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(4, 4, image::Rgba(px));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn assets() -> InMemoryAssetStore {
    let mut assets = InMemoryAssetStore::new();
    assets.insert_image_bytes(IMAGE, png(RED));
    assets.insert_image_bytes(BLUE_IMAGE, png(BLUE));
    assets.insert(
        VIDEO,
        AssetKind::Video,
        AssetSource::Path(PathBuf::from("/nonexistent/clip.mp4")),
    );
    assets
}

fn project(asset: Option<AssetId>) -> (InMemoryProjectStore, SceneId) {
    let mut store = InMemoryProjectStore::new();
    let scene = store.add_scene("demo", Canvas::new(4, 4).unwrap()).unwrap();
    let mut ed = TrackEditor::new(&mut store, scene).unwrap();
    ed.ensure_main_layer().unwrap();
    ed.insert_at_main_track(asset, 1.0, 0.0, BlockTransform::default())
        .unwrap();
    (store, scene)
}

fn opts(dir: &Path) -> ExportOptions {
    ExportOptions {
        width: 4,
        height: 4,
        fps: Fps::whole(2).unwrap(),
        output_dir: Some(dir.to_path_buf()),
        ..ExportOptions::default()
    }
}

#[test]
fn export_renders_encodes_and_cleans_up() {
    let dir = temp_dir("ok");
    let (store, scene) = project(Some(IMAGE));
    let assets = assets();
    let mut comp = CpuCompositor;
    let mut enc = RecordingEncoder::default();
    let mut reports = Vec::new();

    let out = {
        let mut pipeline = ExportPipeline::new(&store, &assets, &mut comp, &mut enc);
        let out = pipeline
            .export_scene(scene, &opts(&dir), &mut |p: &Progress| reports.push(p.clone()))
            .unwrap();
        assert_eq!(pipeline.phase(), ExportPhase::Done);
        out
    };

    assert_eq!(out.output_path, dir.join(format!("export_{}.mp4", scene.0)));
    assert_eq!(out.frames, 2);
    assert_eq!((out.width, out.height), (4, 4));
    assert!(out.output_path.exists());
    assert_eq!(enc.calls, vec![(2, Fps::whole(2).unwrap())]);
    assert_eq!(leftover_frame_dirs(&dir), 0);

    let px = enc.first_frame.unwrap().get_pixel(1, 1).0;
    assert!(px[0] > 200 && px[2] < 50, "{px:?}");

    let seen: Vec<(ProgressPhase, u8)> = reports.iter().map(|p| (p.phase, p.percent)).collect();
    assert_eq!(
        seen,
        vec![
            (ProgressPhase::Frames, 0),
            (ProgressPhase::Frames, 40),
            (ProgressPhase::Frames, 80),
            (ProgressPhase::Encode, 85),
            (ProgressPhase::Done, 100),
        ]
    );
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn empty_timeline_is_rejected_before_rendering() {
    let dir = temp_dir("empty");
    let mut store = InMemoryProjectStore::new();
    let scene = store.add_scene("empty", Canvas::new(4, 4).unwrap()).unwrap();
    let assets = assets();
    let mut comp = CpuCompositor;
    let mut enc = RecordingEncoder::default();
    let mut pipeline = ExportPipeline::new(&store, &assets, &mut comp, &mut enc);

    let err = pipeline
        .export_scene(scene, &opts(&dir), &mut |_: &Progress| {})
        .unwrap_err();
    assert!(matches!(err, CutlineError::InvalidTimeline(_)));
    assert!(err.to_string().contains("no timeline content"));
    assert_eq!(pipeline.phase(), ExportPhase::Failed);
    drop(pipeline);
    assert!(enc.calls.is_empty());
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn missing_asset_fails_and_removes_frames() {
    let dir = temp_dir("missing");
    let (store, scene) = project(Some(AssetId(99)));
    let assets = assets();
    let mut comp = CpuCompositor;
    let mut enc = RecordingEncoder::default();
    let mut pipeline = ExportPipeline::new(&store, &assets, &mut comp, &mut enc);

    let err = pipeline
        .export_scene(scene, &opts(&dir), &mut |_: &Progress| {})
        .unwrap_err();
    assert!(matches!(err, CutlineError::AssetUnavailable(_)));
    drop(pipeline);
    assert!(enc.calls.is_empty());
    assert_eq!(leftover_frame_dirs(&dir), 0);
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn encoder_failure_removes_partial_output() {
    let dir = temp_dir("encfail");
    let (store, scene) = project(Some(IMAGE));
    let assets = assets();
    let mut comp = CpuCompositor;
    let mut enc = RecordingEncoder {
        fail: true,
        ..RecordingEncoder::default()
    };
    let o = opts(&dir);
    let mut pipeline = ExportPipeline::new(&store, &assets, &mut comp, &mut enc);

    let err = pipeline.export_scene(scene, &o, &mut |_: &Progress| {}).unwrap_err();
    assert!(matches!(err, CutlineError::EncodingFailure(_)));
    assert!(!o.output_path(scene).exists());
    assert_eq!(leftover_frame_dirs(&dir), 0);
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn cancelled_export_stops_before_the_next_frame() {
    let dir = temp_dir("cancel");
    let (store, scene) = project(Some(IMAGE));
    let assets = assets();
    let mut comp = CpuCompositor;
    let mut enc = RecordingEncoder::default();
    let cancel = CancelFlag::new();
    let mut pipeline =
        ExportPipeline::new(&store, &assets, &mut comp, &mut enc).with_cancel(cancel.clone());

    let mut frames_seen = 0;
    let err = pipeline
        .export_scene(scene, &opts(&dir), &mut |p: &Progress| {
            if p.phase == ProgressPhase::Frames && p.percent > 0 {
                frames_seen += 1;
                cancel.cancel();
            }
        })
        .unwrap_err();
    assert!(matches!(err, CutlineError::Cancelled(_)));
    assert_eq!(frames_seen, 1);
    drop(pipeline);
    assert!(enc.calls.is_empty());
    assert_eq!(leftover_frame_dirs(&dir), 0);
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn hidden_layers_and_video_assets_do_not_paint() {
    let dir = temp_dir("hidden");
    let assets = assets();
    let mut comp = CpuCompositor;

    let (mut store, scene) = project(Some(IMAGE));
    {
        let mut ed = TrackEditor::new(&mut store, scene).unwrap();
        let main = ed.ensure_main_layer().unwrap();
        ed.set_layer_visibility(main, false).unwrap();
    }
    let mut enc = RecordingEncoder::default();
    ExportPipeline::new(&store, &assets, &mut comp, &mut enc)
        .export_scene(scene, &opts(&dir), &mut |_: &Progress| {})
        .unwrap();
    assert_eq!(enc.first_frame.unwrap().get_pixel(1, 1).0, [0, 0, 0, 255]);

    let (store, scene) = project(Some(VIDEO));
    let mut enc = RecordingEncoder::default();
    ExportPipeline::new(&store, &assets, &mut comp, &mut enc)
        .export_scene(scene, &opts(&dir), &mut |_: &Progress| {})
        .unwrap();
    assert_eq!(enc.first_frame.unwrap().get_pixel(1, 1).0, [0, 0, 0, 255]);
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn options_follow_configured_defaults() {
    let defaults = ExportDefaults {
        fps: 24,
        file_stem: "reel".to_owned(),
        ..ExportDefaults::default()
    };
    let o = ExportOptions::from_defaults(&defaults).unwrap();
    assert_eq!(o.fps, Fps::whole(24).unwrap());
    assert_eq!(o.output_path(SceneId(7)), PathBuf::from(".").join("reel_7.mp4"));
    assert_eq!(o.report_every(1000), 10);
    assert_eq!(o.report_every(5), 1);
}

#[test]
fn injected_frame_store_sees_frames_in_order_and_is_cleaned() {
    let dir = temp_dir("memframes");
    let (store, scene) = project(Some(IMAGE));
    let assets = assets();
    let mut comp = CpuCompositor;
    let mut enc = CountingEncoder::default();
    let log = Rc::new(RefCell::new(FrameLog::default()));
    let o = ExportOptions {
        fps: Fps::whole(4).unwrap(),
        ..opts(&dir)
    };

    let out = ExportPipeline::new(&store, &assets, &mut comp, &mut enc)
        .with_frame_store(memory_frames(&log))
        .export_scene(scene, &o, &mut |_: &Progress| {})
        .unwrap();
    assert_eq!(out.frames, 4);
    assert_eq!(enc.counts, vec![4]);
    let log = log.borrow();
    assert_eq!(log.indices, vec![0, 1, 2, 3]);
    assert!(log.centers.iter().all(|px| *px == RED), "{:?}", log.centers);
    assert_eq!(log.cleanups, 1);
    assert_eq!(leftover_frame_dirs(&dir), 0);
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn injected_frame_store_is_cleaned_after_failures() {
    let dir = temp_dir("memfail");
    let assets = assets();
    let mut comp = CpuCompositor;

    let (store, scene) = project(Some(IMAGE));
    let mut enc = CountingEncoder {
        fail: true,
        ..CountingEncoder::default()
    };
    let log = Rc::new(RefCell::new(FrameLog::default()));
    let err = ExportPipeline::new(&store, &assets, &mut comp, &mut enc)
        .with_frame_store(memory_frames(&log))
        .export_scene(scene, &opts(&dir), &mut |_: &Progress| {})
        .unwrap_err();
    assert!(matches!(err, CutlineError::EncodingFailure(_)));
    assert_eq!(log.borrow().indices, vec![0, 1]);
    assert_eq!(log.borrow().cleanups, 1);

    let (store, scene) = project(Some(AssetId(99)));
    let mut enc = CountingEncoder::default();
    let log = Rc::new(RefCell::new(FrameLog::default()));
    let err = ExportPipeline::new(&store, &assets, &mut comp, &mut enc)
        .with_frame_store(memory_frames(&log))
        .export_scene(scene, &opts(&dir), &mut |_: &Progress| {})
        .unwrap_err();
    assert!(matches!(err, CutlineError::AssetUnavailable(_)));
    assert!(log.borrow().indices.is_empty());
    assert_eq!(log.borrow().cleanups, 1);
    assert!(enc.counts.is_empty());
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn higher_layers_paint_over_lower_ones() {
    let dir = temp_dir("stack");
    let assets = assets();
    let mut comp = CpuCompositor;

    let mut store = InMemoryProjectStore::new();
    let scene = store.add_scene("stack", Canvas::new(4, 4).unwrap()).unwrap();
    let overlay = {
        let mut ed = TrackEditor::new(&mut store, scene).unwrap();
        // The main layer is created second and still slots in underneath.
        let overlay = ed.add_layer(LayerKind::SecondaryVideo, "overlay").unwrap();
        ed.ensure_main_layer().unwrap();
        ed.insert_at_main_track(Some(IMAGE), 1.0, 0.0, BlockTransform::default())
            .unwrap();
        overlay
    };
    let on_top = AnimatedBlock::new(Block::new(BlockId(500), overlay, Some(BLUE_IMAGE), 0.0, 1.0));
    store
        .apply(
            scene,
            Transaction {
                mutations: vec![Mutation::PutBlock { block: on_top }],
            },
        )
        .unwrap();

    let tl = Timeline::load(&store, scene).unwrap();
    assert!(tl.layer(overlay).unwrap().layer.position > tl.main().unwrap().layer.position);

    let export_centers = |store: &InMemoryProjectStore, comp: &mut CpuCompositor| {
        let log = Rc::new(RefCell::new(FrameLog::default()));
        let mut enc = CountingEncoder::default();
        ExportPipeline::new(store, &assets, comp, &mut enc)
            .with_frame_store(memory_frames(&log))
            .export_scene(scene, &opts(&dir), &mut |_: &Progress| {})
            .unwrap();
        log.borrow().centers.clone()
    };
    assert_eq!(export_centers(&store, &mut comp), vec![BLUE, BLUE]);

    TrackEditor::new(&mut store, scene)
        .unwrap()
        .set_layer_visibility(overlay, false)
        .unwrap();
    assert_eq!(export_centers(&store, &mut comp), vec![RED, RED]);
    let _ = std::fs::remove_dir_all(dir);
}
