use super::*;
use crate::foundation::core::{AssetId, Canvas};
use crate::model::keyframe::KeyframeValue;

fn scene() -> Scene {
    Scene {
        id: SceneId(1),
        name: "intro".to_owned(),
        canvas: Canvas {
            width: 1920,
            height: 1080,
        },
    }
}

fn layer(id: u64, position: i32, kind: LayerKind, is_main: bool) -> Layer {
    Layer {
        id: LayerId(id),
        scene: SceneId(1),
        name: format!("layer {id}"),
        position,
        kind,
        visible: true,
        is_main,
    }
}

fn animated(id: u64, layer: u64, start: f64, end: f64, key_times: &[f64]) -> AnimatedBlock {
    let block = Block::new(BlockId(id), LayerId(layer), Some(AssetId(1)), start, end);
    let keyframes = key_times
        .iter()
        .enumerate()
        .map(|(i, &t)| Keyframe {
            id: KeyframeId(id * 100 + i as u64),
            block: BlockId(id),
            time: t,
            value: KeyframeValue::Opacity { value: 1.0 },
        })
        .collect();
    AnimatedBlock { block, keyframes }
}

#[test]
fn shift_moves_span_and_keyframes_together() {
    let mut ab = animated(3, 1, 2.0, 5.0, &[2.0, 4.5]);
    ab.shift(1.5);
    assert_eq!((ab.block.start_time, ab.block.end_time), (3.5, 6.5));
    let times: Vec<f64> = ab.keyframes.iter().map(|k| k.time).collect();
    assert_eq!(times, vec![3.5, 6.0]);
}

#[test]
fn move_to_keeps_duration_and_reports_delta() {
    let mut ab = animated(3, 1, 4.0, 6.0, &[5.0]);
    let delta = ab.move_to(1.0);
    assert_eq!(delta, -3.0);
    assert_eq!((ab.block.start_time, ab.block.end_time), (1.0, 3.0));
    assert_eq!(ab.keyframes[0].time, 2.0);
}

#[test]
fn sequential_ids_continue_after_high_water() {
    let mut ids = SequentialIds::after(41);
    assert_eq!(ids.next_id(), 42);
    assert_eq!(ids.next_id(), 43);
}

#[test]
fn duration_is_latest_end_over_all_layers() {
    let mut tl = Timeline::new(scene());
    let mut main = LayerTrack::new(layer(1, 0, LayerKind::MainVideo, true));
    main.blocks.push(animated(10, 1, 0.0, 4.0, &[]));
    let mut audio = LayerTrack::new(layer(2, 1, LayerKind::Audio, false));
    audio.blocks.push(animated(11, 2, 3.0, 9.0, &[]));
    tl.layers = vec![main, audio];

    assert_eq!(tl.duration(), 9.0);
    assert_eq!(Timeline::new(scene()).duration(), 0.0);
    assert!(tl.check_invariants().is_ok());
}

#[test]
fn invariant_checker_reports_gaps_overlaps_and_slivers() {
    let mut tl = Timeline::new(scene());
    let mut main = LayerTrack::new(layer(1, 0, LayerKind::MainVideo, true));
    main.blocks.push(animated(10, 1, 0.0, 2.0, &[]));
    main.blocks.push(animated(11, 1, 3.0, 3.2, &[]));
    let mut overlay = LayerTrack::new(layer(2, 1, LayerKind::SecondaryVideo, false));
    overlay.blocks.push(animated(20, 2, 0.0, 4.0, &[]));
    overlay.blocks.push(animated(21, 2, 3.0, 5.0, &[]));
    tl.layers = vec![main, overlay];

    let v = tl.invariant_violations();
    assert!(v.iter().any(|m| m.contains("gap between block#10 and block#11")));
    assert!(v.iter().any(|m| m.contains("block#11 is shorter")));
    assert!(v.iter().any(|m| m.contains("block#20 overlaps block#21")));
    assert!(matches!(
        tl.check_invariants(),
        Err(CutlineError::StructuralInvariantViolation(_))
    ));
}

#[test]
fn invariant_checker_flags_main_offset_and_second_main() {
    let mut tl = Timeline::new(scene());
    let mut main = LayerTrack::new(layer(1, 0, LayerKind::MainVideo, true));
    main.blocks.push(animated(10, 1, 1.0, 2.0, &[]));
    tl.layers = vec![main, LayerTrack::new(layer(2, 1, LayerKind::MainVideo, true))];

    let v = tl.invariant_violations();
    assert!(v.iter().any(|m| m.contains("does not start at 0")));
    assert!(v.iter().any(|m| m.contains("2 main layers")));
}

#[test]
fn locate_and_lookup_report_not_found() {
    let mut tl = Timeline::new(scene());
    let mut main = LayerTrack::new(layer(1, 0, LayerKind::MainVideo, true));
    main.blocks.push(animated(10, 1, 0.0, 2.0, &[1.0]));
    tl.layers.push(main);

    assert_eq!(tl.locate(BlockId(10)).unwrap(), (0, 0));
    assert_eq!(tl.locate_keyframe(KeyframeId(1000)).unwrap(), (0, 0, 0));
    assert!(matches!(
        tl.locate(BlockId(99)),
        Err(CutlineError::NotFound(_))
    ));
    assert!(tl.layer(LayerId(7)).is_err());
}
