use super::*;
use crate::foundation::core::{BlockId, LayerId};

fn block(start: f64, end: f64) -> Block {
    Block::new(BlockId(1), LayerId(1), None, start, end)
}

fn key(id: u64, time: f64, value: KeyframeValue) -> Keyframe {
    Keyframe {
        id: KeyframeId(id),
        block: BlockId(1),
        time,
        value,
    }
}

fn rotation(deg: f64) -> KeyframeValue {
    KeyframeValue::Rotation {
        rotation: Some(deg),
        rotation_x: None,
        rotation_y: None,
    }
}

#[test]
fn no_keyframes_returns_static_values() {
    let mut b = block(0.0, 4.0);
    b.transform.pos_x = 0.25;
    b.effects.opacity = 0.6;
    let s = sample(&b, &[], 2.0);
    assert_eq!(s.transform, b.transform);
    assert_eq!(s.effects, b.effects);
    assert_eq!(s.effects.color, Color::WHITE);
}

#[test]
fn scalar_channels_blend_linearly_and_hold_at_ends() {
    let b = block(0.0, 10.0);
    let keys = [
        key(2, 6.0, KeyframeValue::Opacity { value: 0.0 }),
        key(1, 2.0, KeyframeValue::Opacity { value: 1.0 }),
    ];
    assert_eq!(sample(&b, &keys, 1.0).effects.opacity, 1.0);
    assert_eq!(sample(&b, &keys, 4.0).effects.opacity, 0.5);
    assert_eq!(sample(&b, &keys, 9.0).effects.opacity, 0.0);
}

#[test]
fn sampling_outside_block_holds_boundary_values() {
    let b = block(2.0, 6.0);
    let keys = [
        key(1, 3.0, KeyframeValue::Pos { x: 0.0, y: 0.0 }),
        key(2, 5.0, KeyframeValue::Pos { x: 1.0, y: 0.5 }),
        key(3, 2.0, KeyframeValue::Blur { value: 2.0 }),
        key(4, 6.0, KeyframeValue::Blur { value: 8.0 }),
    ];
    assert_eq!(sample(&b, &keys, -100.0), sample(&b, &keys, 2.0));
    assert_eq!(sample(&b, &keys, 100.0), sample(&b, &keys, 6.0));
    assert_eq!(sample(&b, &keys, 100.0).effects.blur, 8.0);
}

#[test]
fn rotation_takes_the_shortest_arc() {
    let b = block(0.0, 1.0);
    let keys = [key(1, 0.0, rotation(350.0)), key(2, 1.0, rotation(10.0))];
    let mid = sample(&b, &keys, 0.5).transform.rotation;
    assert!(mid.abs() < 1e-9, "expected 0 degrees, got {mid}");

    let quarter = sample(&b, &keys, 0.25).transform.rotation;
    assert!((quarter - (-5.0)).abs() < 1e-9, "got {quarter}");
}

#[test]
fn angle_wrap_stays_in_half_open_range() {
    assert_eq!(wrap_degrees(180.0), 180.0);
    assert_eq!(wrap_degrees(-180.0), 180.0);
    assert_eq!(wrap_degrees(190.0), -170.0);
    assert_eq!(wrap_degrees(720.0), 0.0);
}

#[test]
fn tilt_channels_are_independent_of_rotation() {
    let b = block(0.0, 2.0);
    let keys = [
        key(
            1,
            0.0,
            KeyframeValue::Rotation {
                rotation: None,
                rotation_x: Some(0.0),
                rotation_y: None,
            },
        ),
        key(
            2,
            2.0,
            KeyframeValue::Rotation {
                rotation: Some(90.0),
                rotation_x: Some(60.0),
                rotation_y: None,
            },
        ),
    ];
    let s = sample(&b, &keys, 1.0);
    assert!((s.transform.rotation_x - 30.0).abs() < 1e-9);
    // Only one key carries `rotation`, so it is held rather than blended from the static value.
    assert_eq!(s.transform.rotation, 90.0);
    assert_eq!(s.transform.rotation_y, 0.0);
}

#[test]
fn color_blends_per_channel() {
    let b = block(0.0, 1.0);
    let keys = [
        key(
            1,
            0.0,
            KeyframeValue::Color {
                color: Color::from_hex("#FF0000").unwrap(),
            },
        ),
        key(
            2,
            1.0,
            KeyframeValue::Color {
                color: Color::from_hex("#0000FF").unwrap(),
            },
        ),
    ];
    let c = sample(&b, &keys, 0.5).effects.color;
    assert_eq!(c.to_css(), "rgba(128,0,128,1)");
}

#[test]
fn coincident_keys_do_not_divide_by_zero() {
    let b = block(0.0, 2.0);
    let keys = [
        key(1, 1.0, KeyframeValue::Scale { x: 1.0, y: 1.0 }),
        key(2, 1.0, KeyframeValue::Scale { x: 3.0, y: 3.0 }),
    ];
    // The later-created key wins at its own time.
    assert_eq!(sample(&b, &keys, 1.0).transform.scale_x, 3.0);
    assert_eq!(sample(&b, &keys, 0.5).transform.scale_x, 1.0);
}

#[test]
fn sample_block_uses_owned_keyframes() {
    let mut ab = AnimatedBlock::new(block(0.0, 2.0));
    ab.keyframes.push(key(1, 0.0, KeyframeValue::Opacity { value: 0.0 }));
    ab.keyframes.push(key(2, 2.0, KeyframeValue::Opacity { value: 1.0 }));
    assert_eq!(sample_block(&ab, 1.5).effects.opacity, 0.75);
}
