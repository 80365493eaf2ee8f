use crate::foundation::color::Color;
use crate::foundation::core::KeyframeId;
use crate::model::keyframe::{Channel, Keyframe, KeyframeValue};
use crate::model::scene::{Block, BlockEffects, BlockTransform};
use crate::timeline::track::AnimatedBlock;

/// Linear blend between two values of the same kind.
pub trait Lerp: Sized {
    /// Blend `a` toward `b` by `t` in `[0, 1]`.
    fn lerp(a: &Self, b: &Self, t: f64) -> Self;
}

impl Lerp for f64 {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        a + (b - a) * t
    }
}

impl Lerp for Color {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        Color::lerp(*a, *b, t)
    }
}

/// Angle in degrees; blends along the shortest arc.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Degrees(pub f64);

impl Lerp for Degrees {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        Degrees(wrap_degrees(a.0 + wrap_degrees(b.0 - a.0) * t))
    }
}

/// Normalize an angle into `(-180, 180]`.
pub fn wrap_degrees(deg: f64) -> f64 {
    let r = deg.rem_euclid(360.0);
    if r > 180.0 { r - 360.0 } else { r }
}

/// Fully resolved animatable state of a block at one instant.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct Sampled {
    /// Position, scale, rotation, and tilt.
    pub transform: BlockTransform,
    /// Blur, opacity, and tint color.
    pub effects: BlockEffects,
}

/// Evaluate `block` and its `keyframes` at scene time `t`.
///
/// `t` is clamped into the block span first, so times outside the clip hold the boundary value.
/// Each channel is resolved independently; a channel with no keyframes keeps the block's static
/// value. Keyframes may be in any order.
pub fn sample(block: &Block, keyframes: &[Keyframe], t: f64) -> Sampled {
    let t = t.max(block.start_time).min(block.end_time);
    let base_t = &block.transform;
    let base_e = &block.effects;

    let scalar = |channel: Channel, default: f64| {
        sample_channel(keyframes, t, default, |v| v.scalar(channel))
    };
    let angle = |channel: Channel, default: f64| {
        sample_channel(keyframes, t, Degrees(default), |v| {
            v.scalar(channel).map(Degrees)
        })
        .0
    };

    let transform = BlockTransform {
        pos_x: scalar(Channel::PosX, base_t.pos_x),
        pos_y: scalar(Channel::PosY, base_t.pos_y),
        scale_x: scalar(Channel::ScaleX, base_t.scale_x),
        scale_y: scalar(Channel::ScaleY, base_t.scale_y),
        rotation: angle(Channel::Rotation, base_t.rotation),
        rotation_x: angle(Channel::RotationX, base_t.rotation_x),
        rotation_y: angle(Channel::RotationY, base_t.rotation_y),
    };
    let effects = BlockEffects {
        blur: scalar(Channel::Blur, base_e.blur).max(0.0),
        opacity: scalar(Channel::Opacity, base_e.opacity).clamp(0.0, 1.0),
        color: sample_channel(keyframes, t, base_e.color, KeyframeValue::color),
    };
    Sampled { transform, effects }
}

/// [`sample`] over a block and the keyframes it owns.
pub fn sample_block(block: &AnimatedBlock, t: f64) -> Sampled {
    sample(&block.block, &block.keyframes, t)
}

/// Resolve one channel: hold before the first and after the last key, blend in between.
///
/// Ties on time resolve to the key created last for `prev` and first for `next`.
fn sample_channel<T: Lerp>(
    keyframes: &[Keyframe],
    t: f64,
    default: T,
    value: impl Fn(&KeyframeValue) -> Option<T>,
) -> T {
    let mut prev: Option<(f64, KeyframeId, T)> = None;
    let mut next: Option<(f64, KeyframeId, T)> = None;
    for kf in keyframes {
        let Some(v) = value(&kf.value) else {
            continue;
        };
        let key = (kf.time, kf.id);
        if kf.time <= t {
            if prev.as_ref().is_none_or(|(pt, pid, _)| key >= (*pt, *pid)) {
                prev = Some((kf.time, kf.id, v));
            }
        } else if next.as_ref().is_none_or(|(nt, nid, _)| key < (*nt, *nid)) {
            next = Some((kf.time, kf.id, v));
        }
    }

    match (prev, next) {
        (None, None) => default,
        (Some((_, _, v)), None) | (None, Some((_, _, v))) => v,
        (Some((pt, _, a)), Some((nt, _, b))) => {
            let span = nt - pt;
            if span <= 0.0 {
                a
            } else {
                T::lerp(&a, &b, (t - pt) / span)
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/animation/sample.rs"]
mod tests;
