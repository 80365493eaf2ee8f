//! Track mutation algebra.
//!
//! Every operation runs against a scratch copy of the [`Timeline`] and only replaces the caller's
//! value once it succeeded without introducing new invariant violations, so a failed edit never
//! leaves some blocks shifted and others not.

use crate::foundation::core::{
    AssetId, BlockId, KeyframeId, LayerId, MIN_BLOCK_SECS, TIME_EPSILON, ensure_finite, time_eq,
};
use crate::foundation::error::{CutlineError, CutlineResult};
use crate::model::keyframe::{Keyframe, KeyframeValue};
use crate::model::scene::{AudioParams, Block, BlockEffects, BlockTransform, Layer, LayerKind};
use crate::timeline::track::{AnimatedBlock, IdSource, LayerTrack, Timeline};

/// Start-time change applied to one block (and its keyframes) by a compaction pass.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct BlockShift {
    /// Shifted block.
    pub block: BlockId,
    /// Applied delta in seconds.
    pub delta: f64,
}

fn transact<T>(
    timeline: &mut Timeline,
    f: impl FnOnce(&mut Timeline) -> CutlineResult<T>,
) -> CutlineResult<T> {
    let before = timeline.invariant_violations();
    let mut work = timeline.clone();
    let out = f(&mut work)?;
    let introduced: Vec<String> = work
        .invariant_violations()
        .difference(&before)
        .cloned()
        .collect();
    if !introduced.is_empty() {
        return Err(CutlineError::structural(introduced.join("; ")));
    }
    *timeline = work;
    Ok(out)
}

fn floor_duration(duration: f64) -> CutlineResult<f64> {
    Ok(ensure_finite(duration, "duration")?.max(MIN_BLOCK_SECS))
}

fn clamp_start(t: f64, field: &str) -> CutlineResult<f64> {
    Ok(ensure_finite(t, field)?.max(0.0))
}

/// Make room for `duration` seconds at `insert_at` on one track.
///
/// A block strictly straddling `insert_at` is cut to end there (its tail is discarded); every block
/// starting at or after `insert_at` moves later by `duration` along with its keyframes.
fn open_slot(track: &mut LayerTrack, insert_at: f64, duration: f64) -> CutlineResult<()> {
    for ab in &mut track.blocks {
        if !ab.block.straddles(insert_at) {
            continue;
        }
        let kept = insert_at - ab.block.start_time;
        if kept < MIN_BLOCK_SECS - TIME_EPSILON {
            return Err(CutlineError::structural(format!(
                "inserting at {insert_at}s would cut {} down to {kept:.3}s (minimum {MIN_BLOCK_SECS}s)",
                ab.id()
            )));
        }
        tracing::warn!(
            block = %ab.id(),
            cut_at = insert_at,
            discarded_secs = ab.block.end_time - insert_at,
            "truncating straddled block; tail content is discarded"
        );
        ab.block.end_time = insert_at;
    }

    for ab in &mut track.blocks {
        if ab.block.start_time >= insert_at - TIME_EPSILON {
            tracing::debug!(block = %ab.id(), delta = duration, "ripple shift");
            ab.shift(duration);
        }
    }
    Ok(())
}

/// Lay blocks end to end from `t = 0`, keeping each duration.
///
/// `order` lists block ids to place first (each must be on the track, no repeats); blocks not
/// listed follow in their current start order.
fn compact_track(track: &mut LayerTrack, order: Option<&[BlockId]>) -> CutlineResult<Vec<BlockShift>> {
    let mut sequence: Vec<BlockId> = Vec::with_capacity(track.blocks.len());
    if let Some(order) = order {
        for &id in order {
            if track.position_of(id).is_none() {
                return Err(CutlineError::validation(format!(
                    "{id} is not on {}",
                    track.layer.id
                )));
            }
            if sequence.contains(&id) {
                return Err(CutlineError::validation(format!(
                    "{id} is listed more than once"
                )));
            }
            sequence.push(id);
        }
    }
    for ab in &track.blocks {
        if !sequence.contains(&ab.id()) {
            sequence.push(ab.id());
        }
    }

    let mut pool = std::mem::take(&mut track.blocks);
    let mut placed = Vec::with_capacity(pool.len());
    let mut shifts = Vec::with_capacity(pool.len());
    let mut cursor = 0.0f64;
    for id in sequence {
        let idx = pool
            .iter()
            .position(|b| b.id() == id)
            .ok_or_else(|| CutlineError::not_found(format!("{id} vanished during compaction")))?;
        let mut ab = pool.swap_remove(idx);
        let delta = if time_eq(ab.block.start_time, cursor) {
            0.0
        } else {
            ab.move_to(cursor)
        };
        if delta != 0.0 {
            tracing::debug!(block = %id, delta, "compaction shift");
        }
        shifts.push(BlockShift { block: id, delta });
        cursor = ab.block.end_time;
        placed.push(ab);
    }
    track.blocks = placed;
    Ok(shifts)
}

/// Insert a new block into the main layer at `insert_at`, rippling later blocks.
///
/// `duration` is floored to 0.5 s and `insert_at` clamped to >= 0. Finishes with a full
/// compaction of the main track.
#[tracing::instrument(skip(timeline, ids, transform))]
pub fn insert_at_main_track(
    timeline: &mut Timeline,
    ids: &mut dyn IdSource,
    asset: Option<AssetId>,
    duration: f64,
    insert_at: f64,
    transform: BlockTransform,
) -> CutlineResult<BlockId> {
    let duration = floor_duration(duration)?;
    let insert_at = clamp_start(insert_at, "insert_at")?;
    transform.validate()?;

    transact(timeline, |tl| {
        let main = tl.require_main_index()?;
        let track = &mut tl.layers[main];
        open_slot(track, insert_at, duration)?;

        let id = BlockId(ids.next_id());
        let mut block = Block::new(id, track.layer.id, asset, insert_at, insert_at + duration);
        block.transform = transform;
        track.blocks.push(AnimatedBlock::new(block));
        track.sort_blocks();
        compact_track(track, None)?;
        Ok(id)
    })
}

/// Insert a new audio block, reusing the first audio layer (in stacking order) with room for it
/// or stacking a new audio layer on top. Audio layers keep gaps; nothing is compacted.
#[tracing::instrument(skip(timeline, ids))]
pub fn insert_at_audio_track(
    timeline: &mut Timeline,
    ids: &mut dyn IdSource,
    asset: Option<AssetId>,
    start_time: f64,
    duration: f64,
) -> CutlineResult<(LayerId, BlockId)> {
    let duration = floor_duration(duration)?;
    let start_time = clamp_start(start_time, "start_time")?;
    let end_time = start_time + duration;

    transact(timeline, |tl| {
        let reuse = tl.layers.iter().position(|t| {
            t.layer.kind == LayerKind::Audio && t.is_free(start_time, end_time)
        });
        let li = match reuse {
            Some(li) => li,
            None => {
                let audio_count = tl
                    .layers
                    .iter()
                    .filter(|t| t.layer.kind == LayerKind::Audio)
                    .count();
                let layer = Layer {
                    id: LayerId(ids.next_id()),
                    scene: tl.scene_id(),
                    name: format!("Audio {}", audio_count + 1),
                    position: tl.top_position().map_or(0, |p| p + 1),
                    kind: LayerKind::Audio,
                    visible: true,
                    is_main: false,
                };
                tracing::debug!(layer = %layer.id, "no audio layer has room; stacking a new one");
                let id = layer.id;
                tl.layers.push(LayerTrack::new(layer));
                tl.sort_layers();
                tl.layer_index(id)?
            }
        };

        let track = &mut tl.layers[li];
        let id = BlockId(ids.next_id());
        let mut block = Block::new(id, track.layer.id, asset, start_time, end_time);
        block.audio = AudioParams::default();
        track.blocks.push(AnimatedBlock::new(block));
        track.sort_blocks();
        Ok((track.layer.id, id))
    })
}

/// Move an existing block onto the main layer at `insert_at`.
///
/// The block leaves its current slot, the main track opens room exactly as for an insert, and the
/// block lands at `insert_at` with its keyframes shifted by `insert_at - old_start`.
#[tracing::instrument(skip(timeline))]
pub fn move_block_to_main_track(
    timeline: &mut Timeline,
    block: BlockId,
    insert_at: f64,
) -> CutlineResult<()> {
    let insert_at = clamp_start(insert_at, "insert_at")?;

    transact(timeline, |tl| {
        let main = tl.require_main_index()?;
        let (li, bi) = tl.locate(block)?;
        if tl.layers[li].layer.kind == LayerKind::Audio {
            return Err(CutlineError::validation(format!(
                "{block} is on audio {} and cannot move to the main track",
                tl.layers[li].layer.id
            )));
        }
        let mut moving = tl.layers[li].blocks.remove(bi);
        let duration = moving.block.duration();

        let track = &mut tl.layers[main];
        open_slot(track, insert_at, duration)?;
        let delta = moving.move_to(insert_at);
        tracing::debug!(block = %block, delta, "relocating block to main track");
        moving.block.layer = track.layer.id;
        track.blocks.push(moving);
        track.sort_blocks();
        compact_track(track, None)?;
        Ok(())
    })
}

/// Change a block's end time and ripple every later block on the same layer by the same delta.
///
/// `new_end_time` is clamped to at least `start_time + 0.5`. The main layer is compacted afterwards.
#[tracing::instrument(skip(timeline))]
pub fn resize_with_cascade(
    timeline: &mut Timeline,
    block: BlockId,
    new_end_time: f64,
) -> CutlineResult<f64> {
    let new_end_time = ensure_finite(new_end_time, "new_end_time")?;

    transact(timeline, |tl| {
        let (li, bi) = tl.locate(block)?;
        let track = &mut tl.layers[li];
        let start = track.blocks[bi].block.start_time;
        let old_end = track.blocks[bi].block.end_time;
        let new_end = new_end_time.max(start + MIN_BLOCK_SECS);
        let delta = new_end - old_end;
        track.blocks[bi].block.end_time = new_end;

        for ab in &mut track.blocks {
            if ab.id() != block && ab.block.start_time >= old_end - TIME_EPSILON {
                tracing::debug!(block = %ab.id(), delta, "cascade shift");
                ab.shift(delta);
            }
        }
        track.sort_blocks();
        if track.layer.is_main {
            compact_track(track, None)?;
        }
        Ok(new_end)
    })
}

/// Lay the main track out gap-free from `t = 0`.
///
/// With `order`, those blocks come first in the given sequence; otherwise the current start order
/// is kept. Re-running with the same order reports a zero delta for every block.
#[tracing::instrument(skip(timeline))]
pub fn compact_main_track(
    timeline: &mut Timeline,
    order: Option<&[BlockId]>,
) -> CutlineResult<Vec<BlockShift>> {
    transact(timeline, |tl| {
        let main = tl.require_main_index()?;
        compact_track(&mut tl.layers[main], order)
    })
}

/// Reorder the main track to `block_ids` and compact it.
pub fn reorder_main_track(
    timeline: &mut Timeline,
    block_ids: &[BlockId],
) -> CutlineResult<Vec<BlockShift>> {
    compact_main_track(timeline, Some(block_ids))
}

/// Remove a block and its keyframes; the main track is re-compacted.
#[tracing::instrument(skip(timeline))]
pub fn delete_block(timeline: &mut Timeline, block: BlockId) -> CutlineResult<AnimatedBlock> {
    transact(timeline, |tl| {
        let (li, bi) = tl.locate(block)?;
        let track = &mut tl.layers[li];
        let removed = track.blocks.remove(bi);
        if track.layer.is_main {
            compact_track(track, None)?;
        }
        Ok(removed)
    })
}

/// Remove a non-main layer with all of its blocks and keyframes.
#[tracing::instrument(skip(timeline))]
pub fn delete_layer(timeline: &mut Timeline, layer: LayerId) -> CutlineResult<LayerTrack> {
    transact(timeline, |tl| {
        let li = tl.layer_index(layer)?;
        if tl.layers[li].layer.is_main {
            return Err(CutlineError::structural(format!(
                "{layer} is the main layer of {} and cannot be deleted",
                tl.scene_id()
            )));
        }
        Ok(tl.layers.remove(li))
    })
}

/// Return the main layer id, creating an empty main-video layer beneath all others if missing.
#[tracing::instrument(skip(timeline, ids))]
pub fn ensure_main_layer(timeline: &mut Timeline, ids: &mut dyn IdSource) -> CutlineResult<LayerId> {
    if let Some(track) = timeline.main() {
        return Ok(track.layer.id);
    }
    transact(timeline, |tl| {
        let position = tl
            .layers
            .iter()
            .map(|t| t.layer.position)
            .min()
            .map_or(0, |p| p - 1);
        let layer = Layer {
            id: LayerId(ids.next_id()),
            scene: tl.scene_id(),
            name: "Main".to_owned(),
            position,
            kind: LayerKind::MainVideo,
            visible: true,
            is_main: true,
        };
        let id = layer.id;
        tl.layers.push(LayerTrack::new(layer));
        tl.sort_layers();
        Ok(id)
    })
}

/// Stack a new secondary-video or audio layer above all existing layers.
#[tracing::instrument(skip(timeline, ids))]
pub fn add_layer(
    timeline: &mut Timeline,
    ids: &mut dyn IdSource,
    kind: LayerKind,
    name: &str,
) -> CutlineResult<LayerId> {
    if kind == LayerKind::MainVideo {
        return Err(CutlineError::validation(
            "main-video layers are created by ensure_main_layer",
        ));
    }
    transact(timeline, |tl| {
        let layer = Layer {
            id: LayerId(ids.next_id()),
            scene: tl.scene_id(),
            name: name.to_owned(),
            position: tl.top_position().map_or(0, |p| p + 1),
            kind,
            visible: true,
            is_main: false,
        };
        let id = layer.id;
        tl.layers.push(LayerTrack::new(layer));
        tl.sort_layers();
        Ok(id)
    })
}

/// Show or hide a layer for export.
pub fn set_layer_visibility(
    timeline: &mut Timeline,
    layer: LayerId,
    visible: bool,
) -> CutlineResult<()> {
    let li = timeline.layer_index(layer)?;
    timeline.layers[li].layer.visible = visible;
    Ok(())
}

/// Attach a keyframe to a block; `time` is clamped into the block span.
///
/// Opacity values are clamped to `[0, 1]` and blur values floored at 0.
#[tracing::instrument(skip(timeline, ids))]
pub fn add_keyframe(
    timeline: &mut Timeline,
    ids: &mut dyn IdSource,
    block: BlockId,
    time: f64,
    value: KeyframeValue,
) -> CutlineResult<KeyframeId> {
    let time = ensure_finite(time, "keyframe time")?;
    value.validate()?;
    let value = match value {
        KeyframeValue::Opacity { value } => KeyframeValue::Opacity {
            value: value.clamp(0.0, 1.0),
        },
        KeyframeValue::Blur { value } => KeyframeValue::Blur {
            value: value.max(0.0),
        },
        other => other,
    };

    transact(timeline, |tl| {
        let ab = tl.block_mut(block)?;
        let id = KeyframeId(ids.next_id());
        ab.keyframes.push(Keyframe {
            id,
            block,
            time: time.max(ab.block.start_time).min(ab.block.end_time),
            value,
        });
        ab.sort_keyframes();
        Ok(id)
    })
}

/// Remove one keyframe.
pub fn remove_keyframe(timeline: &mut Timeline, keyframe: KeyframeId) -> CutlineResult<Keyframe> {
    let (li, bi, ki) = timeline.locate_keyframe(keyframe)?;
    Ok(timeline.layers[li].blocks[bi].keyframes.remove(ki))
}

/// Replace a block's static transform.
pub fn set_block_transform(
    timeline: &mut Timeline,
    block: BlockId,
    transform: BlockTransform,
) -> CutlineResult<()> {
    transform.validate()?;
    timeline.block_mut(block)?.block.transform = transform;
    Ok(())
}

/// Replace a block's static effects (blur floored at 0, opacity clamped to `[0, 1]`).
pub fn set_block_effects(
    timeline: &mut Timeline,
    block: BlockId,
    effects: BlockEffects,
) -> CutlineResult<()> {
    let effects = effects.clamped()?;
    timeline.block_mut(block)?.block.effects = effects;
    Ok(())
}

/// Replace an audio block's volume and fades.
pub fn set_audio_params(
    timeline: &mut Timeline,
    block: BlockId,
    params: AudioParams,
) -> CutlineResult<()> {
    params.validate()?;
    let (li, bi) = timeline.locate(block)?;
    let track = &mut timeline.layers[li];
    if track.layer.kind != LayerKind::Audio {
        return Err(CutlineError::validation(format!(
            "{block} is not on an audio layer"
        )));
    }
    track.blocks[bi].block.audio = params;
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/ops.rs"]
mod tests;
