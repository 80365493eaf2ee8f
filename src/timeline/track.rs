use std::collections::BTreeSet;

use crate::foundation::core::{BlockId, KeyframeId, LayerId, MIN_BLOCK_SECS, SceneId, TIME_EPSILON};
use crate::foundation::error::{CutlineError, CutlineResult};
use crate::model::keyframe::Keyframe;
use crate::model::scene::{Block, Layer, LayerKind, Scene};
use crate::timeline::store::ProjectStore;

/// Source of fresh row ids for blocks, layers, and keyframes created by an edit.
pub trait IdSource {
    /// Return an id that has never been used in the project.
    fn next_id(&mut self) -> u64;
}

/// Monotonic id source starting after a known high-water mark.
#[derive(Clone, Copy, Debug)]
pub struct SequentialIds {
    last: u64,
}

impl SequentialIds {
    /// Hand out ids strictly greater than `high_water`.
    pub fn after(high_water: u64) -> Self {
        Self { last: high_water }
    }
}

impl IdSource for SequentialIds {
    fn next_id(&mut self) -> u64 {
        self.last += 1;
        self.last
    }
}

/// A block together with the keyframes it owns.
///
/// Every change to the block's start time goes through this type so its keyframes move by the
/// same delta in the same step.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AnimatedBlock {
    /// The block row.
    pub block: Block,
    /// Owned keyframes, ordered by time.
    pub keyframes: Vec<Keyframe>,
}

impl AnimatedBlock {
    /// Wrap a block with no keyframes.
    pub fn new(block: Block) -> Self {
        Self {
            block,
            keyframes: Vec::new(),
        }
    }

    /// Block id.
    pub fn id(&self) -> BlockId {
        self.block.id
    }

    /// Shift the block span and all of its keyframes by `delta` seconds.
    pub fn shift(&mut self, delta: f64) {
        if delta == 0.0 {
            return;
        }
        self.block.start_time += delta;
        self.block.end_time += delta;
        for kf in &mut self.keyframes {
            kf.time += delta;
        }
    }

    /// Place the block at `start`, keeping its duration; returns the applied delta.
    pub fn move_to(&mut self, start: f64) -> f64 {
        let delta = start - self.block.start_time;
        if delta == 0.0 {
            return 0.0;
        }
        let duration = self.block.duration();
        self.block.start_time = start;
        self.block.end_time = start + duration;
        for kf in &mut self.keyframes {
            kf.time += delta;
        }
        delta
    }

    /// Sort keyframes by time, ties by id.
    pub(crate) fn sort_keyframes(&mut self) {
        self.keyframes
            .sort_by(|a, b| a.time.total_cmp(&b.time).then(a.id.cmp(&b.id)));
    }

    /// Find one of this block's keyframes.
    pub fn keyframe(&self, id: KeyframeId) -> Option<&Keyframe> {
        self.keyframes.iter().find(|k| k.id == id)
    }
}

/// A layer and its blocks ordered by start time.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LayerTrack {
    /// The layer row.
    pub layer: Layer,
    /// Blocks in start-time order; ties keep insertion order.
    pub blocks: Vec<AnimatedBlock>,
}

impl LayerTrack {
    /// Wrap a layer with no blocks.
    pub fn new(layer: Layer) -> Self {
        Self {
            layer,
            blocks: Vec::new(),
        }
    }

    /// Stable sort by start time.
    pub(crate) fn sort_blocks(&mut self) {
        self.blocks
            .sort_by(|a, b| a.block.start_time.total_cmp(&b.block.start_time));
    }

    /// Find a block position by id.
    pub fn position_of(&self, id: BlockId) -> Option<usize> {
        self.blocks.iter().position(|b| b.id() == id)
    }

    /// Return `true` when no block in this layer overlaps `[start, end]`.
    pub fn is_free(&self, start: f64, end: f64) -> bool {
        !self.blocks.iter().any(|b| b.block.overlaps(start, end))
    }

    /// Latest end time on this layer, or 0 when empty.
    pub fn end_time(&self) -> f64 {
        self.blocks
            .iter()
            .map(|b| b.block.end_time)
            .fold(0.0, f64::max)
    }
}

/// In-memory working copy of one scene's layers, blocks, and keyframes.
///
/// Layers are kept in stacking order (position ascending, then id).
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Timeline {
    /// Scene row.
    pub scene: Scene,
    /// Layers in stacking order.
    pub layers: Vec<LayerTrack>,
}

impl Timeline {
    /// Create an empty timeline for `scene`.
    pub fn new(scene: Scene) -> Self {
        Self {
            scene,
            layers: Vec::new(),
        }
    }

    /// Read a scene's full layer/block/keyframe state from a project store.
    #[tracing::instrument(skip(store))]
    pub fn load<S: ProjectStore + ?Sized>(store: &S, scene: SceneId) -> CutlineResult<Self> {
        let scene = store.get_scene(scene)?;
        let mut timeline = Self::new(scene);
        for layer in store.get_layers(timeline.scene.id)? {
            let mut track = LayerTrack::new(layer);
            let mut blocks = store.get_blocks(track.layer.id)?;
            // Creation order breaks start-time ties; ids are allocated monotonically.
            blocks.sort_by(|a, b| a.id.cmp(&b.id));
            for block in blocks {
                let mut animated = AnimatedBlock {
                    keyframes: store.get_keyframes(Some(block.id))?,
                    block,
                };
                animated.sort_keyframes();
                track.blocks.push(animated);
            }
            track.sort_blocks();
            timeline.layers.push(track);
        }
        timeline.sort_layers();
        Ok(timeline)
    }

    /// Scene id.
    pub fn scene_id(&self) -> SceneId {
        self.scene.id
    }

    pub(crate) fn sort_layers(&mut self) {
        self.layers.sort_by(|a, b| {
            a.layer
                .position
                .cmp(&b.layer.position)
                .then(a.layer.id.cmp(&b.layer.id))
        });
    }

    /// Index of the main layer, if the scene has one.
    pub fn main_index(&self) -> Option<usize> {
        self.layers.iter().position(|t| t.layer.is_main)
    }

    /// The main layer track.
    pub fn main(&self) -> Option<&LayerTrack> {
        self.main_index().map(|i| &self.layers[i])
    }

    pub(crate) fn require_main_index(&self) -> CutlineResult<usize> {
        self.main_index().ok_or_else(|| {
            CutlineError::not_found(format!("{} has no main layer", self.scene.id))
        })
    }

    /// Index of a layer by id.
    pub fn layer_index(&self, id: LayerId) -> CutlineResult<usize> {
        self.layers
            .iter()
            .position(|t| t.layer.id == id)
            .ok_or_else(|| CutlineError::not_found(format!("{id} is not in {}", self.scene.id)))
    }

    /// Layer track by id.
    pub fn layer(&self, id: LayerId) -> CutlineResult<&LayerTrack> {
        self.layer_index(id).map(|i| &self.layers[i])
    }

    /// Locate a block as `(layer index, block index)`.
    pub fn locate(&self, id: BlockId) -> CutlineResult<(usize, usize)> {
        for (li, track) in self.layers.iter().enumerate() {
            if let Some(bi) = track.position_of(id) {
                return Ok((li, bi));
            }
        }
        Err(CutlineError::not_found(format!(
            "{id} is not in {}",
            self.scene.id
        )))
    }

    /// Block (with keyframes) by id.
    pub fn block(&self, id: BlockId) -> CutlineResult<&AnimatedBlock> {
        let (li, bi) = self.locate(id)?;
        Ok(&self.layers[li].blocks[bi])
    }

    pub(crate) fn block_mut(&mut self, id: BlockId) -> CutlineResult<&mut AnimatedBlock> {
        let (li, bi) = self.locate(id)?;
        Ok(&mut self.layers[li].blocks[bi])
    }

    /// Locate a keyframe as `(layer index, block index, keyframe index)`.
    pub fn locate_keyframe(&self, id: KeyframeId) -> CutlineResult<(usize, usize, usize)> {
        for (li, track) in self.layers.iter().enumerate() {
            for (bi, block) in track.blocks.iter().enumerate() {
                if let Some(ki) = block.keyframes.iter().position(|k| k.id == id) {
                    return Ok((li, bi, ki));
                }
            }
        }
        Err(CutlineError::not_found(format!(
            "{id} is not in {}",
            self.scene.id
        )))
    }

    /// Scene duration: the latest block end over all layers, 0 when empty.
    pub fn duration(&self) -> f64 {
        self.layers
            .iter()
            .map(LayerTrack::end_time)
            .fold(0.0, f64::max)
    }

    /// Iterate all blocks in layer stacking order.
    pub fn blocks(&self) -> impl Iterator<Item = &AnimatedBlock> {
        self.layers.iter().flat_map(|t| t.blocks.iter())
    }

    /// Highest stacking position in use.
    pub(crate) fn top_position(&self) -> Option<i32> {
        self.layers.iter().map(|t| t.layer.position).max()
    }

    /// Describe every structural invariant the timeline currently breaks.
    pub fn invariant_violations(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();

        let mains: Vec<&LayerTrack> = self.layers.iter().filter(|t| t.layer.is_main).collect();
        if mains.len() > 1 {
            out.insert(format!("{} has {} main layers", self.scene.id, mains.len()));
        }

        for track in &self.layers {
            let layer = &track.layer;
            if layer.is_main && layer.kind != LayerKind::MainVideo {
                out.insert(format!("{} is main but not a main-video layer", layer.id));
            }
            for ab in &track.blocks {
                let b = &ab.block;
                if b.layer != layer.id {
                    out.insert(format!("{} is listed under {} but owned by {}", b.id, layer.id, b.layer));
                }
                if !b.start_time.is_finite() || !b.end_time.is_finite() {
                    out.insert(format!("{} has non-finite times", b.id));
                    continue;
                }
                if b.start_time < -TIME_EPSILON {
                    out.insert(format!("{} starts before 0", b.id));
                }
                if b.duration() < MIN_BLOCK_SECS - TIME_EPSILON {
                    out.insert(format!(
                        "{} is shorter than {MIN_BLOCK_SECS}s ({:.3}s)",
                        b.id,
                        b.duration()
                    ));
                }
                for kf in &ab.keyframes {
                    if kf.block != b.id {
                        out.insert(format!("{} is listed under {} but owned by {}", kf.id, b.id, kf.block));
                    }
                }
            }
            for pair in track.blocks.windows(2) {
                let (a, b) = (&pair[0].block, &pair[1].block);
                if a.end_time > b.start_time + TIME_EPSILON {
                    out.insert(format!("{} overlaps {} on {}", a.id, b.id, layer.id));
                } else if layer.is_main && a.end_time < b.start_time - TIME_EPSILON {
                    out.insert(format!("gap between {} and {} on main {}", a.id, b.id, layer.id));
                }
            }
            if layer.is_main
                && let Some(first) = track.blocks.first()
                && first.block.start_time.abs() > TIME_EPSILON
            {
                out.insert(format!("main {} does not start at 0", layer.id));
            }
        }
        out
    }

    /// Fail with [`CutlineError::StructuralInvariantViolation`] when any invariant is broken.
    pub fn check_invariants(&self) -> CutlineResult<()> {
        let violations = self.invariant_violations();
        if violations.is_empty() {
            return Ok(());
        }
        Err(CutlineError::structural(
            violations.into_iter().collect::<Vec<_>>().join("; "),
        ))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/track.rs"]
mod tests;
