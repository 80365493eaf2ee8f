use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;

use crate::foundation::core::{BlockId, Canvas, KeyframeId, LayerId, SceneId};
use crate::foundation::error::{CutlineError, CutlineResult};
use crate::model::keyframe::Keyframe;
use crate::model::scene::{Block, Layer, Scene};
use crate::timeline::track::{AnimatedBlock, Timeline};

/// Project snapshot schema understood by this build.
pub const SCHEMA_VERSION: u32 = 1;

/// Persistence contract for scenes, layers, blocks, and keyframes.
///
/// Reads return rows for one parent; writes arrive as a whole [`Transaction`] that the store must
/// apply all-or-nothing.
pub trait ProjectStore {
    /// Schema version of the persisted data.
    fn schema_version(&self) -> u32;

    /// Scene row by id.
    fn get_scene(&self, scene: SceneId) -> CutlineResult<Scene>;

    /// Layers of a scene, in any order.
    fn get_layers(&self, scene: SceneId) -> CutlineResult<Vec<Layer>>;

    /// Blocks of a layer, in any order.
    fn get_blocks(&self, layer: LayerId) -> CutlineResult<Vec<Block>>;

    /// Keyframes of one block, or every keyframe in the project for `None`.
    fn get_keyframes(&self, block: Option<BlockId>) -> CutlineResult<Vec<Keyframe>>;

    /// Largest row id ever handed out; new rows use ids above it.
    fn high_water_id(&self) -> u64;

    /// Apply every mutation of `tx` to `scene`, or none of them.
    fn apply(&mut self, scene: SceneId, tx: Transaction) -> CutlineResult<()>;
}

/// One row-level write.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mutation {
    /// Insert or replace a layer row.
    PutLayer {
        /// New layer state.
        layer: Layer,
    },
    /// Delete a layer with all of its blocks and keyframes.
    DeleteLayer {
        /// Deleted layer.
        layer: LayerId,
    },
    /// Insert or replace a block row together with its complete keyframe set.
    PutBlock {
        /// New block state.
        block: AnimatedBlock,
    },
    /// Delete a block and its keyframes.
    DeleteBlock {
        /// Deleted block.
        block: BlockId,
    },
}

/// Ordered batch of mutations committed as one unit.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub struct Transaction {
    /// Mutations in application order.
    pub mutations: Vec<Mutation>,
}

impl Transaction {
    /// Return `true` when there is nothing to write.
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    /// Compute the writes that turn `before` into `after`.
    ///
    /// Deletions come first, then layer upserts, then block upserts, so every block lands on a
    /// layer that already exists.
    pub fn diff(before: &Timeline, after: &Timeline) -> Self {
        let old_layers: BTreeMap<LayerId, &Layer> =
            before.layers.iter().map(|t| (t.layer.id, &t.layer)).collect();
        let new_layers: BTreeMap<LayerId, &Layer> =
            after.layers.iter().map(|t| (t.layer.id, &t.layer)).collect();
        let old_blocks: BTreeMap<BlockId, &AnimatedBlock> =
            before.blocks().map(|b| (b.id(), b)).collect();
        let new_blocks: BTreeMap<BlockId, &AnimatedBlock> =
            after.blocks().map(|b| (b.id(), b)).collect();

        let mut mutations = Vec::new();
        for (&id, old) in &old_blocks {
            // Blocks on a deleted layer go away with the layer.
            if !new_blocks.contains_key(&id) && new_layers.contains_key(&old.block.layer) {
                mutations.push(Mutation::DeleteBlock { block: id });
            }
        }
        for &id in old_layers.keys() {
            if !new_layers.contains_key(&id) {
                mutations.push(Mutation::DeleteLayer { layer: id });
            }
        }
        for (&id, &layer) in &new_layers {
            if old_layers.get(&id) != Some(&layer) {
                mutations.push(Mutation::PutLayer {
                    layer: layer.clone(),
                });
            }
        }
        for (&id, &block) in &new_blocks {
            if old_blocks.get(&id) != Some(&block) {
                mutations.push(Mutation::PutBlock {
                    block: block.clone(),
                });
            }
        }
        Self { mutations }
    }
}

/// Serialized form of a whole project.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ProjectSnapshot {
    /// Must equal [`SCHEMA_VERSION`] to load.
    pub schema_version: u32,
    /// Scene rows.
    #[serde(default)]
    pub scenes: Vec<Scene>,
    /// Layer rows.
    #[serde(default)]
    pub layers: Vec<Layer>,
    /// Block rows.
    #[serde(default)]
    pub blocks: Vec<Block>,
    /// Keyframe rows.
    #[serde(default)]
    pub keyframes: Vec<Keyframe>,
}

/// Project store backed by ordered in-memory maps.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InMemoryProjectStore {
    scenes: BTreeMap<SceneId, Scene>,
    layers: BTreeMap<LayerId, Layer>,
    blocks: BTreeMap<BlockId, Block>,
    keyframes: BTreeMap<KeyframeId, Keyframe>,
    high_water: u64,
}

impl InMemoryProjectStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new empty scene and return its id.
    pub fn add_scene(&mut self, name: impl Into<String>, canvas: Canvas) -> CutlineResult<SceneId> {
        let canvas = Canvas::new(canvas.width, canvas.height)?;
        self.high_water += 1;
        let id = SceneId(self.high_water);
        self.scenes.insert(
            id,
            Scene {
                id,
                name: name.into(),
                canvas,
            },
        );
        Ok(id)
    }

    /// All scene ids, ascending.
    pub fn scene_ids(&self) -> Vec<SceneId> {
        self.scenes.keys().copied().collect()
    }

    /// Capture every row as a snapshot.
    pub fn snapshot(&self) -> ProjectSnapshot {
        ProjectSnapshot {
            schema_version: SCHEMA_VERSION,
            scenes: self.scenes.values().cloned().collect(),
            layers: self.layers.values().cloned().collect(),
            blocks: self.blocks.values().cloned().collect(),
            keyframes: self.keyframes.values().cloned().collect(),
        }
    }

    /// Rebuild a store from a snapshot, checking its version and row references.
    pub fn from_snapshot(snapshot: ProjectSnapshot) -> CutlineResult<Self> {
        if snapshot.schema_version != SCHEMA_VERSION {
            return Err(CutlineError::validation(format!(
                "unsupported project schema_version: expected {SCHEMA_VERSION}, got {}",
                snapshot.schema_version
            )));
        }

        let mut store = Self::new();
        let mut high_water = 0u64;
        for scene in snapshot.scenes {
            high_water = high_water.max(scene.id.0);
            if store.scenes.insert(scene.id, scene.clone()).is_some() {
                return Err(CutlineError::validation(format!("duplicate {}", scene.id)));
            }
        }
        for layer in snapshot.layers {
            high_water = high_water.max(layer.id.0);
            if !store.scenes.contains_key(&layer.scene) {
                return Err(CutlineError::not_found(format!(
                    "{} references missing {}",
                    layer.id, layer.scene
                )));
            }
            if store.layers.insert(layer.id, layer.clone()).is_some() {
                return Err(CutlineError::validation(format!("duplicate {}", layer.id)));
            }
        }
        for block in snapshot.blocks {
            high_water = high_water.max(block.id.0);
            if !store.layers.contains_key(&block.layer) {
                return Err(CutlineError::not_found(format!(
                    "{} references missing {}",
                    block.id, block.layer
                )));
            }
            if store.blocks.insert(block.id, block.clone()).is_some() {
                return Err(CutlineError::validation(format!("duplicate {}", block.id)));
            }
        }
        for kf in snapshot.keyframes {
            high_water = high_water.max(kf.id.0);
            if !store.blocks.contains_key(&kf.block) {
                return Err(CutlineError::not_found(format!(
                    "{} references missing {}",
                    kf.id, kf.block
                )));
            }
            if store.keyframes.insert(kf.id, kf.clone()).is_some() {
                return Err(CutlineError::validation(format!("duplicate {}", kf.id)));
            }
        }
        store.high_water = high_water;
        Ok(store)
    }

    /// Parse a JSON snapshot.
    pub fn from_json_str(s: &str) -> CutlineResult<Self> {
        let snapshot: ProjectSnapshot = serde_json::from_str(s)?;
        Self::from_snapshot(snapshot)
    }

    /// Load a JSON snapshot file.
    pub fn load_json(path: &Path) -> CutlineResult<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read project file '{}'", path.display()))?;
        Self::from_json_str(&raw)
    }

    /// Write the store as a pretty-printed JSON snapshot.
    pub fn save_json(&self, path: &Path) -> CutlineResult<()> {
        let json = serde_json::to_string_pretty(&self.snapshot())?;
        std::fs::write(path, json)
            .with_context(|| format!("write project file '{}'", path.display()))?;
        Ok(())
    }

    fn apply_one(&mut self, scene: SceneId, mutation: Mutation) -> CutlineResult<()> {
        match mutation {
            Mutation::PutLayer { layer } => {
                if layer.scene != scene {
                    return Err(CutlineError::validation(format!(
                        "{} belongs to {}, not {scene}",
                        layer.id, layer.scene
                    )));
                }
                if let Some(existing) = self.layers.get(&layer.id)
                    && existing.scene != scene
                {
                    return Err(CutlineError::validation(format!(
                        "{} already belongs to {}",
                        layer.id, existing.scene
                    )));
                }
                self.bump(layer.id.0);
                self.layers.insert(layer.id, layer);
            }
            Mutation::DeleteLayer { layer } => {
                self.scene_layer(scene, layer)?;
                self.layers.remove(&layer);
                let doomed: Vec<BlockId> = self
                    .blocks
                    .values()
                    .filter(|b| b.layer == layer)
                    .map(|b| b.id)
                    .collect();
                for id in doomed {
                    self.drop_block(id);
                }
            }
            Mutation::PutBlock { block } => {
                let AnimatedBlock { block, keyframes } = block;
                self.scene_layer(scene, block.layer)?;
                if let Some(existing) = self.blocks.get(&block.id) {
                    self.scene_layer(scene, existing.layer)?;
                }
                for kf in &keyframes {
                    if kf.block != block.id {
                        return Err(CutlineError::validation(format!(
                            "{} is owned by {}, not {}",
                            kf.id, kf.block, block.id
                        )));
                    }
                    if let Some(other) = self.keyframes.get(&kf.id)
                        && other.block != block.id
                    {
                        return Err(CutlineError::validation(format!(
                            "{} already belongs to {}",
                            kf.id, other.block
                        )));
                    }
                }
                self.keyframes.retain(|_, k| k.block != block.id);
                for kf in keyframes {
                    self.bump(kf.id.0);
                    self.keyframes.insert(kf.id, kf);
                }
                self.bump(block.id.0);
                self.blocks.insert(block.id, block);
            }
            Mutation::DeleteBlock { block } => {
                let layer = self
                    .blocks
                    .get(&block)
                    .map(|b| b.layer)
                    .ok_or_else(|| CutlineError::not_found(format!("{block} does not exist")))?;
                self.scene_layer(scene, layer)?;
                self.drop_block(block);
            }
        }
        Ok(())
    }

    fn scene_layer(&self, scene: SceneId, layer: LayerId) -> CutlineResult<&Layer> {
        match self.layers.get(&layer) {
            Some(l) if l.scene == scene => Ok(l),
            Some(l) => Err(CutlineError::validation(format!(
                "{layer} belongs to {}, not {scene}",
                l.scene
            ))),
            None => Err(CutlineError::not_found(format!("{layer} does not exist"))),
        }
    }

    fn drop_block(&mut self, block: BlockId) {
        self.blocks.remove(&block);
        self.keyframes.retain(|_, k| k.block != block);
    }

    fn bump(&mut self, id: u64) {
        self.high_water = self.high_water.max(id);
    }
}

impl ProjectStore for InMemoryProjectStore {
    fn schema_version(&self) -> u32 {
        SCHEMA_VERSION
    }

    fn get_scene(&self, scene: SceneId) -> CutlineResult<Scene> {
        self.scenes
            .get(&scene)
            .cloned()
            .ok_or_else(|| CutlineError::not_found(format!("{scene} does not exist")))
    }

    fn get_layers(&self, scene: SceneId) -> CutlineResult<Vec<Layer>> {
        self.get_scene(scene)?;
        Ok(self
            .layers
            .values()
            .filter(|l| l.scene == scene)
            .cloned()
            .collect())
    }

    fn get_blocks(&self, layer: LayerId) -> CutlineResult<Vec<Block>> {
        if !self.layers.contains_key(&layer) {
            return Err(CutlineError::not_found(format!("{layer} does not exist")));
        }
        Ok(self
            .blocks
            .values()
            .filter(|b| b.layer == layer)
            .cloned()
            .collect())
    }

    fn get_keyframes(&self, block: Option<BlockId>) -> CutlineResult<Vec<Keyframe>> {
        match block {
            Some(id) => {
                if !self.blocks.contains_key(&id) {
                    return Err(CutlineError::not_found(format!("{id} does not exist")));
                }
                Ok(self
                    .keyframes
                    .values()
                    .filter(|k| k.block == id)
                    .cloned()
                    .collect())
            }
            None => Ok(self.keyframes.values().cloned().collect()),
        }
    }

    fn high_water_id(&self) -> u64 {
        self.high_water
    }

    #[tracing::instrument(skip(self, tx), fields(mutations = tx.mutations.len()))]
    fn apply(&mut self, scene: SceneId, tx: Transaction) -> CutlineResult<()> {
        self.get_scene(scene)?;
        let mut work = self.clone();
        for mutation in tx.mutations {
            work.apply_one(scene, mutation)?;
        }
        *self = work;
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/store.rs"]
mod tests;
