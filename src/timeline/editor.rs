use crate::foundation::core::{AssetId, BlockId, KeyframeId, LayerId, SceneId};
use crate::foundation::error::{CutlineError, CutlineResult};
use crate::model::keyframe::{Keyframe, KeyframeValue};
use crate::model::scene::{AudioParams, BlockEffects, BlockTransform, LayerKind};
use crate::timeline::ops::{self, BlockShift};
use crate::timeline::store::{ProjectStore, SCHEMA_VERSION, Transaction};
use crate::timeline::track::{AnimatedBlock, IdSource, LayerTrack, SequentialIds, Timeline};

/// Serializable edit request, one per timeline operation.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum EditCommand {
    EnsureMainLayer,
    AddLayer {
        kind: LayerKind,
        #[serde(default)]
        name: String,
    },
    SetLayerVisibility {
        layer: LayerId,
        visible: bool,
    },
    DeleteLayer {
        layer: LayerId,
    },
    InsertAtMainTrack {
        #[serde(default)]
        asset: Option<AssetId>,
        duration: f64,
        insert_at: f64,
        #[serde(default)]
        transform: BlockTransform,
    },
    InsertAtAudioTrack {
        #[serde(default)]
        asset: Option<AssetId>,
        start_time: f64,
        duration: f64,
    },
    MoveBlockToMainTrack {
        block: BlockId,
        insert_at: f64,
    },
    ResizeWithCascade {
        block: BlockId,
        new_end_time: f64,
    },
    CompactMainTrack {
        #[serde(default)]
        order: Option<Vec<BlockId>>,
    },
    ReorderMainTrack {
        block_ids: Vec<BlockId>,
    },
    DeleteBlock {
        block: BlockId,
    },
    AddKeyframe {
        block: BlockId,
        time: f64,
        value: KeyframeValue,
    },
    RemoveKeyframe {
        keyframe: KeyframeId,
    },
    SetBlockTransform {
        block: BlockId,
        transform: BlockTransform,
    },
    SetBlockEffects {
        block: BlockId,
        effects: BlockEffects,
    },
    SetAudioParams {
        block: BlockId,
        params: AudioParams,
    },
}

/// What an applied [`EditCommand`] produced.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum EditReceipt {
    Done,
    Layer { layer: LayerId },
    Block { block: BlockId },
    AudioBlock { layer: LayerId, block: BlockId },
    Keyframe { keyframe: KeyframeId },
    Resized { block: BlockId, end_time: f64 },
    Shifts { shifts: Vec<BlockShift> },
}

/// Applies timeline operations to one scene of a [`ProjectStore`].
///
/// Each call loads the scene, runs the operation on the in-memory [`Timeline`], refuses the result
/// if any structural invariant is broken, and commits the row diff as a single transaction.
pub struct TrackEditor<'a, S: ProjectStore + ?Sized> {
    store: &'a mut S,
    scene: SceneId,
}

impl<'a, S: ProjectStore + ?Sized> TrackEditor<'a, S> {
    /// Bind an editor to `scene`.
    pub fn new(store: &'a mut S, scene: SceneId) -> CutlineResult<Self> {
        if store.schema_version() != SCHEMA_VERSION {
            return Err(CutlineError::validation(format!(
                "project store schema_version {} is not supported (expected {SCHEMA_VERSION})",
                store.schema_version()
            )));
        }
        store.get_scene(scene)?;
        Ok(Self { store, scene })
    }

    /// Scene being edited.
    pub fn scene(&self) -> SceneId {
        self.scene
    }

    /// Current persisted state of the scene.
    pub fn timeline(&self) -> CutlineResult<Timeline> {
        Timeline::load(&*self.store, self.scene)
    }

    fn run<T>(
        &mut self,
        f: impl FnOnce(&mut Timeline, &mut dyn IdSource) -> CutlineResult<T>,
    ) -> CutlineResult<T> {
        let before = self.timeline()?;
        let mut after = before.clone();
        let mut ids = SequentialIds::after(self.store.high_water_id());
        let out = f(&mut after, &mut ids)?;
        after.check_invariants()?;

        let tx = Transaction::diff(&before, &after);
        if !tx.is_empty() {
            tracing::debug!(scene = %self.scene, mutations = tx.mutations.len(), "commit");
            self.store.apply(self.scene, tx)?;
        }
        Ok(out)
    }

    /// See [`ops::ensure_main_layer`].
    pub fn ensure_main_layer(&mut self) -> CutlineResult<LayerId> {
        self.run(|tl, ids| ops::ensure_main_layer(tl, ids))
    }

    /// See [`ops::add_layer`].
    pub fn add_layer(&mut self, kind: LayerKind, name: &str) -> CutlineResult<LayerId> {
        self.run(|tl, ids| ops::add_layer(tl, ids, kind, name))
    }

    /// See [`ops::set_layer_visibility`].
    pub fn set_layer_visibility(&mut self, layer: LayerId, visible: bool) -> CutlineResult<()> {
        self.run(|tl, _| ops::set_layer_visibility(tl, layer, visible))
    }

    /// See [`ops::delete_layer`].
    pub fn delete_layer(&mut self, layer: LayerId) -> CutlineResult<LayerTrack> {
        self.run(|tl, _| ops::delete_layer(tl, layer))
    }

    /// See [`ops::insert_at_main_track`].
    pub fn insert_at_main_track(
        &mut self,
        asset: Option<AssetId>,
        duration: f64,
        insert_at: f64,
        transform: BlockTransform,
    ) -> CutlineResult<BlockId> {
        self.run(|tl, ids| ops::insert_at_main_track(tl, ids, asset, duration, insert_at, transform))
    }

    /// See [`ops::insert_at_audio_track`].
    pub fn insert_at_audio_track(
        &mut self,
        asset: Option<AssetId>,
        start_time: f64,
        duration: f64,
    ) -> CutlineResult<(LayerId, BlockId)> {
        self.run(|tl, ids| ops::insert_at_audio_track(tl, ids, asset, start_time, duration))
    }

    /// See [`ops::move_block_to_main_track`].
    pub fn move_block_to_main_track(&mut self, block: BlockId, insert_at: f64) -> CutlineResult<()> {
        self.run(|tl, _| ops::move_block_to_main_track(tl, block, insert_at))
    }

    /// See [`ops::resize_with_cascade`].
    pub fn resize_with_cascade(&mut self, block: BlockId, new_end_time: f64) -> CutlineResult<f64> {
        self.run(|tl, _| ops::resize_with_cascade(tl, block, new_end_time))
    }

    /// See [`ops::compact_main_track`].
    pub fn compact_main_track(&mut self, order: Option<&[BlockId]>) -> CutlineResult<Vec<BlockShift>> {
        self.run(|tl, _| ops::compact_main_track(tl, order))
    }

    /// See [`ops::reorder_main_track`].
    pub fn reorder_main_track(&mut self, block_ids: &[BlockId]) -> CutlineResult<Vec<BlockShift>> {
        self.run(|tl, _| ops::reorder_main_track(tl, block_ids))
    }

    /// See [`ops::delete_block`].
    pub fn delete_block(&mut self, block: BlockId) -> CutlineResult<AnimatedBlock> {
        self.run(|tl, _| ops::delete_block(tl, block))
    }

    /// See [`ops::add_keyframe`].
    pub fn add_keyframe(
        &mut self,
        block: BlockId,
        time: f64,
        value: KeyframeValue,
    ) -> CutlineResult<KeyframeId> {
        self.run(|tl, ids| ops::add_keyframe(tl, ids, block, time, value))
    }

    /// See [`ops::remove_keyframe`].
    pub fn remove_keyframe(&mut self, keyframe: KeyframeId) -> CutlineResult<Keyframe> {
        self.run(|tl, _| ops::remove_keyframe(tl, keyframe))
    }

    /// See [`ops::set_block_transform`].
    pub fn set_block_transform(
        &mut self,
        block: BlockId,
        transform: BlockTransform,
    ) -> CutlineResult<()> {
        self.run(|tl, _| ops::set_block_transform(tl, block, transform))
    }

    /// See [`ops::set_block_effects`].
    pub fn set_block_effects(&mut self, block: BlockId, effects: BlockEffects) -> CutlineResult<()> {
        self.run(|tl, _| ops::set_block_effects(tl, block, effects))
    }

    /// See [`ops::set_audio_params`].
    pub fn set_audio_params(&mut self, block: BlockId, params: AudioParams) -> CutlineResult<()> {
        self.run(|tl, _| ops::set_audio_params(tl, block, params))
    }

    /// Dispatch a serialized command.
    #[tracing::instrument(skip(self), fields(scene = %self.scene))]
    pub fn apply(&mut self, cmd: EditCommand) -> CutlineResult<EditReceipt> {
        Ok(match cmd {
            EditCommand::EnsureMainLayer => EditReceipt::Layer {
                layer: self.ensure_main_layer()?,
            },
            EditCommand::AddLayer { kind, name } => EditReceipt::Layer {
                layer: self.add_layer(kind, &name)?,
            },
            EditCommand::SetLayerVisibility { layer, visible } => {
                self.set_layer_visibility(layer, visible)?;
                EditReceipt::Done
            }
            EditCommand::DeleteLayer { layer } => {
                self.delete_layer(layer)?;
                EditReceipt::Done
            }
            EditCommand::InsertAtMainTrack {
                asset,
                duration,
                insert_at,
                transform,
            } => EditReceipt::Block {
                block: self.insert_at_main_track(asset, duration, insert_at, transform)?,
            },
            EditCommand::InsertAtAudioTrack {
                asset,
                start_time,
                duration,
            } => {
                let (layer, block) = self.insert_at_audio_track(asset, start_time, duration)?;
                EditReceipt::AudioBlock { layer, block }
            }
            EditCommand::MoveBlockToMainTrack { block, insert_at } => {
                self.move_block_to_main_track(block, insert_at)?;
                EditReceipt::Done
            }
            EditCommand::ResizeWithCascade {
                block,
                new_end_time,
            } => EditReceipt::Resized {
                block,
                end_time: self.resize_with_cascade(block, new_end_time)?,
            },
            EditCommand::CompactMainTrack { order } => EditReceipt::Shifts {
                shifts: self.compact_main_track(order.as_deref())?,
            },
            EditCommand::ReorderMainTrack { block_ids } => EditReceipt::Shifts {
                shifts: self.reorder_main_track(&block_ids)?,
            },
            EditCommand::DeleteBlock { block } => {
                self.delete_block(block)?;
                EditReceipt::Done
            }
            EditCommand::AddKeyframe { block, time, value } => EditReceipt::Keyframe {
                keyframe: self.add_keyframe(block, time, value)?,
            },
            EditCommand::RemoveKeyframe { keyframe } => {
                self.remove_keyframe(keyframe)?;
                EditReceipt::Done
            }
            EditCommand::SetBlockTransform { block, transform } => {
                self.set_block_transform(block, transform)?;
                EditReceipt::Done
            }
            EditCommand::SetBlockEffects { block, effects } => {
                self.set_block_effects(block, effects)?;
                EditReceipt::Done
            }
            EditCommand::SetAudioParams { block, params } => {
                self.set_audio_params(block, params)?;
                EditReceipt::Done
            }
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/editor.rs"]
mod tests;
