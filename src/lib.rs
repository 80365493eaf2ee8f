//! cutline is a timeline and keyframe engine for scene-based video authoring.
//!
//! A scene is a stack of layers holding timed blocks. The crate has three parts:
//!
//! - Track edits ([`timeline`]): ripple inserts, moves, cascading resizes, and main-track
//!   compaction, committed atomically through a [`ProjectStore`] by a [`TrackEditor`].
//! - Keyframe sampling ([`animation`]): per-property interpolation with shortest-arc angles and
//!   per-channel color blending.
//! - Frame export ([`render`], [`encode`]): sample, composite, persist frames, and hand them to
//!   `ffmpeg` through an [`ExportPipeline`].
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

/// Keyframe interpolation.
pub mod animation;
/// Engine configuration files.
pub mod config;
/// Video encoders.
pub mod encode;
/// Scene, layer, block, and keyframe records.
pub mod model;
/// Discriminated results for the public boundary.
pub mod outcome;
/// Asset resolution, compositing, and frame export.
pub mod render;
/// Track state and mutation engine.
pub mod timeline;

pub use crate::foundation::color::Color;
pub use crate::foundation::core::{
    AssetId, BlockId, Canvas, Fps, KeyframeId, LayerId, MIN_BLOCK_SECS, SceneId, TIME_EPSILON,
};
pub use crate::foundation::error::{CutlineError, CutlineResult};

pub use crate::animation::sample::{Sampled, sample, sample_block};
pub use crate::config::{EncoderConfig, EngineConfig, ExportDefaults};
pub use crate::encode::FrameEncoder;
pub use crate::encode::ffmpeg::FfmpegEncoder;
pub use crate::model::keyframe::{Keyframe, KeyframeValue, Property};
pub use crate::model::scene::{
    AudioParams, Block, BlockEffects, BlockTransform, Layer, LayerKind, Scene,
};
pub use crate::outcome::Outcome;
pub use crate::render::assets::{
    AssetKind, AssetSource, AssetStore, DirAssetStore, InMemoryAssetStore, ResolvedAsset,
};
pub use crate::render::compositor::{CompositeLayer, Compositor, CpuCompositor};
pub use crate::render::export::{
    CancelFlag, ExportOptions, ExportOutput, ExportPhase, ExportPipeline, FrameStoreFactory,
    Progress, ProgressPhase,
};
pub use crate::render::frames::{DirFrameStore, FrameSequence, FrameStore};
pub use crate::timeline::editor::{EditCommand, EditReceipt, TrackEditor};
pub use crate::timeline::store::{
    InMemoryProjectStore, Mutation, ProjectSnapshot, ProjectStore, SCHEMA_VERSION, Transaction,
};
pub use crate::timeline::ops::BlockShift;
pub use crate::timeline::track::{AnimatedBlock, IdSource, LayerTrack, SequentialIds, Timeline};
