use crate::foundation::color::Color;
use crate::foundation::core::{AssetId, BlockId, Canvas, LayerId, SceneId};
use crate::foundation::error::{CutlineError, CutlineResult};

/// A scene: the unit that is edited and exported.
///
/// A scene owns its layers through the project store; its duration is derived from the blocks
/// (see [`crate::Timeline::duration`]).
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Scene {
    /// Scene identifier.
    pub id: SceneId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Authoring (design) resolution; normalized positions are relative to it.
    pub canvas: Canvas,
}

/// Kind of content hosted by a layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    /// The primary video anchor track.
    MainVideo,
    /// Overlay video/image track; permits gaps.
    SecondaryVideo,
    /// Audio-only track; permits gaps, never overlaps internally.
    Audio,
}

impl LayerKind {
    /// Return `true` for layers whose blocks can paint pixels.
    pub fn is_visual(self) -> bool {
        !matches!(self, Self::Audio)
    }
}

/// A named track within a scene. Stacking `position` defines paint order (lower paints first).
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Layer {
    /// Layer identifier.
    pub id: LayerId,
    /// Owning scene.
    pub scene: SceneId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Stacking position.
    pub position: i32,
    /// Content kind.
    pub kind: LayerKind,
    /// Hidden layers are skipped by export.
    #[serde(default = "default_true")]
    pub visible: bool,
    /// Exactly one layer per scene carries this flag.
    #[serde(default)]
    pub is_main: bool,
}

fn default_true() -> bool {
    true
}

/// Static transform baseline of a block.
///
/// Positions are normalized to the authoring canvas and anchor the block's center; rotations are in
/// degrees.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BlockTransform {
    /// Horizontal center in `[0, 1]`.
    pub pos_x: f64,
    /// Vertical center in `[0, 1]`.
    pub pos_y: f64,
    /// Horizontal scale, > 0.
    pub scale_x: f64,
    /// Vertical scale, > 0.
    pub scale_y: f64,
    /// In-plane rotation.
    pub rotation: f64,
    /// Tilt around the horizontal axis.
    pub rotation_x: f64,
    /// Tilt around the vertical axis.
    pub rotation_y: f64,
}

impl Default for BlockTransform {
    fn default() -> Self {
        Self {
            pos_x: 0.5,
            pos_y: 0.5,
            scale_x: 1.0,
            scale_y: 1.0,
            rotation: 0.0,
            rotation_x: 0.0,
            rotation_y: 0.0,
        }
    }
}

impl BlockTransform {
    /// Validate finiteness and positive scale.
    pub fn validate(&self) -> CutlineResult<()> {
        for (name, v) in [
            ("pos_x", self.pos_x),
            ("pos_y", self.pos_y),
            ("rotation", self.rotation),
            ("rotation_x", self.rotation_x),
            ("rotation_y", self.rotation_y),
        ] {
            if !v.is_finite() {
                return Err(CutlineError::validation(format!(
                    "transform {name} must be finite"
                )));
            }
        }
        if !(self.scale_x.is_finite() && self.scale_x > 0.0)
            || !(self.scale_y.is_finite() && self.scale_y > 0.0)
        {
            return Err(CutlineError::validation(
                "transform scale_x/scale_y must be finite and > 0",
            ));
        }
        Ok(())
    }
}

/// Static effects baseline of a block.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BlockEffects {
    /// Gaussian blur radius in authoring pixels, >= 0.
    pub blur: f64,
    /// Opacity in `[0, 1]`.
    pub opacity: f64,
    /// Multiplicative tint; white leaves the source unchanged.
    pub color: Color,
}

impl Default for BlockEffects {
    fn default() -> Self {
        Self {
            blur: 0.0,
            opacity: 1.0,
            color: Color::WHITE,
        }
    }
}

impl BlockEffects {
    /// Coerce blur and opacity into their documented ranges.
    pub fn clamped(self) -> CutlineResult<Self> {
        if !self.blur.is_finite() || !self.opacity.is_finite() {
            return Err(CutlineError::validation(
                "effects blur/opacity must be finite",
            ));
        }
        Ok(Self {
            blur: self.blur.max(0.0),
            opacity: self.opacity.clamp(0.0, 1.0),
            color: self.color,
        })
    }
}

/// Audio-only block parameters; ignored on visual layers.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AudioParams {
    /// Linear gain.
    pub volume: f64,
    /// Fade-in length in seconds.
    pub fade_in: f64,
    /// Fade-out length in seconds.
    pub fade_out: f64,
}

impl Default for AudioParams {
    fn default() -> Self {
        Self {
            volume: 1.0,
            fade_in: 0.0,
            fade_out: 0.0,
        }
    }
}

impl AudioParams {
    /// Validate gains and fade lengths.
    pub fn validate(&self) -> CutlineResult<()> {
        for (name, v) in [
            ("volume", self.volume),
            ("fade_in", self.fade_in),
            ("fade_out", self.fade_out),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(CutlineError::validation(format!(
                    "audio {name} must be finite and >= 0"
                )));
            }
        }
        Ok(())
    }
}

/// A timed clip on a layer, spanning `[start_time, end_time]` in scene seconds.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Block {
    /// Block identifier.
    pub id: BlockId,
    /// Owning layer.
    pub layer: LayerId,
    /// Referenced asset, if any.
    #[serde(default)]
    pub asset: Option<AssetId>,
    /// Start time in seconds.
    pub start_time: f64,
    /// End time in seconds; `end_time - start_time >= 0.5`.
    pub end_time: f64,
    /// Static transform.
    #[serde(default)]
    pub transform: BlockTransform,
    /// Static effects.
    #[serde(default)]
    pub effects: BlockEffects,
    /// Audio parameters (audio layers only).
    #[serde(default)]
    pub audio: AudioParams,
}

impl Block {
    /// Create a block with default transform, effects, and audio parameters.
    pub fn new(
        id: BlockId,
        layer: LayerId,
        asset: Option<AssetId>,
        start_time: f64,
        end_time: f64,
    ) -> Self {
        Self {
            id,
            layer,
            asset,
            start_time,
            end_time,
            transform: BlockTransform::default(),
            effects: BlockEffects::default(),
            audio: AudioParams::default(),
        }
    }

    /// Length in seconds.
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Return `true` when `t` lies inside the closed span.
    pub fn is_active_at(&self, t: f64) -> bool {
        self.start_time <= t && t <= self.end_time
    }

    /// Return `true` when the open interiors of the spans intersect; touching spans do not overlap.
    pub fn overlaps(&self, start_time: f64, end_time: f64) -> bool {
        self.start_time < end_time - crate::foundation::core::TIME_EPSILON
            && start_time < self.end_time - crate::foundation::core::TIME_EPSILON
    }

    /// Return `true` when `t` lies strictly inside the span.
    pub fn straddles(&self, t: f64) -> bool {
        self.start_time + crate::foundation::core::TIME_EPSILON < t
            && t < self.end_time - crate::foundation::core::TIME_EPSILON
    }
}

#[cfg(test)]
#[path = "../../tests/unit/model/scene.rs"]
mod tests;
