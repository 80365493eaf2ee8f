use crate::foundation::color::Color;
use crate::foundation::core::{BlockId, KeyframeId};
use crate::foundation::error::{CutlineError, CutlineResult};

/// Animatable property a keyframe overrides.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Property {
    /// Normalized center position.
    Pos,
    /// Horizontal/vertical scale.
    Scale,
    /// In-plane rotation and tilts.
    Rotation,
    /// Blur radius.
    Blur,
    /// Opacity.
    Opacity,
    /// Tint color.
    Color,
}

/// One scalar channel inside a property curve.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    /// `pos_x`
    PosX,
    /// `pos_y`
    PosY,
    /// `scale_x`
    ScaleX,
    /// `scale_y`
    ScaleY,
    /// `rotation`
    Rotation,
    /// `rotation_x`
    RotationX,
    /// `rotation_y`
    RotationY,
    /// `blur`
    Blur,
    /// `opacity`
    Opacity,
}

impl Channel {
    /// Property curve this channel belongs to.
    pub fn property(self) -> Property {
        match self {
            Self::PosX | Self::PosY => Property::Pos,
            Self::ScaleX | Self::ScaleY => Property::Scale,
            Self::Rotation | Self::RotationX | Self::RotationY => Property::Rotation,
            Self::Blur => Property::Blur,
            Self::Opacity => Property::Opacity,
        }
    }

    /// Return `true` for angular channels, which interpolate along the shortest arc.
    pub fn is_angle(self) -> bool {
        matches!(self, Self::Rotation | Self::RotationX | Self::RotationY)
    }
}

/// Value carried by a keyframe: exactly one property, tagged by `property`.
///
/// Rotation keys may set any subset of the three angles; an absent angle does not participate in
/// that angle's curve.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "property", rename_all = "snake_case")]
pub enum KeyframeValue {
    /// Center position.
    Pos {
        /// `pos_x`
        x: f64,
        /// `pos_y`
        y: f64,
    },
    /// Scale.
    Scale {
        /// `scale_x`
        x: f64,
        /// `scale_y`
        y: f64,
    },
    /// Rotation angles in degrees.
    Rotation {
        /// In-plane rotation.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rotation: Option<f64>,
        /// Tilt around the horizontal axis.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rotation_x: Option<f64>,
        /// Tilt around the vertical axis.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rotation_y: Option<f64>,
    },
    /// Blur radius.
    Blur {
        /// Radius in authoring pixels.
        value: f64,
    },
    /// Opacity.
    Opacity {
        /// Opacity in `[0, 1]`.
        value: f64,
    },
    /// Tint color.
    Color {
        /// Color value.
        color: Color,
    },
}

impl KeyframeValue {
    /// Property this value animates.
    pub fn property(&self) -> Property {
        match self {
            Self::Pos { .. } => Property::Pos,
            Self::Scale { .. } => Property::Scale,
            Self::Rotation { .. } => Property::Rotation,
            Self::Blur { .. } => Property::Blur,
            Self::Opacity { .. } => Property::Opacity,
            Self::Color { .. } => Property::Color,
        }
    }

    /// Scalar value for `channel`, or `None` when this key does not carry it.
    pub fn scalar(&self, channel: Channel) -> Option<f64> {
        match (self, channel) {
            (Self::Pos { x, .. }, Channel::PosX) => Some(*x),
            (Self::Pos { y, .. }, Channel::PosY) => Some(*y),
            (Self::Scale { x, .. }, Channel::ScaleX) => Some(*x),
            (Self::Scale { y, .. }, Channel::ScaleY) => Some(*y),
            (Self::Rotation { rotation, .. }, Channel::Rotation) => *rotation,
            (Self::Rotation { rotation_x, .. }, Channel::RotationX) => *rotation_x,
            (Self::Rotation { rotation_y, .. }, Channel::RotationY) => *rotation_y,
            (Self::Blur { value }, Channel::Blur) => Some(*value),
            (Self::Opacity { value }, Channel::Opacity) => Some(*value),
            _ => None,
        }
    }

    /// Color carried by a color key.
    pub fn color(&self) -> Option<Color> {
        match self {
            Self::Color { color } => Some(*color),
            _ => None,
        }
    }

    /// Reject non-finite numbers and non-positive scales.
    pub fn validate(&self) -> CutlineResult<()> {
        let finite = |v: f64, name: &str| -> CutlineResult<()> {
            if v.is_finite() {
                Ok(())
            } else {
                Err(CutlineError::validation(format!(
                    "keyframe {name} must be finite"
                )))
            }
        };
        match self {
            Self::Pos { x, y } => {
                finite(*x, "pos x")?;
                finite(*y, "pos y")
            }
            Self::Scale { x, y } => {
                if !(x.is_finite() && *x > 0.0 && y.is_finite() && *y > 0.0) {
                    return Err(CutlineError::validation(
                        "keyframe scale must be finite and > 0",
                    ));
                }
                Ok(())
            }
            Self::Rotation {
                rotation,
                rotation_x,
                rotation_y,
            } => {
                if rotation.is_none() && rotation_x.is_none() && rotation_y.is_none() {
                    return Err(CutlineError::validation(
                        "rotation keyframe must set at least one angle",
                    ));
                }
                for v in [rotation, rotation_x, rotation_y].into_iter().flatten() {
                    finite(*v, "rotation")?;
                }
                Ok(())
            }
            Self::Blur { value } => finite(*value, "blur"),
            Self::Opacity { value } => finite(*value, "opacity"),
            Self::Color { .. } => Ok(()),
        }
    }
}

/// A timed override of one property on one block.
///
/// `time` is absolute scene time; moving the owning block moves its keyframes by the same delta.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Keyframe {
    /// Keyframe identifier.
    pub id: KeyframeId,
    /// Owning block.
    pub block: BlockId,
    /// Absolute scene time in seconds.
    pub time: f64,
    /// Property value.
    #[serde(flatten)]
    pub value: KeyframeValue,
}

impl Keyframe {
    /// Property this keyframe animates.
    pub fn property(&self) -> Property {
        self.value.property()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/model/keyframe.rs"]
mod tests;
