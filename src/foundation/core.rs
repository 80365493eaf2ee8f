use crate::foundation::error::{CutlineError, CutlineResult};

/// Minimum length of any block, in seconds.
pub const MIN_BLOCK_SECS: f64 = 0.5;

/// Tolerance used when comparing timeline positions in seconds.
pub const TIME_EPSILON: f64 = 1e-6;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(
            Clone,
            Copy,
            Debug,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($label, "#{}"), self.0)
            }
        }
    };
}

id_type!(
    /// Identifier of a scene in the project store.
    SceneId,
    "scene"
);
id_type!(
    /// Identifier of a layer (track) in the project store.
    LayerId,
    "layer"
);
id_type!(
    /// Identifier of a block (timed clip) in the project store.
    BlockId,
    "block"
);
id_type!(
    /// Identifier of a keyframe in the project store.
    KeyframeId,
    "keyframe"
);
id_type!(
    /// Identifier of an external asset.
    AssetId,
    "asset"
);

/// Return `true` when two timeline positions are equal within [`TIME_EPSILON`].
pub fn time_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= TIME_EPSILON
}

/// Validate that a caller-supplied time value is a finite number.
pub fn ensure_finite(value: f64, field: &str) -> CutlineResult<f64> {
    if !value.is_finite() {
        return Err(CutlineError::validation(format!(
            "{field} must be a finite number"
        )));
    }
    Ok(value)
}

/// Output frame rate as a rational `num/den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    /// Numerator.
    pub num: u32,
    /// Denominator, must be > 0.
    pub den: u32,
}

impl Fps {
    /// Create a validated frame rate.
    pub fn new(num: u32, den: u32) -> CutlineResult<Self> {
        if den == 0 {
            return Err(CutlineError::validation("fps den must be > 0"));
        }
        if num == 0 {
            return Err(CutlineError::validation("fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Integer frame rate shortcut.
    pub fn whole(num: u32) -> CutlineResult<Self> {
        Self::new(num, 1)
    }

    /// Frames per second as a float.
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Timeline time of frame `index`.
    pub fn frame_time(self, index: u64) -> f64 {
        (index as f64) * f64::from(self.den) / f64::from(self.num)
    }

    /// Number of frames needed to cover `secs`, rounded up.
    pub fn frames_to_cover(self, secs: f64) -> u64 {
        if secs <= 0.0 {
            return 0;
        }
        // Guard against `ceil` overshooting on values like 2.0000000000000004.
        let exact = secs * self.as_f64();
        let rounded = exact.round();
        if (exact - rounded).abs() <= TIME_EPSILON {
            rounded as u64
        } else {
            exact.ceil() as u64
        }
    }
}

/// Pixel dimensions of a raster or authoring surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Canvas {
    /// Create a validated, non-empty canvas.
    pub fn new(width: u32, height: u32) -> CutlineResult<Self> {
        if width == 0 || height == 0 {
            return Err(CutlineError::validation("canvas width/height must be > 0"));
        }
        Ok(Self { width, height })
    }

    /// Width divided by height.
    pub fn aspect(self) -> f64 {
        f64::from(self.width) / f64::from(self.height.max(1))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
