use std::fmt;
use std::str::FromStr;

use crate::foundation::error::{CutlineError, CutlineResult};

/// Straight-alpha RGBA color with every channel normalized to `[0, 1]`.
///
/// Serialized as a hex string (`#RRGGBB` when opaque, `#RRGGBBAA` otherwise). Parsing also accepts
/// the CSS functional forms `rgb(r,g,b)` and `rgba(r,g,b,a)` with 0-255 channels and `a` in
/// `[0, 1]`, which is the form produced by [`Color::to_css`].
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    /// Red.
    pub r: f64,
    /// Green.
    pub g: f64,
    /// Blue.
    pub b: f64,
    /// Alpha.
    pub a: f64,
}

impl Color {
    /// Opaque white; used as the no-op tint.
    pub const WHITE: Self = Self::rgba(1.0, 1.0, 1.0, 1.0);

    /// Opaque black.
    pub const BLACK: Self = Self::rgba(0.0, 0.0, 0.0, 1.0);

    /// Build a color from normalized channels.
    pub const fn rgba(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }

    /// Build a color from 8-bit straight-alpha channels.
    pub fn from_rgba8(px: [u8; 4]) -> Self {
        Self::rgba(
            f64::from(px[0]) / 255.0,
            f64::from(px[1]) / 255.0,
            f64::from(px[2]) / 255.0,
            f64::from(px[3]) / 255.0,
        )
    }

    /// Decode `#RRGGBB` or `#RRGGBBAA` (leading `#` optional, case-insensitive).
    pub fn from_hex(s: &str) -> CutlineResult<Self> {
        let s = s.trim();
        let s = s.strip_prefix('#').unwrap_or(s);
        if !s.is_ascii() {
            return Err(CutlineError::validation(format!(
                "hex color \"{s}\" must be ASCII"
            )));
        }

        fn hex_byte(pair: &str) -> CutlineResult<u8> {
            u8::from_str_radix(pair, 16)
                .map_err(|_| CutlineError::validation(format!("invalid hex byte \"{pair}\"")))
        }

        let (r, g, b, a) = match s.len() {
            6 => (
                hex_byte(&s[0..2])?,
                hex_byte(&s[2..4])?,
                hex_byte(&s[4..6])?,
                255,
            ),
            8 => (
                hex_byte(&s[0..2])?,
                hex_byte(&s[2..4])?,
                hex_byte(&s[4..6])?,
                hex_byte(&s[6..8])?,
            ),
            _ => {
                return Err(CutlineError::validation(
                    "hex color must be #RRGGBB or #RRGGBBAA (case-insensitive)",
                ));
            }
        };
        Ok(Self::from_rgba8([r, g, b, a]))
    }

    fn from_css_fn(s: &str) -> CutlineResult<Self> {
        let s = s.trim();
        let (body, has_alpha) = if let Some(rest) = s.strip_prefix("rgba(") {
            (rest, true)
        } else if let Some(rest) = s.strip_prefix("rgb(") {
            (rest, false)
        } else {
            return Err(CutlineError::validation(format!(
                "unrecognized color \"{s}\""
            )));
        };
        let body = body
            .strip_suffix(')')
            .ok_or_else(|| CutlineError::validation(format!("unterminated color \"{s}\"")))?;
        let parts = body
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<f64>()
                    .map_err(|_| CutlineError::validation(format!("invalid color channel \"{p}\"")))
            })
            .collect::<CutlineResult<Vec<_>>>()?;
        let expected = if has_alpha { 4 } else { 3 };
        if parts.len() != expected {
            return Err(CutlineError::validation(format!(
                "color \"{s}\" must have {expected} channels"
            )));
        }
        let alpha = if has_alpha { parts[3] } else { 1.0 };
        Ok(Self::rgba(
            (parts[0] / 255.0).clamp(0.0, 1.0),
            (parts[1] / 255.0).clamp(0.0, 1.0),
            (parts[2] / 255.0).clamp(0.0, 1.0),
            alpha.clamp(0.0, 1.0),
        ))
    }

    /// 8-bit straight-alpha channels, rounded.
    pub fn to_rgba8(self) -> [u8; 4] {
        fn to_u8(x: f64) -> u8 {
            (x.clamp(0.0, 1.0) * 255.0).round() as u8
        }
        [to_u8(self.r), to_u8(self.g), to_u8(self.b), to_u8(self.a)]
    }

    /// Hex encoding; alpha is only emitted when the color is not opaque.
    pub fn to_hex(self) -> String {
        let [r, g, b, a] = self.to_rgba8();
        if a == 255 {
            format!("#{r:02X}{g:02X}{b:02X}")
        } else {
            format!("#{r:02X}{g:02X}{b:02X}{a:02X}")
        }
    }

    /// CSS `rgba(r,g,b,a)` encoding with 0-255 channels.
    pub fn to_css(self) -> String {
        let [r, g, b, _] = self.to_rgba8();
        let a = (self.a.clamp(0.0, 1.0) * 1000.0).round() / 1000.0;
        format!("rgba({r},{g},{b},{a})")
    }

    /// Per-channel linear interpolation.
    pub fn lerp(a: Self, b: Self, t: f64) -> Self {
        fn mix(x: f64, y: f64, t: f64) -> f64 {
            x + (y - x) * t
        }
        Self::rgba(
            mix(a.r, b.r, t),
            mix(a.g, b.g, t),
            mix(a.b, b.b, t),
            mix(a.a, b.a, t),
        )
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl FromStr for Color {
    type Err = CutlineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.starts_with("rgb") {
            Self::from_css_fn(trimmed)
        } else {
            Self::from_hex(trimmed)
        }
    }
}

impl TryFrom<String> for Color {
    type Error = CutlineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(c: Color) -> Self {
        c.to_hex()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_css())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/color.rs"]
mod tests;
