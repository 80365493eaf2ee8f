use crate::foundation::core::Canvas;
use crate::foundation::error::{CutlineError, CutlineResult};
use crate::model::scene::BlockTransform;

/// Largest even-sized canvas inside `width`x`height` with the authoring aspect ratio.
///
/// Even dimensions keep `yuv420p` encoders happy.
pub fn fit_output_canvas(design: Canvas, width: u32, height: u32) -> CutlineResult<Canvas> {
    if width < 2 || height < 2 {
        return Err(CutlineError::validation(format!(
            "output size {width}x{height} must be at least 2x2"
        )));
    }
    let aspect = design.aspect();
    let (w, h) = if f64::from(width) / f64::from(height) > aspect {
        (f64::from(height) * aspect, f64::from(height))
    } else {
        (f64::from(width), f64::from(width) / aspect)
    };
    let even = |v: f64, cap: u32| (((v + 1e-6).floor() as u32).min(cap) & !1).max(2);
    Ok(Canvas {
        width: even(w, width),
        height: even(h, height),
    })
}

/// Where one source image lands on the output canvas, before tilt and rotation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    /// Target width in output pixels.
    pub width: f64,
    /// Target height in output pixels.
    pub height: f64,
    /// Left edge in output pixels.
    pub left: f64,
    /// Top edge in output pixels.
    pub top: f64,
}

impl Placement {
    /// Horizontal center.
    pub fn center_x(&self) -> f64 {
        self.left + self.width / 2.0
    }

    /// Vertical center.
    pub fn center_y(&self) -> f64 {
        self.top + self.height / 2.0
    }
}

/// Map a block's normalized transform from the authoring canvas onto `output`.
///
/// The source is contain-fitted into the authoring canvas, scaled by the block scale, then
/// resampled by `output / design`. `pos_x`/`pos_y` place the center.
pub fn place(
    design: Canvas,
    output: Canvas,
    src_width: u32,
    src_height: u32,
    transform: &BlockTransform,
) -> Placement {
    let (dw, dh) = (f64::from(design.width), f64::from(design.height));
    let (ow, oh) = (f64::from(output.width), f64::from(output.height));
    let (sw, sh) = (f64::from(src_width.max(1)), f64::from(src_height.max(1)));

    let fit = (dw / sw).min(dh / sh);
    let width = sw * fit * transform.scale_x * (ow / dw);
    let height = sh * fit * transform.scale_y * (oh / dh);
    Placement {
        width,
        height,
        left: transform.pos_x * ow - width / 2.0,
        top: transform.pos_y * oh - height / 2.0,
    }
}

/// Scale a length authored on `design` to `output` (geometric mean of both axes).
pub fn scale_length(design: Canvas, output: Canvas, len: f64) -> f64 {
    let sx = f64::from(output.width) / f64::from(design.width);
    let sy = f64::from(output.height) / f64::from(design.height);
    len * (sx * sy).sqrt()
}

#[cfg(test)]
#[path = "../../tests/unit/render/layout.rs"]
mod tests;
