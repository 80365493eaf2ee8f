use kurbo::{Affine, Point, Rect};

use crate::foundation::color::Color;
use crate::foundation::core::Canvas;
use crate::foundation::error::{CutlineError, CutlineResult};

/// Premultiplied RGBA8 pixel.
pub type PremulRgba8 = [u8; 4];

/// Cosine below which a tilted layer is treated as edge-on and skipped.
const EDGE_ON_COS: f64 = 1e-3;

/// One source image positioned on the output canvas.
#[derive(Clone, Copy, Debug)]
pub struct CompositeLayer<'a> {
    /// Straight-alpha source pixels.
    pub image: &'a image::RgbaImage,
    /// Target width in output pixels, before tilt.
    pub width: f64,
    /// Target height in output pixels, before tilt.
    pub height: f64,
    /// Left edge of the untransformed target box.
    pub left: f64,
    /// Top edge of the untransformed target box.
    pub top: f64,
    /// In-plane rotation about the box center, degrees clockwise.
    pub rotation: f64,
    /// Tilt about the horizontal axis, degrees; foreshortens height.
    pub tilt_x: f64,
    /// Tilt about the vertical axis, degrees; foreshortens width.
    pub tilt_y: f64,
    /// Gaussian blur sigma in output pixels; 0 disables.
    pub blur: f64,
    /// Layer opacity in `[0, 1]`.
    pub opacity: f64,
    /// Multiplicative tint; white leaves the source unchanged.
    pub tint: Color,
}

/// Merges positioned layers into one raster.
pub trait Compositor {
    /// Paint `layers` in order over an opaque `background` of size `base`.
    ///
    /// Returns straight-alpha RGBA8.
    fn composite(
        &mut self,
        base: Canvas,
        background: [u8; 4],
        layers: &[CompositeLayer<'_>],
    ) -> CutlineResult<image::RgbaImage>;
}

/// Software compositor over premultiplied RGBA8 buffers.
#[derive(Clone, Copy, Debug, Default)]
pub struct CpuCompositor;

impl Compositor for CpuCompositor {
    fn composite(
        &mut self,
        base: Canvas,
        background: [u8; 4],
        layers: &[CompositeLayer<'_>],
    ) -> CutlineResult<image::RgbaImage> {
        let mut dst = image::RgbaImage::from_pixel(
            base.width,
            base.height,
            image::Rgba(premultiply(background)),
        );
        for layer in layers {
            draw_layer(&mut dst, layer)?;
        }
        for px in dst.pixels_mut() {
            px.0 = unpremultiply(px.0);
        }
        Ok(dst)
    }
}

/// Paint one layer by inverse-mapping output pixels into the source.
///
/// A source larger than its target box is shrunk first. Scaling up, tilt mirroring and rotation
/// are applied through the inverse affine and never allocate.
fn draw_layer(dst: &mut image::RgbaImage, layer: &CompositeLayer<'_>) -> CutlineResult<()> {
    if layer.opacity <= 0.0 || layer.width <= 0.0 || layer.height <= 0.0 {
        return Ok(());
    }
    let (iw, ih) = layer.image.dimensions();
    if iw == 0 || ih == 0 {
        return Ok(());
    }
    let cos_y = layer.tilt_y.to_radians().cos();
    let cos_x = layer.tilt_x.to_radians().cos();
    if cos_y.abs() < EDGE_ON_COS || cos_x.abs() < EDGE_ON_COS {
        return Ok(());
    }

    let w = layer.width * cos_y.abs();
    let h = layer.height * cos_x.abs();
    if w.round() < 1.0 || h.round() < 1.0 {
        return Ok(());
    }

    let rw = (w.round() as u32).clamp(1, iw);
    let rh = (h.round() as u32).clamp(1, ih);
    let mut src = if (rw, rh) == (iw, ih) {
        layer.image.clone()
    } else {
        image::imageops::resize(layer.image, rw, rh, image::imageops::FilterType::Triangle)
    };

    let tint = layer.tint.to_rgba8();
    for px in src.pixels_mut() {
        px.0 = premultiply(tint_px(px.0, tint));
    }

    // Source pixels per output pixel along each axis.
    let (kx, ky) = (f64::from(rw) / w, f64::from(rh) / h);
    let src = if layer.blur > 0.0 {
        blur_padded(&src, layer.blur * kx, layer.blur * ky)?
    } else {
        src
    };

    let center = Point::new(
        layer.left + layer.width / 2.0,
        layer.top + layer.height / 2.0,
    );
    let (sw, sh) = (f64::from(src.width()), f64::from(src.height()));
    // Tilting past 90 degrees shows the back face.
    let sx = cos_y.signum() / kx;
    let sy = cos_x.signum() / ky;
    let to_dst = Affine::translate(center.to_vec2())
        * Affine::rotate(layer.rotation.to_radians())
        * Affine::scale_non_uniform(sx, sy)
        * Affine::translate((-sw / 2.0, -sh / 2.0));
    let to_src = to_dst.inverse();

    let bbox = to_dst
        .transform_rect_bbox(Rect::new(0.0, 0.0, sw, sh))
        .intersect(Rect::new(
            0.0,
            0.0,
            f64::from(dst.width()),
            f64::from(dst.height()),
        ));
    if bbox.is_zero_area() {
        return Ok(());
    }
    tracing::trace!(w, h, sx, sy, rotation = layer.rotation, "draw layer");

    let opacity = layer.opacity.clamp(0.0, 1.0) as f32;
    let (x0, y0) = (bbox.x0.floor() as u32, bbox.y0.floor() as u32);
    let (x1, y1) = (bbox.x1.ceil() as u32, bbox.y1.ceil() as u32);
    for y in y0..y1.min(dst.height()) {
        for x in x0..x1.min(dst.width()) {
            let p = to_src * Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
            let Some(s) = sample_bilinear(&src, p.x, p.y) else {
                continue;
            };
            let d = dst.get_pixel_mut(x, y);
            d.0 = over(d.0, s, opacity);
        }
    }
    Ok(())
}

/// Bilinear sample of a premultiplied image at pixel-space `(x, y)`; `None` outside.
fn sample_bilinear(img: &image::RgbaImage, x: f64, y: f64) -> Option<PremulRgba8> {
    let (w, h) = (f64::from(img.width()), f64::from(img.height()));
    if x < 0.0 || y < 0.0 || x >= w || y >= h {
        return None;
    }
    let fx = (x - 0.5).clamp(0.0, w - 1.0);
    let fy = (y - 0.5).clamp(0.0, h - 1.0);
    let (ix, iy) = (fx.floor() as u32, fy.floor() as u32);
    let ix1 = (ix + 1).min(img.width() - 1);
    let iy1 = (iy + 1).min(img.height() - 1);
    let (tx, ty) = (fx - f64::from(ix), fy - f64::from(iy));

    let p00 = img.get_pixel(ix, iy).0;
    let p10 = img.get_pixel(ix1, iy).0;
    let p01 = img.get_pixel(ix, iy1).0;
    let p11 = img.get_pixel(ix1, iy1).0;
    let mut out = [0u8; 4];
    for c in 0..4 {
        let top = f64::from(p00[c]) * (1.0 - tx) + f64::from(p10[c]) * tx;
        let bottom = f64::from(p01[c]) * (1.0 - tx) + f64::from(p11[c]) * tx;
        out[c] = (top * (1.0 - ty) + bottom * ty).round().clamp(0.0, 255.0) as u8;
    }
    Some(out)
}

fn tint_px(px: [u8; 4], tint: [u8; 4]) -> [u8; 4] {
    [
        mul_div255(u16::from(px[0]), u16::from(tint[0])),
        mul_div255(u16::from(px[1]), u16::from(tint[1])),
        mul_div255(u16::from(px[2]), u16::from(tint[2])),
        mul_div255(u16::from(px[3]), u16::from(tint[3])),
    ]
}

/// Convert straight alpha to premultiplied.
pub fn premultiply(px: [u8; 4]) -> PremulRgba8 {
    let a = u16::from(px[3]);
    [
        mul_div255(u16::from(px[0]), a),
        mul_div255(u16::from(px[1]), a),
        mul_div255(u16::from(px[2]), a),
        px[3],
    ]
}

/// Convert premultiplied back to straight alpha.
pub fn unpremultiply(px: PremulRgba8) -> [u8; 4] {
    let a = u32::from(px[3]);
    match a {
        0 => [0, 0, 0, 0],
        255 => px,
        _ => {
            let un = |c: u8| ((u32::from(c) * 255 + a / 2) / a).min(255) as u8;
            [un(px[0]), un(px[1]), un(px[2]), px[3]]
        }
    }
}

/// Source-over of premultiplied pixels with an extra layer opacity.
pub fn over(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 || src[3] == 0 {
        return dst;
    }

    let op = ((opacity * 255.0).round() as i32).clamp(0, 255) as u16;
    let sa = mul_div255(u16::from(src[3]), op);
    if sa == 0 {
        return dst;
    }

    let inv = 255u16 - u16::from(sa);
    let mut out = [0u8; 4];
    out[3] = sa.saturating_add(mul_div255(u16::from(dst[3]), inv));
    for i in 0..3 {
        let sc = mul_div255(u16::from(src[i]), op);
        let dc = mul_div255(u16::from(dst[i]), inv);
        out[i] = sc.saturating_add(dc);
    }
    out
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

/// Pad with transparent pixels so the blur can spread past the edges, then blur each axis.
///
/// The padded image keeps the source center.
fn blur_padded(
    src: &image::RgbaImage,
    sigma_x: f64,
    sigma_y: f64,
) -> CutlineResult<image::RgbaImage> {
    let radius = |sigma: f64| (sigma * 3.0).ceil().clamp(1.0, 256.0) as u32;
    let (rx, ry) = (radius(sigma_x), radius(sigma_y));
    let (w, h) = (src.width() + 2 * rx, src.height() + 2 * ry);
    let mut padded = image::RgbaImage::new(w, h);
    image::imageops::replace(&mut padded, src, i64::from(rx), i64::from(ry));

    let kernel_x = gaussian_kernel_q16(rx, sigma_x as f32)?;
    let kernel_y = gaussian_kernel_q16(ry, sigma_y as f32)?;
    let out = blur_separable(padded.as_raw(), w, h, &kernel_x, &kernel_y)?;
    image::RgbaImage::from_raw(w, h, out)
        .ok_or_else(|| CutlineError::compositing("blur produced a mis-sized buffer"))
}

/// Separable gaussian blur over premultiplied RGBA8 with a Q16 fixed-point kernel.
pub fn blur_rgba8_premul(
    src: &[u8],
    width: u32,
    height: u32,
    radius: u32,
    sigma: f32,
) -> CutlineResult<Vec<u8>> {
    if radius == 0 {
        check_len(src, width, height)?;
        return Ok(src.to_vec());
    }
    let kernel = gaussian_kernel_q16(radius, sigma)?;
    blur_separable(src, width, height, &kernel, &kernel)
}

fn check_len(src: &[u8], width: u32, height: u32) -> CutlineResult<usize> {
    let expected_len = (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(4))
        .ok_or_else(|| CutlineError::compositing("blur buffer size overflow"))?;
    if src.len() != expected_len {
        return Err(CutlineError::compositing(
            "blur expects a buffer matching width*height*4",
        ));
    }
    Ok(expected_len)
}

fn blur_separable(
    src: &[u8],
    width: u32,
    height: u32,
    kernel_x: &[u32],
    kernel_y: &[u32],
) -> CutlineResult<Vec<u8>> {
    let len = check_len(src, width, height)?;
    let mut tmp = vec![0u8; len];
    let mut out = vec![0u8; len];
    blur_pass(src, &mut tmp, width, height, kernel_x, true);
    blur_pass(&tmp, &mut out, width, height, kernel_y, false);
    Ok(out)
}

fn gaussian_kernel_q16(radius: u32, sigma: f32) -> CutlineResult<Vec<u32>> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(CutlineError::validation("blur sigma must be > 0"));
    }

    let r = radius as i32;
    let sigma = f64::from(sigma);
    let denom = 2.0 * sigma * sigma;
    let weights_f: Vec<f64> = (-r..=r)
        .map(|i| (-f64::from(i * i) / denom).exp())
        .collect();
    let sum: f64 = weights_f.iter().sum();
    if sum <= 0.0 {
        return Err(CutlineError::compositing("gaussian kernel sum is zero"));
    }

    let mut weights: Vec<u32> = weights_f
        .iter()
        .map(|wf| ((wf / sum) * 65536.0).round().clamp(0.0, 65536.0) as u32)
        .collect();
    // Push rounding drift into the center tap so the kernel sums to exactly 1.0.
    let acc: i64 = weights.iter().map(|&w| i64::from(w)).sum();
    let mid = weights.len() / 2;
    weights[mid] = (i64::from(weights[mid]) + 65536 - acc).clamp(0, 65536) as u32;
    Ok(weights)
}

fn blur_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32], horizontal: bool) {
    let radius = (k.len() / 2) as i32;
    let (w, h) = (width as i32, height as i32);
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let d = ki as i32 - radius;
                let (sx, sy) = if horizontal {
                    ((x + d).clamp(0, w - 1), y)
                } else {
                    (x, (y + d).clamp(0, h - 1))
                };
                let idx = ((sy * w + sx) as usize) * 4;
                for c in 0..4 {
                    acc[c] += u64::from(kw) * u64::from(src[idx + c]);
                }
            }
            let out_idx = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                dst[out_idx + c] = (((acc[c] + 32768) >> 16).min(255)) as u8;
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/compositor.rs"]
mod tests;
