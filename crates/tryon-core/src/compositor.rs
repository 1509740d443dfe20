//! Overlay compositing.
//!
//! Draws one RGBA overlay onto a base frame under an [`OverlayTransform`]:
//! centered at the transform position, rotated and uniformly scaled about
//! the overlay's own center. Implemented as an inverse-mapped similarity
//! warp with bilinear sampling and source-over alpha blending, so each
//! output pixel is computed exactly once and the inputs are never mutated.

use image::{Rgba, RgbaImage};
use thiserror::Error;

use crate::types::OverlayTransform;

#[derive(Error, Debug)]
pub enum CompositeError {
    #[error("image decode failed: {0}")]
    Decode(#[source] image::ImageError),
    #[error("png encode failed: {0}")]
    Encode(#[source] image::ImageError),
}

/// Decode an encoded image (any format `image` recognizes) into RGBA.
pub fn decode_image(bytes: &[u8]) -> Result<RgbaImage, CompositeError> {
    let img = image::load_from_memory(bytes).map_err(CompositeError::Decode)?;
    Ok(img.to_rgba8())
}

/// Encode an RGBA buffer as PNG.
pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>, CompositeError> {
    let mut out = Vec::new();
    img.write_to(
        &mut std::io::Cursor::new(&mut out),
        image::ImageFormat::Png,
    )
    .map_err(CompositeError::Encode)?;
    Ok(out)
}

/// Composite `overlay` onto a copy of `base` under `transform`.
///
/// The overlay is drawn centered at `(transform.x, transform.y)`, rotated
/// by `transform.rotation_degrees` and scaled by `transform.scale`, both
/// about the overlay's center. Pixels outside the overlay's footprint are
/// bit-identical to the base. A degenerate scale (≈ 0) draws nothing.
pub fn composite(
    base: &RgbaImage,
    overlay: &RgbaImage,
    transform: &OverlayTransform,
) -> RgbaImage {
    let mut out = base.clone();

    let (ow, oh) = overlay.dimensions();
    if ow == 0 || oh == 0 {
        return out;
    }

    // Similarity matrix M = s·R mapping overlay-centered coordinates into
    // the base frame: [a, -b; b, a] with a = s·cosθ, b = s·sinθ.
    let theta = transform.rotation_degrees.to_radians();
    let a = transform.scale * theta.cos();
    let b = transform.scale * theta.sin();

    // Invert the 2×2 part, det = a² + b² = s².
    let det = a * a + b * b;
    if det < 1e-12 {
        return out;
    }
    let ia = a / det;
    let ib = b / det;

    let cx = ow as f32 / 2.0;
    let cy = oh as f32 / 2.0;

    // Destination footprint: transformed overlay corners, clipped to base.
    let half_w = ow as f32 / 2.0;
    let half_h = oh as f32 / 2.0;
    let mut min_x = f32::INFINITY;
    let mut min_y = f32::INFINITY;
    let mut max_x = f32::NEG_INFINITY;
    let mut max_y = f32::NEG_INFINITY;
    for (sx, sy) in [
        (-half_w, -half_h),
        (half_w, -half_h),
        (-half_w, half_h),
        (half_w, half_h),
    ] {
        let dx = a * sx - b * sy + transform.x;
        let dy = b * sx + a * sy + transform.y;
        min_x = min_x.min(dx);
        min_y = min_y.min(dy);
        max_x = max_x.max(dx);
        max_y = max_y.max(dy);
    }

    let (bw, bh) = base.dimensions();
    if bw == 0 || bh == 0 {
        return out;
    }
    let x0 = min_x.floor().max(0.0) as u32;
    let y0 = min_y.floor().max(0.0) as u32;
    let x1 = (max_x.ceil().max(0.0) as u32).min(bw.saturating_sub(1));
    let y1 = (max_y.ceil().max(0.0) as u32).min(bh.saturating_sub(1));
    if x0 > x1 || y0 > y1 {
        return out;
    }

    for oy in y0..=y1 {
        for ox in x0..=x1 {
            // Inverse map: src = M⁻¹ · (dst − t) + overlay center.
            let dx = ox as f32 - transform.x;
            let dy = oy as f32 - transform.y;
            let sx = ia * dx + ib * dy + cx;
            let sy = -ib * dx + ia * dy + cy;

            let Some(src) = sample_bilinear(overlay, sx, sy) else {
                continue;
            };
            if src[3] == 0 {
                continue;
            }

            let dst = out.get_pixel(ox, oy);
            out.put_pixel(ox, oy, blend_over(src, *dst));
        }
    }

    out
}

/// Bilinearly sample RGBA at a fractional position.
///
/// Out-of-bounds taps contribute fully transparent pixels; returns `None`
/// when the position is entirely outside the image.
fn sample_bilinear(img: &RgbaImage, sx: f32, sy: f32) -> Option<Rgba<u8>> {
    let (w, h) = img.dimensions();
    if sx < -1.0 || sy < -1.0 || sx > w as f32 || sy > h as f32 {
        return None;
    }

    let x0 = sx.floor() as i64;
    let y0 = sy.floor() as i64;
    let fx = sx - x0 as f32;
    let fy = sy - y0 as f32;

    let tap = |x: i64, y: i64| -> [f32; 4] {
        if x >= 0 && x < w as i64 && y >= 0 && y < h as i64 {
            let p = img.get_pixel(x as u32, y as u32);
            [p[0] as f32, p[1] as f32, p[2] as f32, p[3] as f32]
        } else {
            [0.0; 4]
        }
    };

    let tl = tap(x0, y0);
    let tr = tap(x0 + 1, y0);
    let bl = tap(x0, y0 + 1);
    let br = tap(x0 + 1, y0 + 1);

    let mut px = [0u8; 4];
    for c in 0..4 {
        let top = tl[c] * (1.0 - fx) + tr[c] * fx;
        let bot = bl[c] * (1.0 - fx) + br[c] * fx;
        px[c] = (top * (1.0 - fy) + bot * fy).round().clamp(0.0, 255.0) as u8;
    }
    Some(Rgba(px))
}

/// Source-over blend of `src` onto `dst`.
fn blend_over(src: Rgba<u8>, dst: Rgba<u8>) -> Rgba<u8> {
    let sa = src[3] as f32 / 255.0;
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let mut out = [0u8; 4];
    for c in 0..3 {
        let v = (src[c] as f32 * sa + dst[c] as f32 * da * (1.0 - sa)) / out_a;
        out[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgba(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, px: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba(px))
    }

    fn identity_at(x: f32, y: f32) -> OverlayTransform {
        OverlayTransform {
            x,
            y,
            scale: 1.0,
            rotation_degrees: 0.0,
        }
    }

    #[test]
    fn overlay_lands_centered() {
        let base = solid(64, 64, [10, 20, 30, 255]);
        let overlay = solid(8, 8, [200, 0, 0, 255]);
        let out = composite(&base, &overlay, &identity_at(32.0, 32.0));

        assert_eq!(out.get_pixel(32, 32), &Rgba([200, 0, 0, 255]));
        // Well outside the 8×8 footprint: untouched base.
        assert_eq!(out.get_pixel(5, 5), &Rgba([10, 20, 30, 255]));
        assert_eq!(out.get_pixel(60, 60), &Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn base_is_not_mutated() {
        let base = solid(32, 32, [1, 2, 3, 255]);
        let overlay = solid(8, 8, [255, 255, 255, 255]);
        let before = base.clone();
        let _ = composite(&base, &overlay, &identity_at(16.0, 16.0));
        assert_eq!(base, before);
    }

    #[test]
    fn compositing_is_idempotent() {
        let base = solid(48, 48, [40, 40, 40, 255]);
        let overlay = solid(10, 6, [0, 120, 240, 180]);
        let t = OverlayTransform {
            x: 24.0,
            y: 20.0,
            scale: 1.5,
            rotation_degrees: 30.0,
        };
        let first = composite(&base, &overlay, &t);
        let second = composite(&base, &overlay, &t);
        assert_eq!(first, second);
    }

    #[test]
    fn transparent_overlay_leaves_base_identical() {
        let base = solid(32, 32, [9, 9, 9, 255]);
        let overlay = solid(16, 16, [255, 0, 0, 0]);
        let out = composite(&base, &overlay, &identity_at(16.0, 16.0));
        assert_eq!(out, base);
    }

    #[test]
    fn zero_scale_draws_nothing() {
        let base = solid(32, 32, [7, 7, 7, 255]);
        let overlay = solid(16, 16, [255, 255, 255, 255]);
        let t = OverlayTransform {
            x: 16.0,
            y: 16.0,
            scale: 0.0,
            rotation_degrees: 0.0,
        };
        assert_eq!(composite(&base, &overlay, &t), base);
    }

    #[test]
    fn scale_grows_footprint() {
        let base = solid(64, 64, [0, 0, 0, 255]);
        let overlay = solid(8, 8, [255, 255, 255, 255]);

        let small = composite(&base, &overlay, &identity_at(32.0, 32.0));
        let t2 = OverlayTransform {
            x: 32.0,
            y: 32.0,
            scale: 2.0,
            rotation_degrees: 0.0,
        };
        let big = composite(&base, &overlay, &t2);

        let lit = |img: &RgbaImage| img.pixels().filter(|p| p[0] > 128).count();
        let small_lit = lit(&small);
        let big_lit = lit(&big);
        // 2x uniform scale quadruples the covered area (within sampling slop).
        assert!(
            big_lit > 3 * small_lit,
            "small = {small_lit}, big = {big_lit}"
        );
    }

    #[test]
    fn rotation_90_swaps_extent() {
        let base = solid(64, 64, [0, 0, 0, 255]);
        // Wide, short overlay: 20×4.
        let overlay = solid(20, 4, [255, 255, 255, 255]);
        let t = OverlayTransform {
            x: 32.0,
            y: 32.0,
            scale: 1.0,
            rotation_degrees: 90.0,
        };
        let out = composite(&base, &overlay, &t);

        // After a quarter turn the long axis is vertical.
        assert!(out.get_pixel(32, 24)[0] > 128, "expected lit above center");
        assert!(out.get_pixel(32, 40)[0] > 128, "expected lit below center");
        assert_eq!(out.get_pixel(24, 32)[0], 0, "expected dark left of center");
        assert_eq!(out.get_pixel(40, 32)[0], 0, "expected dark right of center");
    }

    #[test]
    fn offscreen_overlay_is_clipped() {
        let base = solid(32, 32, [5, 5, 5, 255]);
        let overlay = solid(8, 8, [255, 255, 255, 255]);
        let out = composite(&base, &overlay, &identity_at(-100.0, -100.0));
        assert_eq!(out, base);
    }

    #[test]
    fn decode_rejects_garbage() {
        let err = decode_image(&[0xde, 0xad, 0xbe, 0xef]).unwrap_err();
        assert!(matches!(err, CompositeError::Decode(_)));
    }

    #[test]
    fn encode_decode_preserves_dimensions() {
        let img = solid(12, 7, [1, 2, 3, 255]);
        let png = encode_png(&img).unwrap();
        let back = decode_image(&png).unwrap();
        assert_eq!(back.dimensions(), (12, 7));
    }
}
