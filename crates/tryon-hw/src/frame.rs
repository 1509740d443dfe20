//! Frame type and pixel conversion — YUYV decoding and preview mirroring.

/// A captured RGB camera frame.
#[derive(Clone)]
pub struct Frame {
    /// Tightly packed RGB24 pixel data (width * height * 3 bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: std::time::Instant,
    pub sequence: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid buffer length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Convert packed YUYV (4:2:2) to RGB24 using BT.601 full-range math.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V] with U/V shared
/// across the pair.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let expected = (width * height * 2) as usize;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for chunk in yuyv[..expected].chunks_exact(4) {
        let [y0, u, y1, v] = [chunk[0], chunk[1], chunk[2], chunk[3]];
        push_yuv_pixel(&mut rgb, y0, u, v);
        push_yuv_pixel(&mut rgb, y1, u, v);
    }
    Ok(rgb)
}

fn push_yuv_pixel(rgb: &mut Vec<u8>, y: u8, u: u8, v: u8) {
    let c = y as f32 - 16.0;
    let d = u as f32 - 128.0;
    let e = v as f32 - 128.0;

    let r = 1.164 * c + 1.596 * e;
    let g = 1.164 * c - 0.392 * d - 0.813 * e;
    let b = 1.164 * c + 2.017 * d;

    rgb.push(r.round().clamp(0.0, 255.0) as u8);
    rgb.push(g.round().clamp(0.0, 255.0) as u8);
    rgb.push(b.round().clamp(0.0, 255.0) as u8);
}

/// Mirror an RGB24 frame horizontally in place.
///
/// The live preview is mirrored like a bathroom mirror; placement math
/// downstream assumes frames arrive already flipped.
pub fn mirror_rgb(rgb: &mut [u8], width: u32, height: u32) -> Result<(), FrameError> {
    let w = width as usize;
    let expected = w * height as usize * 3;
    if rgb.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: rgb.len(),
        });
    }

    for row in rgb[..expected].chunks_exact_mut(w * 3) {
        let mut left = 0usize;
        let mut right = w - 1;
        while left < right {
            for c in 0..3 {
                row.swap(left * 3 + c, right * 3 + c);
            }
            left += 1;
            right -= 1;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yuyv_neutral_chroma_is_grayscale() {
        // U = V = 128 carries no color: R ≈ G ≈ B ≈ 1.164 * (Y - 16).
        let yuyv = vec![128, 128, 200, 128];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1).unwrap();
        assert_eq!(rgb.len(), 6);

        let (r0, g0, b0) = (rgb[0], rgb[1], rgb[2]);
        assert_eq!(r0, g0);
        assert_eq!(g0, b0);
        assert_eq!(r0, 130); // 1.164 * 112 rounds to 130

        let (r1, g1, b1) = (rgb[3], rgb[4], rgb[5]);
        assert_eq!(r1, g1);
        assert_eq!(g1, b1);
        assert_eq!(r1, 214); // 1.164 * 184 rounds to 214
    }

    #[test]
    fn yuyv_red_chroma() {
        // High V pushes red up and green down.
        let yuyv = vec![128, 128, 128, 255];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1).unwrap();
        assert!(rgb[0] > rgb[1], "expected R > G, got {:?}", &rgb[..3]);
        assert!(rgb[0] > rgb[2], "expected R > B, got {:?}", &rgb[..3]);
    }

    #[test]
    fn yuyv_rejects_short_buffer() {
        let result = yuyv_to_rgb(&[1, 2], 2, 1);
        assert!(matches!(result, Err(FrameError::InvalidLength { .. })));
    }

    #[test]
    fn yuyv_clamps_to_byte_range() {
        let yuyv = vec![255, 0, 0, 255];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1).unwrap();
        assert_eq!(rgb.len(), 6); // no panic, all channels clamped
    }

    #[test]
    fn mirror_reverses_rows() {
        // 3×2 frame with per-pixel markers.
        #[rustfmt::skip]
        let mut rgb = vec![
            1, 1, 1,  2, 2, 2,  3, 3, 3,
            4, 4, 4,  5, 5, 5,  6, 6, 6,
        ];
        mirror_rgb(&mut rgb, 3, 2).unwrap();
        #[rustfmt::skip]
        let expected = vec![
            3, 3, 3,  2, 2, 2,  1, 1, 1,
            6, 6, 6,  5, 5, 5,  4, 4, 4,
        ];
        assert_eq!(rgb, expected);
    }

    #[test]
    fn mirror_twice_is_identity() {
        let orig: Vec<u8> = (0..4 * 3 * 3).map(|i| i as u8).collect();
        let mut rgb = orig.clone();
        mirror_rgb(&mut rgb, 4, 3).unwrap();
        mirror_rgb(&mut rgb, 4, 3).unwrap();
        assert_eq!(rgb, orig);
    }

    #[test]
    fn mirror_rejects_short_buffer() {
        let mut rgb = vec![0u8; 5];
        assert!(matches!(
            mirror_rgb(&mut rgb, 3, 2),
            Err(FrameError::InvalidLength { .. })
        ));
    }
}
