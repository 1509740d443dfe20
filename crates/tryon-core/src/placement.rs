//! Eyewear placement geometry.
//!
//! Converts the four anchor landmarks into an [`OverlayTransform`]:
//! position from the eye midpoint, scale from temple-to-temple width,
//! rotation from the eye-to-eye angle. The camera preview is mirrored,
//! so both the x position and the rotation sign compensate for the flip.

use crate::types::{EyewearAnchors, OverlayTransform};

/// Natural pixel width of the shipped overlay assets at scale 1.0.
///
/// Calibrated against the bundled frames; substitute assets must be
/// recalibrated or normalized per-asset.
pub const OVERLAY_NATURAL_WIDTH: f32 = 190.0;

/// Compute the overlay placement for one frame.
///
/// `frame_width`/`frame_height` are the pixel dimensions of the frame
/// the anchors were detected in. Each frame is computed independently;
/// no smoothing is applied between frames.
pub fn eyewear_transform(
    anchors: &EyewearAnchors,
    frame_width: u32,
    frame_height: u32,
) -> OverlayTransform {
    let w = frame_width as f32;
    let h = frame_height as f32;

    // Eye midpoint, mirrored on x to match the mirrored preview.
    let mid_x = (anchors.left_eye.x + anchors.right_eye.x) / 2.0;
    let mid_y = (anchors.left_eye.y + anchors.right_eye.y) / 2.0;
    let x = (1.0 - mid_x) * w;
    let y = mid_y * h;

    // Temple-to-temple width in pixels sets the uniform scale.
    let temple_span = (anchors.right_temple.x - anchors.left_temple.x).abs() * w;
    let scale = temple_span / OVERLAY_NATURAL_WIDTH;

    // Negated so the overlay tilts with the head in the mirrored view.
    let dx = anchors.right_eye.x - anchors.left_eye.x;
    let dy = anchors.right_eye.y - anchors.left_eye.y;
    let rotation_degrees = -dy.atan2(dx).to_degrees();

    OverlayTransform {
        x,
        y,
        scale,
        rotation_degrees,
    }
}
