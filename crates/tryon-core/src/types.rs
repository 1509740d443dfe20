use serde::{Deserialize, Serialize};

/// A single face-mesh landmark, normalized to `[0, 1]` in both axes
/// relative to the frame it was detected in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Mesh index of the left eye outer corner.
pub const MESH_LEFT_EYE: usize = 33;
/// Mesh index of the right eye outer corner.
pub const MESH_RIGHT_EYE: usize = 263;
/// Mesh index of the left temple (frame arm anchor).
pub const MESH_LEFT_TEMPLE: usize = 130;
/// Mesh index of the right temple (frame arm anchor).
pub const MESH_RIGHT_TEMPLE: usize = 359;

/// The four named landmarks eyewear placement depends on.
///
/// All coordinates are normalized to the source frame, exactly as the
/// mesh produced them. Only these four points ever leave the mesh layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EyewearAnchors {
    pub left_eye: Landmark,
    pub right_eye: Landmark,
    pub left_temple: Landmark,
    pub right_temple: Landmark,
}

impl EyewearAnchors {
    /// Select the anchor quadruple from a full mesh landmark list.
    ///
    /// Returns `None` when the list is too short to contain all four
    /// indices — callers treat that as "no detection" and must not fall
    /// back to a stale or default quadruple.
    pub fn from_mesh(landmarks: &[Landmark]) -> Option<Self> {
        Some(Self {
            left_eye: *landmarks.get(MESH_LEFT_EYE)?,
            right_eye: *landmarks.get(MESH_RIGHT_EYE)?,
            left_temple: *landmarks.get(MESH_LEFT_TEMPLE)?,
            right_temple: *landmarks.get(MESH_RIGHT_TEMPLE)?,
        })
    }
}

/// Placement of an overlay asset on a base frame, in pixel space.
///
/// `x`/`y` locate the overlay's center; `scale` is uniform;
/// `rotation_degrees` is counter-clockwise about the overlay's own
/// center. A transform is only meaningful for the frame it was computed
/// from and is never reused across an undetected frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlayTransform {
    pub x: f32,
    pub y: f32,
    pub scale: f32,
    pub rotation_degrees: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh_of_len(n: usize) -> Vec<Landmark> {
        (0..n)
            .map(|i| Landmark::new(i as f32 / n.max(1) as f32, 0.5))
            .collect()
    }

    #[test]
    fn anchors_from_full_mesh() {
        let mesh = mesh_of_len(468);
        let anchors = EyewearAnchors::from_mesh(&mesh).unwrap();
        assert_eq!(anchors.left_eye, mesh[MESH_LEFT_EYE]);
        assert_eq!(anchors.right_eye, mesh[MESH_RIGHT_EYE]);
        assert_eq!(anchors.left_temple, mesh[MESH_LEFT_TEMPLE]);
        assert_eq!(anchors.right_temple, mesh[MESH_RIGHT_TEMPLE]);
    }

    #[test]
    fn anchors_require_highest_index() {
        // 359 is the highest required index, so 360 entries is the minimum.
        assert!(EyewearAnchors::from_mesh(&mesh_of_len(360)).is_some());
        assert!(EyewearAnchors::from_mesh(&mesh_of_len(359)).is_none());
    }

    #[test]
    fn anchors_from_empty_mesh() {
        assert!(EyewearAnchors::from_mesh(&[]).is_none());
    }
}
