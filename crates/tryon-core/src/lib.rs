//! tryon-core — Virtual eyewear try-on engine.
//!
//! Face-mesh landmarks via ONNX Runtime feed a small placement geometry
//! pass (position, scale, rotation), and a compositor draws overlay
//! assets onto captured frames.

pub mod compositor;
pub mod mesh;
pub mod placement;
pub mod types;

pub use compositor::CompositeError;
pub use mesh::{FaceMesh, MeshError};
pub use types::{EyewearAnchors, Landmark, OverlayTransform};
