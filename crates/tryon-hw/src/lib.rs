//! tryon-hw — Hardware abstraction for webcam capture.
//!
//! Provides V4L2-based camera access producing mirrored RGB frames for
//! the try-on pipeline.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, DeviceInfo, PixelFormat};
pub use frame::Frame;
