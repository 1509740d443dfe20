use image::RgbaImage;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tryon_core::placement;
use tryon_core::types::EyewearAnchors;
use tryon_core::{FaceMesh, OverlayTransform};
use tryon_hw::Camera;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("camera error: {0}")]
    Camera(#[from] tryon_hw::CameraError),
    #[error("mesh error: {0}")]
    Mesh(#[from] tryon_core::MeshError),
    #[error("no face detected in the captured frame")]
    NoFaceDetected,
    #[error("engine is not ready (model or camera unavailable)")]
    NotReady,
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Lifecycle of the capture engine.
///
/// `Initializing` covers camera open and model load. A load failure is
/// terminal but non-fatal: the engine parks in `Unavailable` and keeps
/// answering requests with [`EngineError::NotReady`] instead of
/// crashing the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    Initializing,
    Ready,
    Capturing,
    Unavailable,
}

/// One still frame plus the transform computed from that same frame.
///
/// The transform is never carried over from an earlier frame: a capture
/// with no detected face fails instead of compositing stale geometry.
pub struct StillCapture {
    pub image: RgbaImage,
    pub transform: OverlayTransform,
}

/// Messages sent from async handlers to the engine thread.
pub(crate) enum EngineRequest {
    /// One frame, one landmark pass; `None` means no face this frame.
    Preview {
        reply: oneshot::Sender<Result<Option<OverlayTransform>, EngineError>>,
    },
    /// One still for compositing; fails if no face is detected.
    Still {
        reply: oneshot::Sender<Result<StillCapture, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Request a live-preview transform for the current frame.
    pub async fn preview(&self) -> Result<Option<OverlayTransform>, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Preview { reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Request one still frame with its placement transform.
    pub async fn still(&self) -> Result<StillCapture, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Still { reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    #[cfg(test)]
    pub(crate) fn from_channel(tx: mpsc::Sender<EngineRequest>) -> Self {
        Self { tx }
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// Returns immediately; camera open and model load happen on the thread
/// and their outcome is published through the state channel. Startup
/// failure leaves the engine in `Unavailable` — requests are still
/// answered (with `NotReady`), and the daemon stays up.
pub fn spawn_engine(
    camera_device: String,
    mesh_model_path: String,
    score_threshold: f32,
) -> (EngineHandle, watch::Receiver<EngineState>) {
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);
    let (state_tx, state_rx) = watch::channel(EngineState::Initializing);

    std::thread::Builder::new()
        .name("tryon-engine".into())
        .spawn(move || {
            let camera = match Camera::open(&camera_device) {
                Ok(c) => {
                    tracing::info!(
                        device = %camera_device,
                        width = c.width,
                        height = c.height,
                        fourcc = ?c.fourcc,
                        "camera opened"
                    );
                    c
                }
                Err(e) => {
                    tracing::error!(device = %camera_device, error = %e, "camera unavailable");
                    park_unavailable(&state_tx, &mut rx);
                    return;
                }
            };

            let mut mesh = match FaceMesh::load(&mesh_model_path, score_threshold) {
                Ok(m) => {
                    tracing::info!(path = %mesh_model_path, "face-mesh model loaded");
                    m
                }
                Err(e) => {
                    tracing::error!(path = %mesh_model_path, error = %e, "model load failed");
                    park_unavailable(&state_tx, &mut rx);
                    return;
                }
            };

            let _ = state_tx.send(EngineState::Ready);
            tracing::info!("engine thread ready");

            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Preview { reply } => {
                        let _ = reply.send(run_preview(&camera, &mut mesh));
                    }
                    EngineRequest::Still { reply } => {
                        let _ = state_tx.send(EngineState::Capturing);
                        let _ = reply.send(run_still(&camera, &mut mesh));
                        let _ = state_tx.send(EngineState::Ready);
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .expect("failed to spawn engine thread");

    (EngineHandle { tx }, state_rx)
}

/// Terminal not-ready state: publish `Unavailable` and keep draining
/// requests so callers get an error instead of a hang.
fn park_unavailable(
    state_tx: &watch::Sender<EngineState>,
    rx: &mut mpsc::Receiver<EngineRequest>,
) {
    let _ = state_tx.send(EngineState::Unavailable);
    while let Some(req) = rx.blocking_recv() {
        match req {
            EngineRequest::Preview { reply } => {
                let _ = reply.send(Err(EngineError::NotReady));
            }
            EngineRequest::Still { reply } => {
                let _ = reply.send(Err(EngineError::NotReady));
            }
        }
    }
}

/// Capture one frame and compute its transform, if a face is present.
fn run_preview(
    camera: &Camera,
    mesh: &mut FaceMesh,
) -> Result<Option<OverlayTransform>, EngineError> {
    let frame = camera.capture_frame()?;
    Ok(frame_transform(mesh, &frame.data, frame.width, frame.height)?)
}

/// Capture one still for compositing. No face is an error here: the
/// batch must never run against a stale transform.
fn run_still(camera: &Camera, mesh: &mut FaceMesh) -> Result<StillCapture, EngineError> {
    let frame = camera.capture_frame()?;
    let transform = frame_transform(mesh, &frame.data, frame.width, frame.height)?
        .ok_or(EngineError::NoFaceDetected)?;

    let image = rgba_from_rgb(&frame.data, frame.width, frame.height).ok_or_else(|| {
        EngineError::Camera(tryon_hw::CameraError::CaptureFailed(
            "frame buffer size mismatch".into(),
        ))
    })?;

    Ok(StillCapture { image, transform })
}

/// One landmark pass over one frame. `Ok(None)` means no face — an
/// expected transient, logged at debug level only.
fn frame_transform(
    mesh: &mut FaceMesh,
    rgb: &[u8],
    width: u32,
    height: u32,
) -> Result<Option<OverlayTransform>, EngineError> {
    let Some(landmarks) = mesh.landmarks(rgb, width, height)? else {
        return Ok(None);
    };
    let Some(anchors) = EyewearAnchors::from_mesh(&landmarks) else {
        tracing::debug!(count = landmarks.len(), "mesh too short for anchors");
        return Ok(None);
    };
    Ok(Some(placement::eyewear_transform(&anchors, width, height)))
}

/// Expand packed RGB24 into an RGBA image buffer (opaque alpha).
fn rgba_from_rgb(rgb: &[u8], width: u32, height: u32) -> Option<RgbaImage> {
    let pixels = (width * height) as usize;
    if rgb.len() < pixels * 3 {
        return None;
    }
    let mut rgba = Vec::with_capacity(pixels * 4);
    for px in rgb[..pixels * 3].chunks_exact(3) {
        rgba.extend_from_slice(&[px[0], px[1], px[2], 255]);
    }
    RgbaImage::from_raw(width, height, rgba)
}
