use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;
use zbus::interface;

use crate::capture::{CaptureController, CaptureError};
use crate::engine::{EngineError, EngineState};
use crate::gallery::Gallery;

/// D-Bus interface for the try-on daemon.
///
/// Bus name: dev.tryon.TryOn1
/// Object path: /dev/tryon/TryOn1
pub struct TryonService {
    pub controller: Arc<CaptureController>,
    pub state: watch::Receiver<EngineState>,
    pub gallery: Gallery,
}

#[interface(name = "dev.tryon.TryOn1")]
impl TryonService {
    /// Daemon status as JSON: engine state, asset set, gallery size.
    async fn status(&self) -> String {
        let state = *self.state.borrow();
        serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "state": state,
            "loaded": state == EngineState::Ready || state == EngineState::Capturing,
            "assets": self.controller.asset_names(),
            "captures": self.gallery.len().await,
            "pending": self.controller.is_pending(),
        })
        .to_string()
    }

    /// Compute the placement transform for the current frame.
    ///
    /// `{"detected": false}` when no face is present — an expected
    /// condition, not a D-Bus error.
    async fn preview(&self) -> zbus::fdo::Result<String> {
        match self.controller.preview().await {
            Ok(Some(t)) => Ok(serde_json::json!({ "detected": true, "transform": t }).to_string()),
            Ok(None) => Ok(serde_json::json!({ "detected": false }).to_string()),
            Err(e) => Err(map_engine_error(e)),
        }
    }

    /// Run one capture action: one still, one composite per asset.
    /// Returns a JSON batch summary with per-slot outcomes.
    async fn capture(&self) -> zbus::fdo::Result<String> {
        tracing::info!("capture requested");
        match self.controller.capture().await {
            Ok(summary) => {
                Ok(serde_json::to_string(&summary).map_err(|e| internal(&e.to_string()))?)
            }
            Err(CaptureError::Busy) => Err(zbus::fdo::Error::LimitsExceeded(
                "a capture batch is already pending".into(),
            )),
            Err(CaptureError::NoAssets) => {
                Err(zbus::fdo::Error::Failed("no overlay assets configured".into()))
            }
            Err(CaptureError::Engine(e)) => Err(map_engine_error(e)),
        }
    }

    /// Gallery metadata as a JSON array, oldest capture first.
    async fn list_captures(&self) -> zbus::fdo::Result<String> {
        let infos = self.gallery.list().await;
        serde_json::to_string(&infos).map_err(|e| internal(&e.to_string()))
    }

    /// Full-resolution PNG bytes for one capture (the enlarge view).
    async fn get_capture(&self, id: &str) -> zbus::fdo::Result<Vec<u8>> {
        let id = Uuid::parse_str(id)
            .map_err(|_| zbus::fdo::Error::InvalidArgs(format!("not a capture id: {id}")))?;
        self.gallery
            .get(id)
            .await
            .ok_or_else(|| zbus::fdo::Error::Failed(format!("no capture with id {id}")))
    }

    /// Drop all session captures, returning how many were removed.
    async fn clear_captures(&self) -> u32 {
        let n = self.gallery.clear().await;
        tracing::info!(removed = n, "gallery cleared");
        n as u32
    }
}

fn map_engine_error(e: EngineError) -> zbus::fdo::Error {
    match e {
        EngineError::NotReady => {
            zbus::fdo::Error::Failed("engine not ready: model or camera unavailable".into())
        }
        EngineError::NoFaceDetected => {
            zbus::fdo::Error::Failed("no face detected — try facing the camera".into())
        }
        other => zbus::fdo::Error::Failed(other.to_string()),
    }
}

fn internal(msg: &str) -> zbus::fdo::Error {
    zbus::fdo::Error::Failed(msg.to_string())
}
