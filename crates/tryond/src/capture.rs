//! Capture flow: one still frame fanned out to N per-asset composites.
//!
//! The batch is a join over N independent slots. Decodes run
//! concurrently, each bounded by an explicit timeout, and a failed slot
//! never blocks the others; the gallery receives the batch only after
//! every slot has resolved. A second capture while one is pending is
//! rejected outright rather than left to overlap.

use chrono::Utc;
use image::RgbaImage;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio::sync::Mutex;
use tryon_core::{compositor, CompositeError, OverlayTransform};
use uuid::Uuid;

use crate::assets::OverlayAsset;
use crate::engine::{EngineError, EngineHandle};
use crate::gallery::{Capture, Gallery};

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("a capture batch is already pending")]
    Busy,
    #[error("no overlay assets configured")]
    NoAssets,
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Per-slot failure. Slots fail independently; these never abort the batch.
#[derive(Error, Debug)]
pub enum SlotError {
    #[error("asset read failed: {0}")]
    Read(#[from] std::io::Error),
    #[error("asset decode failed: {0}")]
    Decode(#[from] CompositeError),
    #[error("asset decode timed out after {0} ms")]
    DecodeTimeout(u128),
    #[error("composite task failed: {0}")]
    Task(String),
}

/// Outcome of one asset slot in a capture batch.
#[derive(Debug, Clone, Serialize)]
pub struct SlotReport {
    pub asset: String,
    /// Gallery id of the composited capture, when the slot succeeded.
    pub id: Option<Uuid>,
    pub error: Option<String>,
}

/// Result of one capture action.
#[derive(Debug, Clone, Serialize)]
pub struct CaptureSummary {
    pub total: usize,
    pub succeeded: usize,
    pub slots: Vec<SlotReport>,
}

/// Bridges the engine's frame stream to the compositor and the gallery.
pub struct CaptureController {
    engine: EngineHandle,
    assets: Vec<OverlayAsset>,
    decode_timeout: Duration,
    gallery: Gallery,
    /// Held for the duration of a batch; `try_lock` failure means busy.
    pending: Mutex<()>,
}

impl CaptureController {
    pub fn new(
        engine: EngineHandle,
        assets: Vec<OverlayAsset>,
        decode_timeout: Duration,
        gallery: Gallery,
    ) -> Self {
        Self {
            engine,
            assets,
            decode_timeout,
            gallery,
            pending: Mutex::new(()),
        }
    }

    pub fn asset_names(&self) -> Vec<String> {
        self.assets.iter().map(|a| a.name.clone()).collect()
    }

    /// Whether a capture batch is currently in flight.
    pub fn is_pending(&self) -> bool {
        self.pending.try_lock().is_err()
    }

    /// Live-preview transform for the current frame; `None` = no face.
    pub async fn preview(&self) -> Result<Option<OverlayTransform>, EngineError> {
        self.engine.preview().await
    }

    /// Run one capture action: take a still, composite every asset
    /// against it, and hand the completed batch to the gallery.
    pub async fn capture(&self) -> Result<CaptureSummary, CaptureError> {
        if self.assets.is_empty() {
            return Err(CaptureError::NoAssets);
        }
        let _guard = self.pending.try_lock().map_err(|_| CaptureError::Busy)?;

        let still = self.engine.still().await?;
        tracing::info!(
            x = still.transform.x,
            y = still.transform.y,
            scale = still.transform.scale,
            rotation = still.transform.rotation_degrees,
            assets = self.assets.len(),
            "still captured, compositing batch"
        );

        let base = Arc::new(still.image);
        let slots = composite_batch(base, still.transform, &self.assets, self.decode_timeout).await;

        let now = Utc::now();
        let mut captures = Vec::new();
        let mut reports = Vec::with_capacity(slots.len());
        for (asset, result) in slots {
            match result {
                Ok(png) => {
                    let id = Uuid::new_v4();
                    captures.push(Capture {
                        id,
                        asset: asset.clone(),
                        captured_at: now,
                        png,
                    });
                    reports.push(SlotReport {
                        asset,
                        id: Some(id),
                        error: None,
                    });
                }
                Err(e) => {
                    tracing::warn!(asset = %asset, error = %e, "slot failed");
                    reports.push(SlotReport {
                        asset,
                        id: None,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        let succeeded = captures.len();
        // All slots have resolved at this point — the gallery never sees
        // a partial batch.
        self.gallery.push_batch(captures).await;

        Ok(CaptureSummary {
            total: reports.len(),
            succeeded,
            slots: reports,
        })
    }
}

/// Composite every asset against the same base, concurrently.
///
/// Slot results come back in asset order. Each slot decodes its own
/// overlay from disk (bounded by `decode_timeout`) and draws against an
/// unmodified shared base — overlays never accumulate across slots.
pub(crate) async fn composite_batch(
    base: Arc<RgbaImage>,
    transform: OverlayTransform,
    assets: &[OverlayAsset],
    decode_timeout: Duration,
) -> Vec<(String, Result<Vec<u8>, SlotError>)> {
    let mut join = JoinSet::new();
    for (idx, asset) in assets.iter().enumerate() {
        let base = Arc::clone(&base);
        let path = asset.path.clone();
        join.spawn(async move {
            let result = composite_slot(base, transform, path, decode_timeout).await;
            (idx, result)
        });
    }

    let mut by_index: Vec<Option<Result<Vec<u8>, SlotError>>> =
        (0..assets.len()).map(|_| None).collect();
    while let Some(joined) = join.join_next().await {
        match joined {
            Ok((idx, result)) => by_index[idx] = Some(result),
            Err(e) => tracing::error!(error = %e, "batch slot task panicked"),
        }
    }

    assets
        .iter()
        .zip(by_index)
        .map(|(asset, slot)| {
            let result =
                slot.unwrap_or_else(|| Err(SlotError::Task("slot task aborted".into())));
            (asset.name.clone(), result)
        })
        .collect()
}

/// Decode one overlay (with timeout) and composite it against the base.
async fn composite_slot(
    base: Arc<RgbaImage>,
    transform: OverlayTransform,
    path: std::path::PathBuf,
    decode_timeout: Duration,
) -> Result<Vec<u8>, SlotError> {
    let decode = tokio::task::spawn_blocking(move || -> Result<RgbaImage, SlotError> {
        let bytes = std::fs::read(&path)?;
        Ok(compositor::decode_image(&bytes)?)
    });

    // The timeout bounds the caller, not the read: an abandoned decode
    // keeps its blocking-pool thread until the underlying read returns.
    let overlay = match tokio::time::timeout(decode_timeout, decode).await {
        Err(_) => return Err(SlotError::DecodeTimeout(decode_timeout.as_millis())),
        Ok(Err(join_err)) => return Err(SlotError::Task(join_err.to_string())),
        Ok(Ok(decoded)) => decoded?,
    };

    tokio::task::spawn_blocking(move || -> Result<Vec<u8>, SlotError> {
        let out = compositor::composite(&base, &overlay, &transform);
        Ok(compositor::encode_png(&out)?)
    })
    .await
    .map_err(|e| SlotError::Task(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineRequest, StillCapture};
    use image::Rgba;
    use std::path::PathBuf;

    const BASE_PX: [u8; 4] = [10, 20, 30, 255];

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("tryon-batch-{tag}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_overlay(dir: &std::path::Path, name: &str, px: [u8; 4]) -> OverlayAsset {
        let path = dir.join(name);
        RgbaImage::from_pixel(8, 8, Rgba(px)).save(&path).unwrap();
        OverlayAsset {
            name: name.to_string(),
            path,
        }
    }

    fn center_transform() -> OverlayTransform {
        OverlayTransform {
            x: 32.0,
            y: 32.0,
            scale: 1.0,
            rotation_degrees: 0.0,
        }
    }

    fn base_image() -> Arc<RgbaImage> {
        Arc::new(RgbaImage::from_pixel(64, 64, Rgba(BASE_PX)))
    }

    #[tokio::test]
    async fn batch_produces_one_output_per_asset() {
        let dir = scratch_dir("per-asset");
        let assets = vec![
            write_overlay(&dir, "a.png", [200, 0, 0, 255]),
            write_overlay(&dir, "b.png", [0, 200, 0, 255]),
            write_overlay(&dir, "c.png", [0, 0, 200, 255]),
        ];

        let slots = composite_batch(
            base_image(),
            center_transform(),
            &assets,
            Duration::from_secs(5),
        )
        .await;

        assert_eq!(slots.len(), 3);
        let names: Vec<&str> = slots.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["a.png", "b.png", "c.png"]);
        assert!(slots.iter().all(|(_, r)| r.is_ok()));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn untouched_base_pixels_are_identical_across_outputs() {
        let dir = scratch_dir("identical");
        let assets = vec![
            write_overlay(&dir, "red.png", [255, 0, 0, 255]),
            write_overlay(&dir, "blue.png", [0, 0, 255, 255]),
        ];

        let slots = composite_batch(
            base_image(),
            center_transform(),
            &assets,
            Duration::from_secs(5),
        )
        .await;

        let outputs: Vec<RgbaImage> = slots
            .into_iter()
            .map(|(_, r)| compositor::decode_image(&r.unwrap()).unwrap())
            .collect();

        // Overlays differ at the center but never accumulate.
        assert_ne!(outputs[0].get_pixel(32, 32), outputs[1].get_pixel(32, 32));

        // Outside the 8×8 footprint every output matches the base exactly.
        for out in &outputs {
            assert_eq!(out.get_pixel(2, 2).0, BASE_PX);
            assert_eq!(out.get_pixel(60, 5).0, BASE_PX);
        }
        assert_eq!(outputs[0].get_pixel(2, 2), outputs[1].get_pixel(2, 2));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn bad_asset_fails_only_its_own_slot() {
        let dir = scratch_dir("independent");
        let good = write_overlay(&dir, "a-good.png", [200, 0, 0, 255]);
        let bad_path = dir.join("b-bad.png");
        std::fs::write(&bad_path, b"not an image").unwrap();
        let bad = OverlayAsset {
            name: "b-bad.png".into(),
            path: bad_path,
        };
        let missing = OverlayAsset {
            name: "c-missing.png".into(),
            path: dir.join("c-missing.png"),
        };

        let slots = composite_batch(
            base_image(),
            center_transform(),
            &[good, bad, missing],
            Duration::from_secs(5),
        )
        .await;

        assert!(slots[0].1.is_ok());
        assert!(matches!(slots[1].1, Err(SlotError::Decode(_))));
        assert!(matches!(slots[2].1, Err(SlotError::Read(_))));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn stalled_decode_times_out_instead_of_hanging() {
        let dir = scratch_dir("timeout");
        // A FIFO with no writer blocks open() forever — the exact failure
        // mode the timeout exists for.
        let fifo = dir.join("stalled.png");
        let status = std::process::Command::new("mkfifo")
            .arg(&fifo)
            .status()
            .unwrap();
        assert!(status.success());
        let asset = OverlayAsset {
            name: "stalled.png".into(),
            path: fifo,
        };

        let slots = composite_batch(
            base_image(),
            center_transform(),
            &[asset],
            Duration::from_millis(100),
        )
        .await;

        assert!(matches!(slots[0].1, Err(SlotError::DecodeTimeout(100))));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    /// Stand-in engine thread: answers `Still` after a delay.
    fn slow_fake_engine(delay: Duration) -> EngineHandle {
        let (tx, mut rx) = tokio::sync::mpsc::channel(4);
        tokio::spawn(async move {
            while let Some(req) = rx.recv().await {
                if let EngineRequest::Still { reply } = req {
                    tokio::time::sleep(delay).await;
                    let _ = reply.send(Ok(StillCapture {
                        image: RgbaImage::from_pixel(64, 64, Rgba(BASE_PX)),
                        transform: center_transform(),
                    }));
                }
            }
        });
        EngineHandle::from_channel(tx)
    }

    #[tokio::test]
    async fn second_capture_while_pending_is_rejected() {
        let dir = scratch_dir("busy");
        let assets = vec![write_overlay(&dir, "a.png", [1, 2, 3, 255])];

        let controller = Arc::new(CaptureController::new(
            slow_fake_engine(Duration::from_millis(300)),
            assets,
            Duration::from_secs(5),
            Gallery::new(),
        ));

        let first = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.capture().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(controller.is_pending());
        assert!(matches!(
            controller.capture().await,
            Err(CaptureError::Busy)
        ));

        let summary = first.await.unwrap().unwrap();
        assert_eq!(summary.succeeded, 1);
        assert!(!controller.is_pending());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn capture_stores_batch_in_gallery() {
        let dir = scratch_dir("gallery");
        let assets = vec![
            write_overlay(&dir, "a.png", [200, 0, 0, 255]),
            write_overlay(&dir, "b.png", [0, 200, 0, 255]),
        ];
        let gallery = Gallery::new();

        let controller = CaptureController::new(
            slow_fake_engine(Duration::from_millis(1)),
            assets,
            Duration::from_secs(5),
            gallery.clone(),
        );

        let summary = controller.capture().await.unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(gallery.len().await, 2);

        // Every reported id is fetchable at full resolution.
        for slot in &summary.slots {
            let png = gallery.get(slot.id.unwrap()).await.unwrap();
            assert!(compositor::decode_image(&png).is_ok());
        }

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn empty_asset_set_is_rejected() {
        let controller = CaptureController::new(
            slow_fake_engine(Duration::from_millis(1)),
            vec![],
            Duration::from_secs(5),
            Gallery::new(),
        );
        assert!(matches!(
            controller.capture().await,
            Err(CaptureError::NoAssets)
        ));
    }
}
