//! Session gallery of captured images.
//!
//! Pure presentation state: ordered captures, metadata listing, and
//! full-resolution fetch for the enlarge view. No image data is ever
//! transformed here, and nothing is persisted — the gallery lives and
//! dies with the daemon process.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// One composited capture held for the session.
#[derive(Clone)]
pub struct Capture {
    pub id: Uuid,
    /// File name of the overlay asset this capture used.
    pub asset: String,
    pub captured_at: DateTime<Utc>,
    /// PNG-encoded composite.
    pub png: Vec<u8>,
}

/// Listing metadata — everything but the pixel data.
#[derive(Debug, Clone, Serialize)]
pub struct CaptureInfo {
    pub id: Uuid,
    pub asset: String,
    pub captured_at: DateTime<Utc>,
    pub bytes: usize,
}

/// Clone-safe in-memory gallery.
#[derive(Clone, Default)]
pub struct Gallery {
    inner: Arc<RwLock<Vec<Capture>>>,
}

impl Gallery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a completed batch. Called once per capture action, after
    /// every slot has resolved — never with a partial batch.
    pub async fn push_batch(&self, captures: Vec<Capture>) {
        if captures.is_empty() {
            return;
        }
        let mut inner = self.inner.write().await;
        inner.extend(captures);
    }

    /// Metadata for all captures, oldest first.
    pub async fn list(&self) -> Vec<CaptureInfo> {
        self.inner
            .read()
            .await
            .iter()
            .map(|c| CaptureInfo {
                id: c.id,
                asset: c.asset.clone(),
                captured_at: c.captured_at,
                bytes: c.png.len(),
            })
            .collect()
    }

    /// Full-resolution PNG for one capture — the enlarge path.
    pub async fn get(&self, id: Uuid) -> Option<Vec<u8>> {
        self.inner
            .read()
            .await
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.png.clone())
    }

    /// Drop all captures, returning how many were removed.
    pub async fn clear(&self) -> usize {
        let mut inner = self.inner.write().await;
        let n = inner.len();
        inner.clear();
        n
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}
