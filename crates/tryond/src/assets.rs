//! Overlay asset set.
//!
//! A fixed, ordered list of overlay images supplied at initialization:
//! image files in the asset directory, sorted by file name. Assets are
//! decoded lazily at capture time so one unreadable file can only fail
//! its own slot.

use std::io;
use std::path::{Path, PathBuf};

const ASSET_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// One overlay image resource.
#[derive(Debug, Clone)]
pub struct OverlayAsset {
    /// File name, used as the asset's display name.
    pub name: String,
    pub path: PathBuf,
}

/// Discover the asset set in a directory.
///
/// Only files with image extensions are considered; ordering is by file
/// name so the set is stable across runs.
pub fn discover(dir: &Path) -> io::Result<Vec<OverlayAsset>> {
    let mut assets = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_image = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| ASSET_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if !is_image {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        assets.push(OverlayAsset {
            name: name.to_string(),
            path,
        });
    }

    assets.sort_by(|a, b| a.name.cmp(&b.name));
    tracing::info!(dir = %dir.display(), count = assets.len(), "overlay assets discovered");
    Ok(assets)
}
