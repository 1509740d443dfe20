use std::path::PathBuf;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Directory containing the face-mesh ONNX model.
    pub model_dir: PathBuf,
    /// Directory containing the overlay asset images.
    pub asset_dir: PathBuf,
    /// Per-asset decode timeout for a capture batch, in milliseconds.
    pub decode_timeout_ms: u64,
    /// sigmoid(face-flag) threshold below which a frame counts as "no face".
    pub score_threshold: f32,
}

impl Config {
    /// Load configuration from `TRYON_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let data_dir = data_dir(
            std::env::var("XDG_DATA_HOME").ok(),
            std::env::var("HOME").ok(),
        );

        let model_dir = std::env::var("TRYON_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("models"));

        let asset_dir = std::env::var("TRYON_ASSET_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("assets"));

        Self {
            camera_device: std::env::var("TRYON_CAMERA_DEVICE")
                .unwrap_or_else(|_| "/dev/video0".to_string()),
            model_dir,
            asset_dir,
            decode_timeout_ms: env_u64("TRYON_DECODE_TIMEOUT_MS", 5000),
            score_threshold: env_f32(
                "TRYON_SCORE_THRESHOLD",
                tryon_core::mesh::DEFAULT_SCORE_THRESHOLD,
            ),
        }
    }

    /// Path to the face-mesh detection model.
    pub fn mesh_model_path(&self) -> String {
        self.model_dir
            .join("face_landmark.onnx")
            .to_string_lossy()
            .into_owned()
    }
}

/// Data root for models and assets: `$XDG_DATA_HOME/tryon`, falling
/// back to `$HOME/.local/share/tryon`, then `/tmp/.local/share/tryon`.
fn data_dir(xdg_data_home: Option<String>, home: Option<String>) -> PathBuf {
    xdg_data_home
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            PathBuf::from(home.unwrap_or_else(|| "/tmp".to_string())).join(".local/share")
        })
        .join("tryon")
}

fn env_f32(key: &str, default: f32) -> f32 {
    parse_or(std::env::var(key).ok(), default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    parse_or(std::env::var(key).ok(), default)
}

/// Parse an optional variable value, keeping the default on anything
/// missing or unparseable.
fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.parse().ok()).unwrap_or(default)
}
