use std::net::SocketAddr;
use std::path::PathBuf;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Path to the persisted identity store.
    pub data_path: PathBuf,
    /// Maximum embedding distance for a positive match.
    pub match_threshold: f32,
    /// Maximum number of sample images considered per registration.
    pub samples_per_registration: usize,
    /// Side length of generated face thumbnails, in pixels.
    pub thumbnail_size: u32,
}

impl Config {
    /// Load configuration from `GAZE_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let model_dir = std::env::var("GAZE_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("models"));

        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("gaze");

        let data_path = std::env::var("GAZE_DATA_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("identities.json"));

        Self {
            bind_addr: std::env::var("GAZE_BIND_ADDR")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 5000))),
            model_dir,
            data_path,
            match_threshold: env_f32("GAZE_MATCH_THRESHOLD", 0.40),
            samples_per_registration: env_usize("GAZE_SAMPLES_PER_REGISTRATION", 5),
            thumbnail_size: env_u32("GAZE_THUMBNAIL_SIZE", 160),
        }
    }

    /// Path to the UltraFace detection model.
    pub fn detector_model_path(&self) -> String {
        self.model_dir
            .join("version-RFB-320.onnx")
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the ArcFace embedding model.
    pub fn embedder_model_path(&self) -> String {
        self.model_dir
            .join("w600k_r50.onnx")
            .to_string_lossy()
            .into_owned()
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
