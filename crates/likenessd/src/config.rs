use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

/// Gallery directory shipped alongside the identity model.
const BUNDLED_GALLERY_DIR: &str = "celeb_samples_all";

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Address the HTTP server binds to (default: 0.0.0.0).
    pub bind_addr: IpAddr,
    /// HTTP port (default: 7860).
    pub port: u16,
    /// Directory containing model manifests and ONNX files.
    pub model_dir: PathBuf,
    /// Manifest of the age regressor.
    pub age_manifest: PathBuf,
    /// Manifest of the identity classifier.
    pub similarity_manifest: PathBuf,
    /// Directory of `<label>.jpg` reference photos.
    pub gallery_dir: PathBuf,
    /// Capacity of the inference work queue.
    pub queue_depth: usize,
    /// Maximum request body size for uploads and data URLs.
    pub max_upload_bytes: usize,
}

impl Config {
    /// Load configuration from `LIKENESS_*` environment variables with defaults.
    ///
    /// `PORT` is read unprefixed, as hosting platforms set it.
    pub fn from_env() -> Self {
        let model_dir = std::env::var("LIKENESS_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("models"));

        let age_manifest = std::env::var("LIKENESS_AGE_MANIFEST")
            .map(PathBuf::from)
            .unwrap_or_else(|_| model_dir.join("age.toml"));

        let similarity_manifest = std::env::var("LIKENESS_SIMILARITY_MANIFEST")
            .map(PathBuf::from)
            .unwrap_or_else(|_| model_dir.join("similarity.toml"));

        let gallery_dir = std::env::var("LIKENESS_GALLERY_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_gallery_dir(Path::new(BUNDLED_GALLERY_DIR)));

        Self {
            bind_addr: env_parse("LIKENESS_BIND_ADDR", IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
            port: env_parse("PORT", 7860),
            model_dir,
            age_manifest,
            similarity_manifest,
            gallery_dir,
            queue_depth: env_parse("LIKENESS_QUEUE_DEPTH", 16).max(1),
            max_upload_bytes: env_parse("LIKENESS_MAX_UPLOAD_BYTES", 20 * 1024 * 1024),
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

/// The bundled gallery if it was unpacked next to the binary, else the
/// working directory.
fn default_gallery_dir(bundled: &Path) -> PathBuf {
    if bundled.is_dir() {
        bundled.to_path_buf()
    } else {
        PathBuf::from(".")
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
