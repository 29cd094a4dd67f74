use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the resolution pipeline.
/// Every module returns `Result<T, LauncherError>`.
#[derive(Debug, Error)]
pub enum LauncherError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    #[error("Download of {url} was interrupted")]
    Interrupted { url: String },

    #[error("Resolution cancelled before all downloads finished")]
    Cancelled,

    // ── Integrity ───────────────────────────────────────
    #[error("Hash mismatch for {url}: expected {expected}, found {actual}")]
    HashMismatch {
        url: String,
        expected: String,
        actual: String,
    },

    #[error("Invalid {algorithm} digest {digest:?}")]
    InvalidDigest { algorithm: String, digest: String },

    // ── Pre-download gate ───────────────────────────────
    #[error("Cannot download {artifact}: {reason}")]
    PreDownloadCheck { artifact: String, reason: String },

    // ── Maven ───────────────────────────────────────────
    #[error("Invalid Maven coordinate: {0}")]
    InvalidMavenCoordinate(String),

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Sources ─────────────────────────────────────────
    #[error("Unknown jar source: {0}")]
    UnknownSource(String),

    #[error("Source {source_id} failed to resolve: {message}")]
    Resolution { source_id: String, message: String },

    #[error("Could not locate file {0:?} and it has no download source")]
    MissingLocalArtifact(PathBuf),

    #[error("No source provided a main class and none was overridden")]
    MissingEntryPoint,

    // ── Environment ─────────────────────────────────────
    #[error("Storage layout {layout} does not support the {side} side")]
    UnsupportedSide { layout: &'static str, side: String },

    #[error("Failed to find a matching storage layout for {0:?}")]
    NoStorageLocation(PathBuf),

    // ── Config ──────────────────────────────────────────
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience alias used throughout the crate.
pub type LauncherResult<T> = Result<T, LauncherError>;

impl LauncherError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LauncherError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn resolution(source_id: &str, message: impl Into<String>) -> Self {
        LauncherError::Resolution {
            source_id: source_id.to_string(),
            message: message.into(),
        }
    }

    /// Integrity failures are reported differently from transient ones.
    pub fn is_hash_mismatch(&self) -> bool {
        matches!(self, LauncherError::HashMismatch { .. })
    }
}

impl From<std::io::Error> for LauncherError {
    fn from(source: std::io::Error) -> Self {
        LauncherError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}
