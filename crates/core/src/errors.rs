use thiserror::Error;

/// Unified error type for the entire coin-tracker-core library.
///
/// Lookup and store failures are recovered inside the core (logged, then
/// degraded to an empty or unchanged state). The variants still exist so the
/// trait seams can report what went wrong.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── API / Network ───────────────────────────────────────────────
    #[error("API error ({provider}): {message}")]
    Api {
        provider: String,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    // ── Portfolio store ─────────────────────────────────────────────
    #[error("Store read failed: {0}")]
    StoreRead(String),

    #[error("Store write failed: {0}")]
    StoreWrite(String),

    #[error("Permission denied for user {0}")]
    PermissionDenied(String),

    // ── Snapshots / settings ────────────────────────────────────────
    #[error("Invalid store snapshot: {0}")]
    InvalidFileFormat(String),

    #[error("Unsupported store snapshot version: {0}")]
    UnsupportedVersion(u16),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("File I/O error: {0}")]
    FileIO(String),

    #[error("Invalid settings: {0}")]
    ValidationError(String),
}

// ── Conversion helpers (From impls) ─────────────────────────────────

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::FileIO(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Deserialization(e.to_string())
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        // reqwest errors carry the full URL; the query string may hold an API key.
        let msg = e.to_string();
        match msg.split_once('?') {
            Some((url, _)) => CoreError::Network(format!("{url}?<query redacted>")),
            None => CoreError::Network(msg),
        }
    }
}
