use thiserror::Error;

/// Central error type for the voice-isolation crate.
#[derive(Debug, Error)]
pub enum IsolationError {
    // Generic fallback (wraps anyhow)
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),

    // Request-level variants
    #[error("{0}")]
    Validation(String),

    #[error("Failed to decode audio: {0}")]
    Decode(String),

    #[error("Failed to normalize audio: {0}")]
    Normalize(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Failed to encode audio: {0}")]
    Encode(String),

    #[error("Inference timed out after {secs}s")]
    Timeout { secs: u64 },

    // Model lifecycle variants
    #[error("Model load failed: {0}")]
    ModelLoad(String),

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("Checksum mismatch for {path}")]
    Checksum { path: String },

    #[error("Cache dir not available")]
    CacheDirUnavailable,
}

impl IsolationError {
    /// Stable, machine-readable name of the failure kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            IsolationError::Anyhow(_) => "internal",
            IsolationError::Validation(_) => "validation",
            IsolationError::Decode(_) => "decode",
            IsolationError::Normalize(_) => "normalize",
            IsolationError::Inference(_) => "inference",
            IsolationError::Encode(_) => "encode",
            IsolationError::Timeout { .. } => "timeout",
            IsolationError::ModelLoad(_) => "model_load",
            IsolationError::Registry(_) => "registry",
            IsolationError::Manifest(_) => "manifest",
            IsolationError::Checksum { .. } => "checksum",
            IsolationError::CacheDirUnavailable => "cache_dir",
        }
    }
}

// --- Implement From conversions for common errors ---
impl From<std::io::Error> for IsolationError {
    fn from(e: std::io::Error) -> Self {
        IsolationError::Anyhow(e.into())
    }
}

impl From<serde_json::Error> for IsolationError {
    fn from(e: serde_json::Error) -> Self {
        IsolationError::Anyhow(e.into())
    }
}

impl From<reqwest::Error> for IsolationError {
    fn from(e: reqwest::Error) -> Self {
        IsolationError::Anyhow(e.into())
    }
}

impl From<hex::FromHexError> for IsolationError {
    fn from(e: hex::FromHexError) -> Self {
        IsolationError::Anyhow(e.into())
    }
}

impl From<ort::Error> for IsolationError {
    fn from(e: ort::Error) -> Self {
        IsolationError::Inference(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, IsolationError>;
