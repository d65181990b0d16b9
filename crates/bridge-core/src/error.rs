use thiserror::Error;

/// Errors shared across the bridge workspace: one variant per failure
/// class, a short machine-readable `code()` for logging/metrics, and
/// `#[from]` wrapping for the two I/O error types every store touches.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("unknown CLI adapter: {0}")]
    UnknownAdapter(String),

    #[error("unknown model alias: {0}")]
    UnknownModelAlias(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("manifest error: {0}")]
    Manifest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Short machine-readable code, for logging and test assertions.
    pub fn code(&self) -> &'static str {
        match self {
            BridgeError::Config(_) => "CONFIG_ERROR",
            BridgeError::UnknownAdapter(_) => "UNKNOWN_ADAPTER",
            BridgeError::UnknownModelAlias(_) => "UNKNOWN_MODEL_ALIAS",
            BridgeError::Io(_) => "IO_ERROR",
            BridgeError::Serialization(_) => "SERIALIZATION_ERROR",
            BridgeError::Manifest(_) => "MANIFEST_ERROR",
            BridgeError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
