use thiserror::Error;

#[derive(Debug, Error)]
pub enum SubagentError {
    #[error("subagent cap reached for chat (max {max})")]
    CapReached { max: usize },

    #[error("run not found: {run_id}")]
    NotFound { run_id: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store error: {0}")]
    Store(#[from] bridge_store::error::StoreError),
}

impl SubagentError {
    pub fn code(&self) -> &'static str {
        match self {
            SubagentError::CapReached { .. } => "SUBAGENT_CAP_REACHED",
            SubagentError::NotFound { .. } => "SUBAGENT_NOT_FOUND",
            SubagentError::Io(_) => "IO_ERROR",
            SubagentError::Serialization(_) => "SERIALIZATION_ERROR",
            SubagentError::Store(_) => "STORE_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, SubagentError>;
