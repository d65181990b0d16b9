use thiserror::Error;

/// Errors raised by the Agent Process / Event Translator.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("adapter command not found: {0}")]
    CommandNotFound(String),

    #[error("failed to spawn child process: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("child stdin already closed")]
    StdinClosed,

    #[error("session already running")]
    AlreadyRunning,
}

impl AgentError {
    pub fn code(&self) -> &'static str {
        match self {
            AgentError::CommandNotFound(_) => "COMMAND_NOT_FOUND",
            AgentError::Spawn(_) => "SPAWN_FAILED",
            AgentError::StdinClosed => "STDIN_CLOSED",
            AgentError::AlreadyRunning => "ALREADY_RUNNING",
        }
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
