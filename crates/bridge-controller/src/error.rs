use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("unknown CLI adapter: {0}")]
    UnknownAdapter(String),

    #[error("subagent concurrency cap reached for this chat")]
    SubagentCapReached,

    #[error("queue is full")]
    QueueFull,

    #[error(transparent)]
    Agent(#[from] bridge_agent::AgentError),

    #[error(transparent)]
    Store(#[from] bridge_store::StoreError),

    #[error(transparent)]
    Subagent(#[from] bridge_subagent::SubagentError),

    #[error(transparent)]
    Scheduler(#[from] bridge_scheduler::SchedulerError),

    #[error(transparent)]
    Session(#[from] bridge_session::SessionError),
}

impl ControllerError {
    pub fn code(&self) -> &'static str {
        match self {
            ControllerError::UnknownAdapter(_) => "UNKNOWN_ADAPTER",
            ControllerError::SubagentCapReached => "SUBAGENT_CAP",
            ControllerError::QueueFull => "QUEUE_FULL",
            ControllerError::Agent(_) => "AGENT_ERROR",
            ControllerError::Store(_) => "STORE_ERROR",
            ControllerError::Subagent(_) => "SUBAGENT_ERROR",
            ControllerError::Scheduler(_) => "SCHEDULER_ERROR",
            ControllerError::Session(_) => "SESSION_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, ControllerError>;
