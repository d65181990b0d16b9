use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("queue full (bound {bound})")]
    QueueFull { bound: usize },
}

impl SessionError {
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::QueueFull { .. } => "QUEUE_FULL",
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
