//! In-memory Session and Queued Message types.

use std::collections::HashMap;

use bridge_agent::PendingTool;
use bridge_core::{Attachment, ChatId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Suspended,
    Active,
    Completed,
}

/// One in-memory run of an Agent Process, main or subagent.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub chat_id: ChatId,
    pub cli_name: String,
    pub is_subagent: bool,
    pub state: SessionState,
    pub resume_token: Option<String>,
    pub last_activity: DateTime<Utc>,
    pub last_text: String,
    pub pending_tools: HashMap<String, PendingTool>,
}

impl Session {
    pub fn new(chat_id: ChatId, cli_name: impl Into<String>, is_subagent: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            chat_id,
            cli_name: cli_name.into(),
            is_subagent,
            state: SessionState::Active,
            resume_token: None,
            last_activity: Utc::now(),
            last_text: String::new(),
            pending_tools: HashMap::new(),
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}

/// `{source, cronJobId?, memoryToolDepth?, isPrivate?}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueContext {
    pub source: Option<String>,
    pub cron_job_id: Option<String>,
    #[serde(default)]
    pub memory_tool_depth: u32,
    #[serde(default)]
    pub is_private: bool,
}

/// `{id, text, attachments, createdAt, context}`. Per-chat FIFO
/// queue entry, bounded (default 5).
#[derive(Debug, Clone)]
pub struct QueuedMessage {
    pub id: Uuid,
    pub text: String,
    pub attachments: Vec<Attachment>,
    pub created_at: DateTime<Utc>,
    pub context: QueueContext,
}

impl QueuedMessage {
    pub fn new(text: impl Into<String>, attachments: Vec<Attachment>, context: QueueContext) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            attachments,
            created_at: Utc::now(),
            context,
        }
    }
}
