//! Subagent Run Record types.

use bridge_core::ChatId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Queued,
    Running,
    Completed,
    Error,
    Stopped,
}

impl RunStatus {
    /// `true` for `completed`/`error`/`stopped` — the states `endedAt` is
    /// set for.
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Error | RunStatus::Stopped)
    }

    /// Icon used in the completion announcement.
    pub fn icon(self) -> &'static str {
        match self {
            RunStatus::Completed => "✅",
            RunStatus::Error => "❌",
            RunStatus::Stopped => "🛑",
            RunStatus::Queued | RunStatus::Running => "🔄",
        }
    }
}

/// `{runId, chatId, parentSessionId?, childSessionId?, cli, task, label?,
/// status, createdAt, startedAt?, endedAt?, result?, error?,
/// resultInjected}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubagentRun {
    pub run_id: Uuid,
    pub chat_id: ChatId,
    pub parent_session_id: Option<String>,
    pub child_session_id: Option<String>,
    pub cli: String,
    pub task: String,
    pub label: Option<String>,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub result: Option<String>,
    pub error: Option<String>,
    pub result_injected: bool,
}

impl SubagentRun {
    /// Label used in user-visible output, falling back to a short task
    /// preview when no explicit `--label` was given.
    pub fn display_label(&self) -> String {
        self.label.clone().unwrap_or_else(|| {
            let preview: String = self.task.chars().take(40).collect();
            if self.task.chars().count() > 40 {
                format!("{preview}…")
            } else {
                preview
            }
        })
    }

    /// Wall-clock duration, available once the run is terminal.
    pub fn duration(&self) -> Option<chrono::Duration> {
        let started = self.started_at?;
        let ended = self.ended_at?;
        Some(ended - started)
    }
}

/// Parameters to [`crate::registry::SubagentRegistry::spawn`].
#[derive(Debug, Clone)]
pub struct SpawnOpts {
    pub chat_id: ChatId,
    pub parent_session_id: Option<String>,
    pub cli: String,
    pub task: String,
    pub label: Option<String>,
}
