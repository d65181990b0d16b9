//! Cron Job and Cron Run Record types.

use serde::{Deserialize, Serialize};

/// `{at: epoch-ms}` | `{every: ms}` | `{cron: expr, tz?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Schedule {
    At { at: i64 },
    Every { every: i64 },
    Cron { cron: String, tz: Option<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WakeMode {
    Now,
    NextHeartbeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionTarget {
    Main,
    Isolated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LastStatus {
    Ok,
    Error,
}

/// `{id, name, enabled, schedule, message, wakeMode, sessionTarget, model?,
/// createdAtMs, nextRunAtMs?, lastRunAtMs?, lastStatus?, lastError?,
/// isReminder?, delivery?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronJob {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub schedule: Schedule,
    pub message: String,
    pub wake_mode: WakeMode,
    pub session_target: SessionTarget,
    pub model: Option<String>,
    pub created_at_ms: i64,
    pub next_run_at_ms: Option<i64>,
    pub last_run_at_ms: Option<i64>,
    pub last_status: Option<LastStatus>,
    pub last_error: Option<String>,
    pub is_reminder: Option<bool>,
    pub delivery: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Ok,
    Error,
    Skipped,
}

/// Append-only per-isolated-run history record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronRunRecord {
    pub job_id: String,
    pub job_name: String,
    pub started_at_ms: i64,
    pub completed_at_ms: Option<i64>,
    pub status: RunStatus,
    pub summary: Option<String>,
    pub error: Option<String>,
    pub model: Option<String>,
}

/// `{ version: 1, jobs: [CronJob, ...] }` on-disk shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronDocument {
    pub version: u32,
    pub jobs: Vec<CronJob>,
}

impl Default for CronDocument {
    fn default() -> Self {
        Self { version: 1, jobs: Vec::new() }
    }
}

/// What the firing loop hands to its consumer for a due job.
#[derive(Debug, Clone)]
pub enum CronEvent {
    /// `wakeMode=now`, `sessionTarget=main`: run on the Main lane of
    /// `primaryChatId`, interleaving with the human conversation.
    Due { job: CronJob },
    /// `sessionTarget=isolated`: run on the Cron lane in a fresh session;
    /// `run_id` identifies the history record already appended.
    Isolated { job: CronJob, run_id: String },
    /// `wakeMode=next-heartbeat`: queued for opportunistic delivery on the
    /// next user interaction.
    Heartbeat { job: CronJob },
}
