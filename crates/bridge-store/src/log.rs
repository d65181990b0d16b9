//! Session Log — append-only per-UTC-day JSONL of every user/assistant/
//! system message, written with `O_APPEND` so concurrent writers never
//! tear each other's lines.

use std::io::Write;
use std::path::PathBuf;

use bridge_core::ChatId;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubagentMeta {
    #[serde(rename = "runId")]
    pub run_id: String,
    pub label: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntryMeta {
    #[serde(default)]
    pub subagent: Option<SubagentMeta>,
}

/// `{timestamp, chatId, role, text, sessionId?, cli?, meta?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionLogEntry {
    pub timestamp: chrono::DateTime<Utc>,
    #[serde(rename = "chatId")]
    pub chat_id: String,
    pub role: Role,
    pub text: String,
    #[serde(rename = "sessionId", default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub cli: Option<String>,
    #[serde(default)]
    pub meta: Option<EntryMeta>,
}

impl SessionLogEntry {
    pub fn new(chat_id: &ChatId, role: Role, text: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            chat_id: chat_id.0.clone(),
            role,
            text: text.into(),
            session_id: None,
            cli: None,
            meta: None,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>, cli: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self.cli = Some(cli.into());
        self
    }

    pub fn with_subagent(mut self, meta: SubagentMeta) -> Self {
        self.meta = Some(EntryMeta { subagent: Some(meta) });
        self
    }
}

/// Appends one [`SessionLogEntry`] per line to `sessions/<YYYY-MM-DD>.jsonl`
/// under the configured directory. No locking beyond the OS's `O_APPEND`
/// semantics.
pub struct SessionLog {
    dir: PathBuf,
}

impl SessionLog {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path_for(&self, date: chrono::NaiveDate) -> PathBuf {
        self.dir.join(format!("{}.jsonl", date.format("%Y-%m-%d")))
    }

    /// Append `entry`, using today's UTC date as the file name. Persistence
    /// errors are returned for the caller to log-and-continue.
    pub fn append(&self, entry: &SessionLogEntry) -> Result<()> {
        std::fs::create_dir_all(&self.dir).map_err(StoreError::Io)?;
        let path = self.path_for(entry.timestamp.date_naive());
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(StoreError::Io)?;
        let line = serde_json::to_string(entry).map_err(StoreError::Serialization)?;
        writeln!(file, "{line}").map_err(StoreError::Io)?;
        Ok(())
    }

    /// Read every entry logged on `date`, in append order. Used for the
    /// best-effort `/new` memory-summary flush.
    pub fn read_day(&self, date: chrono::NaiveDate) -> Result<Vec<SessionLogEntry>> {
        let path = self.path_for(date);
        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(StoreError::Io(e)),
        };
        let mut entries = Vec::new();
        for line in contents.lines() {
            if line.trim().is_empty() {
                continue;
            }
            entries.push(serde_json::from_str(line).map_err(StoreError::Serialization)?);
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_then_read_day_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let log = SessionLog::new(dir.path().to_path_buf());
        let chat = ChatId::new("42");
        let entry = SessionLogEntry::new(&chat, Role::User, "hello");
        log.append(&entry).unwrap();
        let entry2 = SessionLogEntry::new(&chat, Role::Assistant, "hi there")
            .with_session("sess-1", "claude");
        log.append(&entry2).unwrap();

        let today = Utc::now().date_naive();
        let entries = log.read_day(today).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].text, "hello");
        assert_eq!(entries[1].session_id.as_deref(), Some("sess-1"));
    }

    #[test]
    fn missing_day_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = SessionLog::new(dir.path().to_path_buf());
        let entries = log.read_day(chrono::NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn one_file_per_utc_date() {
        let dir = tempfile::tempdir().unwrap();
        let log = SessionLog::new(dir.path().to_path_buf());
        let chat = ChatId::new("1");
        log.append(&SessionLogEntry::new(&chat, Role::User, "x")).unwrap();
        let expected = dir
            .path()
            .join(format!("{}.jsonl", Utc::now().format("%Y-%m-%d")));
        assert!(expected.exists());
    }
}
