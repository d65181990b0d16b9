//! Subagent Registry — in-memory table of sub-agent runs, snapshotted to
//! disk. A `DashMap<Uuid, SubagentRun>` for the concurrent-map access
//! pattern, with each run tracking its own status-enum lifecycle.

use std::path::PathBuf;

use bridge_core::ChatId;
use bridge_store::atomic::{read_json_or_default, write_json_atomic};
use chrono::Utc;
use dashmap::DashMap;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::{Result, SubagentError};
use crate::types::{RunStatus, SpawnOpts, SubagentRun};

/// In-memory `DashMap` by run-id, snapshot-to-disk. A single
/// mutex would serialize unrelated chats; `DashMap`'s sharded locking keeps
/// operations O(1)-per-entry the way the gateway's other concurrent maps do.
pub struct SubagentRegistry {
    runs: DashMap<Uuid, SubagentRun>,
    snapshot_path: Option<PathBuf>,
}

impl SubagentRegistry {
    pub fn new() -> Self {
        Self {
            runs: DashMap::new(),
            snapshot_path: None,
        }
    }

    /// Load a registry from a snapshot file, or start empty if none exists.
    pub fn load(snapshot_path: PathBuf) -> Result<Self> {
        let runs: Vec<SubagentRun> = read_json_or_default(&snapshot_path, Vec::new)?;
        let map = DashMap::new();
        for run in runs {
            map.insert(run.run_id, run);
        }
        Ok(Self {
            runs: map,
            snapshot_path: Some(snapshot_path),
        })
    }

    fn persist(&self) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let snapshot = self.to_vec();
        write_json_atomic(path, &snapshot)?;
        Ok(())
    }

    fn to_vec(&self) -> Vec<SubagentRun> {
        self.runs.iter().map(|e| e.value().clone()).collect()
    }

    /// Every run for `chat_id` whose status is not terminal.
    pub fn list_active(&self, chat_id: &ChatId) -> Vec<SubagentRun> {
        self.runs
            .iter()
            .filter(|e| &e.chat_id == chat_id && !e.status.is_terminal())
            .map(|e| e.value().clone())
            .collect()
    }

    /// Register a queued run. Refuses — leaving no
    /// partial record behind — if the chat already has `cap` or more
    /// non-terminal runs.
    #[instrument(skip(self, opts), fields(chat_id = %opts.chat_id, cli = %opts.cli))]
    pub fn spawn(&self, opts: SpawnOpts, cap: usize) -> Result<SubagentRun> {
        if self.list_active(&opts.chat_id).len() >= cap {
            return Err(SubagentError::CapReached { max: cap });
        }
        let run = SubagentRun {
            run_id: Uuid::new_v4(),
            chat_id: opts.chat_id,
            parent_session_id: opts.parent_session_id,
            child_session_id: None,
            cli: opts.cli,
            task: opts.task,
            label: opts.label,
            status: RunStatus::Queued,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
            result: None,
            error: None,
            result_injected: false,
        };
        self.runs.insert(run.run_id, run.clone());
        self.persist()?;
        info!(run_id = %run.run_id, "subagent queued");
        Ok(run)
    }

    pub fn mark_running(&self, run_id: Uuid, child_session_id: Option<String>) -> Result<()> {
        let mut entry = self
            .runs
            .get_mut(&run_id)
            .ok_or_else(|| SubagentError::NotFound { run_id: run_id.to_string() })?;
        entry.status = RunStatus::Running;
        entry.started_at = Some(Utc::now());
        entry.child_session_id = child_session_id;
        drop(entry);
        self.persist()
    }

    pub fn mark_completed(&self, run_id: Uuid, result: String) -> Result<()> {
        let mut entry = self
            .runs
            .get_mut(&run_id)
            .ok_or_else(|| SubagentError::NotFound { run_id: run_id.to_string() })?;
        entry.status = RunStatus::Completed;
        entry.ended_at = Some(Utc::now());
        entry.result = Some(result);
        drop(entry);
        self.persist()
    }

    pub fn mark_error(&self, run_id: Uuid, error: String) -> Result<()> {
        let mut entry = self
            .runs
            .get_mut(&run_id)
            .ok_or_else(|| SubagentError::NotFound { run_id: run_id.to_string() })?;
        entry.status = RunStatus::Error;
        entry.ended_at = Some(Utc::now());
        entry.error = Some(error);
        drop(entry);
        self.persist()
    }

    /// Transition a single non-terminal run to `stopped`. Does **not** kill
    /// any process — only `/stop` (via the controller) does so.
    pub fn stop(&self, run_id: Uuid) -> Result<()> {
        if let Some(mut entry) = self.runs.get_mut(&run_id) {
            if !entry.status.is_terminal() {
                entry.status = RunStatus::Stopped;
                entry.ended_at = Some(Utc::now());
            }
        }
        self.persist()
    }

    /// Transition every non-terminal run for `chat_id` to `stopped`,
    /// returning the count transitioned.
    #[instrument(skip(self), fields(%chat_id))]
    pub fn stop_all(&self, chat_id: &ChatId) -> Result<usize> {
        let mut count = 0;
        for mut entry in self.runs.iter_mut() {
            if &entry.chat_id == chat_id && !entry.status.is_terminal() {
                entry.status = RunStatus::Stopped;
                entry.ended_at = Some(Utc::now());
                count += 1;
            }
        }
        self.persist()?;
        Ok(count)
    }

    /// Completed/error records for `chat_id` whose `parentSessionId`
    /// matches `parent_session_id` and that have not yet been injected
    ///. Pure read; side-effect-free.
    pub fn pending_results(&self, chat_id: &ChatId, parent_session_id: &str) -> Vec<SubagentRun> {
        self.runs
            .iter()
            .filter(|e| {
                &e.chat_id == chat_id
                    && matches!(e.status, RunStatus::Completed | RunStatus::Error)
                    && !e.result_injected
                    && e.parent_session_id.as_deref() == Some(parent_session_id)
            })
            .map(|e| e.value().clone())
            .collect()
    }

    pub fn mark_results_injected(&self, ids: &[Uuid]) -> Result<()> {
        for id in ids {
            if let Some(mut entry) = self.runs.get_mut(id) {
                entry.result_injected = true;
            }
        }
        self.persist()
    }

    /// Keep only the `keep_last` most recent terminal records per chat,
    /// deleting the rest.
    #[instrument(skip(self), fields(%chat_id, keep_last))]
    pub fn prune(&self, chat_id: &ChatId, keep_last: usize) -> Result<usize> {
        let mut terminal: Vec<SubagentRun> = self
            .runs
            .iter()
            .filter(|e| &e.chat_id == chat_id && e.status.is_terminal())
            .map(|e| e.value().clone())
            .collect();
        terminal.sort_by_key(|r| r.ended_at);
        terminal.reverse(); // newest first

        let to_remove: Vec<Uuid> = terminal.into_iter().skip(keep_last).map(|r| r.run_id).collect();
        let removed = to_remove.len();
        for id in &to_remove {
            self.runs.remove(id);
        }
        if removed > 0 {
            self.persist()?;
        }
        Ok(removed)
    }

    /// Delete terminal records whose `endedAt` is older than `ttl`.
    pub fn prune_expired(&self, ttl: chrono::Duration) -> Result<usize> {
        let cutoff = Utc::now() - ttl;
        let to_remove: Vec<Uuid> = self
            .runs
            .iter()
            .filter(|e| e.status.is_terminal() && e.ended_at.map(|t| t < cutoff).unwrap_or(false))
            .map(|e| e.run_id)
            .collect();
        let removed = to_remove.len();
        for id in &to_remove {
            self.runs.remove(id);
        }
        if removed > 0 {
            self.persist()?;
        }
        Ok(removed)
    }

    pub fn get(&self, run_id: Uuid) -> Option<SubagentRun> {
        self.runs.get(&run_id).map(|e| e.value().clone())
    }

    pub fn list_for_chat(&self, chat_id: &ChatId) -> Vec<SubagentRun> {
        self.runs
            .iter()
            .filter(|e| &e.chat_id == chat_id)
            .map(|e| e.value().clone())
            .collect()
    }
}

impl Default for SubagentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(chat: &str) -> SpawnOpts {
        SpawnOpts {
            chat_id: ChatId::new(chat),
            parent_session_id: Some("parent-1".to_string()),
            cli: "claude".to_string(),
            task: "do a thing".to_string(),
            label: Some("S".to_string()),
        }
    }

    #[test]
    fn spawn_refuses_past_cap_leaving_no_partial_record() {
        let reg = SubagentRegistry::new();
        let chat = ChatId::new("1");
        for _ in 0..4 {
            reg.spawn(opts("1"), 4).unwrap();
        }
        let before = reg.list_active(&chat).len();
        let err = reg.spawn(opts("1"), 4).unwrap_err();
        assert!(matches!(err, SubagentError::CapReached { max: 4 }));
        assert_eq!(reg.list_active(&chat).len(), before);
    }

    #[test]
    fn pending_results_only_matching_parent_and_not_injected() {
        let reg = SubagentRegistry::new();
        let run = reg.spawn(opts("1"), 4).unwrap();
        reg.mark_running(run.run_id, Some("child-1".to_string())).unwrap();
        reg.mark_completed(run.run_id, "done".to_string()).unwrap();

        let chat = ChatId::new("1");
        let pending = reg.pending_results(&chat, "parent-1");
        assert_eq!(pending.len(), 1);

        reg.mark_results_injected(&[run.run_id]).unwrap();
        let pending = reg.pending_results(&chat, "parent-1");
        assert!(pending.is_empty());
    }

    #[test]
    fn stop_all_transitions_non_terminal_only() {
        let reg = SubagentRegistry::new();
        let chat = ChatId::new("1");
        let r1 = reg.spawn(opts("1"), 4).unwrap();
        let r2 = reg.spawn(opts("1"), 4).unwrap();
        reg.mark_completed(r1.run_id, "ok".to_string()).unwrap();

        let count = reg.stop_all(&chat).unwrap();
        assert_eq!(count, 1); // only r2 was non-terminal
        assert_eq!(reg.get(r2.run_id).unwrap().status, RunStatus::Stopped);
        assert_eq!(reg.get(r1.run_id).unwrap().status, RunStatus::Completed);
    }

    #[test]
    fn prune_keeps_only_most_recent_terminal() {
        let reg = SubagentRegistry::new();
        let chat = ChatId::new("1");
        let mut ids = vec![];
        for _ in 0..5 {
            let r = reg.spawn(opts("1"), 100).unwrap();
            reg.mark_completed(r.run_id, "ok".to_string()).unwrap();
            ids.push(r.run_id);
        }
        let removed = reg.prune(&chat, 2).unwrap();
        assert_eq!(removed, 3);
        assert_eq!(reg.list_for_chat(&chat).len(), 2);
    }

    #[test]
    fn snapshot_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subagent-registry.json");
        let chat = ChatId::new("1");
        {
            let reg = SubagentRegistry::load(path.clone()).unwrap();
            reg.spawn(opts("1"), 4).unwrap();
        }
        let reg = SubagentRegistry::load(path).unwrap();
        assert_eq!(reg.list_active(&chat).len(), 1);
    }
}
