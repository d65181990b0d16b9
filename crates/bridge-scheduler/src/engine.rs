//! Firing loop — a single adaptive timer that wakes for the nearest due
//! job, fires every job whose `nextRunAtMs <= now`, and re-arms.
//!
//! A `tokio::select!` over the adaptive timer and a `watch::Receiver<bool>`
//! shutdown signal, with each fire routed through the three-way
//! `CronEvent` dispatch (main-chat message, subagent spawn, or isolated
//! one-off job).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::run_log::CronRunLog;
use crate::schedule::compute_next_run;
use crate::store::CronStore;
use crate::types::{CronEvent, CronJob, CronRunRecord, RunStatus, SessionTarget, WakeMode};

/// Never schedule a timeout longer than this.
const TIMER_CLAMP: StdDuration = StdDuration::from_millis(i32::MAX as u64);

pub struct CronEngine {
    store: Arc<CronStore>,
    run_log: CronRunLog,
    check_interval: StdDuration,
    fired_tx: mpsc::Sender<CronEvent>,
    /// Reentrancy guard: a tick in progress blocks the next one
    /// from overlapping it, rather than queuing concurrent persistence.
    firing: AtomicBool,
}

impl CronEngine {
    pub fn new(
        store: Arc<CronStore>,
        run_log: CronRunLog,
        check_interval: StdDuration,
        fired_tx: mpsc::Sender<CronEvent>,
    ) -> Self {
        Self { store, run_log, check_interval, fired_tx, firing: AtomicBool::new(false) }
    }

    /// Startup recovery: collapse missed runs into one
    /// catch-up fire per job, then recompute every `nextRunAtMs` from now.
    pub async fn recover_on_startup(&self) -> Result<()> {
        let now = Utc::now();
        for job in self.store.list_jobs().into_iter().filter(|j| j.enabled) {
            if let Some(last_ms) = job.last_run_at_ms {
                let last = DateTime::<Utc>::from_timestamp_millis(last_ms).unwrap_or(now);
                if let Some(latest_missed) = self.latest_missed_run(&job, last, now) {
                    warn!(job_id = %job.id, "collapsing missed runs into one catch-up fire");
                    self.fire_job(job.clone(), latest_missed.timestamp_millis()).await?;
                }
            }
        }
        self.store.recompute_all_next_runs(now)?;
        Ok(())
    }

    /// The latest scheduled instant strictly between `last` and `now`, if
    /// any.
    fn latest_missed_run(&self, job: &CronJob, last: DateTime<Utc>, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut cursor = last;
        let mut latest = None;
        loop {
            let next = compute_next_run(&job.schedule, cursor)?;
            if next >= now {
                break;
            }
            latest = Some(next);
            cursor = next;
        }
        latest
    }

    /// Main loop. Wakes at `min(earliest nextRunAtMs, checkInterval)`,
    /// fires every due job, re-arms, and repeats until `shutdown` signals.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!("cron engine started");
        loop {
            let sleep_for = self.next_wake_delay();
            tokio::select! {
                _ = tokio::time::sleep(sleep_for) => {
                    if let Err(e) = self.tick().await {
                        error!("cron tick error: {e}");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("cron engine shutting down");
                        break;
                    }
                }
            }
        }
    }

    fn next_wake_delay(&self) -> StdDuration {
        let now = Utc::now();
        let earliest = self
            .store
            .list_jobs()
            .into_iter()
            .filter(|j| j.enabled)
            .filter_map(|j| j.next_run_at_ms)
            .min();

        let Some(earliest_ms) = earliest else {
            return self.check_interval.min(TIMER_CLAMP);
        };
        let earliest = DateTime::<Utc>::from_timestamp_millis(earliest_ms).unwrap_or(now);
        let delta = (earliest - now).to_std().unwrap_or(StdDuration::ZERO);
        delta.min(self.check_interval).min(TIMER_CLAMP).max(StdDuration::from_millis(1))
    }

    async fn tick(&self) -> Result<()> {
        if self.firing.swap(true, Ordering::SeqCst) {
            return Ok(()); // previous tick still persisting; skip this wake
        }
        let result = self.tick_inner().await;
        self.firing.store(false, Ordering::SeqCst);
        result
    }

    async fn tick_inner(&self) -> Result<()> {
        let now = Utc::now();
        let now_ms = now.timestamp_millis();
        let due: Vec<CronJob> = self
            .store
            .list_jobs()
            .into_iter()
            .filter(|j| j.enabled && j.next_run_at_ms.map(|t| t <= now_ms).unwrap_or(false))
            .collect();

        for job in due {
            self.fire_job(job, now_ms).await?;
        }
        Ok(())
    }

    /// Route one firing by `wakeMode`/`sessionTarget` and persist the
    /// resulting `lastRunAtMs`/`nextRunAtMs`.
    async fn fire_job(&self, job: CronJob, fired_at_ms: i64) -> Result<()> {
        let now = Utc::now();
        let event = if job.wake_mode == WakeMode::NextHeartbeat {
            CronEvent::Heartbeat { job: job.clone() }
        } else if job.session_target == SessionTarget::Isolated {
            let run_id = Uuid::new_v4().to_string();
            self.run_log.append(&CronRunRecord {
                job_id: job.id.clone(),
                job_name: job.name.clone(),
                started_at_ms: fired_at_ms,
                completed_at_ms: None,
                status: RunStatus::Running,
                summary: None,
                error: None,
                model: job.model.clone(),
            })?;
            CronEvent::Isolated { job: job.clone(), run_id }
        } else {
            CronEvent::Due { job: job.clone() }
        };

        self.store.record_fire(&job.id, fired_at_ms, now)?;
        info!(job_id = %job.id, name = %job.name, "cron job fired");

        if self.fired_tx.send(event).await.is_err() {
            warn!(job_id = %job.id, "cron event receiver dropped; job fired but not delivered");
        }
        Ok(())
    }

    pub fn store(&self) -> &Arc<CronStore> {
        &self.store
    }

    pub fn run_log(&self) -> &CronRunLog {
        &self.run_log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Schedule, SessionTarget as ST, WakeMode as WM};

    fn fresh_store() -> (tempfile::TempDir, Arc<CronStore>) {
        let dir = tempfile::tempdir().unwrap();
        let store = CronStore::load(dir.path().join("cron.json")).unwrap();
        (dir, Arc::new(store))
    }

    #[tokio::test]
    async fn missed_runs_collapse_into_one_catch_up_fire() {
        let (dir, store) = fresh_store();
        let now = Utc::now();
        let job = store
            .add_job(
                "heartbeat".to_string(),
                Schedule::Every { every: 60_000 },
                "ping".to_string(),
                WM::Now,
                ST::Main,
                None,
                (now - chrono::Duration::minutes(5)).timestamp_millis(),
            )
            .unwrap();
        // simulate the job having last run 5 minutes ago
        store
            .record_fire(
                &job.id,
                (now - chrono::Duration::minutes(5)).timestamp_millis(),
                now - chrono::Duration::minutes(5),
            )
            .unwrap();

        let (tx, mut rx) = mpsc::channel(8);
        let run_log = CronRunLog::new(dir.path().join("cron-runs"));
        let engine = CronEngine::new(store.clone(), run_log, StdDuration::from_secs(60), tx);

        engine.recover_on_startup().await.unwrap();

        let mut fired = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, CronEvent::Due { .. }) {
                fired += 1;
            }
        }
        assert_eq!(fired, 1, "exactly one catch-up fire expected");

        let updated = store.get_job(&job.id).unwrap();
        assert!(updated.next_run_at_ms.unwrap() > now.timestamp_millis());
        drop(dir);
    }
}
