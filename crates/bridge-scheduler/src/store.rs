//! Persistent job store — `cron.json`.

use std::path::PathBuf;
use std::sync::Mutex;

use bridge_store::atomic::{read_json_or_default, write_json_atomic};
use uuid::Uuid;

use crate::error::{Result, SchedulerError};
use crate::types::{CronDocument, CronJob, LastStatus, Schedule, SessionTarget, WakeMode};

pub struct CronStore {
    path: PathBuf,
    doc: Mutex<CronDocument>,
}

impl CronStore {
    pub fn load(path: PathBuf) -> Result<Self> {
        let doc = read_json_or_default(&path, CronDocument::default)?;
        Ok(Self { path, doc: Mutex::new(doc) })
    }

    fn persist(&self, doc: &CronDocument) -> Result<()> {
        write_json_atomic(&self.path, doc)?;
        Ok(())
    }

    pub fn add_job(
        &self,
        name: String,
        schedule: Schedule,
        message: String,
        wake_mode: WakeMode,
        session_target: SessionTarget,
        model: Option<String>,
        now_ms: i64,
    ) -> Result<CronJob> {
        let next_run_at_ms = crate::schedule::compute_next_run(
            &schedule,
            chrono::DateTime::<chrono::Utc>::from_timestamp_millis(now_ms).unwrap_or_else(chrono::Utc::now),
        )
        .map(|dt| dt.timestamp_millis());

        let job = CronJob {
            id: Uuid::new_v4().to_string(),
            name,
            enabled: true,
            schedule,
            message,
            wake_mode,
            session_target,
            model,
            created_at_ms: now_ms,
            next_run_at_ms,
            last_run_at_ms: None,
            last_status: None,
            last_error: None,
            is_reminder: None,
            delivery: None,
        };

        let mut doc = self.doc.lock().unwrap();
        doc.jobs.push(job.clone());
        self.persist(&doc)?;
        Ok(job)
    }

    pub fn remove_job(&self, id: &str) -> Result<()> {
        let mut doc = self.doc.lock().unwrap();
        let before = doc.jobs.len();
        doc.jobs.retain(|j| j.id != id);
        if doc.jobs.len() == before {
            return Err(SchedulerError::JobNotFound { id: id.to_string() });
        }
        self.persist(&doc)
    }

    pub fn list_jobs(&self) -> Vec<CronJob> {
        self.doc.lock().unwrap().jobs.clone()
    }

    pub fn get_job(&self, id: &str) -> Option<CronJob> {
        self.doc.lock().unwrap().jobs.iter().find(|j| j.id == id).cloned()
    }

    pub fn set_enabled(&self, id: &str, enabled: bool) -> Result<()> {
        let mut doc = self.doc.lock().unwrap();
        let job = doc
            .jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or_else(|| SchedulerError::JobNotFound { id: id.to_string() })?;
        job.enabled = enabled;
        self.persist(&doc)
    }

    /// Record a fire: advance `last_run_at_ms` and recompute `next_run_at_ms`
    /// from `now` (never trust the stale stored value). Does not
    /// touch `lastStatus`/`lastError` — those reflect the outcome of
    /// *executing* the job, reported later via [`record_completion`].
    pub fn record_fire(&self, id: &str, fired_at_ms: i64, now: chrono::DateTime<chrono::Utc>) -> Result<CronJob> {
        let mut doc = self.doc.lock().unwrap();
        let job = doc
            .jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or_else(|| SchedulerError::JobNotFound { id: id.to_string() })?;
        job.last_run_at_ms = Some(fired_at_ms);
        job.next_run_at_ms = crate::schedule::compute_next_run(&job.schedule, now).map(|dt| dt.timestamp_millis());
        let updated = job.clone();
        self.persist(&doc)?;
        Ok(updated)
    }

    /// Record the outcome of an executed job.
    /// Called by the controller once the Main/Cron lane task finishes.
    pub fn record_completion(&self, id: &str, status: LastStatus, error: Option<String>) -> Result<()> {
        let mut doc = self.doc.lock().unwrap();
        let job = doc
            .jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or_else(|| SchedulerError::JobNotFound { id: id.to_string() })?;
        job.last_status = Some(status);
        job.last_error = error;
        self.persist(&doc)
    }

    /// Recompute every enabled job's `next_run_at_ms` from `now`, never
    /// trusting the stored value.
    pub fn recompute_all_next_runs(&self, now: chrono::DateTime<chrono::Utc>) -> Result<()> {
        let mut doc = self.doc.lock().unwrap();
        for job in doc.jobs.iter_mut().filter(|j| j.enabled) {
            job.next_run_at_ms = crate::schedule::compute_next_run(&job.schedule, now).map(|dt| dt.timestamp_millis());
        }
        self.persist(&doc)
    }
}
