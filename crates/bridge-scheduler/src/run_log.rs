//! Append-only per-isolated-run history — `cron-runs/<jobId>.jsonl`
//!.
//!
//! Same append idiom as `bridge_store::log::SessionLog`, keyed by job id
//! instead of UTC date.

use std::io::Write;
use std::path::PathBuf;

use crate::error::{Result, SchedulerError};
use crate::types::CronRunRecord;

#[derive(Clone)]
pub struct CronRunLog {
    dir: PathBuf,
}

impl CronRunLog {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path_for(&self, job_id: &str) -> PathBuf {
        self.dir.join(format!("{job_id}.jsonl"))
    }

    pub fn append(&self, record: &CronRunRecord) -> Result<()> {
        std::fs::create_dir_all(&self.dir).map_err(SchedulerError::Io)?;
        let path = self.path_for(&record.job_id);
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(SchedulerError::Io)?;
        let line = serde_json::to_string(record)?;
        writeln!(file, "{line}").map_err(SchedulerError::Io)?;
        Ok(())
    }

    pub fn read_all(&self, job_id: &str) -> Result<Vec<CronRunRecord>> {
        let path = self.path_for(job_id);
        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(SchedulerError::Io(e)),
        };
        let mut out = Vec::new();
        for line in contents.lines() {
            if line.trim().is_empty() {
                continue;
            }
            out.push(serde_json::from_str(line)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RunStatus;

    fn record(job_id: &str, status: RunStatus) -> CronRunRecord {
        CronRunRecord {
            job_id: job_id.to_string(),
            job_name: "nightly backup".to_string(),
            started_at_ms: 1_000,
            completed_at_ms: Some(2_000),
            status,
            summary: Some("ok".to_string()),
            error: None,
            model: None,
        }
    }

    #[test]
    fn append_then_read_all_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let log = CronRunLog::new(dir.path().to_path_buf());
        log.append(&record("job-1", RunStatus::Ok)).unwrap();
        log.append(&record("job-1", RunStatus::Error)).unwrap();
        let records = log.read_all("job-1").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].status, RunStatus::Error);
    }

    #[test]
    fn missing_job_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = CronRunLog::new(dir.path().to_path_buf());
        assert!(log.read_all("nope").unwrap().is_empty());
    }

    #[test]
    fn separate_jobs_get_separate_files() {
        let dir = tempfile::tempdir().unwrap();
        let log = CronRunLog::new(dir.path().to_path_buf());
        log.append(&record("job-a", RunStatus::Ok)).unwrap();
        assert!(log.read_all("job-b").unwrap().is_empty());
        assert_eq!(log.read_all("job-a").unwrap().len(), 1);
    }
}
