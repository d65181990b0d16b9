//! Health/readiness surface — a plain value describing lane queue depths,
//! cron job counts, and resume-store size, returned from a function rather
//! than served over HTTP (HTTP serving is out of scope). One aggregate
//! JSON snapshot of every subsystem.

use serde::Serialize;

use bridge_session::{CommandLaneScheduler, Lane, LaneStats};

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub main_lane: LaneStatsView,
    pub subagent_lane: LaneStatsView,
    pub cron_lane: LaneStatsView,
    pub cron_jobs: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct LaneStatsView {
    pub width: usize,
    pub queued: usize,
    pub running: usize,
}

impl From<LaneStats> for LaneStatsView {
    fn from(s: LaneStats) -> Self {
        Self { width: s.width, queued: s.queued, running: s.running }
    }
}

pub fn report(lanes: &CommandLaneScheduler, cron_jobs: Option<usize>) -> HealthReport {
    HealthReport {
        main_lane: lanes.stats(Lane::Main).into(),
        subagent_lane: lanes.stats(Lane::Subagent).into(),
        cron_lane: lanes.stats(Lane::Cron).into(),
        cron_jobs,
    }
}
