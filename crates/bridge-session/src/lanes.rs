//! Command Lane Scheduler — three named bounded-concurrency FIFO lanes,
//! each independently `Semaphore`-gated. Tokio's semaphore grants permits
//! to waiters in acquisition order, which gives FIFO start order within a
//! lane for free; each accepted task runs inside its own `tokio::spawn`,
//! so a panic there cannot take down the lane.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    Main,
    Subagent,
    Cron,
}

#[derive(Debug, Clone, Copy)]
pub struct LaneWidths {
    pub main: usize,
    pub subagent: usize,
    pub cron: usize,
}

impl Default for LaneWidths {
    /// Default widths 1/4/1.
    fn default() -> Self {
        Self { main: 1, subagent: 4, cron: 1 }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LaneStats {
    pub width: usize,
    pub queued: usize,
    pub running: usize,
}

struct LaneHandle {
    semaphore: Arc<Semaphore>,
    width: usize,
    queued: Arc<AtomicUsize>,
    running: Arc<AtomicUsize>,
}

impl LaneHandle {
    fn new(width: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(width)),
            width,
            queued: Arc::new(AtomicUsize::new(0)),
            running: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn enqueue<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let semaphore = self.semaphore.clone();
        let queued = self.queued.clone();
        let running = self.running.clone();
        queued.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(async move {
            let permit = match semaphore.acquire_owned().await {
                Ok(p) => p,
                Err(_) => return, // lane closed during shutdown
            };
            queued.fetch_sub(1, Ordering::SeqCst);
            running.fetch_add(1, Ordering::SeqCst);
            task.await;
            running.fetch_sub(1, Ordering::SeqCst);
            drop(permit);
        });
    }

    fn stats(&self) -> LaneStats {
        LaneStats {
            width: self.width,
            queued: self.queued.load(Ordering::SeqCst),
            running: self.running.load(Ordering::SeqCst),
        }
    }
}

/// Three named lanes, each FIFO with fixed concurrency.
/// "No cross-lane ordering guarantee" falls out naturally: each lane has
/// its own independent semaphore and task set.
pub struct CommandLaneScheduler {
    main: LaneHandle,
    subagent: LaneHandle,
    cron: LaneHandle,
}

impl CommandLaneScheduler {
    pub fn new(widths: LaneWidths) -> Self {
        Self {
            main: LaneHandle::new(widths.main),
            subagent: LaneHandle::new(widths.subagent),
            cron: LaneHandle::new(widths.cron),
        }
    }

    fn handle(&self, lane: Lane) -> &LaneHandle {
        match lane {
            Lane::Main => &self.main,
            Lane::Subagent => &self.subagent,
            Lane::Cron => &self.cron,
        }
    }

    /// Submit `task` to `lane`. Tasks are not cancellable through the
    /// scheduler — cancellation is the task's own
    /// responsibility, e.g. via `AgentProcess::terminate()`.
    pub fn enqueue<F>(&self, lane: Lane, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handle(lane).enqueue(task);
    }

    pub fn stats(&self, lane: Lane) -> LaneStats {
        self.handle(lane).stats()
    }
}

/// Wraps a fallible task so a failure is logged rather than silently lost
///.
pub async fn run_guarded<F>(label: &'static str, task: F)
where
    F: Future<Output = Result<(), Box<dyn std::error::Error + Send + Sync>>>,
{
    if let Err(e) = task.await {
        warn!(lane_task = label, error = %e, "lane task failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    #[tokio::test]
    async fn lane_never_exceeds_its_width() {
        let scheduler = CommandLaneScheduler::new(LaneWidths { main: 1, subagent: 2, cron: 1 });
        let peak = Arc::new(AtomicU32::new(0));
        let current = Arc::new(AtomicU32::new(0));

        for _ in 0..6 {
            let peak = peak.clone();
            let current = current.clone();
            scheduler.enqueue(Lane::Subagent, async move {
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                current.fetch_sub(1, Ordering::SeqCst);
            });
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn panicking_task_does_not_crash_the_lane() {
        let scheduler = CommandLaneScheduler::new(LaneWidths::default());
        scheduler.enqueue(Lane::Main, async { panic!("boom") });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let ran = Arc::new(AtomicU32::new(0));
        let ran2 = ran.clone();
        scheduler.enqueue(Lane::Main, async move {
            ran2.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stats_report_width_and_in_flight() {
        let scheduler = CommandLaneScheduler::new(LaneWidths { main: 1, subagent: 4, cron: 1 });
        let stats = scheduler.stats(Lane::Subagent);
        assert_eq!(stats.width, 4);
        assert_eq!(stats.running, 0);
    }
}
