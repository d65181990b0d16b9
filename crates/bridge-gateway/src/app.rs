//! Wiring: turn a [`bridge_core::BridgeConfig`] into a running
//! [`SessionController`] plus (optionally) a live [`CronEngine`] feeding it.
//! Constructs every subsystem up front and hands `Arc`s to the one thing
//! that owns them all.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use bridge_controller::{ControllerConfig, OutboundSink, SessionController};
use bridge_core::BridgeConfig;
use bridge_scheduler::{CronEngine, CronRunLog, CronStore};
use bridge_session::{CommandLaneScheduler, LaneWidths};
use bridge_store::{PersistentSessionStore, SessionLog};
use bridge_subagent::SubagentRegistry;

use crate::enricher::NullContextEnricher;

/// Everything the gateway binary needs to hold onto for the lifetime of the
/// process: the controller itself, plus a shutdown handle for the cron
/// engine's background task.
pub struct Bridge {
    pub controller: Arc<SessionController>,
    cron_shutdown: Option<watch::Sender<bool>>,
}

impl Bridge {
    /// Build every subsystem from config and wire them into one
    /// `SessionController`. `cron_enabled` gates whether the Cron Service
    /// is constructed at all — a deployment that only needs the
    /// Main/Subagent lanes can skip it entirely.
    pub async fn start(
        config: &BridgeConfig,
        outbound: Arc<dyn OutboundSink>,
        default_cli: &str,
        droid_fallback_cli: Option<&str>,
        cron_enabled: bool,
    ) -> anyhow::Result<Self> {
        std::fs::create_dir_all(config.paths.resume_tokens_path().parent().unwrap())?;
        std::fs::create_dir_all(config.paths.sessions_dir())?;

        let manifests = bridge_core::manifest::load_manifests_from_dir(
            std::path::Path::new(&config.paths.manifest_dir),
        )
        .unwrap_or_else(|e| {
            warn!(error = %e, "adapter manifest load failed; falling back to built-ins");
            bridge_core::manifest::builtin_manifests()
        });
        info!(count = manifests.len(), "adapter manifests loaded");

        let sessions = Arc::new(bridge_session::SessionStore::new());
        let resume_store = Arc::new(PersistentSessionStore::load(config.paths.resume_tokens_path())?);
        let session_log = Arc::new(SessionLog::new(config.paths.sessions_dir()));
        let subagents = Arc::new(SubagentRegistry::load(config.paths.subagent_registry_path())?);
        let lanes = Arc::new(CommandLaneScheduler::new(LaneWidths {
            main: config.lanes.main_width,
            subagent: config.lanes.subagent_width,
            cron: config.lanes.cron_width,
        }));
        let enricher = Arc::new(NullContextEnricher);

        let mut cron_store = None;
        let mut cron_run_log = None;
        let mut cron_rx = None;
        let mut cron_shutdown_tx = None;

        if cron_enabled {
            let store = Arc::new(CronStore::load(config.paths.cron_store_path())?);
            let run_log = CronRunLog::new(config.paths.cron_runs_dir());
            let (fired_tx, fired_rx) = mpsc::channel(64);
            let engine = Arc::new(CronEngine::new(
                store.clone(),
                CronRunLog::new(config.paths.cron_runs_dir()),
                Duration::from_secs(config.cron.check_interval_secs),
                fired_tx,
            ));
            engine.recover_on_startup().await?;

            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            tokio::spawn(engine.clone().run(shutdown_rx));

            cron_store = Some(store);
            cron_run_log = Some(Arc::new(run_log));
            cron_rx = Some(fired_rx);
            cron_shutdown_tx = Some(shutdown_tx);
        }

        let controller_config = ControllerConfig::from_bridge_config(
            config,
            default_cli,
            droid_fallback_cli.map(String::from),
        );

        let controller = SessionController::new(
            controller_config,
            manifests,
            sessions,
            resume_store,
            session_log,
            subagents,
            lanes,
            outbound,
            enricher,
            cron_store,
            cron_run_log,
        );

        if let Some(rx) = cron_rx {
            controller.spawn_cron_consumer(rx);
        }

        Ok(Self { controller, cron_shutdown: cron_shutdown_tx })
    }

    /// Graceful shutdown: stop the cron engine's background
    /// task. Lane draining and store flushing happen naturally — every
    /// store write is already a synchronous atomic rewrite, and in-flight
    /// lane tasks are simply left to finish since the scheduler offers no
    /// cancellation.
    pub fn close(&self) {
        if let Some(tx) = &self.cron_shutdown {
            let _ = tx.send(true);
        }
    }
}
