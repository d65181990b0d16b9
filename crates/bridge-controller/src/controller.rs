//! The Session Controller — the hub that drives `handleInbound` /
//! `processMessage`: it owns every other crate's collaborators and drives
//! one chat's turn from inbound message to the final outbound reply, atop
//! the three-lane scheduling in `bridge-session`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use bridge_agent::{AdapterDriver, AgentProcess, BridgeEvent, RunOptions};
use bridge_core::{
    resolve_model_alias, AdapterManifest, Attachment, ChatId, CliName, ForwardInfo, InboundMessage,
};
use bridge_dispatch::{CronAction, DispatchAction, SpawnArgs, SubagentsAction, ToggleArg};
use bridge_scheduler::{CronEvent, CronJob, CronRunLog, CronStore, LastStatus, RunStatus as CronRunStatus};
use bridge_session::{
    CommandLaneScheduler, Lane, QueueContext, QueuedMessage, Session, SessionStore,
};
use bridge_store::{PersistentSessionStore, Role, SessionLog, SessionLogEntry, SubagentMeta};
use bridge_subagent::{RunStatus as SubagentStatus, SpawnOpts, SubagentError, SubagentRegistry, SubagentRun};

use crate::error::{ControllerError, Result};
use crate::format::{
    completion_announcement, cost_message, pending_results_block, spawn_ack, start_notification,
    subagent_completion_announcement,
};
use crate::prompt::{build_user_text, pending_results_prefix, PromptParts, SPAWN_INSTRUCTIONS};
use crate::sendfile::extract_sendfile_directives;
use crate::sinks::{ContextEnricher, OutboundSink};
use crate::split::split_message;
use crate::stream::StreamAggregator;

/// Outbound chunk size limit.
const SPLIT_MAX_LEN: usize = 4000;
/// Typing-indicator pump cadence.
const TYPING_INTERVAL: std::time::Duration = std::time::Duration::from_secs(4);
/// Delay before `/restart` actually signals the process.
const RESTART_DELAY: std::time::Duration = std::time::Duration::from_millis(500);

/// Tunables the controller needs beyond what [`bridge_core::BridgeConfig`]
/// already carries (the default adapter and the droid fallback are
/// deployment choices, not limits).
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub default_cli: String,
    pub droid_fallback_cli: Option<String>,
    pub subagent_cap: usize,
    pub queue_bound: usize,
    pub subagent_retention: usize,
    pub subagent_ttl: chrono::Duration,
    pub tool_recursion_depth: u8,
}

impl ControllerConfig {
    pub fn from_bridge_config(
        cfg: &bridge_core::BridgeConfig,
        default_cli: impl Into<String>,
        droid_fallback_cli: Option<String>,
    ) -> Self {
        Self {
            default_cli: default_cli.into(),
            droid_fallback_cli,
            subagent_cap: cfg.limits.subagent_cap,
            queue_bound: cfg.limits.queue_bound,
            subagent_retention: cfg.limits.subagent_retention,
            subagent_ttl: chrono::Duration::seconds(cfg.limits.subagent_ttl_secs as i64),
            tool_recursion_depth: cfg.limits.tool_recursion_depth,
        }
    }
}

/// The hub. One instance per running bridge process; `bridge-gateway`
/// constructs it once and feeds it every inbound message.
pub struct SessionController {
    config: ControllerConfig,
    drivers: HashMap<String, Arc<dyn AdapterDriver>>,
    sessions: Arc<SessionStore>,
    resume_store: Arc<PersistentSessionStore>,
    session_log: Arc<SessionLog>,
    subagents: Arc<SubagentRegistry>,
    cron_store: Option<Arc<CronStore>>,
    cron_run_log: Option<Arc<CronRunLog>>,
    lanes: Arc<CommandLaneScheduler>,
    outbound: Arc<dyn OutboundSink>,
    enricher: Arc<dyn ContextEnricher>,
    primary_chat_id: StdMutex<Option<ChatId>>,
    /// Live process handles, kept outside `Session`/`SubagentRun` so
    /// `/stop`, `/interrupt`, and `/restart` can reach into a running turn.
    main_processes: DashMap<ChatId, Arc<AgentProcess>>,
    subagent_processes: DashMap<Uuid, Arc<AgentProcess>>,
    /// `toolId -> runId` for subagent spawns proxied through an adapter's
    /// own built-in `Task` tool rather than `/spawn`.
    proxy_runs: DashMap<String, Uuid>,
    /// Jobs fired with `wakeMode=next-heartbeat`, delivered opportunistically
    /// on the next user turn.
    pending_heartbeats: StdMutex<Vec<CronJob>>,
}

impl SessionController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: ControllerConfig,
        manifests: Vec<AdapterManifest>,
        sessions: Arc<SessionStore>,
        resume_store: Arc<PersistentSessionStore>,
        session_log: Arc<SessionLog>,
        subagents: Arc<SubagentRegistry>,
        lanes: Arc<CommandLaneScheduler>,
        outbound: Arc<dyn OutboundSink>,
        enricher: Arc<dyn ContextEnricher>,
        cron_store: Option<Arc<CronStore>>,
        cron_run_log: Option<Arc<CronRunLog>>,
    ) -> Arc<Self> {
        let drivers = manifests
            .into_iter()
            .map(|m| (m.name.clone(), Arc::<dyn AdapterDriver>::from(bridge_agent::driver_for(m))))
            .collect();
        Arc::new(Self {
            config,
            drivers,
            sessions,
            resume_store,
            session_log,
            subagents,
            cron_store,
            cron_run_log,
            lanes,
            outbound,
            enricher,
            primary_chat_id: StdMutex::new(None),
            main_processes: DashMap::new(),
            subagent_processes: DashMap::new(),
            proxy_runs: DashMap::new(),
            pending_heartbeats: StdMutex::new(Vec::new()),
        })
    }

    fn primary_chat_id(&self) -> Option<ChatId> {
        self.primary_chat_id.lock().unwrap().clone()
    }

    fn note_primary_chat(&self, chat_id: &ChatId) {
        let mut guard = self.primary_chat_id.lock().unwrap();
        if guard.is_none() {
            *guard = Some(chat_id.clone());
        }
    }

    // ---- inbound routing ------------------------------------

    /// Route one inbound message: dispatcher first, then natural-language
    /// spawn detection, then the ordinary prompt path (busy → enqueue,
    /// idle → run now).
    #[instrument(skip(self, msg), fields(chat_id = %msg.chat_id))]
    pub async fn handle_inbound(self: &Arc<Self>, msg: InboundMessage) {
        self.note_primary_chat(&msg.chat_id);
        self.drain_heartbeats().await;

        let ctx = QueueContext {
            source: msg.context.source.clone().or_else(|| Some("user".to_string())),
            cron_job_id: msg.context.cron_job_id.clone(),
            memory_tool_depth: msg.context.memory_tool_depth.unwrap_or(0) as u32,
            is_private: msg.context.is_private.unwrap_or(false),
        };

        if let Some(text) = msg.text.as_deref() {
            if let Some(action) = bridge_dispatch::dispatch(text) {
                self.dispatch_action(&msg.chat_id, action).await;
                return;
            }
            if let Some(task) = detect_natural_language_spawn(text) {
                let _ = self
                    .spawn_subagent(&msg.chat_id, SpawnRequest { task, label: None, cli: None })
                    .await;
                return;
            }
        }

        let user_text = build_user_text(msg.text.as_deref(), &msg.attachments, msg.forward.as_ref());
        self.enqueue_or_run_main(msg.chat_id, user_text, ctx).await;
    }

    /// Busy chats queue (bounded); idle chats run immediately on the Main
    /// lane.
    async fn enqueue_or_run_main(self: &Arc<Self>, chat_id: ChatId, text: String, ctx: QueueContext) {
        if self.sessions.is_busy(&chat_id) {
            let msg = QueuedMessage::new(text, Vec::new(), ctx);
            if self.sessions.enqueue(&chat_id, msg, self.config.queue_bound).is_err() {
                self.outbound.send(&chat_id, "❌ Queue full, please wait for the current turn to finish.").await;
            }
            return;
        }
        let controller = Arc::clone(self);
        self.lanes.enqueue(Lane::Main, async move {
            controller.process_message(chat_id, text, ctx).await;
        });
    }

    // ---- command dispatch -------------------------------------

    async fn dispatch_action(self: &Arc<Self>, chat_id: &ChatId, action: DispatchAction) {
        match action {
            DispatchAction::UseCli { cli } => self.handle_use_cli(chat_id, cli).await,
            DispatchAction::SetModel { alias } => self.handle_set_model(chat_id, alias).await,
            DispatchAction::New => self.handle_new(chat_id).await,
            DispatchAction::Stop => self.handle_stop(chat_id).await,
            DispatchAction::Interrupt => self.handle_interrupt(chat_id).await,
            DispatchAction::Restart => self.handle_restart(chat_id).await,
            DispatchAction::Status => self.handle_status(chat_id).await,
            DispatchAction::Stream(toggle) => self.handle_toggle_stream(chat_id, toggle).await,
            DispatchAction::Verbose(toggle) => self.handle_toggle_verbose(chat_id, toggle).await,
            DispatchAction::Spawn(args) => {
                let _ = self.spawn_subagent(chat_id, SpawnRequest::from(args)).await;
            }
            DispatchAction::Subagents(sub) => self.handle_subagents(chat_id, sub).await,
            DispatchAction::Cron(cron) => self.handle_cron(chat_id, cron).await,
            DispatchAction::Concepts { term } => {
                match self.enricher.related_files(&term).await {
                    Some(text) => self.outbound.send(chat_id, &text).await,
                    None => self.outbound.send(chat_id, "No matching concepts found.").await,
                }
            }
            DispatchAction::Related { term } => {
                match self.enricher.related_files(&term).await {
                    Some(text) => self.outbound.send(chat_id, &text).await,
                    None => self.outbound.send(chat_id, "No related files found.").await,
                }
            }
            DispatchAction::File { path } => {
                self.outbound.send(chat_id, &format!("[File: {path}]")).await;
            }
            DispatchAction::Aliases { .. } => {
                self.outbound.send(chat_id, "opus, sonnet, haiku, codex, codex-max, gemini, gemini-flash, pi, pi-opus, pi-haiku").await;
            }
            DispatchAction::Usage { message, .. } => {
                self.outbound.send(chat_id, &message).await;
            }
        }
    }

    async fn handle_use_cli(&self, chat_id: &ChatId, cli: String) {
        if !self.drivers.contains_key(&cli) {
            self.outbound.send(chat_id, &format!("❌ unknown CLI adapter: {cli}")).await;
            return;
        }
        if self.resume_store.set_active_cli(chat_id, &CliName::new(cli.clone())).is_ok() {
            self.outbound.send(chat_id, &format!("Switched to {cli}.")).await;
        }
    }

    async fn handle_set_model(&self, chat_id: &ChatId, alias: String) {
        let resolved = resolve_model_alias(&alias);
        let result = self.resume_store.update_chat_settings(chat_id, |s| s.model = Some(alias.clone()));
        if result.is_ok() {
            self.outbound.send(chat_id, &format!("Model set to {resolved}.")).await;
        }
    }

    /// `/new`: best-effort flush today's log to memory, drop the main
    /// session, keep the resume token.
    async fn handle_new(self: &Arc<Self>, chat_id: &ChatId) {
        if let Err(e) = self.flush_session_summary(chat_id).await {
            warn!(%chat_id, error = %e, "best-effort memory-summary flush failed");
        }
        self.terminate_main(chat_id).await;
        self.sessions.clear_main(chat_id);
        self.outbound.send(chat_id, "Starting fresh").await;
    }

    async fn flush_session_summary(&self, chat_id: &ChatId) -> Result<()> {
        let today = chrono::Utc::now().date_naive();
        let entries = self.session_log.read_day(today)?;
        let relevant: Vec<_> = entries.into_iter().filter(|e| e.chat_id == chat_id.0).collect();
        if relevant.is_empty() {
            return Ok(());
        }
        self.enricher.flush_session_summary(chat_id, &relevant).await;
        Ok(())
    }

    async fn handle_stop(&self, chat_id: &ChatId) {
        self.terminate_main(chat_id).await;
        self.sessions.clear_main(chat_id);

        let mut stopped_subagents = 0usize;
        for run in self.subagents.list_active(chat_id) {
            if let Some((_, process)) = self.subagent_processes.remove(&run.run_id) {
                process.terminate().await;
            }
            stopped_subagents += 1;
        }
        let _ = self.subagents.stop_all(chat_id);

        self.outbound
            .send(chat_id, &format!("🛑 Stopped (main session and {stopped_subagents} subagent(s))"))
            .await;
    }

    async fn handle_interrupt(self: &Arc<Self>, chat_id: &ChatId) {
        self.terminate_main(chat_id).await;
        self.sessions.clear_main(chat_id);
        self.outbound.send(chat_id, "⏸ Interrupted").await;
        self.flush_next_queued(chat_id).await;
    }

    async fn handle_restart(&self, chat_id: &ChatId) {
        self.outbound.send(chat_id, "♻️ Restarting…").await;
        tokio::spawn(async move {
            tokio::time::sleep(RESTART_DELAY).await;
            #[cfg(unix)]
            {
                let _ = nix::sys::signal::raise(nix::sys::signal::Signal::SIGTERM);
            }
        });
    }

    async fn handle_status(&self, chat_id: &ChatId) {
        let cli = self.resolve_active_cli(chat_id);
        let busy = self.sessions.is_busy(chat_id);
        let queued = self.sessions.queue_len(chat_id);
        let active_subagents = self.subagents.list_active(chat_id).len();
        let settings = self.resume_store.get_chat_settings(chat_id);
        let status = format!(
            "CLI: {cli}\nState: {}\nQueued: {queued}\nActive subagents: {active_subagents}\nStreaming: {}\nVerbose: {}",
            if busy { "busy" } else { "idle" },
            if settings.streaming { "on" } else { "off" },
            if settings.verbose { "on" } else { "off" },
        );
        self.outbound.send(chat_id, &status).await;
    }

    async fn handle_toggle_stream(&self, chat_id: &ChatId, toggle: ToggleArg) {
        let settings = match toggle {
            ToggleArg::Show => self.resume_store.get_chat_settings(chat_id),
            ToggleArg::On => self.resume_store.update_chat_settings(chat_id, |s| s.streaming = true).unwrap_or_default(),
            ToggleArg::Off => self.resume_store.update_chat_settings(chat_id, |s| s.streaming = false).unwrap_or_default(),
        };
        self.outbound.send(chat_id, &format!("Streaming: {}", if settings.streaming { "on" } else { "off" })).await;
    }

    async fn handle_toggle_verbose(&self, chat_id: &ChatId, toggle: ToggleArg) {
        let settings = match toggle {
            ToggleArg::Show => self.resume_store.get_chat_settings(chat_id),
            ToggleArg::On => self.resume_store.update_chat_settings(chat_id, |s| s.verbose = true).unwrap_or_default(),
            ToggleArg::Off => self.resume_store.update_chat_settings(chat_id, |s| s.verbose = false).unwrap_or_default(),
        };
        self.outbound.send(chat_id, &format!("Verbose: {}", if settings.verbose { "on" } else { "off" })).await;
    }

    async fn handle_subagents(&self, chat_id: &ChatId, action: SubagentsAction) {
        match action {
            SubagentsAction::List => {
                let runs = self.subagents.list_for_chat(chat_id);
                if runs.is_empty() {
                    self.outbound.send(chat_id, "No subagents for this chat.").await;
                } else {
                    self.outbound.send(chat_id, &pending_results_block(&runs)).await;
                }
            }
            SubagentsAction::Stop { run_id } => {
                // `/subagents stop <id>` only flips the registry status. It
                // does not kill the child process — the only path that
                // does is `/stop`, which iterates sessions.
                if let Ok(id) = Uuid::parse_str(&run_id) {
                    let _ = self.subagents.stop(id);
                    self.outbound.send(chat_id, &format!("Stopped {run_id}.")).await;
                } else {
                    self.outbound.send(chat_id, &format!("❌ not a valid run id: {run_id}")).await;
                }
            }
            SubagentsAction::StopAll => {
                let count = self.subagents.stop_all(chat_id).unwrap_or(0);
                self.outbound.send(chat_id, &format!("Stopped {count} subagent(s).")).await;
            }
            SubagentsAction::Log { run_id } => {
                if let Ok(id) = Uuid::parse_str(&run_id) {
                    match self.subagents.get(id) {
                        Some(run) => self.outbound.send(chat_id, &subagent_completion_announcement(&run)).await,
                        None => self.outbound.send(chat_id, &format!("No such run: {run_id}")).await,
                    }
                } else {
                    self.outbound.send(chat_id, &format!("❌ not a valid run id: {run_id}")).await;
                }
            }
        }
    }

    async fn handle_cron(self: &Arc<Self>, chat_id: &ChatId, action: CronAction) {
        let Some(store) = self.cron_store.clone() else {
            self.outbound.send(chat_id, "Cron is not enabled for this deployment.").await;
            return;
        };
        match action {
            CronAction::List => {
                let jobs = store.list_jobs();
                if jobs.is_empty() {
                    self.outbound.send(chat_id, "No cron jobs configured.").await;
                } else {
                    let lines: Vec<String> = jobs
                        .iter()
                        .map(|j| format!("{} [{}] {} — {}", j.name, j.id, if j.enabled { "enabled" } else { "disabled" }, bridge_scheduler::format_schedule(&j.schedule)))
                        .collect();
                    self.outbound.send(chat_id, &lines.join("\n")).await;
                }
            }
            CronAction::Add { name, schedule } => {
                match bridge_scheduler::parse_schedule_arg(&schedule) {
                    Ok(parsed) => {
                        // The dispatcher's `/cron add "<name>" <schedule>` grammar carries
                        // no separate message field; the job name doubles as its fire
                        // message (see DESIGN.md's bridge-scheduler section).
                        let now_ms = chrono::Utc::now().timestamp_millis();
                        match store.add_job(
                            name.clone(),
                            parsed,
                            name.clone(),
                            bridge_scheduler::WakeMode::Now,
                            bridge_scheduler::SessionTarget::Main,
                            None,
                            now_ms,
                        ) {
                            Ok(job) => self.outbound.send(chat_id, &format!("Added cron job \"{}\" ({}).", job.name, job.id)).await,
                            Err(e) => self.outbound.send(chat_id, &format!("❌ {e}")).await,
                        }
                    }
                    Err(e) => self.outbound.send(chat_id, &format!("❌ {e}")).await,
                }
            }
            CronAction::Remove { job_id } => match store.remove_job(&job_id) {
                Ok(()) => self.outbound.send(chat_id, &format!("Removed {job_id}.")).await,
                Err(e) => self.outbound.send(chat_id, &format!("❌ {e}")).await,
            },
            CronAction::Enable { job_id } => match store.set_enabled(&job_id, true) {
                Ok(()) => self.outbound.send(chat_id, &format!("Enabled {job_id}.")).await,
                Err(e) => self.outbound.send(chat_id, &format!("❌ {e}")).await,
            },
            CronAction::Disable { job_id } => match store.set_enabled(&job_id, false) {
                Ok(()) => self.outbound.send(chat_id, &format!("Disabled {job_id}.")).await,
                Err(e) => self.outbound.send(chat_id, &format!("❌ {e}")).await,
            },
            CronAction::Run { job_id } => match store.get_job(&job_id) {
                Some(job) => {
                    self.outbound.send(chat_id, &format!("Running \"{}\" now.", job.name)).await;
                    let ctx = QueueContext {
                        source: Some("cron".to_string()),
                        cron_job_id: Some(job.id.clone()),
                        memory_tool_depth: 0,
                        is_private: false,
                    };
                    self.enqueue_or_run_main(chat_id.clone(), job.message.clone(), ctx).await;
                }
                None => self.outbound.send(chat_id, &format!("No such job: {job_id}")).await,
            },
        }
    }

    async fn terminate_main(&self, chat_id: &ChatId) {
        if let Some((_, process)) = self.main_processes.remove(chat_id) {
            process.terminate().await;
        }
    }

    /// Drain one queued message and re-enter `processMessage` for it
    ///.
    async fn flush_next_queued(self: &Arc<Self>, chat_id: &ChatId) {
        if let Some(queued) = self.sessions.dequeue(chat_id) {
            let controller = Arc::clone(self);
            let chat = chat_id.clone();
            self.lanes.enqueue(Lane::Main, async move {
                controller.process_message(chat, queued.text, queued.context).await;
            });
        }
    }

    async fn drain_heartbeats(self: &Arc<Self>) {
        let due = {
            let mut guard = self.pending_heartbeats.lock().unwrap();
            std::mem::take(&mut *guard)
        };
        let Some(chat_id) = self.primary_chat_id() else { return };
        for job in due {
            let ctx = QueueContext {
                source: Some("cron".to_string()),
                cron_job_id: Some(job.id.clone()),
                memory_tool_depth: 0,
                is_private: false,
            };
            self.enqueue_or_run_main(chat_id.clone(), job.message.clone(), ctx).await;
        }
    }

    // ---- cron event consumption -------------------------------

    /// Background task draining the Cron Service's firing channel, routing
    /// each [`CronEvent`] to the right lane. Called once by `bridge-gateway`
    /// at startup.
    pub fn spawn_cron_consumer(self: &Arc<Self>, mut rx: mpsc::Receiver<CronEvent>) {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    CronEvent::Due { job } => {
                        let Some(chat_id) = controller.primary_chat_id() else { continue };
                        let ctx = QueueContext {
                            source: Some("cron".to_string()),
                            cron_job_id: Some(job.id.clone()),
                            memory_tool_depth: 0,
                            is_private: false,
                        };
                        controller.enqueue_or_run_main(chat_id, job.message.clone(), ctx).await;
                    }
                    CronEvent::Isolated { job, run_id } => {
                        let inner = Arc::clone(&controller);
                        controller.lanes.enqueue(Lane::Cron, async move {
                            inner.run_isolated_cron_job(job, run_id).await;
                        });
                    }
                    CronEvent::Heartbeat { job } => {
                        controller.pending_heartbeats.lock().unwrap().push(job);
                    }
                }
            }
        });
    }

    async fn run_isolated_cron_job(self: Arc<Self>, job: CronJob, run_id: String) {
        let Some(chat_id) = self.primary_chat_id() else {
            warn!(job_id = %job.id, "isolated cron job fired with no primary chat registered");
            return;
        };
        let cli_name = job
            .model
            .as_ref()
            .map(|_| self.resolve_active_cli(&chat_id))
            .unwrap_or_else(|| self.resolve_active_cli(&chat_id));
        let Some(driver) = self.drivers.get(&cli_name).cloned() else {
            return;
        };
        let model = job.model.as_deref().map(resolve_model_alias);

        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (exit_tx, mut exit_rx) = mpsc::unbounded_channel();
        let process = Arc::new(AgentProcess::new(driver, event_tx, exit_tx));
        let run_opts = RunOptions { prompt: job.message.clone(), resume_session_id: None, model, working_dir: None };

        if let Err(e) = process.clone().run(run_opts).await {
            self.record_cron_completion(&job, &run_id, CronRunStatus::Error, Some(e.to_string())).await;
            return;
        }

        let mut answer = String::new();
        let mut is_error = false;
        let mut event_rx_closed = false;
        loop {
            tokio::select! {
                maybe = event_rx.recv(), if !event_rx_closed => {
                    match maybe {
                        Some(BridgeEvent::Completed { answer: a, is_error: err, .. }) => {
                            answer = a;
                            is_error = err;
                        }
                        Some(BridgeEvent::Error { message }) => {
                            answer = message;
                            is_error = true;
                        }
                        Some(_) => {}
                        None => event_rx_closed = true,
                    }
                }
                _ = exit_rx.recv() => break,
            }
        }

        let status = if is_error { CronRunStatus::Error } else { CronRunStatus::Ok };
        self.record_cron_completion(&job, &run_id, status, is_error.then(|| answer.clone())).await;

        let header = if is_error { "❌" } else { "✅" };
        self.outbound
            .send(&chat_id, &completion_announcement(&job.name, header, None, Some(&answer), None))
            .await;
    }

    async fn record_cron_completion(&self, job: &CronJob, run_id: &str, status: CronRunStatus, error: Option<String>) {
        if let Some(run_log) = &self.cron_run_log {
            let _ = run_log.append(&bridge_scheduler::CronRunRecord {
                job_id: job.id.clone(),
                job_name: job.name.clone(),
                started_at_ms: job.last_run_at_ms.unwrap_or_else(|| chrono::Utc::now().timestamp_millis()),
                completed_at_ms: Some(chrono::Utc::now().timestamp_millis()),
                status,
                summary: if error.is_none() { Some("ok".to_string()) } else { None },
                error: error.clone(),
                model: job.model.clone(),
            });
        }
        let _ = run_id; // retained for symmetry with the engine's own record; the log above is keyed by job id.
        if let Some(store) = &self.cron_store {
            let last_status = if matches!(status, CronRunStatus::Error) { LastStatus::Error } else { LastStatus::Ok };
            let _ = store.record_completion(&job.id, last_status, error);
        }
    }

    // ---- processMessage -----------------------------

    /// Run one main-lane turn to completion: resolve the adapter, assemble
    /// the prompt, drive the Agent Process, translate its events into
    /// outbound traffic, and finally drain the queue.
    #[instrument(skip(self, prompt_text, ctx), fields(%chat_id))]
    pub async fn process_message(self: Arc<Self>, chat_id: ChatId, prompt_text: String, ctx: QueueContext) {
        let cli_name = self.resolve_active_cli(&chat_id);
        let Some(driver) = self.drivers.get(&cli_name).cloned() else {
            self.outbound.send(&chat_id, &format!("❌ unknown CLI adapter: {cli_name}")).await;
            return;
        };

        let _ = self.session_log.append(&SessionLogEntry::new(&chat_id, Role::User, &prompt_text));

        let cli = CliName::new(cli_name.clone());
        let resume_session_id = self.resume_store.get_resume_token(&chat_id, &cli).map(|t| t.session_id);
        let settings = self.resume_store.get_chat_settings(&chat_id);
        let model = settings.model.as_deref().map(resolve_model_alias);

        let mut session = Session::new(chat_id.clone(), cli_name.clone(), false);
        session.resume_token = resume_session_id.clone();
        self.sessions.set_main(session);

        let parts = self.build_prompt_parts(&chat_id, &prompt_text, &ctx, resume_session_id.as_deref()).await;
        let full_prompt = parts.assemble();

        let typing = self.spawn_typing_pump(chat_id.clone());

        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (exit_tx, mut exit_rx) = mpsc::unbounded_channel();
        let process = Arc::new(AgentProcess::new(driver, event_tx, exit_tx));
        self.main_processes.insert(chat_id.clone(), process.clone());

        let run_opts = RunOptions { prompt: full_prompt, resume_session_id, model, working_dir: None };
        if let Err(e) = process.clone().run(run_opts).await {
            typing.abort();
            self.main_processes.remove(&chat_id);
            self.sessions.clear_main(&chat_id);
            self.outbound.send(&chat_id, &format!("❌ {e}")).await;
            self.flush_next_queued(&chat_id).await;
            return;
        }

        let mut aggregator = StreamAggregator::new();
        let mut last_tool_status: Option<String> = None;
        let mut event_rx_closed = false;
        loop {
            tokio::select! {
                maybe = event_rx.recv(), if !event_rx_closed => {
                    match maybe {
                        Some(event) => {
                            self.handle_event(
                                &chat_id,
                                &cli_name,
                                event,
                                &mut aggregator,
                                settings.streaming,
                                settings.verbose,
                                &mut last_tool_status,
                                &ctx,
                                &prompt_text,
                            )
                            .await;
                        }
                        None => event_rx_closed = true,
                    }
                }
                _ = exit_rx.recv() => break,
            }
        }

        typing.abort();
        self.main_processes.remove(&chat_id);
        self.sessions.clear_main(&chat_id);
        self.flush_next_queued(&chat_id).await;
    }

    /// Translate one [`BridgeEvent`] into whatever outbound/state effect it
    /// implies: text buffering, tool status, persistence, or a terminal
    /// reply.
    #[allow(clippy::too_many_arguments)]
    async fn handle_event(
        self: &Arc<Self>,
        chat_id: &ChatId,
        cli_name: &str,
        event: BridgeEvent,
        aggregator: &mut StreamAggregator,
        streaming: bool,
        verbose: bool,
        last_tool_status: &mut Option<String>,
        ctx: &QueueContext,
        original_prompt: &str,
    ) {
        match event {
            BridgeEvent::Started { session_id, .. } => {
                self.sessions.with_main_mut(chat_id, |s| s.resume_token = Some(session_id));
            }
            BridgeEvent::Text { text, is_snapshot } => {
                aggregator.on_text(&text, is_snapshot);
                if streaming && aggregator.should_flush() {
                    if let Some(flush) = aggregator.flush() {
                        self.emit_flush(chat_id, flush).await;
                    }
                }
            }
            BridgeEvent::Thinking { .. } => {}
            BridgeEvent::ToolStart { tool_id, name, input } => {
                self.sessions.with_main_mut(chat_id, |s| {
                    s.pending_tools.insert(tool_id.clone(), bridge_agent::PendingTool { name: name.clone(), input: input.clone() });
                });
                if name.eq_ignore_ascii_case("task") {
                    let label = input.get("description").and_then(|v| v.as_str()).map(str::to_string);
                    let task = input.get("prompt").and_then(|v| v.as_str()).unwrap_or(&name).to_string();
                    let parent_session_id = self.sessions.get_main(chat_id).map(|s| s.resume_token.unwrap_or(s.id));
                    if let Ok(run) = self.subagents.spawn(
                        SpawnOpts { chat_id: chat_id.clone(), parent_session_id, cli: cli_name.to_string(), task, label: label.clone() },
                        self.config.subagent_cap,
                    ) {
                        let _ = self.subagents.mark_running(run.run_id, None);
                        self.proxy_runs.insert(tool_id, run.run_id);
                        self.outbound.send(chat_id, &start_notification(&run.display_label())).await;
                    }
                } else if verbose {
                    let status = format!("🔧 {name}");
                    if last_tool_status.as_deref() != Some(status.as_str()) {
                        self.outbound.send(chat_id, &status).await;
                        *last_tool_status = Some(status);
                    }
                }
            }
            BridgeEvent::ToolEnd { tool_id, is_error, preview } => {
                self.sessions.with_main_mut(chat_id, |s| { s.pending_tools.remove(&tool_id); });
                if let Some((_, run_id)) = self.proxy_runs.remove(&tool_id) {
                    if is_error {
                        let _ = self.subagents.mark_error(run_id, preview.unwrap_or_else(|| "tool failed".to_string()));
                    } else {
                        let _ = self.subagents.mark_completed(run_id, preview.unwrap_or_default());
                    }
                    if let Some(run) = self.subagents.get(run_id) {
                        self.outbound.send(chat_id, &subagent_completion_announcement(&run)).await;
                    }
                } else if verbose {
                    let msg = if is_error {
                        "❌ Tool failed".to_string()
                    } else {
                        preview.map(|p| crate::format::truncate_middle(&p, 200)).unwrap_or_else(|| "✅ Tool finished".to_string())
                    };
                    self.outbound.send(chat_id, &msg).await;
                }
            }
            BridgeEvent::Completed { session_id, answer, is_error, cost } => {
                if is_error {
                    self.outbound.send(chat_id, &format!("❌ {answer}")).await;
                    self.record_main_turn_as_cron_if_applicable(ctx, LastStatus::Error, Some(answer)).await;
                    return;
                }

                if let Some(spawn_args) = detect_assistant_spawn(&answer) {
                    if let Some(sid) = session_id {
                        let _ = self.resume_store.set_resume_token(chat_id, &CliName::new(cli_name.to_string()), sid);
                    }
                    let _ = self.spawn_subagent(chat_id, SpawnRequest::from(spawn_args)).await;
                    return;
                }

                if ctx.memory_tool_depth < self.config.tool_recursion_depth as u32 {
                    if let Some(tool_result) = self.enricher.try_memory_tool_call(&answer).await {
                        if let Some(sid) = session_id.clone() {
                            let _ = self.resume_store.set_resume_token(chat_id, &CliName::new(cli_name.to_string()), sid);
                        }
                        let follow_up = format!("[Memory tool result]\n{tool_result}\n\n[Original request]\n{original_prompt}");
                        let follow_up_ctx = QueueContext {
                            source: Some("memory-tool".to_string()),
                            cron_job_id: ctx.cron_job_id.clone(),
                            memory_tool_depth: ctx.memory_tool_depth + 1,
                            is_private: ctx.is_private,
                        };
                        Arc::clone(self).process_message(chat_id.clone(), follow_up, follow_up_ctx).await;
                        return;
                    }
                }

                if let Some(sid) = session_id {
                    let _ = self.resume_store.set_resume_token(chat_id, &CliName::new(cli_name.to_string()), sid.clone());
                    let _ = self.session_log.append(
                        &SessionLogEntry::new(chat_id, Role::Assistant, &answer).with_session(sid, cli_name.to_string()),
                    );
                } else {
                    let _ = self.session_log.append(&SessionLogEntry::new(chat_id, Role::Assistant, &answer));
                }

                let flush = if streaming { aggregator.finalize(&answer) } else { StreamFinal::whole(&answer) };
                self.emit_flush(chat_id, flush).await;

                if let Some(cost) = cost {
                    self.outbound.send(chat_id, &cost_message(cost)).await;
                }

                self.record_main_turn_as_cron_if_applicable(ctx, LastStatus::Ok, None).await;
            }
            BridgeEvent::Error { message } => {
                self.outbound.send(chat_id, &format!("❌ {message}")).await;
                self.record_main_turn_as_cron_if_applicable(ctx, LastStatus::Error, Some(message)).await;
            }
        }
    }

    async fn record_main_turn_as_cron_if_applicable(&self, ctx: &QueueContext, status: LastStatus, error: Option<String>) {
        if ctx.source.as_deref() == Some("cron") {
            if let (Some(store), Some(job_id)) = (&self.cron_store, &ctx.cron_job_id) {
                let _ = store.record_completion(job_id, status, error);
            }
        }
    }

    async fn emit_flush(&self, chat_id: &ChatId, flush: impl Into<StreamFinal>) {
        let flush = flush.into();
        for directive in &flush.sendfiles {
            self.outbound.send_file(chat_id, &directive.path, directive.caption.as_deref()).await;
        }
        if !flush.text.trim().is_empty() {
            for chunk in split_message(&flush.text, SPLIT_MAX_LEN) {
                self.outbound.send(chat_id, &chunk).await;
            }
        }
    }

    // ---- spawnSubagent --------------------------------------

    /// Register and launch a subagent run: cap-check, CLI resolution (with
    /// the `droid` fallback), spawn acknowledgment, then a Subagent-lane
    /// task driving its own Agent Process.
    #[instrument(skip(self, req), fields(%chat_id))]
    pub async fn spawn_subagent(self: &Arc<Self>, chat_id: &ChatId, req: SpawnRequest) -> Result<()> {
        let active_cli = self.resolve_active_cli(chat_id);
        let (resolved_cli, fallback_from) = self.resolve_spawn_cli(req.cli.as_deref(), &active_cli);

        let Some(driver) = self.drivers.get(&resolved_cli).cloned() else {
            self.outbound.send(chat_id, &format!("❌ unknown CLI adapter: {resolved_cli}")).await;
            return Err(ControllerError::UnknownAdapter(resolved_cli));
        };

        let parent_session_id = self.current_identity_session_id(chat_id, &active_cli);
        let label = req.label.clone().unwrap_or_else(|| task_preview(&req.task));

        let run = match self.subagents.spawn(
            SpawnOpts { chat_id: chat_id.clone(), parent_session_id, cli: resolved_cli.clone(), task: req.task.clone(), label: Some(label.clone()) },
            self.config.subagent_cap,
        ) {
            Ok(run) => run,
            Err(SubagentError::CapReached { .. }) => {
                self.outbound.send(chat_id, "❌ subagent concurrency cap reached for this chat").await;
                return Err(ControllerError::SubagentCapReached);
            }
            Err(e) => return Err(e.into()),
        };

        self.outbound.send(chat_id, &spawn_ack(&label, &resolved_cli, fallback_from.as_deref(), &req.task)).await;

        let model = self.resume_store.get_chat_settings(chat_id).model.as_deref().map(resolve_model_alias);
        let controller = Arc::clone(self);
        let chat = chat_id.clone();
        let run_id = run.run_id;
        self.lanes.enqueue(Lane::Subagent, async move {
            controller.run_subagent(chat, run_id, driver, req.task, model).await;
        });
        Ok(())
    }

    async fn run_subagent(self: Arc<Self>, chat_id: ChatId, run_id: Uuid, driver: Arc<dyn AdapterDriver>, task: String, model: Option<String>) {
        let label = self.subagents.get(run_id).map(|r| r.display_label()).unwrap_or_default();

        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (exit_tx, mut exit_rx) = mpsc::unbounded_channel();
        let process = Arc::new(AgentProcess::new(driver, event_tx, exit_tx));
        self.subagent_processes.insert(run_id, process.clone());

        let run_opts = RunOptions { prompt: task, resume_session_id: None, model, working_dir: None };
        if let Err(e) = process.clone().run(run_opts).await {
            let _ = self.subagents.mark_error(run_id, e.to_string());
            self.subagent_processes.remove(&run_id);
            if let Some(run) = self.subagents.get(run_id) {
                self.outbound.send(&chat_id, &subagent_completion_announcement(&run)).await;
            }
            return;
        }

        let mut last_text = String::new();
        let mut event_rx_closed = false;
        loop {
            tokio::select! {
                maybe = event_rx.recv(), if !event_rx_closed => {
                    match maybe {
                        Some(BridgeEvent::Started { .. }) => {
                            let _ = self.subagents.mark_running(run_id, None);
                            self.outbound.send(&chat_id, &start_notification(&label)).await;
                        }
                        Some(BridgeEvent::Text { text, is_snapshot }) => {
                            if is_snapshot { last_text = text; } else { last_text.push_str(&text); }
                        }
                        Some(BridgeEvent::Completed { answer, is_error, .. }) => {
                            let result = if answer.is_empty() { last_text.clone() } else { answer };
                            if is_error {
                                let _ = self.subagents.mark_error(run_id, result);
                            } else {
                                let _ = self.subagents.mark_completed(run_id, result.clone());
                                let _ = self.session_log.append(
                                    &SessionLogEntry::new(&chat_id, Role::Assistant, &result).with_subagent(SubagentMeta {
                                        run_id: run_id.to_string(),
                                        label: Some(label.clone()),
                                        status: Some("completed".to_string()),
                                    }),
                                );
                            }
                            if let Some(run) = self.subagents.get(run_id) {
                                self.outbound.send(&chat_id, &subagent_completion_announcement(&run)).await;
                            }
                        }
                        Some(BridgeEvent::Error { message }) => {
                            let _ = self.subagents.mark_error(run_id, message);
                            if let Some(run) = self.subagents.get(run_id) {
                                self.outbound.send(&chat_id, &subagent_completion_announcement(&run)).await;
                            }
                        }
                        Some(_) => {}
                        None => event_rx_closed = true,
                    }
                }
                _ = exit_rx.recv() => break,
            }
        }

        self.subagent_processes.remove(&run_id);
        let _ = self.subagents.prune(&chat_id, self.config.subagent_retention);
        let _ = self.subagents.prune_expired(self.config.subagent_ttl);
    }

    // ---- helpers -----------------------------------------------------------

    fn resolve_active_cli(&self, chat_id: &ChatId) -> String {
        self.resume_store.get_active_cli(chat_id).map(|c| c.0).unwrap_or_else(|| self.config.default_cli.clone())
    }

    /// Explicit `--cli` > caller's active CLI > adapter fallback (only when
    /// the resolved name is `droid` and a fallback is configured) > default
    ///.
    fn resolve_spawn_cli(&self, explicit: Option<&str>, active: &str) -> (String, Option<String>) {
        let resolved = explicit.map(str::to_string).unwrap_or_else(|| active.to_string());
        if resolved == "droid" {
            if let Some(fallback) = &self.config.droid_fallback_cli {
                if self.drivers.contains_key(fallback) {
                    return (fallback.clone(), Some(resolved));
                }
            }
        }
        (resolved, None)
    }

    /// The identity a subagent's `parentSessionId` should link against: the
    /// adapter's own resume-token session id when one exists (stable across
    /// turns), falling back to the ephemeral local turn id on a chat's very
    /// first message.
    fn current_identity_session_id(&self, chat_id: &ChatId, cli_name: &str) -> Option<String> {
        self.resume_store
            .get_resume_token(chat_id, &CliName::new(cli_name.to_string()))
            .map(|t| t.session_id)
            .or_else(|| self.sessions.get_main(chat_id).map(|s| s.id))
    }

    async fn build_prompt_parts(&self, chat_id: &ChatId, user_text: &str, ctx: &QueueContext, resume_session_id: Option<&str>) -> PromptParts {
        let is_memory_tool = ctx.source.as_deref() == Some("memory-tool");
        let is_user = ctx.source.as_deref() == Some("user");

        let spawn_instructions = if is_user { Some(SPAWN_INSTRUCTIONS.to_string()) } else { None };
        let memory_recall = if is_memory_tool { None } else { self.enricher.recall(chat_id, user_text).await };
        let memory_tool_instructions = if is_memory_tool { None } else { self.enricher.memory_tool_instructions().await };

        let pending_results = match resume_session_id {
            Some(sid) => {
                let runs = self.subagents.pending_results(chat_id, sid);
                if !runs.is_empty() {
                    let ids: Vec<Uuid> = runs.iter().map(|r| r.run_id).collect();
                    let _ = self.subagents.mark_results_injected(&ids);
                }
                pending_results_prefix(&runs)
            }
            None => None,
        };

        let related_files = self.enricher.related_files(user_text).await;

        PromptParts {
            spawn_instructions,
            memory_recall,
            memory_tool_instructions,
            pending_results,
            user_text: user_text.to_string(),
            related_files,
        }
    }

    fn spawn_typing_pump(&self, chat_id: ChatId) -> tokio::task::JoinHandle<()> {
        let outbound = Arc::clone(&self.outbound);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(TYPING_INTERVAL);
            loop {
                interval.tick().await;
                outbound.typing(&chat_id).await;
            }
        })
    }
}

/// Request to launch a subagent, however it was triggered (`/spawn`,
/// assistant-initiated, or natural-language detection).
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    pub task: String,
    pub label: Option<String>,
    pub cli: Option<String>,
}

impl From<SpawnArgs> for SpawnRequest {
    fn from(args: SpawnArgs) -> Self {
        Self { task: args.task, label: args.label, cli: args.cli }
    }
}

fn task_preview(task: &str) -> String {
    let preview: String = task.chars().take(40).collect();
    if task.chars().count() > 40 {
        format!("{preview}…")
    } else {
        preview
    }
}

/// Small adapter so `handle_event` can treat a mid-stream [`crate::stream::FlushResult`]
/// and the terminal whole-answer case uniformly.
struct StreamFinal {
    text: String,
    sendfiles: Vec<crate::sendfile::SendFileDirective>,
}

impl StreamFinal {
    fn whole(answer: &str) -> Self {
        let (text, sendfiles) = extract_sendfile_directives(answer);
        Self { text, sendfiles }
    }
}

impl From<crate::stream::FlushResult> for StreamFinal {
    fn from(flush: crate::stream::FlushResult) -> Self {
        Self { text: flush.text, sendfiles: flush.sendfiles }
    }
}

impl From<StreamFinal> for StreamFinal {
    fn from(value: StreamFinal) -> Self {
        value
    }
}

/// A one-line assistant reply of exactly `/spawn ...` and nothing else is
/// the assistant-initiated delegation channel; anything else disqualifies it.
fn detect_assistant_spawn(answer: &str) -> Option<SpawnArgs> {
    let trimmed = answer.trim();
    if trimmed.lines().count() != 1 || !trimmed.starts_with("/spawn") {
        return None;
    }
    match bridge_dispatch::dispatch(trimmed) {
        Some(DispatchAction::Spawn(args)) => Some(args),
        _ => None,
    }
}

/// A human asking in plain language to delegate work.
fn detect_natural_language_spawn(text: &str) -> Option<String> {
    const MARKERS: &[&str] = &["spawn a subagent to ", "spawn a sub-agent to ", "spawn an agent to "];
    let lower = text.to_lowercase();
    for marker in MARKERS {
        if let Some(idx) = lower.find(marker) {
            let task = text[idx + marker.len()..].trim().trim_end_matches('.');
            if !task.is_empty() {
                return Some(task.to_string());
            }
        }
    }
    None
}
