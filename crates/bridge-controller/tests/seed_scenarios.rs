//! End-to-end scenarios driven through the public API only: a real `sh -c`
//! subprocess stands in for the CLI adapter, so these exercise the actual
//! spawn/NDJSON-translate/event pipeline rather than a mock.
//!
//! Scoped to the three scenarios that tolerate no precise timing
//! assumptions: a basic turn, a resumed second turn, and cron catch-up on
//! startup. Interrupt/queue ordering, subagent concurrency, and streaming
//! deltas are covered by unit tests elsewhere (`controller.rs`,
//! `stream.rs`) instead, since asserting their exact interleaving here
//! would be timing-fragile.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use bridge_core::manifest::{ModelFlag, ResumeFlag};
use bridge_core::{AdapterManifest, ChatId, InboundContext, InboundMessage, InputMode};
use bridge_controller::{ContextEnricher, ControllerConfig, OutboundSink, SessionController};
use bridge_scheduler::{CronEngine, CronEvent, CronRunLog, CronStore, Schedule, SessionTarget, WakeMode};
use bridge_session::{CommandLaneScheduler, LaneWidths, SessionStore};
use bridge_store::{PersistentSessionStore, Role, SessionLog};
use bridge_subagent::SubagentRegistry;

struct RecordingOutbound {
    sent: Mutex<Vec<String>>,
}

impl RecordingOutbound {
    fn new() -> Self {
        Self { sent: Mutex::new(Vec::new()) }
    }
    fn texts(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl OutboundSink for RecordingOutbound {
    async fn send(&self, _chat_id: &ChatId, text: &str) {
        self.sent.lock().unwrap().push(text.to_string());
    }
    async fn send_file(&self, _chat_id: &ChatId, path: &str, _caption: Option<&str>) {
        self.sent.lock().unwrap().push(format!("[file:{path}]"));
    }
    async fn typing(&self, _chat_id: &ChatId) {}
}

struct NullEnricher;

#[async_trait]
impl ContextEnricher for NullEnricher {
    async fn recall(&self, _chat_id: &ChatId, _text: &str) -> Option<String> {
        None
    }
    async fn memory_tool_instructions(&self) -> Option<String> {
        None
    }
    async fn related_files(&self, _text: &str) -> Option<String> {
        None
    }
    async fn try_memory_tool_call(&self, _answer: &str) -> Option<String> {
        None
    }
}

fn inbound(chat: &ChatId, text: &str) -> InboundMessage {
    InboundMessage {
        id: uuid::Uuid::new_v4().to_string(),
        chat_id: chat.clone(),
        user_id: "u1".to_string(),
        message_id: uuid::Uuid::new_v4().to_string(),
        timestamp: chrono::Utc::now(),
        text: Some(text.to_string()),
        attachments: vec![],
        forward: None,
        context: InboundContext::default(),
        is_cron: false,
    }
}

fn fake_claude_manifest(script: String, resume: bool) -> AdapterManifest {
    AdapterManifest {
        name: "claude".to_string(),
        command: "sh".to_string(),
        args: vec!["-c".to_string(), script],
        input_mode: InputMode::Arg,
        resume: if resume {
            Some(ResumeFlag { flag: "--resume".to_string(), session_arg: "session_id".to_string() })
        } else {
            None
        },
        model: Some(ModelFlag { flag: "--model".to_string(), default: "test-model".to_string() }),
        working_dir_flag: None,
        keep_stdin_open: false,
    }
}

fn build_controller(
    tmp: &std::path::Path,
    manifests: Vec<AdapterManifest>,
) -> (Arc<SessionController>, Arc<RecordingOutbound>) {
    let outbound = Arc::new(RecordingOutbound::new());
    let config = ControllerConfig {
        default_cli: "claude".to_string(),
        droid_fallback_cli: Some("claude".to_string()),
        subagent_cap: 4,
        queue_bound: 5,
        subagent_retention: 10,
        subagent_ttl: chrono::Duration::hours(6),
        tool_recursion_depth: 2,
    };
    let controller = SessionController::new(
        config,
        manifests,
        Arc::new(SessionStore::new()),
        Arc::new(PersistentSessionStore::load(tmp.join("resume-tokens.json")).unwrap()),
        Arc::new(SessionLog::new(tmp.join("sessions"))),
        Arc::new(SubagentRegistry::new()),
        Arc::new(CommandLaneScheduler::new(LaneWidths::default())),
        outbound.clone(),
        Arc::new(NullEnricher),
        None,
        None,
    );
    (controller, outbound)
}

/// Poll `outbound` until `predicate` holds or `timeout` elapses, panicking
/// with whatever was observed on failure rather than hanging the suite.
async fn wait_for(
    outbound: &RecordingOutbound,
    timeout: Duration,
    predicate: impl Fn(&[String]) -> bool,
) -> Vec<String> {
    let deadline = std::time::Instant::now() + timeout;
    loop {
        let texts = outbound.texts();
        if predicate(&texts) {
            return texts;
        }
        if std::time::Instant::now() >= deadline {
            panic!("timed out waiting for outbound condition; seen so far: {texts:?}");
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Scenario 1 — a single turn through a real (scripted) CLI subprocess ends
/// with the final answer delivered and both roles appended to the session
/// log.
#[tokio::test]
async fn basic_turn_delivers_answer_and_logs_both_roles() {
    let tmp = tempfile::tempdir().unwrap();
    let script = concat!(
        "printf '%s\\n' '{\"type\":\"system\",\"subtype\":\"init\",\"session_id\":\"sess-basic\",\"model\":\"test-model\"}'; ",
        "printf '%s\\n' '{\"type\":\"assistant\",\"content\":[{\"type\":\"text\",\"text\":\"hello world\"}]}'; ",
        "printf '%s\\n' '{\"type\":\"result\",\"session_id\":\"sess-basic\",\"result\":\"hello world\",\"is_error\":false}'"
    )
    .to_string();
    let manifest = fake_claude_manifest(script, false);
    let (controller, outbound) = build_controller(tmp.path(), vec![manifest]);

    let chat = ChatId::new("seed-basic");
    controller.handle_inbound(inbound(&chat, "hello")).await;

    let texts = wait_for(&outbound, Duration::from_secs(5), |t| t.iter().any(|x| x == "hello world")).await;
    assert!(texts.contains(&"hello world".to_string()));

    let log = SessionLog::new(tmp.path().join("sessions"));
    let entries = log.read_day(chrono::Utc::now().date_naive()).unwrap();
    assert_eq!(entries.len(), 2, "expected one user entry and one assistant entry: {entries:?}");
    assert_eq!(entries[0].role, Role::User);
    assert_eq!(entries[0].text, "hello");
    assert_eq!(entries[1].role, Role::Assistant);
    assert_eq!(entries[1].text, "hello world");
}

/// Scenario 2 — the second turn on the same chat resumes the first turn's
/// session id. The fake CLI logs
/// its own invoked argv (minus the shell's own `$0`, which the `-c` calling
/// convention consumes as the first positional) so the test can assert on
/// presence/absence of the resume flag across turns.
#[tokio::test]
async fn second_turn_resumes_first_turns_session_id() {
    let tmp = tempfile::tempdir().unwrap();
    let argv_log = tmp.path().join("argv.log");
    let script = format!(
        concat!(
            "printf '%s\\n' \"$0 $*\" >> '{log}'; ",
            "printf '%s\\n' '{{\"type\":\"system\",\"subtype\":\"init\",\"session_id\":\"sess-p3\",\"model\":\"test-model\"}}'; ",
            "printf '%s\\n' '{{\"type\":\"assistant\",\"content\":[{{\"type\":\"text\",\"text\":\"ack\"}}]}}'; ",
            "printf '%s\\n' '{{\"type\":\"result\",\"session_id\":\"sess-p3\",\"result\":\"ack\",\"is_error\":false}}'",
        ),
        log = argv_log.display(),
    );
    let manifest = fake_claude_manifest(script, true);
    let (controller, outbound) = build_controller(tmp.path(), vec![manifest]);

    let chat = ChatId::new("seed-resume");
    controller.handle_inbound(inbound(&chat, "first")).await;
    wait_for(&outbound, Duration::from_secs(5), |t| t.iter().filter(|x| x.as_str() == "ack").count() >= 1).await;

    controller.handle_inbound(inbound(&chat, "second")).await;
    wait_for(&outbound, Duration::from_secs(5), |t| t.iter().filter(|x| x.as_str() == "ack").count() >= 2).await;

    let contents = std::fs::read_to_string(&argv_log).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 2, "expected one logged invocation per turn: {lines:?}");
    assert!(!lines[0].contains("--resume"), "first turn has nothing to resume from: {}", lines[0]);
    assert!(
        lines[1].contains("--resume") && lines[1].contains("sess-p3"),
        "second turn should resume the first turn's session id: {}",
        lines[1]
    );
}

/// Scenario 5 — a job whose last fire predates startup by several missed
/// intervals collapses into exactly one catch-up fire, and its next run ends
/// up strictly in the future. Exercised directly against
/// `CronStore`/`CronEngine`; no controller or subprocess is needed since
/// recovery is self-contained in the scheduler.
#[tokio::test]
async fn missed_cron_runs_collapse_into_one_catch_up_fire_on_recovery() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(CronStore::load(dir.path().join("cron.json")).unwrap());

    let now = chrono::Utc::now();
    let five_min_ago = now - chrono::Duration::minutes(5);
    let job = store
        .add_job(
            "heartbeat".to_string(),
            Schedule::Every { every: 60_000 },
            "ping".to_string(),
            WakeMode::Now,
            SessionTarget::Main,
            None,
            five_min_ago.timestamp_millis(),
        )
        .unwrap();
    // Seed the job as though it last fired 5 minutes ago, so several of its
    // 60s intervals are now missed.
    store.record_fire(&job.id, five_min_ago.timestamp_millis(), five_min_ago).unwrap();

    let (tx, mut rx) = tokio::sync::mpsc::channel(8);
    let run_log = CronRunLog::new(dir.path().join("cron-runs"));
    let engine = CronEngine::new(store.clone(), run_log, Duration::from_secs(60), tx);

    engine.recover_on_startup().await.unwrap();

    let first = rx.try_recv().expect("exactly one catch-up fire expected");
    assert!(matches!(first, CronEvent::Due { .. }), "wakeMode=now/sessionTarget=main fires Due: {first:?}");
    assert!(rx.try_recv().is_err(), "missed intervals must collapse into a single fire, not one per interval");

    let updated = store.get_job(&job.id).unwrap();
    assert!(updated.next_run_at_ms.unwrap() > now.timestamp_millis(), "next run must be recomputed strictly after now");
    assert!(updated.last_run_at_ms.unwrap() > five_min_ago.timestamp_millis(), "last run should advance past the seeded timestamp");
}
