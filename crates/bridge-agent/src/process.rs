//! Agent Process — supervises one child process running a CLI adapter and
//! translates its output into the normalized [`BridgeEvent`] stream.
//!
//! Spawns with piped stdio, reads NDJSON off stdout line by line, and kills
//! the child on drop or explicit `terminate()`.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::driver::{AdapterDriver, RunOptions, TranslatorState};
use crate::error::{AgentError, Result};
use crate::event::BridgeEvent;

const FORCE_KILL_GRACE: Duration = Duration::from_millis(500);

struct RunningChild {
    child: Child,
    stdin: Option<ChildStdin>,
}

/// Supervises one child process for the lifetime of (at most) one turn at a
/// time. `run` is idempotent while a child is alive.
pub struct AgentProcess {
    driver: Arc<dyn AdapterDriver>,
    inner: Mutex<Option<RunningChild>>,
    running: AtomicBool,
    event_tx: mpsc::UnboundedSender<BridgeEvent>,
    exit_tx: mpsc::UnboundedSender<Option<i32>>,
}

impl AgentProcess {
    pub fn new(
        driver: Arc<dyn AdapterDriver>,
        event_tx: mpsc::UnboundedSender<BridgeEvent>,
        exit_tx: mpsc::UnboundedSender<Option<i32>>,
    ) -> Self {
        Self {
            driver,
            inner: Mutex::new(None),
            running: AtomicBool::new(false),
            event_tx,
            exit_tx,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawn the child with composed argv and drive its output until the
    /// turn completes or the process exits.
    pub async fn run(self: Arc<Self>, opts: RunOptions) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!(adapter = self.driver.name(), "run() called while already running; ignored");
            return Ok(());
        }

        let argv = self.driver.build_argv(&opts);
        let mut cmd = Command::new(&self.driver.manifest().command);
        cmd.args(&argv)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = match cmd.spawn() {
            Ok(c) => c,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                if e.kind() == std::io::ErrorKind::NotFound {
                    let _ = self.event_tx.send(BridgeEvent::Error {
                        message: format!(
                            "{} CLI not found at '{}'",
                            self.driver.name(),
                            self.driver.manifest().command
                        ),
                    });
                } else {
                    let _ = self.event_tx.send(BridgeEvent::Error {
                        message: format!("failed to spawn {}: {e}", self.driver.name()),
                    });
                }
                let _ = self.exit_tx.send(Some(1));
                return Err(AgentError::Spawn(e));
            }
        };

        let stdout = child.stdout.take().expect("stdout not captured");
        let stderr = child.stderr.take().expect("stderr not captured");
        let mut stdin = child.stdin.take();

        if let Some(payload) = self.driver.stdin_payload(&opts) {
            if let Some(ref mut s) = stdin {
                if let Err(e) = s.write_all(payload.as_bytes()).await {
                    warn!(adapter = self.driver.name(), "stdin write failed: {e}");
                }
                let _ = s.write_all(b"\n").await;
            }
        }

        let keep_open = self.driver.wants_stdin_open();
        if !keep_open {
            stdin = None; // dropping closes the pipe
        }

        {
            let mut guard = self.inner.lock().await;
            *guard = Some(RunningChild { child, stdin });
        }

        // stderr sink: collected to logs at debug level.
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(target: "agent_stderr", "{line}");
            }
        });

        let driver = self.driver.clone();
        let event_tx = self.event_tx.clone();
        let this = self.clone();
        tokio::spawn(async move {
            let mut state = TranslatorState::new();
            state.resume_session_id = opts.resume_session_id.clone();
            let mut lines = BufReader::new(stdout).lines();
            let mut exit_code = None;
            let mut saw_terminal = false;

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        let events = driver.translate_line(&line, &mut state);
                        if events.is_empty() {
                            debug!(adapter = driver.name(), %line, "dropped unparsed/unknown line");
                        }
                        for event in events {
                            if event.is_terminal() {
                                saw_terminal = true;
                            }
                            let _ = event_tx.send(event);
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(adapter = driver.name(), "stdout read error: {e}");
                        break;
                    }
                }
            }

            if !saw_terminal && !state.pending_tools.is_empty() {
                // Unexpected exit while tools were still outstanding (spec
                // §4.1 "Unexpected process exit while non-terminal tool
                // entries remain is reported ... as failure").
                let _ = event_tx.send(BridgeEvent::Error {
                    message: "agent process exited with tools still pending".to_string(),
                });
            }

            let wait_result = {
                let mut guard = this.inner.lock().await;
                if let Some(mut running) = guard.take() {
                    running.child.wait().await.ok()
                } else {
                    None
                }
            };
            exit_code = wait_result.and_then(|status| status.code());
            this.running.store(false, Ordering::SeqCst);
            let _ = this.exit_tx.send(exit_code);
        });

        Ok(())
    }

    /// Write a tool-result payload to the child's stdin (Pi's in-loop tool
    /// protocol). No-op if stdin is already closed.
    pub async fn send_tool_result(&self, tool_id: &str, result: &serde_json::Value) -> Result<()> {
        let payload = match self.driver.format_tool_result(tool_id, result) {
            Some(p) => p,
            None => return Ok(()),
        };
        let mut guard = self.inner.lock().await;
        match guard.as_mut().and_then(|r| r.stdin.as_mut()) {
            Some(stdin) => {
                stdin
                    .write_all(payload.as_bytes())
                    .await
                    .map_err(AgentError::Spawn)?;
                stdin.write_all(b"\n").await.map_err(AgentError::Spawn)?;
                Ok(())
            }
            None => {
                debug!(adapter = self.driver.name(), "write to stdin after close dropped");
                Err(AgentError::StdinClosed)
            }
        }
    }

    /// Graceful stop: SIGTERM, then force-kill after 500ms if the child
    /// hasn't exited.
    pub async fn terminate(&self) {
        let mut guard = self.inner.lock().await;
        let Some(running) = guard.as_mut() else {
            return;
        };

        #[cfg(unix)]
        {
            if let Some(pid) = running.child.id() {
                use nix::sys::signal::{kill, Signal};
                use nix::unistd::Pid;
                let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
            }
        }
        #[cfg(not(unix))]
        {
            let _ = running.child.start_kill();
        }

        match tokio::time::timeout(FORCE_KILL_GRACE, running.child.wait()).await {
            Ok(_) => {
                info!(adapter = self.driver.name(), "process exited after SIGTERM");
            }
            Err(_) => {
                warn!(adapter = self.driver.name(), "grace period elapsed; force-killing");
                let _ = running.child.start_kill();
                let _ = running.child.wait().await;
            }
        }
    }
}
