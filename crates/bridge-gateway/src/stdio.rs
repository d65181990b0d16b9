//! Line-delimited-JSON stdin/stdout transport — a stand-in for the
//! out-of-scope concrete Telegram/web transport. One `send`/`typing` method
//! per outbound concern, writing line-framed JSON to stdout instead of a
//! WebSocket connection.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdin, Stdout};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use bridge_core::{ChatId, InboundMessage};
use bridge_controller::{InboundSink, OutboundSink};

/// One line of stdout traffic.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OutboundLine<'a> {
    Send { chat_id: &'a str, text: &'a str },
    SendFile { chat_id: &'a str, path: &'a str, caption: Option<&'a str> },
    Typing { chat_id: &'a str },
}

/// Reads one [`InboundMessage`] per
/// stdin line.
pub struct StdioInbound {
    lines: tokio::io::Lines<BufReader<Stdin>>,
}

impl StdioInbound {
    pub fn new(stdin: Stdin) -> Self {
        Self { lines: BufReader::new(stdin).lines() }
    }
}

#[async_trait]
impl InboundSink for StdioInbound {
    async fn recv(&mut self) -> Option<InboundMessage> {
        loop {
            match self.lines.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<RawInbound>(&line) {
                        Ok(raw) => return Some(raw.into_inbound_message()),
                        Err(e) => {
                            warn!(%e, %line, "dropped unparsable inbound line");
                            continue;
                        }
                    }
                }
                Ok(None) => return None,
                Err(e) => {
                    warn!(%e, "stdin read error");
                    return None;
                }
            }
        }
    }
}

/// The wire shape a caller writes per line: just the bits a human testing
/// the gateway from a shell actually wants to type, defaulted generously.
#[derive(Debug, Deserialize)]
struct RawInbound {
    chat_id: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    attachments: Vec<bridge_core::Attachment>,
    #[serde(default)]
    forward: Option<bridge_core::ForwardInfo>,
    #[serde(default)]
    cron_job_id: Option<String>,
}

impl RawInbound {
    fn into_inbound_message(self) -> InboundMessage {
        let now = chrono::Utc::now();
        InboundMessage {
            id: uuid::Uuid::new_v4().to_string(),
            chat_id: ChatId::new(self.chat_id),
            user_id: "stdio".to_string(),
            message_id: uuid::Uuid::new_v4().to_string(),
            timestamp: now,
            text: self.text,
            attachments: self.attachments,
            forward: self.forward,
            context: bridge_core::InboundContext {
                source: Some(if self.cron_job_id.is_some() { "cron".to_string() } else { "user".to_string() }),
                cron_job_id: self.cron_job_id.clone(),
                memory_tool_depth: None,
                is_private: None,
            },
            is_cron: self.cron_job_id.is_some(),
        }
    }
}

/// Writes outbound traffic as JSON lines to stdout, serialized through a
/// single mutex the same way `PersistentSessionStore` serializes writes
/// through one file.
pub struct StdioOutbound {
    stdout: AsyncMutex<Stdout>,
}

impl StdioOutbound {
    pub fn new(stdout: Stdout) -> Self {
        Self { stdout: AsyncMutex::new(stdout) }
    }

    async fn write_line(&self, line: &OutboundLine<'_>) {
        let Ok(json) = serde_json::to_string(line) else { return };
        let mut out = self.stdout.lock().await;
        if out.write_all(json.as_bytes()).await.is_err() {
            return;
        }
        let _ = out.write_all(b"\n").await;
        let _ = out.flush().await;
    }
}

#[async_trait]
impl OutboundSink for StdioOutbound {
    async fn send(&self, chat_id: &ChatId, text: &str) {
        debug!(%chat_id, "send");
        self.write_line(&OutboundLine::Send { chat_id: &chat_id.0, text }).await;
    }

    async fn send_file(&self, chat_id: &ChatId, path: &str, caption: Option<&str>) {
        self.write_line(&OutboundLine::SendFile { chat_id: &chat_id.0, path, caption }).await;
    }

    async fn typing(&self, chat_id: &ChatId) {
        self.write_line(&OutboundLine::Typing { chat_id: &chat_id.0 }).await;
    }
}
