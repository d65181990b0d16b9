//! Claude adapter driver — translates the `claude --output-format
//! stream-json` NDJSON schema into `BridgeEvent`s via a tagged
//! `CliMessage`/`ContentBlock` enum pair.

use bridge_core::AdapterManifest;
use serde::Deserialize;

use crate::driver::{AdapterDriver, TranslatorState};
use crate::event::BridgeEvent;

pub struct ClaudeDriver {
    manifest: AdapterManifest,
}

impl ClaudeDriver {
    pub fn new(manifest: AdapterManifest) -> Self {
        Self { manifest }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum CliMessage {
    System(SystemMessage),
    Assistant(AssistantMessage),
    User(UserMessage),
    Result(ResultMessage),
}

#[derive(Debug, Deserialize)]
struct SystemMessage {
    #[serde(default)]
    subtype: Option<String>,
    session_id: Option<String>,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct UserMessage {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    Thinking {
        thinking: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: Option<String>,
        #[serde(default)]
        is_error: Option<bool>,
    },
}

#[derive(Debug, Deserialize)]
struct ResultMessage {
    session_id: String,
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    is_error: bool,
    #[serde(default)]
    total_cost_usd: Option<f64>,
}

impl AdapterDriver for ClaudeDriver {
    fn manifest(&self) -> &AdapterManifest {
        &self.manifest
    }

    fn translate_line(&self, line: &str, state: &mut TranslatorState) -> Vec<BridgeEvent> {
        let msg: CliMessage = match serde_json::from_str(line) {
            Ok(m) => m,
            Err(_) => return vec![],
        };

        match msg {
            CliMessage::System(sys) => {
                if sys.subtype.as_deref() == Some("init") || sys.subtype.is_none() {
                    if let Some(session_id) = sys.session_id {
                        state.resume_session_id = Some(session_id.clone());
                        return vec![BridgeEvent::Started {
                            session_id,
                            model: sys.model,
                        }];
                    }
                }
                vec![]
            }
            CliMessage::Assistant(asst) => {
                let mut events = Vec::with_capacity(asst.content.len());
                for block in asst.content {
                    match block {
                        ContentBlock::Text { text } => {
                            state.last_text.push_str(&text);
                            events.push(BridgeEvent::Text {
                                text,
                                is_snapshot: false,
                            });
                        }
                        ContentBlock::Thinking { thinking } => {
                            events.push(BridgeEvent::Thinking { text: thinking });
                        }
                        ContentBlock::ToolUse { id, name, input } => {
                            state.pending_tools.insert(id.clone(), name.clone());
                            events.push(BridgeEvent::ToolStart {
                                tool_id: id,
                                name,
                                input,
                            });
                        }
                        ContentBlock::ToolResult { .. } => {}
                    }
                }
                events
            }
            CliMessage::User(user) => {
                let mut events = Vec::new();
                for block in user.content {
                    if let ContentBlock::ToolResult {
                        tool_use_id,
                        content,
                        is_error,
                    } = block
                    {
                        state.pending_tools.remove(&tool_use_id);
                        events.push(BridgeEvent::ToolEnd {
                            tool_id: tool_use_id,
                            is_error: is_error.unwrap_or(false),
                            preview: content,
                        });
                    }
                }
                events
            }
            CliMessage::Result(result) => {
                let answer = result.result.unwrap_or_else(|| state.last_text.clone());
                vec![BridgeEvent::Completed {
                    session_id: Some(result.session_id),
                    answer,
                    is_error: result.is_error,
                    cost: result.total_cost_usd,
                }]
            }
        }
    }
}
