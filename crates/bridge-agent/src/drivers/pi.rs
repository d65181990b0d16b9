//! Pi adapter driver — translates Pi's turn/message JSONL events (spec
//! §4.1 table, rows tagged "Pi"). Pi is the only adapter whose stdin stays
//! open for the in-loop tool-exec feedback protocol.

use bridge_core::AdapterManifest;
use serde::Deserialize;

use crate::driver::{AdapterDriver, TranslatorState};
use crate::event::BridgeEvent;

pub struct PiDriver {
    manifest: AdapterManifest,
}

impl PiDriver {
    pub fn new(manifest: AdapterManifest) -> Self {
        Self { manifest }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum PiEvent {
    #[serde(rename = "session")]
    Session { session_id: String, model: Option<String> },
    #[serde(rename = "message_update")]
    MessageUpdate {
        #[serde(rename = "assistantMessageEvent")]
        assistant_message_event: AssistantMessageEvent,
    },
    #[serde(rename = "tool_execution_start")]
    ToolExecutionStart { id: String, name: String, #[serde(default)] input: serde_json::Value },
    #[serde(rename = "tool_execution_end")]
    ToolExecutionEnd {
        id: String,
        #[serde(default)]
        is_error: bool,
        #[serde(default)]
        preview: Option<String>,
    },
    #[serde(rename = "agent_end")]
    AgentEnd {
        #[serde(default)]
        messages: Vec<PiMessage>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AssistantMessageEvent {
    TextDelta { delta: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct PiMessage {
    role: String,
    #[serde(default)]
    text: String,
}

impl AdapterDriver for PiDriver {
    fn manifest(&self) -> &AdapterManifest {
        &self.manifest
    }

    fn translate_line(&self, line: &str, state: &mut TranslatorState) -> Vec<BridgeEvent> {
        let event: PiEvent = match serde_json::from_str(line) {
            Ok(e) => e,
            Err(_) => return vec![],
        };

        match event {
            PiEvent::Session { session_id, model } => {
                state.resume_session_id = Some(session_id.clone());
                vec![BridgeEvent::Started { session_id, model }]
            }
            PiEvent::MessageUpdate {
                assistant_message_event: AssistantMessageEvent::TextDelta { delta },
            } => {
                state.last_text.push_str(&delta);
                vec![BridgeEvent::Text {
                    text: delta,
                    is_snapshot: false,
                }]
            }
            PiEvent::MessageUpdate { .. } => vec![],
            PiEvent::ToolExecutionStart { id, name, input } => {
                state.pending_tools.insert(id.clone(), name.clone());
                vec![BridgeEvent::ToolStart {
                    tool_id: id,
                    name,
                    input,
                }]
            }
            PiEvent::ToolExecutionEnd { id, is_error, preview } => {
                state.pending_tools.remove(&id);
                vec![BridgeEvent::ToolEnd {
                    tool_id: id,
                    is_error,
                    preview,
                }]
            }
            PiEvent::AgentEnd { messages } => {
                let answer = if !state.last_text.is_empty() {
                    state.last_text.clone()
                } else {
                    messages
                        .iter()
                        .rev()
                        .find(|m| m.role == "assistant")
                        .map(|m| m.text.clone())
                        .unwrap_or_default()
                };
                vec![BridgeEvent::Completed {
                    session_id: state.resume_session_id.clone(),
                    answer,
                    is_error: false,
                    cost: None,
                }]
            }
        }
    }

    /// Pi's in-loop tool protocol: write the executor's result back to
    /// stdin as a `tool_execution_end` line.
    fn format_tool_result(&self, tool_id: &str, result: &serde_json::Value) -> Option<String> {
        let payload = serde_json::json!({
            "type": "tool_execution_end",
            "id": tool_id,
            "result": result,
        });
        serde_json::to_string(&payload).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_core::manifest::builtin_manifests;

    fn driver() -> PiDriver {
        let manifest = builtin_manifests()
            .into_iter()
            .find(|m| m.name == "pi")
            .unwrap();
        PiDriver::new(manifest)
    }

    #[test]
    fn text_delta_is_incremental() {
        let driver = driver();
        let mut state = TranslatorState::new();
        let events = driver.translate_line(
            r#"{"type":"message_update","assistantMessageEvent":{"type":"text_delta","delta":"hi"}}"#,
            &mut state,
        );
        match &events[0] {
            BridgeEvent::Text { text, is_snapshot } => {
                assert_eq!(text, "hi");
                assert!(!is_snapshot);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn agent_end_falls_back_to_last_assistant_message() {
        let driver = driver();
        let mut state = TranslatorState::new();
        let events = driver.translate_line(
            r#"{"type":"agent_end","messages":[{"role":"user","text":"hi"},{"role":"assistant","text":"hello there"}]}"#,
            &mut state,
        );
        match &events[0] {
            BridgeEvent::Completed { answer, .. } => assert_eq!(answer, "hello there"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn format_tool_result_wraps_payload() {
        let driver = driver();
        let s = driver
            .format_tool_result("t1", &serde_json::json!({"ok": true}))
            .unwrap();
        assert!(s.contains("tool_execution_end"));
        assert!(s.contains("\"t1\""));
    }
}
