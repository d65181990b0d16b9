//! Codex adapter driver — translates `codex exec --json` thread events
//!.

use bridge_core::AdapterManifest;
use serde::Deserialize;

use crate::driver::{AdapterDriver, TranslatorState};
use crate::event::BridgeEvent;

pub struct CodexDriver {
    manifest: AdapterManifest,
}

impl CodexDriver {
    pub fn new(manifest: AdapterManifest) -> Self {
        Self { manifest }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum CodexEvent {
    #[serde(rename = "thread.started")]
    ThreadStarted { thread_id: String, model: Option<String> },
    #[serde(rename = "item.completed")]
    ItemCompleted { item: CodexItem },
    #[serde(rename = "turn.completed")]
    TurnCompleted {
        #[serde(default)]
        usage: Option<CodexUsage>,
    },
    #[serde(rename = "turn.failed")]
    TurnFailed { error: CodexError },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum CodexItem {
    AgentMessage { text: String },
    CommandExecution { id: String, command: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct CodexUsage {
    #[serde(default)]
    total_cost_usd: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CodexError {
    message: String,
}

impl AdapterDriver for CodexDriver {
    fn manifest(&self) -> &AdapterManifest {
        &self.manifest
    }

    fn translate_line(&self, line: &str, state: &mut TranslatorState) -> Vec<BridgeEvent> {
        let event: CodexEvent = match serde_json::from_str(line) {
            Ok(e) => e,
            Err(_) => return vec![],
        };

        match event {
            CodexEvent::ThreadStarted { thread_id, model } => {
                state.resume_session_id = Some(thread_id.clone());
                vec![BridgeEvent::Started {
                    session_id: thread_id,
                    model,
                }]
            }
            CodexEvent::ItemCompleted {
                item: CodexItem::AgentMessage { text },
            } => {
                // Codex sends cumulative snapshots per completed item, not
                // incremental deltas.
                state.last_text = text.clone();
                vec![BridgeEvent::Text {
                    text,
                    is_snapshot: true,
                }]
            }
            CodexEvent::ItemCompleted {
                item: CodexItem::CommandExecution { id, command },
            } => {
                // Codex reports the command as already finished in this one
                // event, so there's no pending span to track here — unlike
                // the other adapters' separate start/end events, inserting
                // into `pending_tools` would leak an entry nothing ever
                // removes.
                vec![
                    BridgeEvent::ToolStart {
                        tool_id: id.clone(),
                        name: "Bash".to_string(),
                        input: serde_json::json!({ "command": command }),
                    },
                    BridgeEvent::ToolEnd {
                        tool_id: id,
                        is_error: false,
                        preview: None,
                    },
                ]
            }
            CodexEvent::ItemCompleted { item: CodexItem::Other } => vec![],
            CodexEvent::TurnCompleted { usage } => {
                vec![BridgeEvent::Completed {
                    session_id: state.resume_session_id.clone(),
                    answer: state.last_text.clone(),
                    is_error: false,
                    cost: usage.and_then(|u| u.total_cost_usd),
                }]
            }
            CodexEvent::TurnFailed { error } => vec![BridgeEvent::Error {
                message: error.message,
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_core::manifest::builtin_manifests;

    fn driver() -> CodexDriver {
        let manifest = builtin_manifests()
            .into_iter()
            .find(|m| m.name == "codex")
            .unwrap();
        CodexDriver::new(manifest)
    }

    #[test]
    fn thread_started_emits_started() {
        let driver = driver();
        let mut state = TranslatorState::new();
        let events = driver.translate_line(
            r#"{"type":"thread.started","thread_id":"th1","model":"gpt-5.1-codex"}"#,
            &mut state,
        );
        assert!(matches!(events[0], BridgeEvent::Started { .. }));
        assert_eq!(state.resume_session_id.as_deref(), Some("th1"));
    }

    #[test]
    fn turn_completed_uses_accumulated_last_text() {
        let driver = driver();
        let mut state = TranslatorState::new();
        driver.translate_line(
            r#"{"type":"item.completed","item":{"type":"agent_message","text":"the answer"}}"#,
            &mut state,
        );
        let events = driver.translate_line(r#"{"type":"turn.completed"}"#, &mut state);
        match &events[0] {
            BridgeEvent::Completed { answer, .. } => assert_eq!(answer, "the answer"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn turn_failed_emits_error() {
        let driver = driver();
        let mut state = TranslatorState::new();
        let events = driver.translate_line(
            r#"{"type":"turn.failed","error":{"message":"rate limited"}}"#,
            &mut state,
        );
        match &events[0] {
            BridgeEvent::Error { message } => assert_eq!(message, "rate limited"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
