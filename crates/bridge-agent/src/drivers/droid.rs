//! Droid adapter driver — translates `droid exec --output-format json`
//! stream events.
//!
//! Droid's own event shapes have drifted across releases, so several
//! fields tolerate alternate names (`tool`/`toolName`, `id`/`toolId`,
//! `parameters`/`input`).

use bridge_core::AdapterManifest;
use serde::Deserialize;

use crate::driver::{AdapterDriver, TranslatorState};
use crate::event::BridgeEvent;

pub struct DroidDriver {
    manifest: AdapterManifest,
}

impl DroidDriver {
    pub fn new(manifest: AdapterManifest) -> Self {
        Self { manifest }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum DroidEvent {
    SessionStart(SessionStartEvt),
    Message(MessageEvt),
    ToolStart(ToolStartEvt),
    ToolEnd(ToolEndEvt),
    Completion(CompletionEvt),
}

#[derive(Debug, Deserialize)]
struct SessionStartEvt {
    #[serde(alias = "sessionId")]
    session_id: Option<String>,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageEvt {
    #[serde(default)]
    role: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ToolStartEvt {
    #[serde(alias = "tool", alias = "toolName")]
    name: String,
    #[serde(alias = "toolId")]
    id: String,
    #[serde(alias = "parameters", default)]
    input: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ToolEndEvt {
    #[serde(alias = "toolId")]
    id: String,
    #[serde(default, alias = "error")]
    is_error: bool,
    #[serde(default, alias = "output")]
    preview: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionEvt {
    #[serde(default, alias = "final_text")]
    final_text: String,
    #[serde(default, alias = "sessionId")]
    session_id: Option<String>,
}

impl AdapterDriver for DroidDriver {
    fn manifest(&self) -> &AdapterManifest {
        &self.manifest
    }

    fn translate_line(&self, line: &str, state: &mut TranslatorState) -> Vec<BridgeEvent> {
        let event: DroidEvent = match serde_json::from_str(line) {
            Ok(e) => e,
            Err(_) => return vec![],
        };

        match event {
            DroidEvent::SessionStart(s) => {
                let session_id = s.session_id.unwrap_or_default();
                if session_id.is_empty() {
                    return vec![];
                }
                state.resume_session_id = Some(session_id.clone());
                vec![BridgeEvent::Started {
                    session_id,
                    model: s.model,
                }]
            }
            DroidEvent::Message(m) if m.role == "assistant" => {
                // Droid emits cumulative snapshots, not incremental deltas.
                state.last_text = m.text.clone();
                vec![BridgeEvent::Text {
                    text: m.text,
                    is_snapshot: true,
                }]
            }
            DroidEvent::Message(_) => vec![],
            DroidEvent::ToolStart(t) => {
                state.pending_tools.insert(t.id.clone(), t.name.clone());
                vec![BridgeEvent::ToolStart {
                    tool_id: t.id,
                    name: t.name,
                    input: t.input,
                }]
            }
            DroidEvent::ToolEnd(t) => {
                state.pending_tools.remove(&t.id);
                vec![BridgeEvent::ToolEnd {
                    tool_id: t.id,
                    is_error: t.is_error,
                    preview: t.preview,
                }]
            }
            DroidEvent::Completion(c) => {
                let answer = if c.final_text.is_empty() {
                    state.last_text.clone()
                } else {
                    c.final_text
                };
                let session_id = c.session_id.or_else(|| state.resume_session_id.clone());
                vec![BridgeEvent::Completed {
                    session_id,
                    answer,
                    is_error: false,
                    cost: None,
                }]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_core::manifest::builtin_manifests;

    fn driver() -> DroidDriver {
        let manifest = builtin_manifests()
            .into_iter()
            .find(|m| m.name == "droid")
            .unwrap();
        DroidDriver::new(manifest)
    }

    #[test]
    fn message_snapshot_replaces_last_text() {
        let driver = driver();
        let mut state = TranslatorState::new();
        driver.translate_line(r#"{"type":"message","role":"assistant","text":"abc"}"#, &mut state);
        driver.translate_line(r#"{"type":"message","role":"assistant","text":"abcdef"}"#, &mut state);
        assert_eq!(state.last_text, "abcdef");
    }

    #[test]
    fn tool_start_tolerates_alternate_field_names() {
        let driver = driver();
        let mut state = TranslatorState::new();
        let events = driver.translate_line(
            r#"{"type":"tool_start","toolName":"grep","toolId":"t9","parameters":{"q":"x"}}"#,
            &mut state,
        );
        match &events[0] {
            BridgeEvent::ToolStart { tool_id, name, .. } => {
                assert_eq!(tool_id, "t9");
                assert_eq!(name, "grep");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn completion_falls_back_to_stored_session_id() {
        let driver = driver();
        let mut state = TranslatorState::new();
        state.resume_session_id = Some("stored-session".to_string());
        state.last_text = "hello world".to_string();
        let events = driver.translate_line(r#"{"type":"completion"}"#, &mut state);
        match &events[0] {
            BridgeEvent::Completed { session_id, answer, .. } => {
                assert_eq!(session_id.as_deref(), Some("stored-session"));
                assert_eq!(answer, "hello world");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
