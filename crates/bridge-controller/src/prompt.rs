//! Prompt assembly — the fixed prefix ordering `processMessage` builds
//! every turn's prompt from: named sections concatenated in a fixed order,
//! blank lines between present ones, absent ones simply skipped.

use bridge_core::{Attachment, ForwardInfo};
use bridge_subagent::SubagentRun;

use crate::format::pending_results_block;

/// Standing instructions telling the model it may delegate background work
///. Only included for
/// `source == user` turns — a subagent's own completion should never spawn
/// more subagents through this channel.
pub const SPAWN_INSTRUCTIONS: &str = "You can delegate a long-running background task to a subagent. To do so, reply with EXACTLY one line and nothing else: `/spawn \"<task>\" [--label <label>] [--cli <cli>]`. Any additional text in that reply disqualifies it and the whole reply is sent to the user as-is instead.";

/// The prefix sections `processMessage` assembles, in the fixed order spec
/// §4.3.2 requires. Each `Option` that is `None` is simply omitted — never
/// rendered as an empty section.
#[derive(Debug, Clone, Default)]
pub struct PromptParts {
    pub spawn_instructions: Option<String>,
    pub memory_recall: Option<String>,
    pub memory_tool_instructions: Option<String>,
    pub pending_results: Option<String>,
    pub user_text: String,
    pub related_files: Option<String>,
}

impl PromptParts {
    /// Join every present section with a blank line, outermost first (spec
    /// §4.3.2's `[spawn] [recall] [memory tool] [pending results] [user
    /// text] [related files]` ordering).
    pub fn assemble(&self) -> String {
        let sections = [
            self.spawn_instructions.as_deref(),
            self.memory_recall.as_deref(),
            self.memory_tool_instructions.as_deref(),
            self.pending_results.as_deref(),
            Some(self.user_text.as_str()),
            self.related_files.as_deref(),
        ];
        sections
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Render the pending-results prefix from a batch of already-drained
/// terminal subagent records, or `None` when there are none to inject
///.
pub fn pending_results_prefix(runs: &[SubagentRun]) -> Option<String> {
    if runs.is_empty() {
        None
    } else {
        Some(pending_results_block(runs))
    }
}

/// Build the "original user text" section: forward annotation, then one
/// annotation line per attachment, then the raw text.
pub fn build_user_text(text: Option<&str>, attachments: &[Attachment], forward: Option<&ForwardInfo>) -> String {
    let mut lines = Vec::new();
    if let Some(fwd) = forward {
        lines.push(fwd.annotation());
    }
    for attachment in attachments {
        lines.push(attachment.annotation());
    }
    if let Some(t) = text {
        if !t.is_empty() {
            lines.push(t.to_string());
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_core::{AttachmentType, ChatId};
    use bridge_subagent::RunStatus;

    #[test]
    fn assemble_omits_absent_sections() {
        let parts = PromptParts {
            user_text: "hello".to_string(),
            ..Default::default()
        };
        assert_eq!(parts.assemble(), "hello");
    }

    #[test]
    fn assemble_preserves_section_order() {
        let parts = PromptParts {
            spawn_instructions: Some("spawn".to_string()),
            memory_recall: Some("recall".to_string()),
            memory_tool_instructions: Some("tool".to_string()),
            pending_results: Some("results".to_string()),
            user_text: "hello".to_string(),
            related_files: Some("related".to_string()),
        };
        assert_eq!(parts.assemble(), "spawn\n\nrecall\n\ntool\n\nresults\n\nhello\n\nrelated");
    }

    #[test]
    fn build_user_text_prefixes_attachments_and_forward() {
        let forward = ForwardInfo { from_user: Some("alice".to_string()), from_chat: None };
        let attachments = vec![Attachment {
            kind: AttachmentType::Photo,
            file_id: "f1".to_string(),
            local_path: Some("/tmp/x.jpg".to_string()),
        }];
        let text = build_user_text(Some("look at this"), &attachments, Some(&forward));
        assert_eq!(
            text,
            "[Forwarded message from alice]\n[Image: /tmp/x.jpg]\nlook at this"
        );
    }

    #[test]
    fn build_user_text_with_no_text_omits_blank_line() {
        let text = build_user_text(None, &[], None);
        assert_eq!(text, "");
    }

    #[test]
    fn pending_results_prefix_none_when_empty() {
        assert!(pending_results_prefix(&[]).is_none());
    }

    #[test]
    fn pending_results_prefix_renders_block_when_present() {
        let run = SubagentRun {
            run_id: uuid::Uuid::new_v4(),
            chat_id: ChatId::new("1"),
            parent_session_id: Some("p".to_string()),
            child_session_id: None,
            cli: "claude".to_string(),
            task: "t".to_string(),
            label: Some("S".to_string()),
            status: RunStatus::Completed,
            created_at: chrono::Utc::now(),
            started_at: None,
            ended_at: None,
            result: Some("done".to_string()),
            error: None,
            result_injected: false,
        };
        let prefix = pending_results_prefix(&[run]).unwrap();
        assert!(prefix.starts_with("[Subagent Results]"));
    }
}
