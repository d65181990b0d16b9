//! User-visible output conventions — must be reproducible for
//! tests, so every piece of punctuation here is load-bearing.

use bridge_subagent::SubagentRun;

/// Truncate to `max_len` chars, keeping the first 60% and the last 40%
/// joined by a middle ellipsis marker.
/// Text at or under `max_len` is returned unchanged.
pub fn truncate_middle(text: &str, max_len: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_len {
        return text.to_string();
    }
    let head_len = max_len * 6 / 10;
    let tail_len = max_len - head_len;
    let head: String = chars[..head_len].iter().collect();
    let tail: String = chars[chars.len() - tail_len..].iter().collect();
    format!("{head}\n…(truncated)…\n{tail}")
}

/// `🚀 Spawned: <label>\n   CLI: <cli>[ (fallback from <orig>)]\n   Task: <first 100 chars>…?`
///.
pub fn spawn_ack(label: &str, cli: &str, fallback_from: Option<&str>, task: &str) -> String {
    let cli_line = match fallback_from {
        Some(orig) => format!("   CLI: {cli} (fallback from {orig})"),
        None => format!("   CLI: {cli}"),
    };
    let task_chars: Vec<char> = task.chars().collect();
    let task_preview = if task_chars.len() > 100 {
        let head: String = task_chars[..100].iter().collect();
        format!("{head}…")
    } else {
        task.to_string()
    };
    format!("🚀 Spawned: {label}\n{cli_line}\n   Task: {task_preview}")
}

/// `🔄 Started: <label>`.
pub fn start_notification(label: &str) -> String {
    format!("🔄 Started: {label}")
}

/// Header line `<icon> <label> [(<duration>)]`, blank line, then the body
///. `error` takes priority over
/// `result`; an empty/absent result renders as `(no output)`.
pub fn completion_announcement(
    label: &str,
    icon: &str,
    duration: Option<chrono::Duration>,
    result: Option<&str>,
    error: Option<&str>,
) -> String {
    let header = match duration {
        Some(d) => format!("{icon} {label} ({})", format_duration(d)),
        None => format!("{icon} {label}"),
    };
    let body = if let Some(err) = error {
        format!("Error: {err}")
    } else {
        match result.filter(|r| !r.is_empty()) {
            Some(r) => truncate_middle(r, 2000),
            None => "(no output)".to_string(),
        }
    };
    format!("{header}\n\n{body}")
}

/// Build a completion announcement straight from a terminal [`SubagentRun`].
pub fn subagent_completion_announcement(run: &SubagentRun) -> String {
    completion_announcement(
        &run.display_label(),
        run.status.icon(),
        run.duration(),
        run.result.as_deref(),
        run.error.as_deref(),
    )
}

fn format_duration(d: chrono::Duration) -> String {
    let total_secs = d.num_milliseconds().max(0) as f64 / 1000.0;
    if total_secs < 60.0 {
        format!("{total_secs:.1}s")
    } else {
        let mins = (total_secs / 60.0).floor();
        let secs = total_secs - mins * 60.0;
        format!("{mins:.0}m{secs:.0}s")
    }
}

/// `[Subagent Results]\n<✅|❌> <label>: <output>\n…\n[/Subagent Results]`
///.
pub fn pending_results_block(runs: &[SubagentRun]) -> String {
    let mut lines = vec!["[Subagent Results]".to_string()];
    for run in runs {
        let output = run
            .result
            .as_deref()
            .or(run.error.as_deref())
            .unwrap_or("(no output)");
        lines.push(format!("{} {}: {output}", run.status.icon(), run.display_label()));
    }
    lines.push("[/Subagent Results]".to_string());
    lines.join("\n")
}

/// `💰 Cost` message emitted after the final answer when the adapter
/// reports a `cost`.
pub fn cost_message(cost: f64) -> String {
    format!("💰 Cost: ${cost:.4}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_core::ChatId;
    use bridge_subagent::RunStatus;

    fn run(status: RunStatus, result: Option<&str>, error: Option<&str>) -> SubagentRun {
        SubagentRun {
            run_id: uuid::Uuid::new_v4(),
            chat_id: ChatId::new("1"),
            parent_session_id: Some("p".to_string()),
            child_session_id: None,
            cli: "claude".to_string(),
            task: "do stuff".to_string(),
            label: Some("S".to_string()),
            status,
            created_at: chrono::Utc::now(),
            started_at: Some(chrono::Utc::now()),
            ended_at: Some(chrono::Utc::now()),
            result: result.map(str::to_string),
            error: error.map(str::to_string),
            result_injected: false,
        }
    }

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(truncate_middle("hello", 2000), "hello");
    }

    #[test]
    fn long_text_splits_60_40_with_marker() {
        let text = "a".repeat(3000);
        let result = truncate_middle(&text, 2000);
        assert!(result.contains("…(truncated)…"));
        let head_len = result.find('\n').unwrap();
        assert_eq!(head_len, 1200);
    }

    #[test]
    fn spawn_ack_without_fallback() {
        let msg = spawn_ack("S", "claude", None, "write a report");
        assert_eq!(msg, "🚀 Spawned: S\n   CLI: claude\n   Task: write a report");
    }

    #[test]
    fn spawn_ack_with_fallback_notes_original() {
        let msg = spawn_ack("S", "claude", Some("droid"), "do a thing");
        assert!(msg.contains("CLI: claude (fallback from droid)"));
    }

    #[test]
    fn spawn_ack_truncates_long_task_to_100_chars() {
        let task = "x".repeat(150);
        let msg = spawn_ack("S", "claude", None, &task);
        assert!(msg.contains(&"x".repeat(100)));
        assert!(msg.trim_end().ends_with('…'));
    }

    #[test]
    fn start_notification_format() {
        assert_eq!(start_notification("S"), "🔄 Started: S");
    }

    #[test]
    fn completion_announcement_error_takes_priority() {
        let msg = completion_announcement("S", "❌", None, Some("ignored"), Some("boom"));
        assert!(msg.contains("Error: boom"));
        assert!(!msg.contains("ignored"));
    }

    #[test]
    fn completion_announcement_no_output_when_empty() {
        let msg = completion_announcement("S", "✅", None, Some(""), None);
        assert!(msg.contains("(no output)"));
    }

    #[test]
    fn subagent_completion_announcement_uses_icon_and_label() {
        let r = run(RunStatus::Completed, Some("sub-X:42"), None);
        let msg = subagent_completion_announcement(&r);
        assert!(msg.starts_with("✅ S"));
        assert!(msg.contains("sub-X:42"));
    }

    #[test]
    fn pending_results_block_wraps_multiple_entries() {
        let runs = vec![
            run(RunStatus::Completed, Some("ok"), None),
            run(RunStatus::Error, None, Some("failed")),
        ];
        let block = pending_results_block(&runs);
        assert!(block.starts_with("[Subagent Results]"));
        assert!(block.ends_with("[/Subagent Results]"));
        assert!(block.contains("✅ S: ok"));
        assert!(block.contains("❌ S: failed"));
    }

    #[test]
    fn cost_message_format() {
        assert_eq!(cost_message(0.0123), "💰 Cost: $0.0123");
    }
}
