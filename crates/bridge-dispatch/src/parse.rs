//! Pure text → typed action.
//!
//! A `trimmed.eq_ignore_ascii_case` / `strip_prefix` dispatch chain over
//! the full slash-command surface, returning a typed enum instead of a
//! formatted reply string.

use crate::action::{CronAction, DispatchAction, SpawnArgs, SubagentsAction, ToggleArg};

/// Parse one inbound message into a [`DispatchAction`]. Returns `None` when
/// `text` is not a recognized command.
pub fn dispatch(text: &str) -> Option<DispatchAction> {
    let trimmed = text.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let (verb, rest) = split_verb(trimmed);

    match verb.to_ascii_lowercase().as_str() {
        "/use" => {
            let cli = rest.trim();
            if cli.is_empty() {
                Some(DispatchAction::Usage { command: "/use", message: "usage: /use <cli>".to_string() })
            } else {
                Some(DispatchAction::UseCli { cli: cli.to_string() })
            }
        }
        "/model" => {
            let alias = rest.trim();
            if alias.is_empty() {
                Some(DispatchAction::Usage { command: "/model", message: "usage: /model <alias>".to_string() })
            } else {
                Some(DispatchAction::SetModel { alias: alias.to_string() })
            }
        }
        "/new" => Some(DispatchAction::New),
        "/stop" => Some(DispatchAction::Stop),
        "/interrupt" => Some(DispatchAction::Interrupt),
        "/restart" => Some(DispatchAction::Restart),
        "/status" => Some(DispatchAction::Status),
        "/stream" => Some(DispatchAction::Stream(parse_toggle(rest))),
        "/verbose" => Some(DispatchAction::Verbose(parse_toggle(rest))),
        "/spawn" => Some(parse_spawn(rest)),
        "/subagents" => Some(parse_subagents(rest)),
        "/cron" => Some(parse_cron(rest)),
        "/concepts" => Some(DispatchAction::Concepts { term: rest.trim().to_string() }),
        "/related" => Some(DispatchAction::Related { term: rest.trim().to_string() }),
        "/file" => Some(DispatchAction::File { path: rest.trim().to_string() }),
        "/aliases" => Some(DispatchAction::Aliases { args: rest.trim().to_string() }),
        _ => None,
    }
}

fn split_verb(trimmed: &str) -> (&str, &str) {
    match trimmed.find(char::is_whitespace) {
        Some(i) => (&trimmed[..i], trimmed[i..].trim_start()),
        None => (trimmed, ""),
    }
}

fn parse_toggle(rest: &str) -> ToggleArg {
    match rest.trim().to_ascii_lowercase().as_str() {
        "on" => ToggleArg::On,
        "off" => ToggleArg::Off,
        _ => ToggleArg::Show,
    }
}

/// Pull a leading `"quoted string"` off `s`, returning `(content, remainder)`.
/// Falls back to splitting on the first `--` flag marker, then on
/// whitespace, when `s` is not quoted.
fn take_leading_token(s: &str) -> (String, &str) {
    let s = s.trim_start();
    if let Some(stripped) = s.strip_prefix('"') {
        if let Some(end) = stripped.find('"') {
            return (stripped[..end].to_string(), stripped[end + 1..].trim_start());
        }
        // unterminated quote: treat the rest of the line as the token.
        return (stripped.to_string(), "");
    }
    match s.find(" --") {
        Some(i) => (s[..i].trim().to_string(), s[i..].trim_start()),
        None => (s.trim().to_string(), ""),
    }
}

fn parse_flags(mut rest: &str) -> (Option<String>, Option<String>) {
    let mut label = None;
    let mut cli = None;
    while let Some(flag_start) = rest.strip_prefix("--") {
        let (name, after_name) = match flag_start.find(char::is_whitespace) {
            Some(i) => (&flag_start[..i], flag_start[i..].trim_start()),
            None => (flag_start, ""),
        };
        let (value, after_value) = take_leading_token(after_name);
        match name {
            "label" => label = Some(value),
            "cli" => cli = Some(value),
            _ => {}
        }
        rest = after_value;
    }
    (label, cli)
}

fn parse_spawn(rest: &str) -> DispatchAction {
    let (task, flag_rest) = take_leading_token(rest);
    let (label, cli) = parse_flags(flag_rest);
    DispatchAction::Spawn(SpawnArgs { task, label, cli })
}

fn parse_subagents(rest: &str) -> DispatchAction {
    let rest = rest.trim();
    if rest.is_empty() || rest.eq_ignore_ascii_case("list") {
        return DispatchAction::Subagents(SubagentsAction::List);
    }
    let (verb, arg) = split_verb(rest);
    match verb.to_ascii_lowercase().as_str() {
        "stop" if arg.eq_ignore_ascii_case("all") => DispatchAction::Subagents(SubagentsAction::StopAll),
        "stop" if !arg.is_empty() => DispatchAction::Subagents(SubagentsAction::Stop { run_id: arg.trim().to_string() }),
        "log" if !arg.is_empty() => DispatchAction::Subagents(SubagentsAction::Log { run_id: arg.trim().to_string() }),
        _ => DispatchAction::Usage {
            command: "/subagents",
            message: "usage: /subagents [list|stop <id>|stop all|log <id>]".to_string(),
        },
    }
}

fn parse_cron(rest: &str) -> DispatchAction {
    let rest = rest.trim();
    if rest.eq_ignore_ascii_case("list") {
        return DispatchAction::Cron(CronAction::List);
    }
    let (verb, arg) = split_verb(rest);
    match verb.to_ascii_lowercase().as_str() {
        "add" => {
            let (name, schedule_rest) = take_leading_token(arg);
            let schedule = schedule_rest.trim().to_string();
            if name.is_empty() || schedule.is_empty() {
                DispatchAction::Usage {
                    command: "/cron",
                    message: "usage: /cron add \"<name>\" <schedule>".to_string(),
                }
            } else {
                DispatchAction::Cron(CronAction::Add { name, schedule })
            }
        }
        "remove" if !arg.is_empty() => DispatchAction::Cron(CronAction::Remove { job_id: arg.trim().to_string() }),
        "run" if !arg.is_empty() => DispatchAction::Cron(CronAction::Run { job_id: arg.trim().to_string() }),
        "enable" if !arg.is_empty() => DispatchAction::Cron(CronAction::Enable { job_id: arg.trim().to_string() }),
        "disable" if !arg.is_empty() => DispatchAction::Cron(CronAction::Disable { job_id: arg.trim().to_string() }),
        _ => DispatchAction::Usage {
            command: "/cron",
            message: "usage: /cron list | add \"<name>\" <schedule> | remove <id> | run <id> | enable|disable <id>".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_slash_text_is_not_a_command() {
        assert_eq!(dispatch("hello there"), None);
    }

    #[test]
    fn use_sets_cli() {
        assert_eq!(dispatch("/use droid"), Some(DispatchAction::UseCli { cli: "droid".to_string() }));
    }

    #[test]
    fn model_without_arg_is_usage() {
        assert!(matches!(dispatch("/model"), Some(DispatchAction::Usage { command: "/model", .. })));
    }

    #[test]
    fn stream_bare_shows_current() {
        assert_eq!(dispatch("/stream"), Some(DispatchAction::Stream(ToggleArg::Show)));
        assert_eq!(dispatch("/stream on"), Some(DispatchAction::Stream(ToggleArg::On)));
        assert_eq!(dispatch("/verbose off"), Some(DispatchAction::Verbose(ToggleArg::Off)));
    }

    #[test]
    fn spawn_parses_quoted_task_and_flags() {
        let action = dispatch("/spawn \"audit the config loader\" --label audit --cli codex").unwrap();
        assert_eq!(
            action,
            DispatchAction::Spawn(SpawnArgs {
                task: "audit the config loader".to_string(),
                label: Some("audit".to_string()),
                cli: Some("codex".to_string()),
            })
        );
    }

    #[test]
    fn spawn_without_quotes_takes_rest_of_line_as_task() {
        let action = dispatch("/spawn clean up the workspace").unwrap();
        assert_eq!(
            action,
            DispatchAction::Spawn(SpawnArgs { task: "clean up the workspace".to_string(), label: None, cli: None })
        );
    }

    #[test]
    fn subagents_bare_is_list() {
        assert_eq!(dispatch("/subagents"), Some(DispatchAction::Subagents(SubagentsAction::List)));
        assert_eq!(dispatch("/subagents list"), Some(DispatchAction::Subagents(SubagentsAction::List)));
    }

    #[test]
    fn subagents_stop_all_vs_stop_one() {
        assert_eq!(dispatch("/subagents stop all"), Some(DispatchAction::Subagents(SubagentsAction::StopAll)));
        assert_eq!(
            dispatch("/subagents stop abc-123"),
            Some(DispatchAction::Subagents(SubagentsAction::Stop { run_id: "abc-123".to_string() }))
        );
    }

    #[test]
    fn subagents_unknown_subverb_is_usage() {
        assert!(matches!(dispatch("/subagents frobnicate"), Some(DispatchAction::Usage { command: "/subagents", .. })));
    }

    #[test]
    fn cron_add_captures_name_and_schedule() {
        let action = dispatch("/cron add \"nightly backup\" every 1h").unwrap();
        assert_eq!(
            action,
            DispatchAction::Cron(CronAction::Add { name: "nightly backup".to_string(), schedule: "every 1h".to_string() })
        );
    }

    #[test]
    fn cron_add_with_cron_expr_schedule() {
        let action = dispatch("/cron add \"heartbeat\" cron \"*/5 * * * *\"").unwrap();
        assert_eq!(
            action,
            DispatchAction::Cron(CronAction::Add {
                name: "heartbeat".to_string(),
                schedule: "cron \"*/5 * * * *\"".to_string(),
            })
        );
    }

    #[test]
    fn cron_unknown_subverb_is_usage() {
        assert!(matches!(dispatch("/cron frobnicate"), Some(DispatchAction::Usage { command: "/cron", .. })));
    }

    #[test]
    fn concepts_and_file_pass_through_raw_argument() {
        assert_eq!(dispatch("/concepts retry logic"), Some(DispatchAction::Concepts { term: "retry logic".to_string() }));
        assert_eq!(dispatch("/file src/main.rs"), Some(DispatchAction::File { path: "src/main.rs".to_string() }));
    }
}
