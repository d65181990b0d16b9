//! `AdapterDriver` — a polymorphic capability set (`buildArgv` /
//! `translateEvent` / `wantsStdinOpen`) in place of string-keyed
//! `cli == "droid"` branches: one capability-set trait, one implementation
//! per backend, and the supervisor (`AgentProcess`) depends only on the
//! trait object.

use std::collections::HashMap;

use bridge_core::AdapterManifest;
use serde_json::Value;

use crate::event::BridgeEvent;

/// Parameters for one turn, used to build the child's argv/stdin payload.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub prompt: String,
    pub resume_session_id: Option<String>,
    pub model: Option<String>,
    pub working_dir: Option<String>,
}

/// Per-session mutable state the translator needs across lines: the
/// cumulative "last text" buffer (for snapshot adapters whose terminal event
/// carries no answer of its own, e.g. Codex's `turn.completed`) and the
/// table of tools the child has started but not yet finished.
#[derive(Debug, Default)]
pub struct TranslatorState {
    pub last_text: String,
    pub pending_tools: HashMap<String, String>,
    pub resume_session_id: Option<String>,
}

impl TranslatorState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// The capability set an `AgentProcess` depends on instead of a string tag.
///
/// Implementations are pure: `translate_line` takes a raw JSONL line plus
/// mutable translator state and returns zero or more normalized events.
/// Unknown/non-JSON lines return an empty vec.
pub trait AdapterDriver: Send + Sync {
    fn manifest(&self) -> &AdapterManifest;

    fn name(&self) -> &str {
        &self.manifest().name
    }

    /// Compose the argv for one turn. The manifest's
    /// `baseArgs` come first, then adapter-specific resume/model/working-dir
    /// flags, then the prompt itself when `input_mode == Arg`.
    fn build_argv(&self, opts: &RunOptions) -> Vec<String> {
        let manifest = self.manifest();
        let mut argv = manifest.args.clone();

        if let (Some(resume), Some(flag)) = (&opts.resume_session_id, &manifest.resume) {
            argv.push(flag.flag.clone());
            argv.push(resume.clone());
        }

        if let Some(model_flag) = &manifest.model {
            let model = opts.model.clone().unwrap_or_else(|| model_flag.default.clone());
            argv.push(model_flag.flag.clone());
            argv.push(model);
        }

        if let (Some(dir), Some(flag)) = (&opts.working_dir, &manifest.working_dir_flag) {
            argv.push(flag.clone());
            argv.push(dir.clone());
        }

        if matches!(manifest.input_mode, bridge_core::InputMode::Arg) {
            argv.push(opts.prompt.clone());
        }

        argv
    }

    /// Whether stdin should remain open after the initial prompt is written
    ///.
    fn wants_stdin_open(&self) -> bool {
        self.manifest().keep_stdin_open
    }

    /// The payload to write to stdin before closing it (or keeping it open),
    /// for adapters whose `input_mode == Jsonl`. `None` for `Arg`-mode
    /// adapters, whose prompt is already in argv.
    fn stdin_payload(&self, opts: &RunOptions) -> Option<String> {
        match self.manifest().input_mode {
            bridge_core::InputMode::Jsonl => Some(opts.prompt.clone()),
            bridge_core::InputMode::Arg => None,
        }
    }

    /// Translate one raw JSONL line (or a non-JSON stderr-adjacent line) into
    /// zero or more normalized events.
    fn translate_line(&self, line: &str, state: &mut TranslatorState) -> Vec<BridgeEvent>;

    /// Write a tool-result payload back to the child's stdin, for adapters
    /// with an in-loop tool protocol.
    fn format_tool_result(&self, _tool_id: &str, _result: &Value) -> Option<String> {
        None
    }
}
