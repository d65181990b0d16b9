//! The normalized `BridgeEvent` vocabulary — every adapter's raw
//! JSONL schema is translated into this set before it ever reaches the
//! Session Controller.

use serde_json::Value;

/// A tool invocation the child process has requested, tracked in
/// `Session::pendingTools`.
#[derive(Debug, Clone)]
pub struct PendingTool {
    pub name: String,
    pub input: Value,
}

/// The normalized event vocabulary emitted by an [`crate::process::AgentProcess`]
///.
#[derive(Debug, Clone)]
pub enum BridgeEvent {
    /// Fired once, when the child reports its session identifier.
    Started {
        session_id: String,
        model: Option<String>,
    },
    /// Assistant text fragment. Adapters that snapshot cumulative text and
    /// adapters that stream incremental deltas both produce this variant;
    /// `is_snapshot` tells the consumer which prefix-test regime applies
    ///.
    Text { text: String, is_snapshot: bool },
    /// Internal reasoning trace. Never forwarded to users.
    Thinking { text: String },
    /// The child wants to invoke a tool.
    ToolStart {
        tool_id: String,
        name: String,
        input: Value,
    },
    /// A previously started tool finished.
    ToolEnd {
        tool_id: String,
        is_error: bool,
        preview: Option<String>,
    },
    /// Terminal for the turn.
    Completed {
        session_id: Option<String>,
        answer: String,
        is_error: bool,
        cost: Option<f64>,
    },
    /// Non-recoverable turn failure.
    Error { message: String },
}

impl BridgeEvent {
    /// `true` for the events that end a turn.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BridgeEvent::Completed { .. } | BridgeEvent::Error { .. })
    }
}
