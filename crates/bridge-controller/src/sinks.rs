//! The three small traits that keep the out-of-scope collaborators
//! (concrete chat transport, memory recall / concept-index scanning)
//! pluggable: one minimal capability-set trait per concern, implemented by
//! whatever host owns the real transport/memory subsystem.

use async_trait::async_trait;

use bridge_core::{ChatId, InboundMessage};
use bridge_store::SessionLogEntry;

/// Producer half of the transport.
/// `bridge-gateway`'s stdin/stdout transport implements this; a real
/// Telegram/web transport would too.
#[async_trait]
pub trait InboundSink: Send {
    /// Pull the next inbound message. `None` means the transport has
    /// closed and the controller's run loop should stop.
    async fn recv(&mut self) -> Option<InboundMessage>;
}

/// Consumer half of the transport.
#[async_trait]
pub trait OutboundSink: Send + Sync {
    async fn send(&self, chat_id: &ChatId, text: &str);
    async fn send_file(&self, chat_id: &ChatId, path: &str, caption: Option<&str>);
    async fn typing(&self, chat_id: &ChatId);
}

/// Memory recall and concept-index lookups. Every method returns
/// `None` when the concern is disabled or has nothing to contribute, in
/// which case the corresponding prompt-assembly prefix is
/// omitted entirely rather than emitted empty.
#[async_trait]
pub trait ContextEnricher: Send + Sync {
    /// Memory recall block, included only for `source == user` turns with
    /// memory enabled.
    async fn recall(&self, chat_id: &ChatId, text: &str) -> Option<String>;

    /// Memory tool usage instructions appended to the prompt so the model
    /// knows it can request a memory lookup (omitted when `source ==
    /// memory-tool`, i.e. we are already answering a tool call).
    async fn memory_tool_instructions(&self) -> Option<String>;

    /// Related-files context block, included when the concept index has
    /// matches for `text`.
    async fn related_files(&self, text: &str) -> Option<String>;

    /// Detect a memory-tool invocation embedded in an assistant answer and
    /// execute it, returning the tool's result text. `None` means the
    /// answer was not a memory-tool call.
    async fn try_memory_tool_call(&self, answer: &str) -> Option<String>;

    /// Best-effort flush of a day's session-log entries into a memory
    /// summary, fired by `/new` before the main session is dropped (spec
    /// §4.3.5). A no-op default since summarization is itself part of the
    /// out-of-scope memory subsystem; hosts that wire in a real
    /// one override it.
    async fn flush_session_summary(&self, _chat_id: &ChatId, _entries: &[SessionLogEntry]) {}
}
