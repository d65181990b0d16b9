//! A no-op [`ContextEnricher`] — memory recall and concept-index scanning
//! are out-of-scope external collaborators; this is the stand-in
//! the gateway binary wires up so every prompt-assembly prefix is simply
//! omitted until a real memory subsystem is plugged in. Same method surface
//! a real one would have (`recall`/`search`/summarization entry points),
//! stubbed to `None` everywhere.

use async_trait::async_trait;

use bridge_core::ChatId;
use bridge_controller::ContextEnricher;
use bridge_store::SessionLogEntry;

pub struct NullContextEnricher;

#[async_trait]
impl ContextEnricher for NullContextEnricher {
    async fn recall(&self, _chat_id: &ChatId, _text: &str) -> Option<String> {
        None
    }

    async fn memory_tool_instructions(&self) -> Option<String> {
        None
    }

    async fn related_files(&self, _text: &str) -> Option<String> {
        None
    }

    async fn try_memory_tool_call(&self, _answer: &str) -> Option<String> {
        None
    }

    async fn flush_session_summary(&self, _chat_id: &ChatId, _entries: &[SessionLogEntry]) {}
}
