//! Streaming-mode aggregation — `streamBuffer` / `lastStreamedText`, the
//! prefix-test regime for mixed incremental/snapshot adapters, and the
//! 800-char / 1500ms flush trigger.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use crate::sendfile::{extract_sendfile_directives, SendFileDirective};

/// Flush threshold: buffer growth past this many chars forces a send
/// even if the idle timer hasn't elapsed.
pub const FLUSH_SIZE_THRESHOLD: usize = 800;
/// Flush threshold: this much idle time since the last flush forces a
/// send even if the buffer hasn't grown much.
pub const FLUSH_IDLE_THRESHOLD: Duration = Duration::from_millis(1500);

/// Per-turn streaming state. One instance lives for the lifetime of a
/// single agent turn; `chunks`/`finalize` draw from the Agent Process's
/// `text` events as they arrive.
pub struct StreamAggregator {
    buffer: String,
    last_streamed_text: String,
    last_flush_at: Instant,
    sent_sendfile_paths: HashSet<String>,
}

impl StreamAggregator {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            last_streamed_text: String::new(),
            last_flush_at: Instant::now(),
            sent_sendfile_paths: HashSet::new(),
        }
    }

    /// Fold one `text` event into the buffer using the prefix-test regime
    ///: a snapshot that extends the buffer replaces it; a
    /// snapshot that is a prefix of the buffer (an older snapshot arriving
    /// late) is ignored; anything else is appended.
    pub fn on_text(&mut self, text: &str, is_snapshot: bool) {
        if is_snapshot {
            if text.starts_with(self.buffer.as_str()) {
                self.buffer = text.to_string();
            } else if self.buffer.starts_with(text) {
                // stale snapshot, already superseded
            } else {
                self.buffer.push_str(text);
            }
        } else {
            self.buffer.push_str(text);
        }
    }

    /// Chars in the buffer not yet streamed to the user.
    pub fn pending_delta_len(&self) -> usize {
        self.pending_delta().chars().count()
    }

    fn pending_delta(&self) -> String {
        if self.buffer.starts_with(self.last_streamed_text.as_str()) {
            self.buffer[self.last_streamed_text.len()..].to_string()
        } else {
            // prefix invariant broken (shouldn't happen); resend the whole
            // buffer rather than drop content.
            self.buffer.clone()
        }
    }

    /// Whether a flush is due right now.
    pub fn should_flush(&self) -> bool {
        if self.pending_delta_len() == 0 {
            return false;
        }
        self.pending_delta_len() > FLUSH_SIZE_THRESHOLD
            || self.last_flush_at.elapsed() >= FLUSH_IDLE_THRESHOLD
    }

    /// Take the pending delta, mark it streamed, and extract/dedup any
    /// `[Sendfile:]` directives in it. Returns `None` when the buffer looks
    /// like it might still be growing into an assistant-initiated
    /// `/spawn` directive or
    /// when there's nothing new to send.
    pub fn flush(&mut self) -> Option<FlushResult> {
        if self.buffer.trim_start().starts_with("/spawn") {
            return None;
        }
        let delta = self.pending_delta();
        if delta.is_empty() {
            return None;
        }
        self.last_streamed_text = self.buffer.clone();
        self.last_flush_at = Instant::now();
        let (text, directives) = extract_sendfile_directives(&delta);
        let sendfiles = self.dedup(directives);
        Some(FlushResult { text, sendfiles })
    }

    /// At `completed`, the remaining delta vs whatever was already
    /// streamed. When streaming was never turned on, `last_streamed_text` is
    /// still empty so this simply returns the whole answer.
    pub fn finalize(&mut self, answer: &str) -> FlushResult {
        let delta = if answer.starts_with(self.last_streamed_text.as_str()) {
            answer[self.last_streamed_text.len()..].to_string()
        } else {
            answer.to_string()
        };
        let (text, directives) = extract_sendfile_directives(&delta);
        let sendfiles = self.dedup(directives);
        FlushResult { text, sendfiles }
    }

    fn dedup(&mut self, directives: Vec<SendFileDirective>) -> Vec<SendFileDirective> {
        directives
            .into_iter()
            .filter(|d| self.sent_sendfile_paths.insert(d.path.clone()))
            .collect()
    }
}

impl Default for StreamAggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushResult {
    pub text: String,
    pub sendfiles: Vec<SendFileDirective>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_growth_replaces_buffer() {
        let mut agg = StreamAggregator::new();
        agg.on_text("abc", true);
        agg.on_text("abcdef", true);
        agg.on_text("abcdefghi", true);
        assert_eq!(agg.pending_delta(), "abcdefghi");
    }

    #[test]
    fn stale_snapshot_is_ignored() {
        let mut agg = StreamAggregator::new();
        agg.on_text("abcdef", true);
        agg.on_text("abc", true); // older snapshot, arrives late
        assert_eq!(agg.pending_delta(), "abcdef");
    }

    #[test]
    fn incremental_chunks_append() {
        let mut agg = StreamAggregator::new();
        agg.on_text("ab", false);
        agg.on_text("cd", false);
        assert_eq!(agg.pending_delta(), "abcd");
    }

    #[test]
    fn flush_marks_delta_streamed_and_is_idempotent_until_new_text() {
        let mut agg = StreamAggregator::new();
        agg.on_text("hello world", false);
        let first = agg.flush().unwrap();
        assert_eq!(first.text, "hello world");
        assert!(agg.flush().is_none());
    }

    #[test]
    fn finalize_after_streaming_sends_only_new_delta() {
        let mut agg = StreamAggregator::new();
        agg.on_text("abc", true);
        agg.flush().unwrap();
        agg.on_text("abcdef", true);
        let result = agg.finalize("abcdef");
        assert_eq!(result.text, "def");
    }

    #[test]
    fn finalize_with_no_streaming_sends_whole_answer() {
        let mut agg = StreamAggregator::new();
        let result = agg.finalize("complete answer");
        assert_eq!(result.text, "complete answer");
    }

    #[test]
    fn flush_suppressed_while_buffer_looks_like_spawn_directive() {
        let mut agg = StreamAggregator::new();
        agg.on_text("/spawn \"do a thi", false);
        assert!(agg.flush().is_none());
    }

    #[test]
    fn sendfile_directive_not_resent_at_finalize() {
        let mut agg = StreamAggregator::new();
        agg.on_text("partial [Sendfile: /tmp/a.csv]\n", false);
        let flushed = agg.flush().unwrap();
        assert_eq!(flushed.sendfiles.len(), 1);

        agg.on_text("partial [Sendfile: /tmp/a.csv]\nmore text", false);
        let finalized = agg.finalize("partial [Sendfile: /tmp/a.csv]\nmore text");
        assert!(finalized.sendfiles.is_empty());
    }

    #[test]
    fn should_flush_past_size_threshold() {
        let mut agg = StreamAggregator::new();
        agg.on_text(&"x".repeat(801), false);
        assert!(agg.should_flush());
    }

    #[test]
    fn should_not_flush_small_buffer_immediately() {
        let mut agg = StreamAggregator::new();
        agg.on_text("short", false);
        assert!(!agg.should_flush());
    }
}
