use serde::{Deserialize, Serialize};

/// Opaque chat identity. A chat beginning with `web:` denotes the optional
/// non-Telegram transport and is treated identically for bridge purposes
///.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChatId(pub String);

impl ChatId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// True if this chat belongs to the optional web transport.
    pub fn is_web(&self) -> bool {
        self.0.starts_with("web:")
    }
}

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChatId {
    fn from(s: &str) -> Self {
        ChatId(s.to_string())
    }
}

impl From<String> for ChatId {
    fn from(s: String) -> Self {
        ChatId(s)
    }
}

/// Name of a supported CLI adapter (`claude`, `codex`, `droid`, `pi`, or any
/// name loaded from an adapter manifest).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CliName(pub String);

impl CliName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl std::fmt::Display for CliName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CliName {
    fn from(s: &str) -> Self {
        CliName(s.to_string())
    }
}

/// Kind of attachment on an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentType {
    Photo,
    Document,
    Audio,
    Voice,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(rename = "type")]
    pub kind: AttachmentType,
    pub file_id: String,
    pub local_path: Option<String>,
}

impl Attachment {
    /// Render the inline annotation line preceding the prompt text
    ///.
    pub fn annotation(&self) -> String {
        let path = self.local_path.as_deref().unwrap_or(&self.file_id);
        match self.kind {
            AttachmentType::Photo => format!("[Image: {path}]"),
            AttachmentType::Document => format!("[File: {path}]"),
            AttachmentType::Audio => format!("[Audio: {path}]"),
            AttachmentType::Voice => format!("[Voice: {path}]"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardInfo {
    pub from_user: Option<String>,
    pub from_chat: Option<String>,
}

impl ForwardInfo {
    /// `[Forwarded message from <who>]` prefix.
    pub fn annotation(&self) -> String {
        let who = self
            .from_user
            .as_deref()
            .or(self.from_chat.as_deref())
            .unwrap_or("unknown");
        format!("[Forwarded message from {who}]")
    }
}

/// Context tagged onto an inbound message describing where it came from
///.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InboundContext {
    pub source: Option<String>,
    pub cron_job_id: Option<String>,
    pub memory_tool_depth: Option<u8>,
    pub is_private: Option<bool>,
}

/// Inbound-message contract consumed from the transport collaborator
///.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub id: String,
    pub chat_id: ChatId,
    pub user_id: String,
    pub message_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub forward: Option<ForwardInfo>,
    #[serde(default)]
    pub context: InboundContext,
    /// `true` when this delivery originated from a cron job; paired with
    /// `context.cron_job_id`.
    #[serde(default)]
    pub is_cron: bool,
}

/// Built-in model-alias table. Lookup is case-insensitive; unknown aliases
/// pass through unchanged.
const MODEL_ALIASES: &[(&str, &str)] = &[
    ("opus", "claude-opus-4-6"),
    ("sonnet", "claude-sonnet-4-6"),
    ("haiku", "claude-haiku-4-5"),
    ("codex", "gpt-5.1-codex"),
    ("codex-max", "gpt-5.1-codex-max"),
    ("gemini", "gemini-2.5-pro"),
    ("gemini-flash", "gemini-2.5-flash"),
    ("pi", "pi-default"),
    ("pi-opus", "claude-opus-4-6"),
    ("pi-haiku", "claude-haiku-4-5"),
];

/// Resolve a model alias to its adapter-specific model ID. Passes through
/// unmodified when `alias` is not a known short name.
pub fn resolve_model_alias(alias: &str) -> String {
    let lower = alias.to_lowercase();
    for &(short, full) in MODEL_ALIASES {
        if lower == short {
            return full.to_string();
        }
    }
    alias.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_id_web_prefix_detected() {
        assert!(ChatId::new("web:abc").is_web());
        assert!(!ChatId::new("12345").is_web());
    }

    #[test]
    fn model_alias_resolves_known() {
        assert_eq!(resolve_model_alias("opus"), "claude-opus-4-6");
        assert_eq!(resolve_model_alias("SONNET"), "claude-sonnet-4-6");
    }

    #[test]
    fn model_alias_passes_through_unknown() {
        assert_eq!(resolve_model_alias("claude-opus-4-6"), "claude-opus-4-6");
        assert_eq!(resolve_model_alias("gpt-9000"), "gpt-9000");
    }

    #[test]
    fn attachment_annotation_prefers_local_path() {
        let a = Attachment {
            kind: AttachmentType::Photo,
            file_id: "tg123".into(),
            local_path: Some("/tmp/x.jpg".into()),
        };
        assert_eq!(a.annotation(), "[Image: /tmp/x.jpg]");
    }
}
