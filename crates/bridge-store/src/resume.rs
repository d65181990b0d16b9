//! Resume Store / `PersistentSessionStore` — the `resume-tokens.json`
//! document.
//!
//! The exact on-disk shape is a compatibility contract: field
//! names are camelCase and the map key for `tokens` is `"<chatId>:<cli>"`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use bridge_core::{ChatId, CliName};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::atomic::{read_json_or_default, write_json_atomic};
use crate::error::Result;

/// `{engine: CLIName, sessionId: string}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResumeToken {
    pub engine: String,
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

/// Per-chat settings, read dynamically mid-session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatSettings {
    #[serde(default)]
    pub streaming: bool,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub model: Option<String>,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            streaming: false,
            verbose: false,
            model: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedDocument {
    version: u32,
    #[serde(default)]
    tokens: HashMap<String, ResumeToken>,
    #[serde(rename = "activeCli", default)]
    active_cli: HashMap<String, String>,
    #[serde(rename = "chatSettings", default)]
    chat_settings: HashMap<String, ChatSettings>,
}

impl Default for PersistedDocument {
    fn default() -> Self {
        Self {
            version: 1,
            tokens: HashMap::new(),
            active_cli: HashMap::new(),
            chat_settings: HashMap::new(),
        }
    }
}

fn token_key(chat_id: &ChatId, cli: &CliName) -> String {
    format!("{}:{}", chat_id, cli)
}

/// The durable half of session state: resume tokens, per-chat active CLI,
/// and per-chat settings, mirrored through a single JSON file rewritten
/// atomically on every mutation.
pub struct PersistentSessionStore {
    path: PathBuf,
    doc: Mutex<PersistedDocument>,
}

impl PersistentSessionStore {
    /// Load (or lazily initialize) the document at `path`.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load(path: PathBuf) -> Result<Self> {
        let doc = read_json_or_default(&path, PersistedDocument::default)?;
        Ok(Self {
            path,
            doc: Mutex::new(doc),
        })
    }

    fn persist(&self, doc: &PersistedDocument) -> Result<()> {
        write_json_atomic(&self.path, doc)
    }

    pub fn get_resume_token(&self, chat_id: &ChatId, cli: &CliName) -> Option<ResumeToken> {
        let doc = self.doc.lock().unwrap();
        doc.tokens.get(&token_key(chat_id, cli)).cloned()
    }

    /// Set the resume token for `(chatId, cli)`.
    #[instrument(skip(self), fields(%chat_id, %cli))]
    pub fn set_resume_token(
        &self,
        chat_id: &ChatId,
        cli: &CliName,
        session_id: impl Into<String>,
    ) -> Result<()> {
        let mut doc = self.doc.lock().unwrap();
        doc.tokens.insert(
            token_key(chat_id, cli),
            ResumeToken {
                engine: cli.0.clone(),
                session_id: session_id.into(),
            },
        );
        self.persist(&doc)
    }

    /// Clear a resume token. Not used by `/new` but available for completeness/testing.
    pub fn clear_resume_token(&self, chat_id: &ChatId, cli: &CliName) -> Result<()> {
        let mut doc = self.doc.lock().unwrap();
        doc.tokens.remove(&token_key(chat_id, cli));
        self.persist(&doc)
    }

    pub fn get_active_cli(&self, chat_id: &ChatId) -> Option<CliName> {
        let doc = self.doc.lock().unwrap();
        doc.active_cli.get(&chat_id.0).cloned().map(CliName::new)
    }

    #[instrument(skip(self), fields(%chat_id, %cli))]
    pub fn set_active_cli(&self, chat_id: &ChatId, cli: &CliName) -> Result<()> {
        let mut doc = self.doc.lock().unwrap();
        doc.active_cli.insert(chat_id.0.clone(), cli.0.clone());
        self.persist(&doc)
    }

    pub fn get_chat_settings(&self, chat_id: &ChatId) -> ChatSettings {
        let doc = self.doc.lock().unwrap();
        doc.chat_settings.get(&chat_id.0).cloned().unwrap_or_default()
    }

    /// Apply `f` to the chat's settings (creating defaults if absent) and
    /// persist. Settings changes take effect immediately and are read
    /// dynamically mid-session.
    #[instrument(skip(self, f), fields(%chat_id))]
    pub fn update_chat_settings(
        &self,
        chat_id: &ChatId,
        f: impl FnOnce(&mut ChatSettings),
    ) -> Result<ChatSettings> {
        let mut doc = self.doc.lock().unwrap();
        let mut settings = doc.chat_settings.get(&chat_id.0).cloned().unwrap_or_default();
        f(&mut settings);
        doc.chat_settings.insert(chat_id.0.clone(), settings.clone());
        self.persist(&doc)?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, PersistentSessionStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resume-tokens.json");
        let store = PersistentSessionStore::load(path).unwrap();
        (dir, store)
    }

    #[test]
    fn resume_token_round_trips() {
        let (_dir, store) = temp_store();
        let chat = ChatId::new("123");
        let cli = CliName::new("claude");
        assert!(store.get_resume_token(&chat, &cli).is_none());

        store.set_resume_token(&chat, &cli, "sess-1").unwrap();
        let token = store.get_resume_token(&chat, &cli).unwrap();
        assert_eq!(token.session_id, "sess-1");
        assert_eq!(token.engine, "claude");
    }

    #[test]
    fn reload_from_disk_preserves_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resume-tokens.json");
        let chat = ChatId::new("123");
        let cli = CliName::new("claude");
        {
            let store = PersistentSessionStore::load(path.clone()).unwrap();
            store.set_resume_token(&chat, &cli, "sess-1").unwrap();
            store.set_active_cli(&chat, &cli).unwrap();
        }
        let store = PersistentSessionStore::load(path).unwrap();
        assert_eq!(
            store.get_resume_token(&chat, &cli).unwrap().session_id,
            "sess-1"
        );
        assert_eq!(store.get_active_cli(&chat).unwrap(), cli);
    }

    #[test]
    fn chat_settings_default_to_spec_values() {
        let (_dir, store) = temp_store();
        let settings = store.get_chat_settings(&ChatId::new("42"));
        assert!(!settings.streaming);
        assert!(!settings.verbose);
        assert!(settings.model.is_none());
    }

    #[test]
    fn on_disk_shape_matches_spec_field_names() {
        let (_dir, store) = temp_store();
        let chat = ChatId::new("42");
        let cli = CliName::new("claude");
        store.set_resume_token(&chat, &cli, "s1").unwrap();
        let raw = std::fs::read_to_string(&store.path).unwrap();
        assert!(raw.contains("\"tokens\""));
        assert!(raw.contains("\"activeCli\""));
        assert!(raw.contains("\"chatSettings\""));
        assert!(raw.contains("\"sessionId\""));
        assert!(raw.contains("\"42:claude\""));
    }
}
