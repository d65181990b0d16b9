//! `bridge-core` — shared types, config, and adapter manifests for the
//! chat-to-CLI bridge.
//!
//! # Overview
//!
//! This crate carries no behaviour of its own; every other crate in the
//! workspace depends on it for the vocabulary they share: chat/CLI
//! identifiers, the inbound-message contract, the model-alias table, the
//! adapter manifest shape, config, and the common error type.

pub mod config;
pub mod error;
pub mod manifest;
pub mod types;

pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
pub use manifest::{AdapterManifest, InputMode};
pub use types::{
    resolve_model_alias, Attachment, AttachmentType, ChatId, CliName, ForwardInfo,
    InboundContext, InboundMessage,
};
