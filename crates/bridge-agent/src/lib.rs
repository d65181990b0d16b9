//! `bridge-agent` — Agent Process (child process supervisor) and Event
//! Translator.
//!
//! # Overview
//!
//! One [`AdapterDriver`] implementation exists per supported CLI (claude,
//! droid, codex, pi). `AgentProcess` depends only on the trait object, never
//! on a string tag.

pub mod driver;
pub mod drivers;
pub mod error;
pub mod event;
pub mod process;

pub use driver::{AdapterDriver, RunOptions, TranslatorState};
pub use drivers::driver_for;
pub use error::{AgentError, Result};
pub use event::{BridgeEvent, PendingTool};
pub use process::AgentProcess;
