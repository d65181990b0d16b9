//! `bridge-store` — Resume Store (`PersistentSessionStore`) and the
//! append-only Session Log.

pub mod atomic;
pub mod error;
pub mod log;
pub mod resume;

pub use error::{Result, StoreError};
pub use log::{EntryMeta, Role, SessionLog, SessionLogEntry, SubagentMeta};
pub use resume::{ChatSettings, PersistentSessionStore, ResumeToken};
