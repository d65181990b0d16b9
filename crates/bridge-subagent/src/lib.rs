//! `bridge-subagent` — the Subagent Registry.

pub mod error;
pub mod registry;
pub mod types;

pub use error::{Result, SubagentError};
pub use registry::SubagentRegistry;
pub use types::{RunStatus, SpawnOpts, SubagentRun};
