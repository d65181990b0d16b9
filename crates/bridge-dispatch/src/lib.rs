//! `bridge-dispatch` — the Command Dispatcher: pure text → typed action
//!.

pub mod action;
pub mod parse;

pub use action::{CronAction, DispatchAction, SpawnArgs, SubagentsAction, ToggleArg};
pub use parse::dispatch;
