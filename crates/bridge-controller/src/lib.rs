//! `bridge-controller` — the Session Controller: the hub that wires every
//! other crate together into `handleInbound`/`processMessage`.

pub mod controller;
pub mod error;
pub mod format;
pub mod prompt;
pub mod sendfile;
pub mod sinks;
pub mod split;
pub mod stream;

pub use controller::{ControllerConfig, SessionController};
pub use error::{ControllerError, Result};
pub use sinks::{ContextEnricher, InboundSink, OutboundSink};
