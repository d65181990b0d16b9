mod claude;
mod codex;
mod droid;
mod pi;

pub use claude::ClaudeDriver;
pub use codex::CodexDriver;
pub use droid::DroidDriver;
pub use pi::PiDriver;

use bridge_core::AdapterManifest;

use crate::driver::AdapterDriver;

/// Build the `AdapterDriver` matching a manifest's `name`. Adapters named
/// outside the four built-ins fall back to the Claude schema, the most
/// common one among the pack's example repos.
pub fn driver_for(manifest: AdapterManifest) -> Box<dyn AdapterDriver> {
    match manifest.name.as_str() {
        "droid" => Box::new(DroidDriver::new(manifest)),
        "codex" => Box::new(CodexDriver::new(manifest)),
        "pi" => Box::new(PiDriver::new(manifest)),
        _ => Box::new(ClaudeDriver::new(manifest)),
    }
}
