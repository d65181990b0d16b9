//! `bridge-gateway` — the binary. Wires a [`bridge_core::BridgeConfig`]
//! into a running [`bridge_controller::SessionController`] and drives a
//! minimal line-delimited-JSON stdin/stdout transport, a stand-in for the
//! out-of-scope concrete Telegram/web transport. Initializes
//! tracing-subscriber, loads config with a warn-and-default fallback, and
//! builds the shared `Arc<Bridge>`.

mod app;
mod enricher;
mod health;
mod stdio;

use std::sync::Arc;

use clap::Parser;
use tracing::info;

use bridge_core::BridgeConfig;
use bridge_controller::InboundSink;

/// A chat-to-CLI bridge: mediates between a chat transport and long-running
/// interactive coding-assistant CLIs.
#[derive(Parser, Debug)]
#[command(name = "bridge-gateway", version)]
struct Args {
    /// Path to `bridge.toml`. Falls back to `BRIDGE_CONFIG` then
    /// `~/.bridge/bridge.toml`.
    #[arg(long)]
    config: Option<String>,

    /// Default adapter for chats with no `/use` override.
    #[arg(long, default_value = "claude")]
    default_cli: String,

    /// Adapter substituted when a spawn resolves to `droid` but no `droid`
    /// adapter is configured.
    #[arg(long)]
    droid_fallback_cli: Option<String>,

    /// Disable the Cron Service entirely.
    #[arg(long)]
    no_cron: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bridge_gateway=info,bridge_controller=info".into()),
        )
        .init();

    let args = Args::parse();

    let config = BridgeConfig::load(args.config.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("config load failed ({e}), using defaults");
        BridgeConfig::default()
    });

    let outbound = Arc::new(stdio::StdioOutbound::new(tokio::io::stdout()));
    let bridge = app::Bridge::start(
        &config,
        outbound,
        &args.default_cli,
        args.droid_fallback_cli.as_deref(),
        !args.no_cron,
    )
    .await?;

    info!("bridge-gateway ready; reading inbound messages from stdin");

    let mut inbound = stdio::StdioInbound::new(tokio::io::stdin());
    loop {
        match inbound.recv().await {
            Some(msg) => {
                let controller = bridge.controller.clone();
                tokio::spawn(async move { controller.handle_inbound(msg).await });
            }
            None => {
                info!("stdin closed; shutting down");
                break;
            }
        }
    }

    bridge.close();
    Ok(())
}
