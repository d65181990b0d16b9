//! `BridgeConfig` — the bridge's single TOML document plus `BRIDGE_*` env
//! overrides, loaded with a figment chain so env vars win over file values
//! and file values win over built-in defaults.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

/// Top-level config (`bridge.toml` + `BRIDGE_*` env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub lanes: LaneConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub cron: CronConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            lanes: LaneConfig::default(),
            limits: LimitsConfig::default(),
            paths: PathsConfig::default(),
            cron: CronConfig::default(),
        }
    }
}

/// Concurrency width of each of the three named lanes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaneConfig {
    #[serde(default = "default_main_width")]
    pub main_width: usize,
    #[serde(default = "default_subagent_width")]
    pub subagent_width: usize,
    #[serde(default = "default_cron_width")]
    pub cron_width: usize,
}

impl Default for LaneConfig {
    fn default() -> Self {
        Self {
            main_width: default_main_width(),
            subagent_width: default_subagent_width(),
            cron_width: default_cron_width(),
        }
    }
}

fn default_main_width() -> usize {
    1
}
fn default_subagent_width() -> usize {
    4
}
fn default_cron_width() -> usize {
    1
}

/// Bounds shared across subsystems: subagent cap, queue bound, retention,
/// TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_subagent_cap")]
    pub subagent_cap: usize,
    #[serde(default = "default_queue_bound")]
    pub queue_bound: usize,
    #[serde(default = "default_subagent_retention")]
    pub subagent_retention: usize,
    #[serde(default = "default_subagent_ttl_secs")]
    pub subagent_ttl_secs: u64,
    #[serde(default = "default_tool_recursion_depth")]
    pub tool_recursion_depth: u8,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            subagent_cap: default_subagent_cap(),
            queue_bound: default_queue_bound(),
            subagent_retention: default_subagent_retention(),
            subagent_ttl_secs: default_subagent_ttl_secs(),
            tool_recursion_depth: default_tool_recursion_depth(),
        }
    }
}

fn default_subagent_cap() -> usize {
    4
}
fn default_queue_bound() -> usize {
    5
}
fn default_subagent_retention() -> usize {
    10
}
fn default_subagent_ttl_secs() -> u64 {
    6 * 3600
}
fn default_tool_recursion_depth() -> u8 {
    2
}

/// Filesystem layout for the durable stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_workspace_dir")]
    pub workspace_dir: String,
    #[serde(default = "default_config_dir")]
    pub config_dir: String,
    #[serde(default = "default_manifest_dir")]
    pub manifest_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            workspace_dir: default_workspace_dir(),
            config_dir: default_config_dir(),
            manifest_dir: default_manifest_dir(),
        }
    }
}

impl PathsConfig {
    pub fn resume_tokens_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.workspace_dir)
            .join(".state")
            .join("resume-tokens.json")
    }

    pub fn sessions_dir(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.workspace_dir).join("sessions")
    }

    pub fn cron_store_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.config_dir).join("cron.json")
    }

    pub fn cron_runs_dir(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.config_dir).join("cron-runs")
    }

    pub fn subagent_registry_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.config_dir).join("subagent-registry.json")
    }
}

fn default_workspace_dir() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.bridge/workspace")
}
fn default_config_dir() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.bridge")
}
fn default_manifest_dir() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.bridge/adapters")
}

/// Cron firing-loop tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronConfig {
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
}

impl Default for CronConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval_secs(),
        }
    }
}

fn default_check_interval_secs() -> u64 {
    60
}

impl BridgeConfig {
    /// Load config from a TOML file with `BRIDGE_*` env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. `BRIDGE_CONFIG` env var
    ///   3. `~/.bridge/bridge.toml`
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .or_else(|| std::env::var("BRIDGE_CONFIG").ok())
            .unwrap_or_else(default_config_path);

        let config: BridgeConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("BRIDGE_").split("_"))
            .extract()
            .map_err(|e| BridgeError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.bridge/bridge.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_lane_widths() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.lanes.main_width, 1);
        assert_eq!(cfg.lanes.subagent_width, 4);
        assert_eq!(cfg.lanes.cron_width, 1);
    }

    #[test]
    fn defaults_match_spec_limits() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.limits.subagent_cap, 4);
        assert_eq!(cfg.limits.queue_bound, 5);
        assert_eq!(cfg.limits.subagent_retention, 10);
        assert_eq!(cfg.limits.subagent_ttl_secs, 6 * 3600);
        assert_eq!(cfg.limits.tool_recursion_depth, 2);
    }

    #[test]
    fn load_falls_back_to_defaults_without_a_file() {
        let cfg = BridgeConfig::load(Some("/nonexistent/bridge.toml")).unwrap();
        assert_eq!(cfg.lanes.main_width, 1);
    }
}
