//! Adapter manifests — static per-CLI descriptors.
//!
//! Loading a manifest *file* belongs to the deployment, but the manifest
//! *shape* and a loader for its YAML format live here so `bridge-gateway`
//! has something concrete to call.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

/// How a CLI adapter accepts its prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    /// Prompt passed as a trailing command-line argument.
    Arg,
    /// Prompt passed as a JSONL message written to stdin.
    Jsonl,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeFlag {
    pub flag: String,
    pub session_arg: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelFlag {
    pub flag: String,
    pub default: String,
}

/// Static per-CLI descriptor. Immutable
/// after load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterManifest {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub input_mode: InputMode,
    #[serde(default)]
    pub resume: Option<ResumeFlag>,
    #[serde(default)]
    pub model: Option<ModelFlag>,
    #[serde(default)]
    pub working_dir_flag: Option<String>,
    /// Whether stdin remains open after the prompt is sent, for tool-exec
    /// feedback loops (currently only Pi).
    #[serde(default)]
    pub keep_stdin_open: bool,
}

/// Load every `*.yaml`/`*.yml` manifest file in `dir`, overriding/augmenting
/// the built-in defaults. Directory absence is not an error — the
/// built-ins are still returned.
pub fn load_manifests_from_dir(dir: &Path) -> Result<Vec<AdapterManifest>> {
    let mut manifests: Vec<AdapterManifest> = builtin_manifests();

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(manifests),
        Err(e) => return Err(BridgeError::Io(e)),
    };

    for entry in entries {
        let entry = entry.map_err(BridgeError::Io)?;
        let path = entry.path();
        let is_yaml = path
            .extension()
            .map(|ext| ext == "yaml" || ext == "yml")
            .unwrap_or(false);
        if !is_yaml {
            continue;
        }
        let contents = std::fs::read_to_string(&path).map_err(BridgeError::Io)?;
        let manifest: AdapterManifest = serde_yaml::from_str(&contents)
            .map_err(|e| BridgeError::Manifest(format!("{}: {e}", path.display())))?;

        if let Some(existing) = manifests.iter_mut().find(|m| m.name == manifest.name) {
            *existing = manifest;
        } else {
            manifests.push(manifest);
        }
    }

    Ok(manifests)
}

/// The four named adapters (claude, droid, codex, pi), shipped as
/// compiled-in defaults so the gateway works without any manifest directory
/// on disk.
pub fn builtin_manifests() -> Vec<AdapterManifest> {
    vec![
        AdapterManifest {
            name: "claude".to_string(),
            command: "claude".to_string(),
            args: vec!["-p".to_string(), "--output-format".to_string(), "stream-json".to_string(), "--verbose".to_string()],
            input_mode: InputMode::Arg,
            resume: Some(ResumeFlag {
                flag: "--resume".to_string(),
                session_arg: "session_id".to_string(),
            }),
            model: Some(ModelFlag {
                flag: "--model".to_string(),
                default: "claude-sonnet-4-6".to_string(),
            }),
            working_dir_flag: None,
            keep_stdin_open: false,
        },
        AdapterManifest {
            name: "droid".to_string(),
            command: "droid".to_string(),
            args: vec!["exec".to_string(), "--output-format".to_string(), "json".to_string()],
            input_mode: InputMode::Arg,
            resume: Some(ResumeFlag {
                flag: "--session".to_string(),
                session_arg: "session_id".to_string(),
            }),
            model: Some(ModelFlag {
                flag: "--model".to_string(),
                default: "droid-core".to_string(),
            }),
            working_dir_flag: Some("--cwd".to_string()),
            keep_stdin_open: false,
        },
        AdapterManifest {
            name: "codex".to_string(),
            command: "codex".to_string(),
            args: vec!["exec".to_string(), "--json".to_string()],
            input_mode: InputMode::Arg,
            resume: Some(ResumeFlag {
                flag: "--resume".to_string(),
                session_arg: "thread_id".to_string(),
            }),
            model: Some(ModelFlag {
                flag: "--model".to_string(),
                default: "gpt-5.1-codex".to_string(),
            }),
            working_dir_flag: Some("--cd".to_string()),
            keep_stdin_open: false,
        },
        AdapterManifest {
            name: "pi".to_string(),
            command: "pi".to_string(),
            args: vec!["--jsonl".to_string()],
            input_mode: InputMode::Jsonl,
            resume: Some(ResumeFlag {
                flag: "--session".to_string(),
                session_arg: "session_id".to_string(),
            }),
            model: Some(ModelFlag {
                flag: "--model".to_string(),
                default: "pi-default".to_string(),
            }),
            working_dir_flag: Some("--cwd".to_string()),
            keep_stdin_open: true,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_cover_the_four_named_adapters() {
        let names: Vec<_> = builtin_manifests().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["claude", "droid", "codex", "pi"]);
    }

    #[test]
    fn only_pi_keeps_stdin_open() {
        for m in builtin_manifests() {
            assert_eq!(m.keep_stdin_open, m.name == "pi");
        }
    }

    #[test]
    fn missing_dir_returns_builtins_only() {
        let result = load_manifests_from_dir(Path::new("/nonexistent/does-not-exist")).unwrap();
        assert_eq!(result.len(), builtin_manifests().len());
    }

    #[test]
    fn yaml_file_overrides_builtin_by_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("claude.yaml"),
            "name: claude\ncommand: /opt/claude/bin\ninput_mode: arg\n",
        )
        .unwrap();
        let manifests = load_manifests_from_dir(dir.path()).unwrap();
        let claude = manifests.iter().find(|m| m.name == "claude").unwrap();
        assert_eq!(claude.command, "/opt/claude/bin");
        assert_eq!(manifests.len(), builtin_manifests().len());
    }
}
