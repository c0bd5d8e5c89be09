use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use awo_record::{JsonSchemaValidator, SchemaValidator};

pub const CONFIG_FILE: &str = "awo.toml";

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub backends: BackendsConfig,
    pub gate: GateConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathsConfig {
    pub runs_root: String,
    pub attestations_root: String,
    /// Loads schemas from disk instead of the embedded copies.
    pub schemas_dir: Option<String>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            runs_root: "runs".to_string(),
            attestations_root: "governance/attestations".to_string(),
            schemas_dir: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendsConfig {
    /// Used by `fanout_generate` when a step names no models.
    pub default_models: Vec<String>,
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self { default_models: vec!["echo".to_string(), "upper".to_string(), "reverse".to_string()] }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GateConfig {
    pub default_checklist: String,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self { default_checklist: "templates/audit-checklist.md".to_string() }
    }
}

impl Config {
    pub fn load_from(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let cfg: Config = toml::from_str(&s).with_context(|| format!("parse {}", path.display()))?;
        Ok(cfg)
    }

    /// `awo.toml` under the repo root when present, defaults otherwise.
    pub fn load_or_default(repo_root: &Path) -> Result<Self> {
        let path = Self::config_path(repo_root);
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn config_path(repo_root: &Path) -> PathBuf {
        repo_root.join(CONFIG_FILE)
    }

    pub fn runs_root(&self, repo_root: &Path) -> PathBuf {
        resolve_path(repo_root, &self.paths.runs_root)
    }

    pub fn attestations_root(&self, repo_root: &Path) -> PathBuf {
        resolve_path(repo_root, &self.paths.attestations_root)
    }

    pub fn schema_validator(&self, repo_root: &Path) -> Result<Arc<dyn SchemaValidator>> {
        let validator = match &self.paths.schemas_dir {
            Some(dir) => JsonSchemaValidator::from_dir(&resolve_path(repo_root, dir))?,
            None => JsonSchemaValidator::builtin()?,
        };
        Ok(Arc::new(validator))
    }
}

/// Expands `~` and anchors relative paths at the repo root.
pub fn resolve_path(repo_root: &Path, raw: &str) -> PathBuf {
    let expanded = PathBuf::from(shellexpand::tilde(raw).to_string());
    if expanded.is_absolute() {
        expanded
    } else {
        repo_root.join(expanded)
    }
}

/// `--repo-root`, else `GITHUB_WORKSPACE`, else the current directory.
pub fn resolve_repo_root(flag: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(root) = flag {
        return Ok(root);
    }
    match std::env::var("GITHUB_WORKSPACE") {
        Ok(ws) if !ws.trim().is_empty() => Ok(PathBuf::from(ws)),
        _ => std::env::current_dir().context("resolve current directory"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "[paths]\nruns_root = \"out/runs\"\n").unwrap();
        let cfg = Config::load_or_default(dir.path()).unwrap();
        assert_eq!(cfg.runs_root(dir.path()), dir.path().join("out/runs"));
        assert_eq!(cfg.attestations_root(dir.path()), dir.path().join("governance/attestations"));
        assert_eq!(cfg.backends.default_models, vec!["echo", "upper", "reverse"]);
        assert_eq!(cfg.gate.default_checklist, "templates/audit-checklist.md");
    }

    #[test]
    fn schemas_dir_is_optional() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(Config::config_path(dir.path()), "[paths]\nschemas_dir = \"schemas\"\n").unwrap();
        let cfg = Config::load_or_default(dir.path()).unwrap();
        assert_eq!(cfg.paths.schemas_dir.as_deref(), Some("schemas"));
        assert!(Config::default().paths.schemas_dir.is_none());
    }

    #[test]
    fn absolute_paths_are_kept() {
        let root = Path::new("/repo");
        assert_eq!(resolve_path(root, "/abs/runs"), PathBuf::from("/abs/runs"));
        assert_eq!(resolve_path(root, "runs"), PathBuf::from("/repo/runs"));
    }
}
