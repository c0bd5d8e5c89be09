use std::path::Path;

use serde::{Deserialize, Serialize};

use awo_core::time::rfc3339;
use awo_core::{now, Timestamp};

use crate::util::{env_nonempty, git_output};

/// Platform and tooling snapshot stored as `environment.json`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EnvironmentSnapshot {
    pub os: String,
    pub arch: String,
    pub family: String,
    pub tool: String,
    pub tool_version: String,
    pub git_commit: Option<String>,
    pub git_branch: Option<String>,
    pub github_run_id: Option<String>,
    pub github_sha: Option<String>,
    #[serde(with = "rfc3339")]
    pub captured_at: Timestamp,
}

impl EnvironmentSnapshot {
    pub fn capture(repo_root: &Path) -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            family: std::env::consts::FAMILY.to_string(),
            tool: env!("CARGO_PKG_NAME").to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            git_commit: git_output(repo_root, &["rev-parse", "HEAD"]),
            git_branch: git_output(repo_root, &["rev-parse", "--abbrev-ref", "HEAD"]),
            github_run_id: env_nonempty("GITHUB_RUN_ID"),
            github_sha: env_nonempty("GITHUB_SHA"),
            captured_at: now(),
        }
    }
}
