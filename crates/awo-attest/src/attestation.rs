use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use awo_record::fsio::{write_atomic, write_json_atomic};

pub const ATTESTATION_TXT: &str = "ATTESTATION.txt";
pub const ATTESTATION_JSON: &str = "ATTESTATION.json";

/// Who and what an attestation is about, usually taken from the CI
/// environment. Unknown values stay empty.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttestContext {
    pub repository: String,
    pub commit: String,
    pub workflow_run_url: String,
    pub actor: String,
}

impl AttestContext {
    /// Reads `GITHUB_REPOSITORY`, `GITHUB_RUN_ID` and `GITHUB_ACTOR`.
    /// `commit` comes from the caller, typically `git rev-parse HEAD`.
    pub fn from_env(commit: Option<String>) -> Self {
        Self::from_lookup(|k| std::env::var(k).ok().filter(|v| !v.is_empty()), commit)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>, commit: Option<String>) -> Self {
        let repository = lookup("GITHUB_REPOSITORY").unwrap_or_default();
        let workflow_run_url = match lookup("GITHUB_RUN_ID") {
            Some(id) if !repository.is_empty() => format!("https://github.com/{repository}/actions/runs/{id}"),
            _ => String::new(),
        };
        Self {
            repository,
            commit: commit.unwrap_or_default(),
            workflow_run_url,
            actor: lookup("GITHUB_ACTOR").unwrap_or_default(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Attestation {
    pub run_id: String,
    pub repository: String,
    pub commit: String,
    pub workflow_run_url: String,
    pub actor: String,
    pub timestamp_utc: String,
    /// File name to `sha256:<hex>`.
    pub bindings: BTreeMap<String, String>,
}

impl Attestation {
    pub fn render_text(&self) -> String {
        let mut out = String::from("AWO Run Attestation\n\n");
        let _ = writeln!(out, "Run-ID: {}", self.run_id);
        let _ = writeln!(out, "Repository: {}", self.repository);
        let _ = writeln!(out, "Commit: {}", self.commit);
        let _ = writeln!(out, "Workflow Run: {}", self.workflow_run_url);
        let _ = writeln!(out, "Actor: {}", self.actor);
        let _ = writeln!(out, "Timestamp (UTC): {}", self.timestamp_utc);
        out.push_str("\nBindings:\n");
        for (name, digest) in &self.bindings {
            let _ = writeln!(out, "  {name}: {digest}");
        }
        out.push_str(
            "\nStatement:\nThe run directory named above was verified against its SHA256SUMS.txt \
             before this attestation was written. The bindings pin the manifest and checksum \
             list that were verified.\n",
        );
        out
    }
}

/// Writes both forms under `<root>/<run_id>/`, replacing earlier ones.
pub fn write_attestation(root: &Path, att: &Attestation) -> Result<(PathBuf, PathBuf)> {
    let dir = root.join(&att.run_id);
    std::fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    let txt = dir.join(ATTESTATION_TXT);
    let json = dir.join(ATTESTATION_JSON);
    write_atomic(&txt, att.render_text().as_bytes())?;
    write_json_atomic(&json, att)?;
    Ok((txt, json))
}
