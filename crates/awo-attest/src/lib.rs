//! Run-directory integrity: checksum generation, strict verification with a
//! seeded re-hash sample, and attestation records bound to the verified
//! manifest and checksum list.

pub mod attestation;
pub mod error;
pub mod sums;
pub mod verify;

pub use attestation::*;
pub use error::*;
pub use sums::*;
pub use verify::*;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::info;

use awo_core::time::format_rfc3339;
use awo_core::{now, sha256_file, RunId};
use awo_record::MANIFEST_FILE;

#[derive(Debug)]
pub struct AttestOutcome {
    pub sums_path: PathBuf,
    pub report: VerifyReport,
    pub attestation: Attestation,
    pub txt_path: PathBuf,
    pub json_path: PathBuf,
}

/// A run id names one directory directly under a root.
fn check_run_id(run_id: &RunId) -> Result<(), IntegrityError> {
    let id = run_id.as_str();
    let nested = id.contains(&['/', '\\'][..]) || id.contains("..") || Path::new(id).is_absolute();
    if id.is_empty() || nested {
        return Err(IntegrityError::InvalidRunId(id.to_string()));
    }
    Ok(())
}

fn existing_run_dir(runs_root: &Path, run_id: &RunId) -> Result<PathBuf, IntegrityError> {
    check_run_id(run_id)?;
    let dir = runs_root.join(run_id.as_str());
    if !dir.is_dir() {
        return Err(IntegrityError::RunDirMissing(dir.display().to_string()));
    }
    Ok(dir)
}

/// Regenerates `SHA256SUMS.txt`, verifies it and, only on success, writes
/// the attestation pair under `attestations_root/<run_id>/`.
pub fn attest(
    runs_root: &Path,
    attestations_root: &Path,
    run_id: &RunId,
    ctx: &AttestContext,
) -> Result<AttestOutcome, IntegrityError> {
    let run_dir = existing_run_dir(runs_root, run_id)?;
    let manifest = run_dir.join(MANIFEST_FILE);
    if !manifest.is_file() {
        return Err(IntegrityError::ManifestMissing(manifest.display().to_string()));
    }

    let (sums_path, _) = write_sums(&run_dir)?;
    let sums_text = std::fs::read_to_string(&sums_path)
        .with_context(|| format!("read {}", sums_path.display()))?;
    let report = verify(&run_dir, run_id.as_str(), &sums_text)?;

    let bindings = BTreeMap::from([
        (MANIFEST_FILE.to_string(), format!("sha256:{}", sha256_file(&manifest)?)),
        (SUMS_FILE.to_string(), format!("sha256:{}", sha256_file(&sums_path)?)),
    ]);
    let attestation = Attestation {
        run_id: run_id.as_str().to_string(),
        repository: ctx.repository.clone(),
        commit: ctx.commit.clone(),
        workflow_run_url: ctx.workflow_run_url.clone(),
        actor: ctx.actor.clone(),
        timestamp_utc: format_rfc3339(&now()),
        bindings,
    };
    let (txt_path, json_path) = write_attestation(attestations_root, &attestation)?;
    info!(run_id = %run_id, files = report.files, sampled = report.sampled.len(), "attested");
    Ok(AttestOutcome { sums_path, report, attestation, txt_path, json_path })
}

/// Verifies the existing `SHA256SUMS.txt` without rewriting it.
pub fn verify_run(runs_root: &Path, run_id: &RunId) -> Result<VerifyReport, IntegrityError> {
    let run_dir = existing_run_dir(runs_root, run_id)?;
    let sums_path = run_dir.join(SUMS_FILE);
    if !sums_path.is_file() {
        return Err(IntegrityError::SumsMissing(sums_path.display().to_string()));
    }
    let text = std::fs::read_to_string(&sums_path)
        .with_context(|| format!("read {}", sums_path.display()))?;
    verify(&run_dir, run_id.as_str(), &text)
}
