use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use anyhow::Context;
use rand::rngs::StdRng;
use rand::SeedableRng;
use sha2::{Digest, Sha256};
use tracing::debug;

use awo_core::{sha256_file, OperationKind};
use awo_record::fsio::read_json;
use awo_record::{RunIndex, RunManifest, INDEX_FILE, MANIFEST_FILE, SCOPE_DIR};

use crate::error::IntegrityError;
use crate::sums::{list_files, parse, SumsEntry};

const MIN_SAMPLE: usize = 3;
const MAX_SAMPLE: usize = 20;

/// What a successful verification looked at.
#[derive(Clone, Debug, PartialEq)]
pub struct VerifyReport {
    pub files: usize,
    pub sampled: Vec<String>,
}

fn isqrt(n: usize) -> usize {
    let mut r = (n as f64).sqrt() as usize;
    while r * r > n {
        r -= 1;
    }
    while (r + 1) * (r + 1) <= n {
        r += 1;
    }
    r
}

/// `min(n, clamp(isqrt(n), 3, 20))`.
pub fn sample_size(n: usize) -> usize {
    n.min(isqrt(n).clamp(MIN_SAMPLE, MAX_SAMPLE))
}

/// Low 63 bits of `sha256(run_id)` read as a big-endian integer.
pub fn run_seed(run_id: &str) -> u64 {
    let digest = Sha256::digest(run_id.as_bytes());
    let mut low = [0u8; 8];
    low.copy_from_slice(&digest[24..]);
    u64::from_be_bytes(low) & (u64::MAX >> 1)
}

/// Sorted positions to re-hash. Same run id and count, same picks.
pub fn sample_indices(run_id: &str, n: usize) -> Vec<usize> {
    let k = sample_size(n);
    if k == 0 {
        return vec![];
    }
    let mut rng = StdRng::seed_from_u64(run_seed(run_id));
    let mut picks = rand::seq::index::sample(&mut rng, n, k).into_vec();
    picks.sort_unstable();
    picks
}

/// Whether the run recorded a `scope_validate` step. The index mirror is
/// consulted first, then the manifest when the index lists no steps.
pub fn scope_required(run_dir: &Path) -> Result<bool, IntegrityError> {
    let wanted = OperationKind::ScopeValidate.as_str();
    let index_path = run_dir.join(INDEX_FILE);
    if index_path.is_file() {
        let index: RunIndex = read_json(&index_path)?;
        if !index.steps.is_empty() {
            return Ok(index.has_op(wanted));
        }
    }
    let manifest_path = run_dir.join(MANIFEST_FILE);
    if manifest_path.is_file() {
        let manifest: RunManifest = read_json(&manifest_path)?;
        return Ok(manifest.has_op(wanted));
    }
    Ok(false)
}

/// The sorted file list, once it is known to match the sums exactly.
fn check_coverage(run_dir: &Path, entries: &[SumsEntry]) -> Result<Vec<String>, IntegrityError> {
    let actual: BTreeSet<String> = list_files(run_dir)?.into_iter().collect();
    let listed: BTreeSet<String> = entries.iter().map(|e| e.path.clone()).collect();

    let missing: Vec<String> = actual.difference(&listed).cloned().collect();
    if !missing.is_empty() {
        return Err(IntegrityError::MissingInSums(missing));
    }
    let extra: Vec<String> = listed.difference(&actual).cloned().collect();
    if !extra.is_empty() {
        return Err(IntegrityError::ExtraInSums(extra));
    }
    Ok(actual.into_iter().collect())
}

/// Checks `sums_text` against the files of `run_dir`: strict parse, exact
/// coverage, the scope requirement, then a seeded re-hash sample over the
/// sorted file list.
pub fn verify(run_dir: &Path, run_id: &str, sums_text: &str) -> Result<VerifyReport, IntegrityError> {
    let entries = parse(sums_text)?;
    let files = check_coverage(run_dir, &entries)?;

    if scope_required(run_dir)? && !run_dir.join(SCOPE_DIR).is_dir() {
        return Err(IntegrityError::ScopeMissingButRequired);
    }

    let recorded: HashMap<&str, &SumsEntry> = entries.iter().map(|e| (e.path.as_str(), e)).collect();
    let mut sampled = Vec::new();
    for i in sample_indices(run_id, files.len()) {
        let rel = &files[i];
        let entry = recorded
            .get(rel.as_str())
            .ok_or_else(|| IntegrityError::MissingInSums(vec![rel.clone()]))?;
        let actual = sha256_file(&entry.file_in(run_dir)).with_context(|| format!("rehash {rel}"))?;
        if actual != entry.digest {
            return Err(IntegrityError::RehashMismatch(rel.clone()));
        }
        sampled.push(rel.clone());
    }
    debug!(run_id, files = files.len(), sampled = sampled.len(), "verified");
    Ok(VerifyReport { files: files.len(), sampled })
}
