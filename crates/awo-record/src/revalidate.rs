use std::path::Path;

use anyhow::{bail, Result};
use serde_json::Value;

use crate::fsio::read_json;
use crate::layout::{MANIFEST_FILE, PROVENANCE_FILE};
use crate::schema::{SchemaKind, SchemaValidator};

/// Re-checks a persisted run directory against the schemas. Returns one line
/// per problem; an empty list means the directory is valid.
pub fn revalidate_run_dir(run_dir: &Path, validator: &dyn SchemaValidator) -> Result<Vec<String>> {
    if !run_dir.is_dir() {
        bail!("run dir not found: {}", run_dir.display());
    }
    let mut problems = Vec::new();

    let manifest_path = run_dir.join(MANIFEST_FILE);
    if manifest_path.exists() {
        let manifest: Value = read_json(&manifest_path)?;
        if let Err(v) = validator.validate(SchemaKind::RunManifest, &manifest) {
            problems.push(format!("{MANIFEST_FILE}: {v}"));
        }
    } else {
        problems.push(format!("{MANIFEST_FILE}: missing"));
    }

    let prov_path = run_dir.join(PROVENANCE_FILE);
    if prov_path.exists() {
        match read_json::<Value>(&prov_path)? {
            Value::Array(records) => {
                for (i, record) in records.iter().enumerate() {
                    if let Err(v) = validator.validate(SchemaKind::Provenance, record) {
                        problems.push(format!("{PROVENANCE_FILE}[{i}]: {v}"));
                    }
                }
            }
            _ => problems.push(format!("{PROVENANCE_FILE}: expected a list of records")),
        }
    } else {
        problems.push(format!("{PROVENANCE_FILE}: missing"));
    }

    Ok(problems)
}
