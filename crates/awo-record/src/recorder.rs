use std::sync::Arc;

use anyhow::Context;
use serde_json::Value;
use tracing::{debug, info, warn};

use awo_core::{RunId, RunStatus, StepId, Timestamp};

use crate::error::RecordError;
use crate::fsio::{read_json, write_json_atomic};
use crate::index::RunIndex;
use crate::layout::{INDEX_FILE, MANIFEST_FILE, PROVENANCE_FILE};
use crate::manifest::{OpEntry, RunManifest};
use crate::provenance::ProvenanceRecord;
use crate::schema::{SchemaKind, SchemaValidator};
use crate::store::RunDir;

/// Owns `run_manifest.json`, `provenance.json` and `index.json` for one run.
///
/// Every mutation is applied to a candidate copy first. The candidate is
/// validated, written atomically, read back and validated again; only then
/// does it replace the in-memory state. A rejected mutation leaves both the
/// disk and memory untouched.
pub struct RunRecorder {
    run: RunDir,
    validator: Arc<dyn SchemaValidator>,
    manifest: RunManifest,
    provenance: Vec<ProvenanceRecord>,
}

impl RunRecorder {
    pub fn init(
        run: RunDir,
        validator: Arc<dyn SchemaValidator>,
        workflow_ref: &str,
        started_at: Timestamp,
    ) -> Result<Self, RecordError> {
        let manifest = RunManifest::new(run.id.clone(), workflow_ref, started_at);
        let mut rec = Self { run, validator, manifest: manifest.clone(), provenance: vec![] };
        rec.commit(manifest)?;
        write_json_atomic(&rec.run.join(PROVENANCE_FILE), &rec.provenance)?;
        info!(run_id = %rec.run.id, workflow = workflow_ref, "run initialized");
        Ok(rec)
    }

    /// Reloads a recorder from what is already on disk.
    pub fn resume(run: RunDir, validator: Arc<dyn SchemaValidator>) -> Result<Self, RecordError> {
        let manifest: RunManifest = read_json(&run.join(MANIFEST_FILE))?;
        let prov_path = run.join(PROVENANCE_FILE);
        let provenance: Vec<ProvenanceRecord> = if prov_path.exists() { read_json(&prov_path)? } else { vec![] };
        Ok(Self { run, validator, manifest, provenance })
    }

    pub fn run_dir(&self) -> &RunDir {
        &self.run
    }

    pub fn run_id(&self) -> &RunId {
        &self.run.id
    }

    pub fn manifest(&self) -> &RunManifest {
        &self.manifest
    }

    pub fn provenance(&self) -> &[ProvenanceRecord] {
        &self.provenance
    }

    pub fn status(&self) -> RunStatus {
        self.manifest.status
    }

    pub fn append_op(&mut self, index: usize, id: &StepId, op: &str) -> Result<(), RecordError> {
        let mut next = self.manifest.clone();
        next.ops.push(OpEntry { index, id: id.as_str().to_string(), op: op.to_string() });
        self.commit(next)?;
        debug!(run_id = %self.run.id, index, step = %id, op, "op appended");
        Ok(())
    }

    pub fn add_note(&mut self, note: impl Into<String>) -> Result<(), RecordError> {
        let mut next = self.manifest.clone();
        next.notes.push(note.into());
        self.commit(next)
    }

    /// Points the manifest at the environment snapshot.
    pub fn attach_environment(&mut self, env_ref: &str) -> Result<(), RecordError> {
        let mut next = self.manifest.clone();
        next.env_ref = Some(env_ref.to_string());
        next.notes.push(format!("env:{env_ref}"));
        self.commit(next)
    }

    /// Moves the run to a terminal status. `finished_at` never precedes
    /// `started_at`.
    pub fn finalize(&mut self, status: RunStatus, finished_at: Timestamp) -> Result<(), RecordError> {
        let to = self.manifest.status.transition(status)?;
        let mut next = self.manifest.clone();
        next.status = to;
        next.finished_at = Some(finished_at.max(next.started_at));
        self.commit(next)?;
        info!(run_id = %self.run.id, status = %to, "run finalized");
        Ok(())
    }

    /// Validates `record` and rewrites the whole ledger atomically.
    pub fn append_provenance(&mut self, record: ProvenanceRecord) -> Result<(), RecordError> {
        let doc = serde_json::to_value(&record).context("serialize provenance record")?;
        self.validator.validate(SchemaKind::Provenance, &doc)?;
        let mut next = self.provenance.clone();
        next.push(record);
        write_json_atomic(&self.run.join(PROVENANCE_FILE), &next)?;
        self.provenance = next;
        Ok(())
    }

    fn commit(&mut self, candidate: RunManifest) -> Result<(), RecordError> {
        let doc = serde_json::to_value(&candidate).context("serialize run manifest")?;
        if let Err(violation) = self.validator.validate(SchemaKind::RunManifest, &doc) {
            warn!(run_id = %self.run.id, error = %violation, "manifest mutation rejected");
            return Err(violation.into());
        }
        let path = self.run.join(MANIFEST_FILE);
        write_json_atomic(&path, &doc)?;
        let persisted: Value = read_json(&path)?;
        self.validator.validate(SchemaKind::RunManifest, &persisted)?;
        write_json_atomic(&self.run.join(INDEX_FILE), &RunIndex::from(&candidate))?;
        self.manifest = candidate;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchemaViolation;
    use crate::provenance::Actor;
    use crate::schema::JsonSchemaValidator;
    use crate::store::{FsRunStore, RunStore};
    use awo_core::{now, Role};

    fn recorder(dir: &std::path::Path) -> RunRecorder {
        let store = FsRunStore::new(dir.to_path_buf());
        let run = store.create_run_dir(&now()).unwrap();
        let validator = Arc::new(JsonSchemaValidator::builtin().unwrap());
        RunRecorder::init(run, validator, "wf.json", now()).unwrap()
    }

    #[test]
    fn index_mirrors_every_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let mut rec = recorder(dir.path());
        rec.append_op(1, &StepId::from_str("gen"), "fanout_generate").unwrap();
        let index: RunIndex = read_json(&rec.run_dir().join(INDEX_FILE)).unwrap();
        assert_eq!(index.status, RunStatus::Running);
        assert!(index.has_op("fanout_generate"));
        assert!(index.finished_at.is_none());

        rec.finalize(RunStatus::Succeeded, now()).unwrap();
        let index: RunIndex = read_json(&rec.run_dir().join(INDEX_FILE)).unwrap();
        assert_eq!(index.status, RunStatus::Succeeded);
        assert!(index.finished_at.unwrap() >= index.started_at);
    }

    #[test]
    fn non_positive_index_is_rejected_and_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let mut rec = recorder(dir.path());
        let err = rec.append_op(0, &StepId::from_str("zeroth"), "write_text").unwrap_err();
        assert_eq!(err.code(), "schema_violation");
        assert!(rec.manifest().ops.is_empty());
        let on_disk: RunManifest = read_json(&rec.run_dir().join(MANIFEST_FILE)).unwrap();
        assert!(on_disk.ops.is_empty());
    }

    #[test]
    fn terminal_status_is_final() {
        let dir = tempfile::tempdir().unwrap();
        let mut rec = recorder(dir.path());
        rec.finalize(RunStatus::PendingReview, now()).unwrap();
        let err = rec.finalize(RunStatus::Succeeded, now()).unwrap_err();
        assert_eq!(err.code(), "illegal_transition");
        assert_eq!(rec.status(), RunStatus::PendingReview);
    }

    #[test]
    fn provenance_is_rewritten_as_a_complete_list() {
        let dir = tempfile::tempdir().unwrap();
        let mut rec = recorder(dir.path());
        let run_id = rec.run_id().clone();
        rec.append_provenance(ProvenanceRecord::new(run_id.clone(), Role::Consensus, Actor::local("majority-vote")))
            .unwrap();
        rec.append_provenance(ProvenanceRecord::new(run_id.clone(), Role::Auditor, Actor::local("human-gate")))
            .unwrap();
        let bad = ProvenanceRecord::new(run_id, Role::Editor, Actor::local("write-text")).artifact("a.txt", "nope");
        assert!(matches!(rec.append_provenance(bad), Err(RecordError::Schema(SchemaViolation { .. }))));

        let on_disk: Vec<ProvenanceRecord> = read_json(&rec.run_dir().join(PROVENANCE_FILE)).unwrap();
        assert_eq!(on_disk.len(), 2);
        assert_eq!(on_disk[1].actor.name, "human-gate");
    }

    #[test]
    fn resume_reads_back_persisted_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut rec = recorder(dir.path());
        rec.attach_environment("environment.json").unwrap();
        let run = rec.run_dir().clone();
        let validator = Arc::new(JsonSchemaValidator::builtin().unwrap());
        let resumed = RunRecorder::resume(run, validator).unwrap();
        assert_eq!(resumed.manifest().env_ref.as_deref(), Some("environment.json"));
        assert_eq!(resumed.manifest().notes, vec!["env:environment.json".to_string()]);
    }
}
