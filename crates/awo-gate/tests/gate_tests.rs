use std::sync::Arc;

use awo_core::{now, Role, RunStatus};
use awo_gate::{enter_gate, load_decision, GateStatus, GATE_ACTOR};
use awo_record::{FsRunStore, JsonSchemaValidator, RunRecorder, RunStore};
use tempfile::tempdir;

#[test]
fn entering_the_gate_parks_the_run() {
    let dir = tempdir().unwrap();
    let store = FsRunStore::new(dir.path().to_path_buf());
    let run = store.create_run_dir(&now()).unwrap();
    let validator = Arc::new(JsonSchemaValidator::builtin().unwrap());
    let mut rec = RunRecorder::init(run, validator, "wf.json", now()).unwrap();

    let entry = enter_gate(&mut rec, "templates/audit-checklist.md", now()).unwrap();
    assert!(entry.path.exists());
    assert_eq!(rec.status(), RunStatus::PendingReview);
    assert!(rec.manifest().finished_at.is_some());

    let last = rec.provenance().last().unwrap();
    assert_eq!(last.role, Role::Auditor);
    assert_eq!(last.actor.name, GATE_ACTOR);
    assert_eq!(last.notes.as_deref(), Some("checklist=templates/audit-checklist.md"));

    let decision = load_decision(&rec.run_dir().path).unwrap();
    assert_eq!(decision.status, GateStatus::Pending);
    assert_eq!(decision.checklist, "templates/audit-checklist.md");
}

#[test]
fn gate_cannot_be_entered_twice() {
    let dir = tempdir().unwrap();
    let store = FsRunStore::new(dir.path().to_path_buf());
    let run = store.create_run_dir(&now()).unwrap();
    let validator = Arc::new(JsonSchemaValidator::builtin().unwrap());
    let mut rec = RunRecorder::init(run, validator, "wf.json", now()).unwrap();
    enter_gate(&mut rec, "c.md", now()).unwrap();
    let err = enter_gate(&mut rec, "c.md", now()).unwrap_err();
    assert_eq!(err.code(), "illegal_transition");
}
