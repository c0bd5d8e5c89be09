use std::sync::Arc;

use awo_core::{now, Role, RunStatus, StepId};
use awo_record::{
    revalidate_run_dir, Actor, FsRunStore, JsonSchemaValidator, ProvenanceRecord, RunRecorder, RunStore,
    MANIFEST_FILE, PROVENANCE_FILE,
};
use tempfile::tempdir;

fn validator() -> Arc<JsonSchemaValidator> {
    Arc::new(JsonSchemaValidator::builtin().unwrap())
}

#[test]
fn recorded_run_revalidates_cleanly() {
    let dir = tempdir().unwrap();
    let store = FsRunStore::new(dir.path().join("runs"));
    let run = store.create_run_dir(&now()).unwrap();
    let mut rec = RunRecorder::init(run, validator(), "workflows/demo.json", now()).unwrap();
    rec.append_op(1, &StepId::from_str("gen"), "fanout_generate").unwrap();
    let actor = Actor { version: Some("fallback".into()), ..Actor::local("echo") };
    rec.append_provenance(
        ProvenanceRecord::new(rec.run_id().clone(), Role::Proposer, actor)
            .prompt_ref(awo_core::short_ref("hello"))
            .seed(0),
    )
    .unwrap();
    rec.finalize(RunStatus::Succeeded, now()).unwrap();

    let v = JsonSchemaValidator::builtin().unwrap();
    let problems = revalidate_run_dir(&rec.run_dir().path, &v).unwrap();
    assert!(problems.is_empty(), "{problems:?}");
}

#[test]
fn tampered_manifest_is_reported() {
    let dir = tempdir().unwrap();
    let store = FsRunStore::new(dir.path().to_path_buf());
    let run = store.create_run_dir(&now()).unwrap();
    let rec = RunRecorder::init(run, validator(), "wf.json", now()).unwrap();
    let path = rec.run_dir().join(MANIFEST_FILE);
    let mut doc: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    doc["status"] = serde_json::json!("done");
    std::fs::write(&path, serde_json::to_vec(&doc).unwrap()).unwrap();
    std::fs::write(rec.run_dir().join(PROVENANCE_FILE), br#"[{"role": "Nobody"}]"#).unwrap();

    let v = JsonSchemaValidator::builtin().unwrap();
    let problems = revalidate_run_dir(&rec.run_dir().path, &v).unwrap();
    assert_eq!(problems.len(), 2);
    assert!(problems[0].starts_with("run_manifest.json"));
    assert!(problems[1].starts_with("provenance.json[0]"));
}

#[test]
fn missing_run_dir_is_an_error() {
    let dir = tempdir().unwrap();
    let v = JsonSchemaValidator::builtin().unwrap();
    assert!(revalidate_run_dir(&dir.path().join("run_missing"), &v).is_err());
}
