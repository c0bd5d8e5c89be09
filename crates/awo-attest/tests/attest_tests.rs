use std::fs;
use std::path::Path;

use awo_attest::{attest, sample_indices, verify, verify_run, write_sums, AttestContext, Attestation, SUMS_FILE};
use awo_core::RunId;
use serde_json::json;

const RUN: &str = "2024-05-01T10-00-00Z";

fn seed_run(root: &Path, ops: &[&str]) -> std::path::PathBuf {
    let dir = root.join(RUN);
    fs::create_dir_all(dir.join("steps")).unwrap();
    fs::create_dir_all(dir.join("artifacts")).unwrap();
    let steps: Vec<_> = ops.iter().enumerate().map(|(i, op)| json!({"index": i + 1, "id": format!("s{}", i + 1), "op": op})).collect();
    let started = "2024-05-01T10:00:00Z";
    let manifest = json!({
        "run_id": RUN, "workflow": "wf.json", "started_at": started, "finished_at": started,
        "status": "succeeded", "ops": steps, "notes": []
    });
    let index = json!({"run_id": RUN, "started_at": started, "finished_at": started, "status": "succeeded", "steps": steps});
    fs::write(dir.join("run_manifest.json"), manifest.to_string()).unwrap();
    fs::write(dir.join("index.json"), index.to_string()).unwrap();
    for i in 0..12 {
        fs::write(dir.join("artifacts").join(format!("f{i:02}.txt")), format!("content {i}")).unwrap();
    }
    dir
}

fn sums_of(dir: &Path) -> String {
    fs::read_to_string(dir.join(SUMS_FILE)).unwrap()
}

#[test]
fn generation_is_idempotent() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = seed_run(tmp.path(), &["write_text"]);
    write_sums(&dir).unwrap();
    let first = sums_of(&dir);
    write_sums(&dir).unwrap();
    assert_eq!(first, sums_of(&dir));
    assert!(!first.contains(SUMS_FILE));
    assert!(first.lines().all(|l| l.contains("  ./")));
    let paths: Vec<&str> = first.lines().map(|l| &l[66..]).collect();
    let mut sorted = paths.clone();
    sorted.sort();
    assert_eq!(paths, sorted);
}

#[test]
fn attest_writes_both_records_bound_to_verified_files() {
    let tmp = tempfile::tempdir().unwrap();
    let runs = tmp.path().join("runs");
    let atts = tmp.path().join("attestations");
    let dir = seed_run(&runs, &["write_text"]);
    let ctx = AttestContext { repository: "acme/widgets".into(), ..Default::default() };

    let out = attest(&runs, &atts, &RunId::from_str(RUN), &ctx).unwrap();
    assert_eq!(out.report.files, 14);
    assert_eq!(out.report.sampled.len(), 3);
    assert!(out.txt_path.ends_with(format!("{RUN}/ATTESTATION.txt")));

    let json: Attestation = serde_json::from_slice(&fs::read(&out.json_path).unwrap()).unwrap();
    assert_eq!(json.run_id, RUN);
    assert_eq!(json.repository, "acme/widgets");
    let sums_digest = awo_core::sha256_file(&dir.join(SUMS_FILE)).unwrap();
    assert_eq!(json.bindings[SUMS_FILE], format!("sha256:{sums_digest}"));
    assert!(json.bindings["run_manifest.json"].starts_with("sha256:"));

    assert_eq!(verify_run(&runs, &RunId::from_str(RUN)).unwrap(), out.report);
}

#[test]
fn unlisted_file_is_missing_in_sums() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = seed_run(tmp.path(), &[]);
    write_sums(&dir).unwrap();
    fs::write(dir.join("steps").join("late.json"), "{}").unwrap();
    let err = verify(&dir, RUN, &sums_of(&dir)).unwrap_err();
    assert_eq!(err.to_string(), "missing_in_sums:./steps/late.json");
}

#[test]
fn listed_but_absent_file_is_extra_in_sums() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = seed_run(tmp.path(), &[]);
    write_sums(&dir).unwrap();
    let mut text = sums_of(&dir);
    text.push_str(&format!("{}  ./ghost.txt\n", "0".repeat(64)));
    let err = verify(&dir, RUN, &text).unwrap_err();
    assert_eq!(err.to_string(), "extra_in_sums:./ghost.txt");
}

#[test]
fn corrupting_a_sampled_file_is_a_rehash_mismatch() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = seed_run(tmp.path(), &[]);
    write_sums(&dir).unwrap();
    let text = sums_of(&dir);
    let paths: Vec<String> = text.lines().map(|l| l[66..].to_string()).collect();
    let victim = &paths[sample_indices(RUN, paths.len())[0]];
    fs::write(dir.join(victim.trim_start_matches("./")), "tampered").unwrap();
    let err = verify(&dir, RUN, &text).unwrap_err();
    assert_eq!(err.to_string(), format!("rehash_mismatch:{victim}"));
}

#[test]
fn scope_dir_required_when_scope_step_ran() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = seed_run(tmp.path(), &["scope_validate"]);
    write_sums(&dir).unwrap();
    let err = verify(&dir, RUN, &sums_of(&dir)).unwrap_err();
    assert_eq!(err.code(), "scope_missing_but_required");

    fs::create_dir_all(dir.join("scope")).unwrap();
    fs::write(dir.join("scope").join("summary.json"), "{}").unwrap();
    write_sums(&dir).unwrap();
    verify(&dir, RUN, &sums_of(&dir)).unwrap();
}

#[test]
fn malformed_sums_fail_before_coverage() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = seed_run(tmp.path(), &[]);
    let err = verify(&dir, RUN, "not a sums line\n").unwrap_err();
    assert_eq!(err.to_string(), "bad_line_format:1:not a sums line");
}

#[test]
fn empty_run_dir_verifies_with_no_sample() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("empty");
    fs::create_dir_all(&dir).unwrap();
    write_sums(&dir).unwrap();
    assert_eq!(sums_of(&dir), "");
    let report = verify(&dir, "empty", "").unwrap();
    assert_eq!(report.files, 0);
    assert!(report.sampled.is_empty());
}

#[test]
fn missing_run_dir_and_manifest() {
    let tmp = tempfile::tempdir().unwrap();
    let ctx = AttestContext::default();
    let err = attest(tmp.path(), tmp.path(), &RunId::from_str("nope"), &ctx).unwrap_err();
    assert_eq!(err.code(), "run_dir_missing");

    fs::create_dir_all(tmp.path().join("bare")).unwrap();
    let err = attest(tmp.path(), tmp.path(), &RunId::from_str("bare"), &ctx).unwrap_err();
    assert_eq!(err.code(), "manifest_missing");
    assert!(!tmp.path().join("bare").join(SUMS_FILE).exists());

    let err = verify_run(tmp.path(), &RunId::from_str("bare")).unwrap_err();
    assert_eq!(err.code(), "sums_missing");
}

#[test]
fn a_path_listed_twice_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = seed_run(tmp.path(), &[]);
    write_sums(&dir).unwrap();
    let text = format!("{}  ./artifacts/f00.txt\n{}", "0".repeat(64), sums_of(&dir));
    let err = verify(&dir, RUN, &text).unwrap_err();
    assert_eq!(err.code(), "duplicate_in_sums");
    assert!(err.to_string().ends_with(":./artifacts/f00.txt"));
}

#[test]
fn sample_size_follows_the_file_count() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = seed_run(tmp.path(), &[]);
    for i in 12..30 {
        fs::write(dir.join("artifacts").join(format!("f{i:02}.txt")), format!("content {i}")).unwrap();
    }
    write_sums(&dir).unwrap();
    let report = verify(&dir, RUN, &sums_of(&dir)).unwrap();
    assert_eq!(report.files, 32);
    assert_eq!(report.sampled.len(), 5);
    let again = verify(&dir, RUN, &sums_of(&dir)).unwrap();
    assert_eq!(report.sampled, again.sampled);
}

#[test]
fn run_ids_cannot_leave_the_roots() {
    let tmp = tempfile::tempdir().unwrap();
    let runs = tmp.path().join("runs");
    seed_run(&runs, &[]);
    let ctx = AttestContext::default();
    for bad in ["../runs/2024-05-01T10-00-00Z", "a/b", "a\\b", "..", ""] {
        let err = attest(&runs, &tmp.path().join("atts"), &RunId::from_str(bad), &ctx).unwrap_err();
        assert_eq!(err.code(), "invalid_run_id", "{bad}");
        assert_eq!(verify_run(&runs, &RunId::from_str(bad)).unwrap_err().code(), "invalid_run_id");
    }
    let abs = runs.join(RUN).display().to_string();
    assert_eq!(verify_run(&runs, &RunId::from_str(abs)).unwrap_err().code(), "invalid_run_id");
    assert!(!tmp.path().join("atts").exists());
}

#[test]
fn scope_requirement_falls_back_to_the_manifest() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = seed_run(tmp.path(), &["scope_validate"]);
    fs::remove_file(dir.join("index.json")).unwrap();
    write_sums(&dir).unwrap();
    assert_eq!(verify(&dir, RUN, &sums_of(&dir)).unwrap_err().code(), "scope_missing_but_required");
}
