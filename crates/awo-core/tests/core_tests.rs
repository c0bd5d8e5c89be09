use awo_core::{Candidate, OperationKind, Role, RunId, RunStatus, StepId};

#[test]
fn test_run_id_display_matches_as_str() {
    let id = RunId::from_str("run_2026-01-01T00-00-00Z");
    assert_eq!(id.to_string(), id.as_str());
}

#[test]
fn test_positional_step_id() {
    assert_eq!(StepId::positional(3).as_str(), "step_3");
}

#[test]
fn test_run_status_terminality() {
    assert!(!RunStatus::Running.is_terminal());
    assert!(RunStatus::PendingReview.is_terminal());
    assert!(RunStatus::Succeeded.is_terminal());
    assert!(RunStatus::Error.is_terminal());
}

#[test]
fn test_role_serializes_pascal_case() {
    assert_eq!(serde_json::to_string(&Role::Proposer).unwrap(), "\"Proposer\"");
    assert_eq!(serde_json::to_string(&Role::Auditor).unwrap(), "\"Auditor\"");
}

#[test]
fn test_candidate_meta_defaults_to_null() {
    let c: Candidate = serde_json::from_str(r#"{"model":"echo","text":"hi"}"#).unwrap();
    assert_eq!(c, Candidate::new("echo", "hi"));
}

#[test]
fn test_unknown_operation_is_rejected() {
    assert!(OperationKind::parse("delete_everything").is_none());
}
