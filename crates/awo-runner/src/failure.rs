use thiserror::Error;

use awo_record::RecordError;

/// A condition that ends a run as `error`. `code()` is the stable reason
/// written into the step record.
#[derive(Debug, Error)]
pub enum StepFailure {
    #[error("workflow file not found: {0}")]
    WorkflowMissing(String),
    #[error("failed to parse workflow JSON: {0}")]
    JsonParse(String),
    #[error("invalid workflow: {0}")]
    InvalidWorkflow(String),
    #[error("unknown op: {0}")]
    UnknownOp(String),
    #[error("{op}: invalid args: {message}")]
    InvalidArgs { op: &'static str, message: String },
    #[error("unknown model backend: {0}")]
    UnknownBackend(String),
    #[error("consensus_vote: no inputs from '{0}'")]
    MissingInputs(String),
    #[error("assert_contains: 'from_step' is required")]
    MissingFromStep,
    #[error("write_text: source step '{0}' not found")]
    MissingSource(String),
    #[error("write_text: unsafe artifact path '{0}'")]
    UnsafeArtifactPath(String),
    #[error("assert_contains failed; missing: {missing:?}")]
    AssertContainsFailed { missing: Vec<String> },
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error(transparent)]
    Io(#[from] anyhow::Error),
}

impl StepFailure {
    pub fn code(&self) -> &'static str {
        match self {
            StepFailure::WorkflowMissing(_) => "workflow_missing",
            StepFailure::JsonParse(_) => "json_parse",
            StepFailure::InvalidWorkflow(_) => "invalid_workflow",
            StepFailure::UnknownOp(_) => "unknown_op",
            StepFailure::InvalidArgs { .. } => "invalid_args",
            StepFailure::UnknownBackend(_) => "unknown_backend",
            StepFailure::MissingInputs(_) => "missing_inputs",
            StepFailure::MissingFromStep => "missing_from_step",
            StepFailure::MissingSource(_) => "missing_source",
            StepFailure::UnsafeArtifactPath(_) => "unsafe_artifact_path",
            StepFailure::AssertContainsFailed { .. } => "assert_contains_failed",
            StepFailure::Record(e) => e.code(),
            StepFailure::Io(_) => "io_error",
        }
    }
}
