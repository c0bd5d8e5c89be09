use thiserror::Error;

use awo_core::IllegalTransition;

use crate::schema::SchemaKind;

#[derive(Debug, Error)]
#[error("{} failed schema validation: {}", kind.label(), messages.join("; "))]
pub struct SchemaViolation {
    pub kind: SchemaKind,
    pub messages: Vec<String>,
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error(transparent)]
    Schema(#[from] SchemaViolation),
    #[error(transparent)]
    Transition(#[from] IllegalTransition),
    #[error(transparent)]
    Io(#[from] anyhow::Error),
}

impl RecordError {
    pub fn code(&self) -> &'static str {
        match self {
            RecordError::Schema(_) => "schema_violation",
            RecordError::Transition(_) => "illegal_transition",
            RecordError::Io(_) => "io_error",
        }
    }
}
