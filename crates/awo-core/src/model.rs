use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Run lifecycle. `Running` is the only non-terminal state.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    PendingReview,
    Succeeded,
    Error,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("illegal run status transition {from} -> {to}")]
pub struct IllegalTransition {
    pub from: RunStatus,
    pub to: RunStatus,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::PendingReview => "pending_review",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }

    pub fn transition(self, to: RunStatus) -> Result<RunStatus, IllegalTransition> {
        match (self, to) {
            (RunStatus::Running, RunStatus::PendingReview | RunStatus::Succeeded | RunStatus::Error) => Ok(to),
            (from, to) => Err(IllegalTransition { from, to }),
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of workflow operations.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    FanoutGenerate,
    ConsensusVote,
    ScopeValidate,
    AssertContains,
    WriteText,
    AuditGate,
}

impl OperationKind {
    pub const ALL: [OperationKind; 6] = [
        OperationKind::FanoutGenerate,
        OperationKind::ConsensusVote,
        OperationKind::ScopeValidate,
        OperationKind::AssertContains,
        OperationKind::WriteText,
        OperationKind::AuditGate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::FanoutGenerate => "fanout_generate",
            OperationKind::ConsensusVote => "consensus_vote",
            OperationKind::ScopeValidate => "scope_validate",
            OperationKind::AssertContains => "assert_contains",
            OperationKind::WriteText => "write_text",
            OperationKind::AuditGate => "audit_gate",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Semantic role a provenance record is filed under.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Role {
    Proposer,
    Consensus,
    Auditor,
    Editor,
}

/// One backend's answer inside a fanout.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    pub model: String,
    pub text: String,
    #[serde(default)]
    pub meta: serde_json::Value,
}

impl Candidate {
    pub fn new(model: impl Into<String>, text: impl Into<String>) -> Self {
        Self { model: model.into(), text: text.into(), meta: serde_json::Value::Null }
    }
}
