//! Human review checkpoint. Entering the gate writes an editable decision
//! placeholder, records who is expected to decide, and parks the run in
//! `pending_review`. Nothing after the gate executes.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use awo_core::time::rfc3339;
use awo_core::{Role, RunStatus, Timestamp};
use awo_record::{Actor, ProvenanceRecord, RecordError, RunRecorder};

pub const GATE_DECISION_FILE: &str = "gate_decision.yml";
pub const GATE_ACTOR: &str = "human-gate";

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    Pending,
    Approved,
    Rejected,
}

impl GateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateStatus::Pending => "pending",
            GateStatus::Approved => "approved",
            GateStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for GateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contents of `gate_decision.yml`. A reviewer edits `status` (and may add
/// `reviewer`/`notes`) after the run has halted.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GateDecision {
    pub status: GateStatus,
    pub checklist: String,
    #[serde(with = "rfc3339")]
    pub created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl GateDecision {
    pub fn pending(checklist: impl Into<String>, created_at: Timestamp) -> Self {
        Self { status: GateStatus::Pending, checklist: checklist.into(), created_at, reviewer: None, notes: None }
    }
}

#[derive(Clone, Debug)]
pub struct GateEntry {
    pub decision: GateDecision,
    pub path: PathBuf,
}

/// Writes the placeholder and the gate provenance, then finalizes the run as
/// `pending_review`.
pub fn enter_gate(rec: &mut RunRecorder, checklist: &str, at: Timestamp) -> Result<GateEntry, RecordError> {
    let decision = GateDecision::pending(checklist, at);
    let yaml = serde_yaml::to_string(&decision).context("serialize gate decision")?;
    let path = rec.run_dir().write_text(GATE_DECISION_FILE, &yaml)?;

    let record = ProvenanceRecord::new(rec.run_id().clone(), Role::Auditor, Actor::local(GATE_ACTOR))
        .span(at, at)
        .notes(format!("checklist={checklist}"));
    rec.append_provenance(record)?;
    rec.finalize(RunStatus::PendingReview, at)?;
    info!(run_id = %rec.run_id(), checklist, "run halted for human review");
    Ok(GateEntry { decision, path })
}

pub fn load_decision(run_dir: &Path) -> Result<GateDecision> {
    let path = run_dir.join(GATE_DECISION_FILE);
    let s = std::fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    serde_yaml::from_str(&s).with_context(|| format!("parse {}", path.display()))
}
