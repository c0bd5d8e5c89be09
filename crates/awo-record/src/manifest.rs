use serde::{Deserialize, Serialize};

use awo_core::time::rfc3339;
use awo_core::{RunId, RunStatus, Timestamp};

/// One processed step, in execution order.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct OpEntry {
    pub index: usize,
    pub id: String,
    pub op: String,
}

/// Which steps a run performed. `finished_at` is present iff the status is
/// terminal.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RunManifest {
    pub run_id: RunId,
    pub workflow: String,
    #[serde(with = "rfc3339")]
    pub started_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "rfc3339::option")]
    pub finished_at: Option<Timestamp>,
    pub status: RunStatus,
    pub ops: Vec<OpEntry>,
    pub notes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_ref: Option<String>,
}

impl RunManifest {
    pub fn new(run_id: RunId, workflow: impl Into<String>, started_at: Timestamp) -> Self {
        Self {
            run_id,
            workflow: workflow.into(),
            started_at,
            finished_at: None,
            status: RunStatus::Running,
            ops: vec![],
            notes: vec![],
            env_ref: None,
        }
    }

    pub fn has_op(&self, op: &str) -> bool {
        self.ops.iter().any(|o| o.op == op)
    }
}
