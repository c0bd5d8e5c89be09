use serde::{Deserialize, Serialize};

use awo_core::time::rfc3339;
use awo_core::{RunId, RunStatus, Timestamp};

use crate::manifest::{OpEntry, RunManifest};

/// Lightweight lifecycle mirror of the manifest for automation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RunIndex {
    pub run_id: RunId,
    #[serde(with = "rfc3339")]
    pub started_at: Timestamp,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "rfc3339::option")]
    pub finished_at: Option<Timestamp>,
    #[serde(default)]
    pub steps: Vec<OpEntry>,
}

impl RunIndex {
    pub fn has_op(&self, op: &str) -> bool {
        self.steps.iter().any(|s| s.op == op)
    }
}

impl From<&RunManifest> for RunIndex {
    fn from(m: &RunManifest) -> Self {
        Self {
            run_id: m.run_id.clone(),
            started_at: m.started_at,
            status: m.status,
            finished_at: m.finished_at,
            steps: m.ops.clone(),
        }
    }
}
