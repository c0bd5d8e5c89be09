use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use awo_core::time::rfc3339;
use awo_core::{now, Role, RunId, Timestamp};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Actor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl Actor {
    pub fn local(name: impl Into<String>) -> Self {
        Self { name: name.into(), provider: Some("local".to_string()), version: None }
    }
}

/// What an operation produced and who produced it. Large inputs are
/// referenced by digest (`prompt_ref`), never copied in.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProvenanceRecord {
    pub run_id: RunId,
    pub role: Role,
    pub actor: Actor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    pub artifacts: Vec<String>,
    pub hashes: BTreeMap<String, String>,
    #[serde(with = "rfc3339")]
    pub started: Timestamp,
    #[serde(with = "rfc3339")]
    pub ended: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ProvenanceRecord {
    pub fn new(run_id: RunId, role: Role, actor: Actor) -> Self {
        let ts = now();
        Self {
            run_id,
            role,
            actor,
            prompt_ref: None,
            seed: None,
            artifacts: vec![],
            hashes: BTreeMap::new(),
            started: ts,
            ended: ts,
            notes: None,
        }
    }

    pub fn prompt_ref(mut self, prompt_ref: impl Into<String>) -> Self {
        self.prompt_ref = Some(prompt_ref.into());
        self
    }

    pub fn seed(mut self, seed: i64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// `digest` is the tagged `sha256:<hex>` form.
    pub fn artifact(mut self, path: impl Into<String>, digest: impl Into<String>) -> Self {
        let path = path.into();
        self.hashes.insert(path.clone(), digest.into());
        self.artifacts.push(path);
        self
    }

    pub fn span(mut self, started: Timestamp, ended: Timestamp) -> Self {
        self.started = started;
        self.ended = ended.max(started);
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}
