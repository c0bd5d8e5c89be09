use serde::{Deserialize, Serialize};
use serde_json::Value;

use awo_core::short_ref;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Claim {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub statement: Option<String>,
    #[serde(default)]
    pub predictions: Option<Vec<Value>>,
    #[serde(default)]
    pub falsification_tests: Option<Vec<Value>>,
}

impl Claim {
    pub fn from_value(doc: &Value) -> serde_json::Result<Self> {
        Claim::deserialize(doc)
    }

    pub fn predictions(&self) -> &[Value] {
        self.predictions.as_deref().unwrap_or_default()
    }

    pub fn falsification_tests(&self) -> &[Value] {
        self.falsification_tests.as_deref().unwrap_or_default()
    }
}

/// Id used for the claim's artifact name: its own `id` when present, else a
/// content-derived `claim-<12 hex>`.
pub fn claim_label(doc: &Value) -> String {
    match doc.get("id").and_then(Value::as_str) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => {
            let hex = short_ref(&doc.to_string());
            format!("claim-{}", hex.trim_start_matches("sha256:"))
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Finding {
    pub rule_id: String,
    pub message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestabilityReport {
    pub ok: bool,
    pub problems: Vec<String>,
}

impl TestabilityReport {
    pub fn from_findings(findings: Vec<Finding>) -> Self {
        Self {
            ok: findings.is_empty(),
            problems: findings.into_iter().map(|f| f.message).collect(),
        }
    }
}
