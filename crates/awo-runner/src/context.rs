use std::collections::HashMap;

use serde::Serialize;
use serde_json::{json, Value};

use awo_consensus::Consensus;
use awo_core::{Candidate, StepId};

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ScopeDetail {
    pub id: String,
    pub ok: bool,
    pub problems: Vec<String>,
}

/// Contents of `scope/summary.json`.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ScopeSummary {
    pub claims_checked: usize,
    pub overall_ok: bool,
    pub details: Vec<ScopeDetail>,
    pub notes: Vec<String>,
    pub ts: String,
}

/// What a completed step left behind for later steps.
#[derive(Clone, Debug, PartialEq)]
pub enum StepResult {
    Fanout(Vec<Candidate>),
    Consensus { inputs_from: String, consensus: Consensus },
    Scope(ScopeSummary),
    Assertion { ok: bool, missing: Vec<String> },
    Written { path: String, digest: String },
}

/// How a result is flattened into text for `assert_contains`/`write_text`.
#[derive(Clone, Copy, Debug)]
pub struct TextStyle {
    /// Separator between fanout outputs.
    pub joiner: &'static str,
    pub pretty_json: bool,
}

pub const ASSERT_STYLE: TextStyle = TextStyle { joiner: "\n", pretty_json: false };
pub const WRITE_STYLE: TextStyle = TextStyle { joiner: "\n\n", pretty_json: true };

impl StepResult {
    pub fn to_json(&self) -> Value {
        match self {
            StepResult::Fanout(cands) => json!(cands),
            StepResult::Consensus { inputs_from, consensus } => {
                let mut v = json!(consensus);
                if let Value::Object(m) = &mut v {
                    m.insert("inputs_from".to_string(), json!(inputs_from));
                }
                v
            }
            StepResult::Scope(summary) => json!(summary),
            StepResult::Assertion { ok, missing } => json!({"ok": ok, "missing": missing}),
            StepResult::Written { path, digest } => json!({"path": path, "digest": digest}),
        }
    }

    /// Field lookup first, then the joined texts of a fanout, then the whole
    /// result as JSON.
    pub fn text(&self, field: &str, style: TextStyle) -> String {
        if let StepResult::Fanout(cands) = self {
            return cands.iter().map(|c| c.text.as_str()).collect::<Vec<_>>().join(style.joiner);
        }
        let doc = self.to_json();
        if let Some(v) = doc.get(field) {
            return scalar_text(v);
        }
        let rendered = if style.pretty_json { serde_json::to_string_pretty(&doc) } else { serde_json::to_string(&doc) };
        rendered.unwrap_or_default()
    }
}

fn scalar_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Run-scoped results keyed by step id. Owned by the single engine thread.
#[derive(Debug, Default)]
pub struct StepContext {
    results: HashMap<StepId, StepResult>,
}

impl StepContext {
    pub fn insert(&mut self, id: StepId, result: StepResult) {
        self.results.insert(id, result);
    }

    pub fn get(&self, id: &str) -> Option<&StepResult> {
        self.results.get(&StepId::from_str(id))
    }

    pub fn candidates(&self, id: &str) -> Option<&[Candidate]> {
        match self.get(id)? {
            StepResult::Fanout(c) => Some(c),
            _ => None,
        }
    }
}
