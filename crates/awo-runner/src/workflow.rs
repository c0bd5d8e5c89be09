use std::path::Path;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use awo_core::{OperationKind, StepId};

use crate::failure::StepFailure;

/// A workflow as read from disk. `raw` is frozen verbatim into the run.
#[derive(Clone, Debug)]
pub struct Workflow {
    pub raw: Vec<u8>,
    pub steps: Vec<RawStep>,
}

/// One entry of `steps`, before its arguments are checked against its op.
#[derive(Clone, Debug, PartialEq)]
pub struct RawStep {
    /// 1-based position in the workflow.
    pub index: usize,
    pub id: StepId,
    pub op: Option<String>,
    /// Top-level fields merged with the nested `args` object; `args` wins.
    pub args: Map<String, Value>,
}

impl RawStep {
    fn from_value(index: usize, doc: &Value) -> Result<Self, StepFailure> {
        let obj = doc
            .as_object()
            .ok_or_else(|| StepFailure::InvalidWorkflow(format!("step {index} is not an object")))?;

        let id = match obj.get("id").and_then(Value::as_str) {
            Some(s) if !s.is_empty() => StepId::from_str(s),
            _ => StepId::positional(index),
        };
        let op = obj.get("op").and_then(Value::as_str).map(str::to_string);

        let mut args: Map<String, Value> = obj
            .iter()
            .filter(|(k, _)| !matches!(k.as_str(), "id" | "op" | "args"))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        match obj.get("args") {
            Some(Value::Object(nested)) => args.extend(nested.iter().map(|(k, v)| (k.clone(), v.clone()))),
            Some(Value::Null) | None => {}
            Some(_) => return Err(StepFailure::InvalidWorkflow(format!("step {index}: args must be an object"))),
        }
        Ok(Self { index, id, op, args })
    }

    /// What the manifest records for this step's op.
    pub fn op_label(&self) -> &str {
        self.op.as_deref().filter(|s| !s.is_empty()).unwrap_or("unknown")
    }

    pub fn kind(&self) -> Result<OperationKind, StepFailure> {
        OperationKind::parse(self.op_label()).ok_or_else(|| StepFailure::UnknownOp(self.op_label().to_string()))
    }
}

impl Workflow {
    pub fn load(path: &Path) -> Result<Self, StepFailure> {
        if !path.is_file() {
            return Err(StepFailure::WorkflowMissing(path.display().to_string()));
        }
        let raw = std::fs::read(path)
            .with_context(|| format!("read {}", path.display()))
            .map_err(StepFailure::Io)?;
        Self::parse(raw)
    }

    pub fn parse(raw: Vec<u8>) -> Result<Self, StepFailure> {
        let doc: Value = serde_json::from_slice(&raw).map_err(|e| StepFailure::JsonParse(e.to_string()))?;
        let obj = doc.as_object().ok_or_else(|| StepFailure::InvalidWorkflow("top level must be an object".to_string()))?;
        let steps = match obj.get("steps") {
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(i, v)| RawStep::from_value(i + 1, v))
                .collect::<Result<Vec<_>, _>>()?,
            None | Some(Value::Null) => vec![],
            Some(_) => return Err(StepFailure::InvalidWorkflow("steps must be an array".to_string())),
        };
        Ok(Self { raw, steps })
    }
}

/// Values a step falls back to when it leaves an argument out.
#[derive(Clone, Debug)]
pub struct OpDefaults {
    pub models: Vec<String>,
    pub checklist: String,
}

pub const DEFAULT_FIELD: &str = "consensus_text";

#[derive(Clone, Debug, PartialEq)]
pub struct FanoutArgs {
    pub prompt: String,
    pub models: Vec<String>,
    pub params: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConsensusArgs {
    pub inputs_from: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScopeArgs {
    pub claim: Option<Value>,
    pub claims_glob: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AssertArgs {
    pub from_step: Option<String>,
    pub field: String,
    pub must_include: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WriteTextArgs {
    pub path: String,
    pub text: Option<String>,
    pub from_step: Option<String>,
    pub field: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GateArgs {
    pub checklist: String,
}

/// A step's operation with its arguments checked and defaulted.
#[derive(Clone, Debug, PartialEq)]
pub enum Operation {
    FanoutGenerate(FanoutArgs),
    ConsensusVote(ConsensusArgs),
    ScopeValidate(ScopeArgs),
    AssertContains(AssertArgs),
    WriteText(WriteTextArgs),
    AuditGate(GateArgs),
}

#[derive(Deserialize)]
struct FanoutDoc {
    prompt: String,
    models: Option<Vec<String>>,
    params: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
struct ConsensusDoc {
    inputs_from: Option<String>,
}

#[derive(Deserialize)]
struct ScopeDoc {
    claim: Option<Value>,
    claims_glob: Option<String>,
}

#[derive(Deserialize)]
struct AssertDoc {
    from_step: Option<String>,
    field: Option<String>,
    #[serde(default)]
    must_include: Vec<Value>,
}

#[derive(Deserialize)]
struct WriteTextDoc {
    path: String,
    text: Option<String>,
    from_step: Option<String>,
    field: Option<String>,
}

#[derive(Deserialize)]
struct GateDoc {
    checklist: Option<String>,
}

fn decode<T: DeserializeOwned>(kind: OperationKind, args: &Map<String, Value>) -> Result<T, StepFailure> {
    serde_json::from_value(Value::Object(args.clone()))
        .map_err(|e| StepFailure::InvalidArgs { op: kind.as_str(), message: e.to_string() })
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.is_empty())
}

impl Operation {
    pub fn from_step(step: &RawStep, defaults: &OpDefaults) -> Result<Self, StepFailure> {
        let kind = step.kind()?;
        let op = match kind {
            OperationKind::FanoutGenerate => {
                let d: FanoutDoc = decode(kind, &step.args)?;
                Operation::FanoutGenerate(FanoutArgs {
                    prompt: d.prompt,
                    models: d.models.unwrap_or_else(|| defaults.models.clone()),
                    params: d.params.unwrap_or_else(default_params),
                })
            }
            OperationKind::ConsensusVote => {
                let d: ConsensusDoc = decode(kind, &step.args)?;
                Operation::ConsensusVote(ConsensusArgs { inputs_from: non_empty(d.inputs_from) })
            }
            OperationKind::ScopeValidate => {
                let d: ScopeDoc = decode(kind, &step.args)?;
                Operation::ScopeValidate(ScopeArgs { claim: d.claim, claims_glob: non_empty(d.claims_glob) })
            }
            OperationKind::AssertContains => {
                let d: AssertDoc = decode(kind, &step.args)?;
                Operation::AssertContains(AssertArgs {
                    from_step: non_empty(d.from_step),
                    field: d.field.unwrap_or_else(|| DEFAULT_FIELD.to_string()),
                    must_include: d.must_include.into_iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
                })
            }
            OperationKind::WriteText => {
                let d: WriteTextDoc = decode(kind, &step.args)?;
                Operation::WriteText(WriteTextArgs {
                    path: d.path,
                    text: d.text,
                    from_step: non_empty(d.from_step),
                    field: d.field.unwrap_or_else(|| DEFAULT_FIELD.to_string()),
                })
            }
            OperationKind::AuditGate => {
                let d: GateDoc = decode(kind, &step.args)?;
                Operation::AuditGate(GateArgs {
                    checklist: non_empty(d.checklist).unwrap_or_else(|| defaults.checklist.clone()),
                })
            }
        };
        Ok(op)
    }
}

fn default_params() -> Map<String, Value> {
    match json!({"seed": 0}) {
        Value::Object(m) => m,
        _ => Map::new(),
    }
}
