use std::path::{Component, Path};

use anyhow::Context;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use awo_backends::{seed_of, BackendRegistry};
use awo_claims::{check_claim_value, claim_label};
use awo_core::time::format_rfc3339;
use awo_core::{now, safe_file_stem, sha256_tagged, short_ref, Candidate, Role, StepId};
use awo_gate::{enter_gate, GateEntry};
use awo_record::{Actor, ProvenanceRecord, RunRecorder, ARTIFACTS_DIR, SCOPE_DIR};

use crate::context::{ScopeDetail, ScopeSummary, StepContext, StepResult, ASSERT_STYLE, WRITE_STYLE};
use crate::failure::StepFailure;
use crate::report::{preview, Report};
use crate::workflow::{AssertArgs, ConsensusArgs, FanoutArgs, GateArgs, Operation, ScopeArgs, WriteTextArgs};

/// What the engine does after a step completes.
#[derive(Debug)]
pub enum Flow {
    Continue,
    /// The audit gate was entered; the run is already `pending_review`.
    Halt(GateEntry),
}

/// Everything a handler may touch while one step executes.
pub struct StepScope<'a> {
    pub repo_root: &'a Path,
    pub registry: &'a BackendRegistry,
    pub rec: &'a mut RunRecorder,
    pub ctx: &'a mut StepContext,
    pub report: &'a mut Report,
    /// Payload of `steps/NN_<id>.json`; handlers add their fields.
    pub record: &'a mut Map<String, Value>,
    pub index: usize,
    pub step_id: &'a StepId,
}

impl StepScope<'_> {
    pub fn dispatch(&mut self, op: Operation) -> Result<Flow, StepFailure> {
        match op {
            Operation::FanoutGenerate(a) => self.fanout_generate(a),
            Operation::ConsensusVote(a) => self.consensus_vote(a),
            Operation::ScopeValidate(a) => self.scope_validate(a),
            Operation::AssertContains(a) => self.assert_contains(a),
            Operation::WriteText(a) => self.write_text(a),
            Operation::AuditGate(a) => self.audit_gate(a),
        }
    }

    fn put(&mut self, key: &str, value: Value) {
        self.record.insert(key.to_string(), value);
    }

    fn fanout_generate(&mut self, args: FanoutArgs) -> Result<Flow, StepFailure> {
        let registry = self.registry;
        let mut backends = Vec::with_capacity(args.models.len());
        for name in &args.models {
            let backend = registry.get(name).ok_or_else(|| StepFailure::UnknownBackend(name.clone()))?;
            backends.push(backend);
        }

        let prompt_ref = short_ref(&args.prompt);
        let seed = seed_of(&args.params);
        let mut outputs = Vec::with_capacity(backends.len());
        for backend in backends {
            let started = now();
            let gen = backend.generate(&args.prompt, &args.params);
            let ended = now();
            let actor = Actor {
                name: backend.name().to_string(),
                provider: Some(backend.provider().to_string()),
                version: Some(backend.version().to_string()),
            };
            let record = ProvenanceRecord::new(self.rec.run_id().clone(), Role::Proposer, actor)
                .prompt_ref(prompt_ref.clone())
                .seed(seed)
                .span(started, ended)
                .notes("fanout_generate");
            self.rec.append_provenance(record)?;
            outputs.push(Candidate { model: backend.name().to_string(), text: gen.text, meta: gen.meta });
        }

        self.put("prompt", json!(args.prompt));
        self.put("models", json!(args.models));
        self.put("params", Value::Object(args.params.clone()));
        self.put("outputs", json!(outputs));

        let mut body = vec![format!("Prompt ({prompt_ref}):"), String::new(), "```".to_string()];
        body.push(args.prompt.clone());
        body.extend(["```".to_string(), String::new(), "Outputs:".to_string()]);
        body.extend(outputs.iter().map(|o| format!("- **{}** -> {}", o.model, preview(&o.text, 200))));
        self.report.section(self.index, "fanout_generate", self.step_id.as_str(), body);

        self.ctx.insert(self.step_id.clone(), StepResult::Fanout(outputs));
        Ok(Flow::Continue)
    }

    fn consensus_vote(&mut self, args: ConsensusArgs) -> Result<Flow, StepFailure> {
        let src = args.inputs_from.unwrap_or_default();
        let consensus = self
            .ctx
            .candidates(&src)
            .and_then(awo_consensus::vote)
            .ok_or_else(|| StepFailure::MissingInputs(src.clone()))?;

        self.put("inputs_from", json!(src));
        if let Value::Object(fields) = json!(consensus) {
            self.record.extend(fields);
        }

        let notes = format!("voters={:?}, agreement_ratio={:.2}", consensus.voters, consensus.agreement_ratio);
        let record = ProvenanceRecord::new(self.rec.run_id().clone(), Role::Consensus, Actor::local("majority-vote"))
            .notes(notes);
        self.rec.append_provenance(record)?;

        let voters = if consensus.voters.is_empty() { "(none)".to_string() } else { consensus.voters.join(", ") };
        self.report.section(
            self.index,
            "consensus_vote",
            self.step_id.as_str(),
            [
                format!("- inputs_from: {src}"),
                format!("- voters: {voters}"),
                format!("- agreement_ratio: {:.2}", consensus.agreement_ratio),
                String::new(),
                "```".to_string(),
                consensus.consensus_text.chars().take(300).collect(),
                "```".to_string(),
            ],
        );

        self.ctx.insert(self.step_id.clone(), StepResult::Consensus { inputs_from: src, consensus });
        Ok(Flow::Continue)
    }

    fn scope_validate(&mut self, args: ScopeArgs) -> Result<Flow, StepFailure> {
        let (claims, notes) = load_claims(self.repo_root, &args);
        let run = self.rec.run_dir().clone();
        let claims_dir = run.join(SCOPE_DIR).join("claims");
        std::fs::create_dir_all(&claims_dir).with_context(|| format!("create {}", claims_dir.display()))?;

        let mut details = Vec::with_capacity(claims.len());
        for claim in &claims {
            let outcome = check_claim_value(claim);
            let id = claim_label(claim);
            run.write_json(claims_dir.join(format!("{}.json", safe_file_stem(&id))), claim)?;
            details.push(ScopeDetail { id, ok: outcome.ok, problems: outcome.problems });
        }

        let summary = ScopeSummary {
            claims_checked: claims.len(),
            overall_ok: details.iter().all(|d| d.ok),
            details,
            notes,
            ts: format_rfc3339(&now()),
        };
        let summary_path = run.write_json(Path::new(SCOPE_DIR).join("summary.json"), &summary)?;
        let bytes = std::fs::read(&summary_path).with_context(|| format!("read {}", summary_path.display()))?;
        let rel = run.relative(&summary_path)?;

        let record = ProvenanceRecord::new(self.rec.run_id().clone(), Role::Auditor, Actor::local("scope-validator"))
            .artifact(rel, sha256_tagged(&bytes))
            .notes("Scope/testability validation");
        self.rec.append_provenance(record)?;

        if !summary.overall_ok {
            warn!(run_id = %self.rec.run_id(), step = %self.step_id, "claims failed testability checks");
        }

        let mut echoed = Map::new();
        if let Some(c) = &args.claim {
            echoed.insert("claim".to_string(), c.clone());
        }
        if let Some(g) = &args.claims_glob {
            echoed.insert("claims_glob".to_string(), json!(g));
        }
        self.put("args", Value::Object(echoed));
        self.put("summary", json!(summary));
        self.report.section(
            self.index,
            "scope_validate",
            self.step_id.as_str(),
            [format!("- claims_checked: {}", summary.claims_checked), format!("- overall_ok: {}", summary.overall_ok)],
        );

        self.ctx.insert(self.step_id.clone(), StepResult::Scope(summary));
        Ok(Flow::Continue)
    }

    fn assert_contains(&mut self, args: AssertArgs) -> Result<Flow, StepFailure> {
        let src = args.from_step.ok_or(StepFailure::MissingFromStep)?;
        let hay = self.ctx.get(&src).map(|r| r.text(&args.field, ASSERT_STYLE)).unwrap_or_default();
        let hay_lower = hay.to_lowercase();
        let missing: Vec<String> =
            args.must_include.iter().filter(|m| !hay_lower.contains(&m.to_lowercase())).cloned().collect();
        let ok = missing.is_empty();

        self.put("from_step", json!(src));
        self.put("field", json!(args.field));
        self.put("must_include", json!(args.must_include));
        self.put("missing", json!(missing));
        self.put("ok", json!(ok));
        self.put("sample", json!(hay.chars().take(400).collect::<String>()));

        let notes = format!("must_include={:?}; missing={:?}", args.must_include, missing);
        let record = ProvenanceRecord::new(self.rec.run_id().clone(), Role::Auditor, Actor::local("assert-contains"))
            .notes(notes);
        self.rec.append_provenance(record)?;

        self.ctx.insert(self.step_id.clone(), StepResult::Assertion { ok, missing: missing.clone() });
        if !ok {
            return Err(StepFailure::AssertContainsFailed { missing });
        }
        self.report.section(self.index, "assert_contains", self.step_id.as_str(), [format!("- ok: {ok}")]);
        Ok(Flow::Continue)
    }

    fn write_text(&mut self, args: WriteTextArgs) -> Result<Flow, StepFailure> {
        if !is_safe_relative(&args.path) {
            return Err(StepFailure::UnsafeArtifactPath(args.path));
        }
        let text = match (&args.text, &args.from_step) {
            (Some(t), _) => t.clone(),
            (None, Some(src)) => {
                let source = self.ctx.get(src).ok_or_else(|| StepFailure::MissingSource(src.clone()))?;
                source.text(&args.field, WRITE_STYLE)
            }
            (None, None) => String::new(),
        };

        let run = self.rec.run_dir().clone();
        let out = run.write_text(Path::new(ARTIFACTS_DIR).join(&args.path), &text)?;
        let rel = run.relative(&out)?;
        let bytes = std::fs::read(&out).with_context(|| format!("read {}", out.display()))?;
        let digest = sha256_tagged(&bytes);

        self.put("wrote", json!(rel));
        self.put("from_step", json!(args.from_step));
        self.put("field", if args.from_step.is_some() { json!(args.field) } else { Value::Null });
        self.report.section(self.index, "write_text", self.step_id.as_str(), [format!("- wrote: {rel}")]);

        let record = ProvenanceRecord::new(self.rec.run_id().clone(), Role::Editor, Actor::local("write-text"))
            .artifact(rel.clone(), digest.clone())
            .notes("emit artifact");
        self.rec.append_provenance(record)?;

        debug!(step = %self.step_id, path = %rel, "artifact written");
        self.ctx.insert(self.step_id.clone(), StepResult::Written { path: rel, digest });
        Ok(Flow::Continue)
    }

    fn audit_gate(&mut self, args: GateArgs) -> Result<Flow, StepFailure> {
        let at = now();
        self.put("gate", json!({"status": "pending", "checklist": args.checklist, "ts": format_rfc3339(&at)}));
        let entry = enter_gate(&mut *self.rec, &args.checklist, at)?;
        self.report.section(
            self.index,
            "audit_gate",
            self.step_id.as_str(),
            [format!("- checklist: {}", args.checklist)],
        );
        self.report.halted_for_review();
        Ok(Flow::Halt(entry))
    }
}

/// Inline `claim` first, then every file matched by `claims_glob` (relative
/// to the repo root). Unreadable files become notes, not failures.
fn load_claims(repo_root: &Path, args: &ScopeArgs) -> (Vec<Value>, Vec<String>) {
    let mut claims = Vec::new();
    let mut notes = Vec::new();
    if let Some(c @ Value::Object(_)) = &args.claim {
        claims.push(c.clone());
    }
    let Some(pattern) = &args.claims_glob else {
        return (claims, notes);
    };
    let full = repo_root.join(pattern);
    let paths = match glob::glob(&full.to_string_lossy()) {
        Ok(paths) => paths,
        Err(e) => {
            notes.push(format!("invalid claims_glob {pattern}: {e}"));
            return (claims, notes);
        }
    };
    for entry in paths {
        match entry {
            Ok(path) => {
                let parsed = std::fs::read(&path)
                    .map_err(|e| e.to_string())
                    .and_then(|b| serde_json::from_slice::<Value>(&b).map_err(|e| e.to_string()));
                match parsed {
                    Ok(doc) => claims.push(doc),
                    Err(e) => notes.push(format!("failed to parse {}: {e}", path.display())),
                }
            }
            Err(e) => notes.push(format!("failed to read {}: {e}", e.path().display())),
        }
    }
    (claims, notes)
}

/// Non-empty, relative, and free of `..`/root/prefix components.
fn is_safe_relative(path: &str) -> bool {
    if path.is_empty() || path.contains('\\') {
        return false;
    }
    let p = Path::new(path);
    p.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        && p.components().any(|c| matches!(c, Component::Normal(_)))
}
