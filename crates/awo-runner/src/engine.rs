use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, warn};

use awo_backends::BackendRegistry;
use awo_core::time::format_rfc3339;
use awo_core::{now, RunId, RunStatus, StepId, Timestamp};
use awo_record::fsio::write_json_atomic;
use awo_record::{
    FsRunStore, RunDir, RunIndex, RunManifest, RunRecorder, RunStore, SchemaValidator, ENVIRONMENT_FILE, INDEX_FILE,
    MANIFEST_FILE, STEPS_DIR, WORKFLOW_FROZEN_FILE,
};

use crate::context::StepContext;
use crate::environment::EnvironmentSnapshot;
use crate::failure::StepFailure;
use crate::ops::{Flow, StepScope};
use crate::report::Report;
use crate::workflow::{OpDefaults, Operation, Workflow};
use crate::Config;

pub const EXIT_OK: i32 = 0;
pub const EXIT_UNHANDLED: i32 = 1;
pub const EXIT_FATAL: i32 = 2;
/// Distinct from success and failure: a human has to look at the run.
pub const EXIT_PENDING: i32 = 78;

const INIT_ERROR: &str = "init_error";
const UNHANDLED_RECORD: &str = "00_unhandled_error.json";

/// How a run ended.
#[derive(Clone, Debug, PartialEq)]
pub struct RunOutcome {
    pub run_id: RunId,
    pub run_dir: PathBuf,
    pub status: RunStatus,
    /// `(code, message)` of the condition that ended the run as `error`.
    pub failure: Option<(String, String)>,
    /// The run was salvaged after a fault nothing else anticipated.
    pub unhandled: bool,
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self.status {
            RunStatus::Succeeded => EXIT_OK,
            RunStatus::PendingReview => EXIT_PENDING,
            RunStatus::Error if self.unhandled => EXIT_UNHANDLED,
            RunStatus::Error | RunStatus::Running => EXIT_FATAL,
        }
    }
}

/// Executes workflows one step at a time against an explicit backend
/// registry.
pub struct Engine {
    pub repo_root: PathBuf,
    pub cfg: Config,
    pub registry: BackendRegistry,
    pub store: FsRunStore,
    pub validator: Arc<dyn SchemaValidator>,
}

impl Engine {
    /// Config from `awo.toml` (or defaults) and the local backends.
    pub fn open(repo_root: PathBuf) -> Result<Self> {
        let cfg = Config::load_or_default(&repo_root)?;
        let validator = cfg.schema_validator(&repo_root)?;
        let store = FsRunStore::new(cfg.runs_root(&repo_root));
        Ok(Self { repo_root, cfg, registry: BackendRegistry::with_local_defaults(), store, validator })
    }

    pub fn with_registry(mut self, registry: BackendRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Runs `workflow_ref` (relative to the repo root unless absolute).
    ///
    /// Only failing to create the run directory itself is an `Err`; every
    /// later condition, panics included, still leaves a finalized run.
    pub fn execute(&self, workflow_ref: &str) -> Result<RunOutcome> {
        let started_at = now();
        let run = self.store.create_run_dir(&started_at)?;
        self.store.write_breadcrumb(&run.id)?;
        info!(run_id = %run.id, workflow = workflow_ref, "run started");

        let attempt = catch_unwind(AssertUnwindSafe(|| self.drive(&run, workflow_ref, started_at)));
        let message = match attempt {
            Ok(Ok(outcome)) => return Ok(outcome),
            Ok(Err(e)) => format!("{e:#}"),
            Err(panic) => panic_message(panic.as_ref()),
        };
        error!(run_id = %run.id, error = %message, "unhandled fault; salvaging run");
        Ok(self.salvage(&run, workflow_ref, started_at, &message))
    }

    fn drive(&self, run: &RunDir, workflow_ref: &str, started_at: Timestamp) -> Result<RunOutcome> {
        let mut rec = RunRecorder::init(run.clone(), self.validator.clone(), workflow_ref, started_at)?;
        run.write_json(ENVIRONMENT_FILE, &EnvironmentSnapshot::capture(&self.repo_root))?;
        rec.attach_environment(ENVIRONMENT_FILE)?;

        let mut report =
            Report::new(run.id.as_str(), &self.repo_root, &self.store.root, workflow_ref, &started_at);

        let workflow = match Workflow::load(&self.workflow_path(workflow_ref)) {
            Ok(w) => w,
            Err(failure) => {
                let id = StepId::from_str(INIT_ERROR);
                let mut record = step_record(&id, INIT_ERROR);
                if let Err(e) = rec.append_op(1, &id, INIT_ERROR) {
                    warn!(run_id = %run.id, error = %e, "could not record init_error op");
                }
                return self.fail(&mut rec, &mut report, 1, &id, &mut record, failure);
            }
        };
        run.write_bytes(WORKFLOW_FROZEN_FILE, &workflow.raw)?;

        let defaults = OpDefaults {
            models: self.cfg.backends.default_models.clone(),
            checklist: self.cfg.gate.default_checklist.clone(),
        };
        let mut ctx = StepContext::default();

        for step in &workflow.steps {
            let mut record = step_record(&step.id, step.op_label());
            debug!(run_id = %run.id, index = step.index, step = %step.id, op = step.op_label(), "step");

            let result = rec
                .append_op(step.index, &step.id, step.op_label())
                .map_err(StepFailure::from)
                .and_then(|()| Operation::from_step(step, &defaults))
                .and_then(|op| {
                    StepScope {
                        repo_root: &self.repo_root,
                        registry: &self.registry,
                        rec: &mut rec,
                        ctx: &mut ctx,
                        report: &mut report,
                        record: &mut record,
                        index: step.index,
                        step_id: &step.id,
                    }
                    .dispatch(op)
                });

            match result {
                Ok(Flow::Continue) => {
                    run.write_step_record(step.index, &step.id, &Value::Object(record))?;
                }
                Ok(Flow::Halt(entry)) => {
                    run.write_step_record(step.index, &step.id, &Value::Object(record))?;
                    report.write(run)?;
                    self.store.write_breadcrumb(&run.id)?;
                    info!(run_id = %run.id, decision = %entry.path.display(), "awaiting human review");
                    return Ok(self.outcome(run, RunStatus::PendingReview, None));
                }
                Err(failure) => {
                    return self.fail(&mut rec, &mut report, step.index, &step.id, &mut record, failure);
                }
            }
        }

        report.write(run)?;
        rec.finalize(RunStatus::Succeeded, now())?;
        self.store.write_breadcrumb(&run.id)?;
        info!(run_id = %run.id, "run succeeded");
        Ok(self.outcome(run, RunStatus::Succeeded, None))
    }

    /// The one path every fatal condition takes: diagnostic step record,
    /// report, `error` manifest, breadcrumb.
    fn fail(
        &self,
        rec: &mut RunRecorder,
        report: &mut Report,
        index: usize,
        step_id: &StepId,
        record: &mut Map<String, Value>,
        failure: StepFailure,
    ) -> Result<RunOutcome> {
        let code = failure.code();
        let message = failure.to_string();
        record.insert("error".to_string(), json!(code));
        record.insert("message".to_string(), json!(message));

        let run = rec.run_dir().clone();
        run.write_step_record(index, step_id, &Value::Object(record.clone()))?;
        report.error(&message);
        report.write(&run)?;
        if !rec.status().is_terminal() {
            rec.finalize(RunStatus::Error, now())?;
        }
        self.store.write_breadcrumb(&run.id)?;
        error!(run_id = %run.id, step = %step_id, code, "{message}");
        Ok(self.outcome(&run, RunStatus::Error, Some((code.to_string(), message))))
    }

    /// Best effort: every write is attempted even if an earlier one fails.
    fn salvage(&self, run: &RunDir, workflow_ref: &str, started_at: Timestamp, message: &str) -> RunOutcome {
        if let Err(e) = self.store.write_breadcrumb(&run.id) {
            warn!(run_id = %run.id, error = %e, "breadcrumb not written");
        }
        let diag = json!({"error": "unhandled", "message": message, "ts": format_rfc3339(&now())});
        if let Err(e) = run.write_json(Path::new(STEPS_DIR).join(UNHANDLED_RECORD), &diag) {
            warn!(run_id = %run.id, error = %e, "diagnostic record not written");
        }

        let mut report =
            Report::new(run.id.as_str(), &self.repo_root, &self.store.root, workflow_ref, &started_at);
        report.error(&format!("unhandled: {message}"));
        if let Err(e) = report.write(run) {
            warn!(run_id = %run.id, error = %e, "report not written");
        }

        let status = match self.salvage_manifest(run, workflow_ref, started_at) {
            Ok(status) => status,
            Err(e) => {
                warn!(run_id = %run.id, error = %e, "validated manifest unavailable; writing minimal manifest");
                let mut manifest = RunManifest::new(run.id.clone(), workflow_ref, started_at);
                manifest.status = RunStatus::Error;
                manifest.finished_at = Some(now().max(started_at));
                manifest.notes.push("unhandled_error".to_string());
                let written = write_json_atomic(&run.join(MANIFEST_FILE), &manifest)
                    .and_then(|()| write_json_atomic(&run.join(INDEX_FILE), &RunIndex::from(&manifest)));
                if let Err(e) = written {
                    error!(run_id = %run.id, error = %e, "run directory left without a manifest");
                }
                RunStatus::Error
            }
        };

        RunOutcome {
            run_id: run.id.clone(),
            run_dir: run.path.clone(),
            status,
            failure: Some(("unhandled".to_string(), message.to_string())),
            unhandled: true,
        }
    }

    /// Leaves the manifest terminal and returns the status it ends up with. A
    /// run that already reached a terminal status keeps it.
    fn salvage_manifest(&self, run: &RunDir, workflow_ref: &str, started_at: Timestamp) -> Result<RunStatus> {
        let mut rec = match RunRecorder::resume(run.clone(), self.validator.clone()) {
            Ok(rec) => rec,
            Err(_) => RunRecorder::init(run.clone(), self.validator.clone(), workflow_ref, started_at)?,
        };
        rec.add_note("unhandled_error")?;
        if !rec.status().is_terminal() {
            rec.finalize(RunStatus::Error, now())?;
        }
        Ok(rec.status())
    }

    fn outcome(&self, run: &RunDir, status: RunStatus, failure: Option<(String, String)>) -> RunOutcome {
        RunOutcome { run_id: run.id.clone(), run_dir: run.path.clone(), status, failure, unhandled: false }
    }

    fn workflow_path(&self, workflow_ref: &str) -> PathBuf {
        let p = Path::new(workflow_ref);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.repo_root.join(p)
        }
    }
}

fn step_record(id: &StepId, op: &str) -> Map<String, Value> {
    let mut m = Map::new();
    m.insert("ts".to_string(), json!(format_rfc3339(&now())));
    m.insert("id".to_string(), json!(id.as_str()));
    m.insert("op".to_string(), json!(op));
    m
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic".to_string()
    }
}
