use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use awo_attest::{attest, verify_run, AttestContext};
use awo_core::RunId;
use awo_record::{revalidate_run_dir, FsRunStore, RunStore};
use awo_runner::{git_output, resolve_repo_root, Config, Engine, EXIT_UNHANDLED};

#[derive(Parser)]
#[command(name = "awo", version)]
struct Cli {
    /// Repository root (default: $GITHUB_WORKSPACE, then the current directory)
    #[arg(long, global = true)]
    repo_root: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute a workflow and record the run
    Run {
        /// Workflow JSON, relative to the repo root unless absolute
        workflow: String,
    },

    /// Generate SHA256SUMS.txt for a run, verify it and write the attestation
    Attest {
        /// Defaults to the run named in LAST_RUN
        #[arg(long)]
        run_id: Option<String>,
    },

    /// Verify an existing SHA256SUMS.txt without regenerating it
    Verify {
        #[arg(long)]
        run_id: Option<String>,
    },

    /// Re-check a run directory's manifest and provenance against the schemas
    ValidateRun { run_dir: PathBuf },

    /// Show the gate decision of a halted run
    Gate {
        #[arg(long)]
        run_id: Option<String>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    match dispatch(cli) {
        Ok(code) => exit_code(code),
        Err(e) => {
            error!("{e:#}");
            eprintln!("error: {e:#}");
            exit_code(EXIT_UNHANDLED)
        }
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

fn pick_run(cfg: &Config, repo_root: &Path, run_id: Option<String>) -> Result<RunId> {
    if let Some(id) = run_id {
        return Ok(RunId::from_str(id));
    }
    FsRunStore::new(cfg.runs_root(repo_root))
        .last_run()?
        .ok_or_else(|| anyhow!("no --run-id given and no LAST_RUN breadcrumb"))
}

fn dispatch(cli: Cli) -> Result<i32> {
    let repo_root = resolve_repo_root(cli.repo_root)?;
    let cfg = Config::load_or_default(&repo_root)?;

    match cli.cmd {
        Command::Run { workflow } => {
            let engine = Engine::open(repo_root)?;
            let outcome = engine.execute(&workflow)?;
            println!("{}", outcome.run_dir.display());
            if let Some((code, message)) = &outcome.failure {
                eprintln!("run {} failed: {code}: {message}", outcome.run_id);
            }
            Ok(outcome.exit_code())
        }
        Command::Attest { run_id } => {
            let run_id = pick_run(&cfg, &repo_root, run_id)?;
            let ctx = AttestContext::from_env(git_output(&repo_root, &["rev-parse", "HEAD"]));
            match attest(&cfg.runs_root(&repo_root), &cfg.attestations_root(&repo_root), &run_id, &ctx) {
                Ok(out) => {
                    println!("integrity_ok: {} files, {} re-hashed", out.report.files, out.report.sampled.len());
                    println!("{}", out.txt_path.display());
                    println!("{}", out.json_path.display());
                    Ok(0)
                }
                Err(e) => {
                    eprintln!("integrity_fail:{e}");
                    Ok(EXIT_UNHANDLED)
                }
            }
        }
        Command::Verify { run_id } => {
            let run_id = pick_run(&cfg, &repo_root, run_id)?;
            match verify_run(&cfg.runs_root(&repo_root), &run_id) {
                Ok(report) => {
                    println!("integrity_ok: {} files, {} re-hashed", report.files, report.sampled.len());
                    Ok(0)
                }
                Err(e) => {
                    eprintln!("integrity_fail:{e}");
                    Ok(EXIT_UNHANDLED)
                }
            }
        }
        Command::ValidateRun { run_dir } => {
            let run_dir = if run_dir.is_absolute() { run_dir } else { repo_root.join(run_dir) };
            let validator = cfg.schema_validator(&repo_root)?;
            let problems = revalidate_run_dir(&run_dir, validator.as_ref())?;
            if problems.is_empty() {
                println!("OK");
                return Ok(0);
            }
            for p in &problems {
                eprintln!("- {p}");
            }
            Ok(EXIT_UNHANDLED)
        }
        Command::Gate { run_id } => {
            let run_id = pick_run(&cfg, &repo_root, run_id)?;
            let run = FsRunStore::new(cfg.runs_root(&repo_root)).open_run(&run_id)?;
            let decision = awo_gate::load_decision(&run.path)?;
            println!("status: {}", decision.status);
            println!("checklist: {}", decision.checklist);
            if let Some(reviewer) = &decision.reviewer {
                println!("reviewer: {reviewer}");
            }
            if let Some(notes) = &decision.notes {
                println!("notes: {notes}");
            }
            Ok(0)
        }
    }
}
