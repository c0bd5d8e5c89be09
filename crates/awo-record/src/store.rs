use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use awo_core::{RunId, StepId, Timestamp};

use crate::fsio::{write_atomic, write_json_atomic};
use crate::layout::{ARTIFACTS_DIR, BREADCRUMB_FILE, STEPS_DIR};

const BREADCRUMB_READBACK_ATTEMPTS: usize = 3;
const BREADCRUMB_READBACK_DELAY: Duration = Duration::from_millis(50);

/// Where runs live. One directory per run, plus the `LAST_RUN` breadcrumb.
pub trait RunStore: Send + Sync {
    fn create_run_dir(&self, started_at: &Timestamp) -> Result<RunDir>;
    fn open_run(&self, run_id: &RunId) -> Result<RunDir>;
    fn write_breadcrumb(&self, run_id: &RunId) -> Result<()>;
    fn last_run(&self) -> Result<Option<RunId>>;
}

#[derive(Clone, Debug)]
pub struct FsRunStore {
    pub root: PathBuf,
}

impl FsRunStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn breadcrumb_path(&self) -> PathBuf {
        self.root.join(BREADCRUMB_FILE)
    }
}

impl RunStore for FsRunStore {
    fn create_run_dir(&self, started_at: &Timestamp) -> Result<RunDir> {
        std::fs::create_dir_all(&self.root).with_context(|| format!("create runs root {}", self.root.display()))?;
        let base = RunId::from_time(started_at);
        let mut candidate = base.clone();
        let mut suffix = 1;
        loop {
            let path = self.root.join(candidate.as_str());
            match std::fs::create_dir(&path) {
                Ok(()) => {
                    for sub in [STEPS_DIR, ARTIFACTS_DIR] {
                        let dir = path.join(sub);
                        std::fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
                    }
                    debug!(run_id = %candidate, path = %path.display(), "created run dir");
                    return Ok(RunDir { id: candidate, path });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    suffix += 1;
                    candidate = base.with_suffix(suffix);
                }
                Err(e) => return Err(e).with_context(|| format!("create run dir {}", path.display())),
            }
        }
    }

    fn open_run(&self, run_id: &RunId) -> Result<RunDir> {
        let path = self.root.join(run_id.as_str());
        if !path.is_dir() {
            bail!("run dir not found: {}", path.display());
        }
        Ok(RunDir { id: run_id.clone(), path })
    }

    fn write_breadcrumb(&self, run_id: &RunId) -> Result<()> {
        let path = self.breadcrumb_path();
        write_atomic(&path, run_id.as_str().as_bytes())?;
        for attempt in 0..BREADCRUMB_READBACK_ATTEMPTS {
            if let Ok(found) = std::fs::read_to_string(&path) {
                if found.trim() == run_id.as_str() {
                    return Ok(());
                }
            }
            if attempt + 1 < BREADCRUMB_READBACK_ATTEMPTS {
                std::thread::sleep(BREADCRUMB_READBACK_DELAY);
            }
        }
        Err(anyhow!("breadcrumb verification failed: {} != {}", path.display(), run_id))
    }

    fn last_run(&self) -> Result<Option<RunId>> {
        let path = self.breadcrumb_path();
        match std::fs::read_to_string(&path) {
            Ok(s) if !s.trim().is_empty() => Ok(Some(RunId::from_str(s.trim()))),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("read {}", path.display())),
        }
    }
}

/// A single run directory. All writes are atomic replacements.
#[derive(Clone, Debug)]
pub struct RunDir {
    pub id: RunId,
    pub path: PathBuf,
}

impl RunDir {
    pub fn join(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.path.join(rel)
    }

    pub fn write_json<T: Serialize + ?Sized>(&self, rel: impl AsRef<Path>, value: &T) -> Result<PathBuf> {
        let path = self.join(rel);
        write_json_atomic(&path, value)?;
        Ok(path)
    }

    pub fn write_bytes(&self, rel: impl AsRef<Path>, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.join(rel);
        write_atomic(&path, bytes)?;
        Ok(path)
    }

    pub fn write_text(&self, rel: impl AsRef<Path>, text: &str) -> Result<PathBuf> {
        self.write_bytes(rel, text.as_bytes())
    }

    /// `steps/NN_<stem>.json`; NN is at least two digits.
    pub fn step_record_path(&self, index: usize, step: &StepId) -> PathBuf {
        self.join(STEPS_DIR).join(format!("{:02}_{}.json", index, step.file_stem()))
    }

    pub fn write_step_record(&self, index: usize, step: &StepId, record: &Value) -> Result<PathBuf> {
        let path = self.step_record_path(index, step);
        write_json_atomic(&path, record)?;
        Ok(path)
    }

    /// POSIX-style path of `path` relative to this run dir.
    pub fn relative(&self, path: &Path) -> Result<String> {
        let rel = path
            .strip_prefix(&self.path)
            .with_context(|| format!("{} is outside run dir {}", path.display(), self.path.display()))?;
        Ok(posix_path(rel))
    }
}

/// Joins normal components with `/`, whatever the host separator is.
pub fn posix_path(rel: &Path) -> String {
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
