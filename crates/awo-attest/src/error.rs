use thiserror::Error;

/// Integrity failures. `Display` is `<code>:<detail>`.
#[derive(Debug, Error)]
pub enum IntegrityError {
    #[error("invalid_run_id:{0}")]
    InvalidRunId(String),
    #[error("run_dir_missing:{0}")]
    RunDirMissing(String),
    #[error("manifest_missing:{0}")]
    ManifestMissing(String),
    #[error("sums_missing:{0}")]
    SumsMissing(String),
    #[error("bad_line_format:{line}:{text}")]
    BadLineFormat { line: usize, text: String },
    #[error("unsafe_path_line:{line}:{path}")]
    UnsafePathLine { line: usize, path: String },
    #[error("duplicate_in_sums:{line}:{path}")]
    DuplicateInSums { line: usize, path: String },
    #[error("symlink_in_run_dir:{0}")]
    SymlinkInRunDir(String),
    #[error("missing_in_sums:{}", .0.join(","))]
    MissingInSums(Vec<String>),
    #[error("extra_in_sums:{}", .0.join(","))]
    ExtraInSums(Vec<String>),
    #[error("scope_missing_but_required")]
    ScopeMissingButRequired,
    #[error("rehash_mismatch:{0}")]
    RehashMismatch(String),
    #[error("io_error:{0:#}")]
    Io(#[from] anyhow::Error),
}

impl IntegrityError {
    pub fn code(&self) -> &'static str {
        match self {
            IntegrityError::InvalidRunId(_) => "invalid_run_id",
            IntegrityError::RunDirMissing(_) => "run_dir_missing",
            IntegrityError::ManifestMissing(_) => "manifest_missing",
            IntegrityError::SumsMissing(_) => "sums_missing",
            IntegrityError::BadLineFormat { .. } => "bad_line_format",
            IntegrityError::UnsafePathLine { .. } => "unsafe_path_line",
            IntegrityError::DuplicateInSums { .. } => "duplicate_in_sums",
            IntegrityError::SymlinkInRunDir(_) => "symlink_in_run_dir",
            IntegrityError::MissingInSums(_) => "missing_in_sums",
            IntegrityError::ExtraInSums(_) => "extra_in_sums",
            IntegrityError::ScopeMissingButRequired => "scope_missing_but_required",
            IntegrityError::RehashMismatch(_) => "rehash_mismatch",
            IntegrityError::Io(_) => "io_error",
        }
    }
}
