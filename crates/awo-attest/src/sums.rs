use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Context;
use regex::Regex;
use walkdir::WalkDir;

use awo_core::sha256_file;
use awo_record::fsio::write_atomic;
use awo_record::posix_path;

use crate::error::IntegrityError;

pub const SUMS_FILE: &str = "SHA256SUMS.txt";

/// One `<hex>  ./path` line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SumsEntry {
    pub digest: String,
    /// POSIX, always `./`-prefixed.
    pub path: String,
}

impl SumsEntry {
    /// Location on disk under `run_dir`.
    pub fn file_in(&self, run_dir: &Path) -> PathBuf {
        run_dir.join(self.path.trim_start_matches("./"))
    }
}

/// Every regular file under `run_dir` except the sums file, as sorted
/// `./`-prefixed paths. A symlink anywhere in the tree is an error.
pub fn list_files(run_dir: &Path) -> Result<Vec<String>, IntegrityError> {
    let mut out = Vec::new();
    for entry in WalkDir::new(run_dir).follow_links(false) {
        let entry = entry.with_context(|| format!("walk {}", run_dir.display()))?;
        let rel = entry
            .path()
            .strip_prefix(run_dir)
            .with_context(|| format!("{} outside {}", entry.path().display(), run_dir.display()))?;
        let rel = posix_path(rel);
        if entry.depth() > 0 && entry.path_is_symlink() {
            return Err(IntegrityError::SymlinkInRunDir(format!("./{rel}")));
        }
        if !entry.file_type().is_file() || rel == SUMS_FILE {
            continue;
        }
        out.push(format!("./{rel}"));
    }
    out.sort();
    Ok(out)
}

pub fn generate(run_dir: &Path) -> Result<Vec<SumsEntry>, IntegrityError> {
    list_files(run_dir)?
        .into_iter()
        .map(|path| {
            let digest = sha256_file(&run_dir.join(path.trim_start_matches("./")))?;
            Ok(SumsEntry { digest, path })
        })
        .collect()
}

pub fn render(entries: &[SumsEntry]) -> String {
    entries.iter().map(|e| format!("{}  {}\n", e.digest, e.path)).collect()
}

/// Regenerates `SHA256SUMS.txt` at the top of `run_dir`.
pub fn write_sums(run_dir: &Path) -> Result<(PathBuf, Vec<SumsEntry>), IntegrityError> {
    let entries = generate(run_dir)?;
    let path = run_dir.join(SUMS_FILE);
    write_atomic(&path, render(&entries).as_bytes())?;
    Ok((path, entries))
}

const LINE_PATTERN: &str = r"^([a-f0-9]{64})  (\./.+)$";

/// Strict parse; the first offending line aborts. Each path may appear once.
pub fn parse(text: &str) -> Result<Vec<SumsEntry>, IntegrityError> {
    let body = text.strip_suffix('\n').unwrap_or(text);
    if body.is_empty() {
        return Ok(vec![]);
    }
    let re = Regex::new(LINE_PATTERN).context("compile sums line pattern")?;
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for (i, line) in body.split('\n').enumerate() {
        let ln = i + 1;
        let caps = re
            .captures(line)
            .ok_or_else(|| IntegrityError::BadLineFormat { line: ln, text: line.to_string() })?;
        let path = caps[2].to_string();
        if path.contains("..") || path.contains('\\') {
            return Err(IntegrityError::UnsafePathLine { line: ln, path });
        }
        if !seen.insert(path.clone()) {
            return Err(IntegrityError::DuplicateInSums { line: ln, path });
        }
        out.push(SumsEntry { digest: caps[1].to_string(), path });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const H: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

    #[test]
    fn parses_coreutils_lines() {
        let entries = parse(&format!("{H}  ./a.txt\n{H}  ./dir/b.txt\n")).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].path, "./dir/b.txt");
        assert!(parse("").unwrap().is_empty());
    }

    #[test]
    fn rejects_malformed_lines() {
        let err = parse(&format!("{H}  ./a.txt\n{H} ./single-space\n")).unwrap_err();
        assert_eq!(err.to_string(), format!("bad_line_format:2:{H} ./single-space"));
        assert_eq!(parse(&format!("{}  ./a", H.to_uppercase())).unwrap_err().code(), "bad_line_format");
        assert_eq!(parse(&format!("{H}  a.txt")).unwrap_err().code(), "bad_line_format");
    }

    #[test]
    fn rejects_unsafe_paths() {
        let err = parse(&format!("{H}  ./../etc/passwd\n")).unwrap_err();
        assert_eq!(err.to_string(), "unsafe_path_line:1:./../etc/passwd");
        assert_eq!(parse(&format!("{H}  ./a\\b")).unwrap_err().code(), "unsafe_path_line");
    }

    #[test]
    fn rejects_repeated_paths() {
        let other = "f".repeat(64);
        let err = parse(&format!("{H}  ./a.txt\n{H}  ./b.txt\n{other}  ./a.txt\n")).unwrap_err();
        assert_eq!(err.to_string(), "duplicate_in_sums:3:./a.txt");
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_reported_not_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = dir.path().join("artifacts");
        std::fs::create_dir_all(&artifacts).unwrap();
        std::fs::write(artifacts.join("real.txt"), "r").unwrap();
        std::os::unix::fs::symlink(artifacts.join("real.txt"), artifacts.join("link.txt")).unwrap();
        let err = list_files(dir.path()).unwrap_err();
        assert_eq!(err.to_string(), "symlink_in_run_dir:./artifacts/link.txt");
        assert_eq!(write_sums(dir.path()).unwrap_err().code(), "symlink_in_run_dir");
    }

    #[test]
    fn listing_skips_the_sums_file_only_at_the_top() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join(SUMS_FILE), "x").unwrap();
        std::fs::write(dir.path().join("nested").join(SUMS_FILE), "y").unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        let files = list_files(dir.path()).unwrap();
        assert_eq!(files, vec!["./b.txt".to_string(), format!("./nested/{SUMS_FILE}")]);
    }
}
