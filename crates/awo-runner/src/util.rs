use anyhow::{anyhow, Context, Result};
use std::path::Path;
use std::process::Command;

pub fn run_cmd(dir: &Path, program: &str, args: &[&str]) -> Result<String> {
    let mut cmd = Command::new(program);
    cmd.args(args).current_dir(dir);
    let out = cmd.output().with_context(|| format!("run {} {:?}", program, args))?;
    if !out.status.success() {
        return Err(anyhow!(
            "command failed: {} {:?}\nstdout:{}\nstderr:{}",
            program,
            args,
            String::from_utf8_lossy(&out.stdout),
            String::from_utf8_lossy(&out.stderr)
        ));
    }
    Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
}

/// Best effort: `None` when git is missing or `dir` is not a repository.
pub fn git_output(dir: &Path, args: &[&str]) -> Option<String> {
    run_cmd(dir, "git", args).ok().filter(|s| !s.is_empty())
}

pub fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
