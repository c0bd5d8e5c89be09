use std::path::Path;

use anyhow::Result;

use awo_core::time::format_rfc3339;
use awo_core::Timestamp;
use awo_record::{RunDir, REPORT_FILE};

/// `report.md`, built up step by step and rewritten whole.
#[derive(Clone, Debug)]
pub struct Report {
    lines: Vec<String>,
}

impl Report {
    pub fn new(run_id: &str, repo_root: &Path, runs_root: &Path, workflow: &str, started: &Timestamp) -> Self {
        Self {
            lines: vec![
                format!("# AWO Run Report: {run_id}"),
                String::new(),
                format!("- Repo root: {}", repo_root.display()),
                format!("- Runs root: {}", runs_root.display()),
                format!("- Workflow: {workflow}"),
                format!("- Started: {}", format_rfc3339(started)),
                String::new(),
            ],
        }
    }

    pub fn section<I, S>(&mut self, index: usize, op: &str, step_id: &str, body: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lines.push(format!("## {index}. {op}: {step_id}"));
        self.lines.extend(body.into_iter().map(Into::into));
        self.lines.push(String::new());
    }

    pub fn error(&mut self, message: &str) {
        self.lines.extend(["## Error".to_string(), String::new(), message.to_string(), String::new()]);
    }

    pub fn halted_for_review(&mut self) {
        self.lines.extend(["> Run halted for human review.".to_string(), String::new()]);
    }

    pub fn render(&self) -> String {
        self.lines.join("\n")
    }

    pub fn write(&self, run: &RunDir) -> Result<()> {
        run.write_text(REPORT_FILE, &self.render())?;
        Ok(())
    }
}

/// Single-line preview for the report.
pub fn preview(text: &str, max_chars: usize) -> String {
    text.replace('\n', " ").chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_sections_in_order() {
        let started = awo_core::time::parse_rfc3339("2026-10-16T09:00:00Z").unwrap();
        let mut r = Report::new("run_x", Path::new("/repo"), Path::new("/repo/runs"), "wf.json", &started);
        r.section(1, "consensus_vote", "vote", ["- voters: echo, upper"]);
        r.error("boom");
        let text = r.render();
        assert!(text.starts_with("# AWO Run Report: run_x\n"));
        assert!(text.contains("- Started: 2026-10-16T09:00:00Z"));
        let section = text.find("## 1. consensus_vote: vote").unwrap();
        assert!(section < text.find("## Error").unwrap());
    }

    #[test]
    fn preview_is_single_line() {
        assert_eq!(preview("a\nb\nc", 3), "a b");
    }
}
