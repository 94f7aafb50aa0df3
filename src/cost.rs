//! Append-only cost audit log.
//!
//! One line per AI call. Write-only telemetry for the end user; the core
//! never reads it back, and a failed append must never abort a user-visible
//! operation.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Appends one audit line per AI call to a flat text file.
#[derive(Debug, Clone)]
pub struct CostMeter {
    path: PathBuf,
}

impl CostMeter {
    /// Create a meter writing to the given log file path.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one cost line. Best-effort: failures are logged and swallowed.
    pub fn log(
        &self,
        provider: &str,
        model: &str,
        cost_usd: f64,
        document_title: Option<&str>,
        prompt_name: Option<&str>,
    ) {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let line = format!(
            "{} | {} | {} | ${:.6} | {} | {}\n",
            timestamp,
            provider,
            model,
            cost_usd,
            document_title.unwrap_or("N/A"),
            prompt_name.unwrap_or("N/A"),
        );

        if let Err(e) = self.append(&line) {
            warn!("Cost logging failed: {}", e);
        }
    }

    fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_appends_one_line_per_call() {
        let dir = tempfile::tempdir().unwrap();
        let meter = CostMeter::new(dir.path().join("cost_log.txt"));

        meter.log("OpenAI", "gpt-4o", 0.001234, Some("My Doc"), Some("Summarize"));
        meter.log("Anthropic", "claude-3-haiku", 0.0005, None, None);

        let contents = std::fs::read_to_string(meter.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("| OpenAI | gpt-4o | $0.001234 | My Doc | Summarize"));
        assert!(lines[1].contains("| Anthropic | claude-3-haiku | $0.000500 | N/A | N/A"));
    }

    #[test]
    fn test_unwritable_path_does_not_panic() {
        // Parent is a file, so the append must fail; log swallows the error.
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();
        let meter = CostMeter::new(blocker.join("cost_log.txt"));
        meter.log("OpenAI", "gpt-4o", 0.1, None, None);
    }
}
