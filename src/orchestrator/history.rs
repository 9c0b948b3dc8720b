//! Append-only record of stage runs, shown by `status`.
//!
//! Format, one line per run: `stage|status|duration_ms|timestamp`.
//! The history is informational only; artifact presence stays the sole
//! signal the pipeline gates on.

use super::StageReport;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::io::Write;
use std::path::PathBuf;

/// File name of the history inside the config directory.
pub const HISTORY_FILE: &str = "history.log";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub stage: String,
    pub status: String,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

pub struct RunHistory {
    history_file: PathBuf,
}

impl RunHistory {
    pub fn new(history_file: PathBuf) -> Self {
        Self { history_file }
    }

    pub fn record(&self, report: &StageReport) -> Result<()> {
        let duration_ms = report.duration().map(|d| d.as_millis() as u64).unwrap_or(0);
        let entry = format!(
            "{}|{}|{}|{}\n",
            report.stage,
            report.status(),
            duration_ms,
            Utc::now().to_rfc3339()
        );

        if let Some(parent) = self.history_file.parent() {
            fs::create_dir_all(parent).context("Failed to create history directory")?;
        }
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.history_file)
            .context("Failed to open history file")?
            .write_all(entry.as_bytes())
            .context("Failed to write history entry")?;

        Ok(())
    }

    pub fn entries(&self) -> Result<Vec<HistoryEntry>> {
        if !self.history_file.exists() {
            return Ok(Vec::new());
        }

        let content =
            fs::read_to_string(&self.history_file).context("Failed to read history file")?;

        Ok(content
            .lines()
            .filter_map(|line| {
                let parts: Vec<&str> = line.split('|').collect();
                if parts.len() != 4 {
                    return None;
                }
                Some(HistoryEntry {
                    stage: parts[0].to_string(),
                    status: parts[1].to_string(),
                    duration_ms: parts[2].parse().unwrap_or(0),
                    timestamp: DateTime::parse_from_rfc3339(parts[3])
                        .ok()?
                        .with_timezone(&Utc),
                })
            })
            .collect())
    }

    /// Most recent entry for a stage.
    pub fn last_for(&self, stage: &str) -> Result<Option<HistoryEntry>> {
        Ok(self.entries()?.into_iter().rfind(|e| e.stage == stage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::{StageFailure, StageOutcome, StageState};
    use tempfile::tempdir;

    fn report(stage: &str, outcome: StageOutcome) -> StageReport {
        StageReport {
            stage: stage.to_string(),
            title: String::new(),
            states: vec![StageState::Idle, StageState::Completed],
            process: None,
            outcome,
            success_message: None,
            next: None,
        }
    }

    #[test]
    fn test_empty_history() {
        let dir = tempdir().unwrap();
        let history = RunHistory::new(dir.path().join("history.log"));
        assert!(history.entries().unwrap().is_empty());
        assert!(history.last_for("extract").unwrap().is_none());
    }

    #[test]
    fn test_record_and_read_back() {
        let dir = tempdir().unwrap();
        let history = RunHistory::new(dir.path().join(".mvc/history.log"));

        history
            .record(&report(
                "extract",
                StageOutcome::Failure(StageFailure::SpawnFailed {
                    message: "no python".into(),
                }),
            ))
            .unwrap();
        history
            .record(&report("extract", StageOutcome::Success { artifact: None }))
            .unwrap();
        history
            .record(&report(
                "fix",
                StageOutcome::Failure(StageFailure::Cancelled {
                    reason: "declined".into(),
                }),
            ))
            .unwrap();

        let entries = history.entries().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].status, "failed");
        assert_eq!(
            history.last_for("extract").unwrap().unwrap().status,
            "success"
        );
        assert_eq!(history.last_for("fix").unwrap().unwrap().status, "cancelled");
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.log");
        std::fs::write(
            &path,
            "garbage\naudit|success|12|2026-01-02T03:04:05+00:00\naudit|success|x|not-a-date\n",
        )
        .unwrap();
        let entries = RunHistory::new(path).entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].duration_ms, 12);
    }
}
