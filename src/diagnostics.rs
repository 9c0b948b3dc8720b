//! Append-only diagnostic sink for captured process output.
//!
//! The sink is passed explicitly to whatever needs it. `DiagnosticLog` writes
//! to `.mvc/logs/diagnostics.log` through a non-blocking appender; lines are
//! flushed when the log is closed or dropped.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};

/// File name of the diagnostic log inside the log directory.
pub const LOG_FILE: &str = "diagnostics.log";

/// Receives whole lines of diagnostic text.
pub trait DiagnosticSink: Send + Sync {
    fn append(&self, line: &str);

    /// Append each line of a multi-line block.
    fn append_block(&self, block: &str) {
        for line in block.lines() {
            self.append(line);
        }
    }
}

/// File-backed diagnostic log.
pub struct DiagnosticLog {
    path: PathBuf,
    writer: Mutex<NonBlocking>,
    guard: Mutex<Option<WorkerGuard>>,
}

impl DiagnosticLog {
    /// Open (or create) `<dir>/diagnostics.log` for appending.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;

        let appender = RollingFileAppender::builder()
            .rotation(Rotation::NEVER)
            .filename_prefix(LOG_FILE)
            .build(dir)
            .with_context(|| format!("Failed to open diagnostic log in {}", dir.display()))?;
        let (writer, guard) = tracing_appender::non_blocking(appender);

        Ok(Self {
            path: dir.join(LOG_FILE),
            writer: Mutex::new(writer),
            guard: Mutex::new(Some(guard)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush pending lines and stop accepting new ones.
    pub fn close(&self) {
        if let Ok(mut guard) = self.guard.lock() {
            guard.take();
        }
    }

    fn is_open(&self) -> bool {
        self.guard.lock().map(|g| g.is_some()).unwrap_or(false)
    }
}

impl DiagnosticSink for DiagnosticLog {
    fn append(&self, line: &str) {
        if !self.is_open() {
            return;
        }
        if let Ok(mut writer) = self.writer.lock()
            && let Err(e) = writeln!(writer, "{}", line)
        {
            tracing::warn!(error = %e, "Failed to write diagnostic line");
        }
    }
}

impl std::fmt::Debug for DiagnosticLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticLog")
            .field("path", &self.path)
            .field("open", &self.is_open())
            .finish()
    }
}

/// In-memory sink, used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }
}

impl DiagnosticSink for MemorySink {
    fn append(&self, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_memory_sink_records_lines_in_order() {
        let sink = MemorySink::new();
        sink.append("[extract] one");
        sink.append_block("two\nthree");
        assert_eq!(sink.lines(), vec!["[extract] one", "two", "three"]);
        assert!(sink.contains("three"));
        assert!(!sink.contains("four"));
    }

    #[test]
    fn test_log_writes_lines_on_close() {
        let dir = tempdir().unwrap();
        let log_dir = dir.path().join(".mvc/logs");
        let log = DiagnosticLog::open(&log_dir).unwrap();
        log.append("[audit] starting");
        log.append("[audit ERROR] boom");
        log.close();

        let content = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(content, "[audit] starting\n[audit ERROR] boom\n");
    }

    #[test]
    fn test_log_ignores_lines_after_close() {
        let dir = tempdir().unwrap();
        let log = DiagnosticLog::open(dir.path()).unwrap();
        log.append("kept");
        log.close();
        log.append("dropped");

        let content = std::fs::read_to_string(dir.path().join(LOG_FILE)).unwrap();
        assert_eq!(content, "kept\n");
    }

    #[test]
    fn test_log_appends_across_opens() {
        let dir = tempdir().unwrap();
        {
            let log = DiagnosticLog::open(dir.path()).unwrap();
            log.append("first run");
        }
        let log = DiagnosticLog::open(dir.path()).unwrap();
        log.append("second run");
        log.close();

        let content = std::fs::read_to_string(dir.path().join(LOG_FILE)).unwrap();
        assert_eq!(content, "first run\nsecond run\n");
    }
}
