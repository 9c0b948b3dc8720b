//! External process execution.
//!
//! `CommandRunner` launches one child process per invocation, streams both
//! output pipes line by line into the diagnostic sink, enforces the wall-clock
//! timeout and classifies the result. It never returns an error: spawn
//! failures, timeouts and crashes all become a [`ProcessOutcome`].

pub mod noise;

use crate::diagnostics::DiagnosticSink;
use crate::project_config::SilentExitPolicy;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Default per-stream capture cap.
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// How long output readers may keep draining once the child is gone.
pub const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Everything needed to launch one external command.
#[derive(Debug, Clone)]
pub struct ProcessInvocation {
    pub id: Uuid,
    /// Stage name used to tag diagnostic lines
    pub tag: String,
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    /// Overrides merged over the ambient environment
    pub env: BTreeMap<String, String>,
    pub timeout: Option<Duration>,
    pub max_output_bytes: usize,
}

impl ProcessInvocation {
    pub fn new(
        tag: impl Into<String>,
        program: impl Into<String>,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tag: tag.into(),
            program: program.into(),
            args: Vec::new(),
            working_dir: working_dir.into(),
            env: BTreeMap::new(),
            timeout: None,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn envs<'a>(mut self, vars: impl IntoIterator<Item = (&'a String, &'a String)>) -> Self {
        for (key, value) in vars {
            self.env.insert(key.clone(), value.clone());
        }
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_output_bytes(mut self, bytes: usize) -> Self {
        self.max_output_bytes = bytes;
        self
    }

    /// Display form of the command. Arguments are never passed through a
    /// shell, so quoting here is cosmetic.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(display_arg)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn display_arg(arg: &str) -> String {
    if arg.is_empty() || arg.chars().any(char::is_whitespace) {
        format!("\"{}\"", arg.replace('"', "\\\""))
    } else {
        arg.to_string()
    }
}

/// How a finished process is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Success,
    /// Timeout, signal, or a non-zero exit with no real diagnostics
    ExpectedTermination,
    RealFailure,
    SpawnFailure,
}

impl Classification {
    /// Classify a process that was spawned.
    ///
    /// Rules apply in order: exit 0, then timeout or abnormal termination, then
    /// real stderr content, then the silent-exit policy.
    pub fn classify(
        exit_code: Option<i32>,
        timed_out: bool,
        filtered_stderr: &str,
        policy: SilentExitPolicy,
    ) -> Self {
        match exit_code {
            Some(0) if !timed_out => Classification::Success,
            _ if timed_out => Classification::ExpectedTermination,
            None => Classification::ExpectedTermination,
            Some(_) if !filtered_stderr.trim().is_empty() => Classification::RealFailure,
            Some(_) => match policy {
                SilentExitPolicy::Expected => Classification::ExpectedTermination,
                SilentExitPolicy::Failure => Classification::RealFailure,
            },
        }
    }

    /// Whether the orchestrator should go on to verify the output artifact.
    pub fn proceeds(&self) -> bool {
        matches!(
            self,
            Classification::Success | Classification::ExpectedTermination
        )
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Classification::Success => write!(f, "success"),
            Classification::ExpectedTermination => write!(f, "expected-termination"),
            Classification::RealFailure => write!(f, "real-failure"),
            Classification::SpawnFailure => write!(f, "spawn-failure"),
        }
    }
}

/// Immutable result of one invocation.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub invocation_id: Uuid,
    /// `None` when the process was killed or terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    /// Stderr with noise lines removed
    pub stderr: String,
    pub timed_out: bool,
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
    pub duration: Duration,
    pub spawn_error: Option<String>,
    pub classification: Classification,
}

impl ProcessOutcome {
    pub fn spawn_failure(
        invocation: &ProcessInvocation,
        message: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self {
            invocation_id: invocation.id,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            timed_out: false,
            stdout_truncated: false,
            stderr_truncated: false,
            duration,
            spawn_error: Some(message.into()),
            classification: Classification::SpawnFailure,
        }
    }

    /// A successful outcome with the given stdout. Handy for test doubles.
    pub fn success(invocation: &ProcessInvocation, stdout: impl Into<String>) -> Self {
        Self {
            invocation_id: invocation.id,
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
            timed_out: false,
            stdout_truncated: false,
            stderr_truncated: false,
            duration: Duration::ZERO,
            spawn_error: None,
            classification: Classification::Success,
        }
    }

    /// One-line description of why the process failed.
    pub fn failure_summary(&self) -> String {
        if let Some(err) = &self.spawn_error {
            return err.clone();
        }
        let first_line = self.stderr.lines().find(|l| !l.trim().is_empty());
        match (first_line, self.exit_code) {
            (Some(line), _) => line.trim().to_string(),
            (None, Some(code)) => format!("Process exited with code {}", code),
            (None, None) => "Process terminated abnormally".to_string(),
        }
    }
}

/// Executes a single external command.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, invocation: &ProcessInvocation) -> ProcessOutcome;
}

#[derive(Debug, Clone, Copy)]
enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    fn tagged(&self, tag: &str, line: &str) -> String {
        match self {
            StreamKind::Stdout => format!("[{}] {}", tag, line),
            StreamKind::Stderr => format!("[{} ERROR] {}", tag, line),
        }
    }
}

/// Bytes captured from one pipe, bounded by the invocation's cap.
#[derive(Debug, Default)]
struct StreamCapture {
    text: String,
    bytes: usize,
    truncated: bool,
}

impl StreamCapture {
    fn push(&mut self, line: &str, raw_len: usize, cap: usize) {
        if self.truncated {
            return;
        }
        if self.bytes + raw_len > cap {
            self.truncated = true;
            return;
        }
        self.text.push_str(line);
        self.text.push('\n');
        self.bytes += raw_len;
    }
}

/// Bytes read from a pipe per call.
const READ_CHUNK: usize = 8 * 1024;

/// Longest unterminated run held in memory before it is emitted as a line.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Destination of one pipe's lines: the sink plus the bounded capture.
struct LineOutput {
    kind: StreamKind,
    tag: String,
    cap: usize,
    sink: Arc<dyn DiagnosticSink>,
    capture: Arc<Mutex<StreamCapture>>,
}

impl LineOutput {
    fn emit(&self, raw: &[u8]) {
        let decoded = String::from_utf8_lossy(raw);
        let line = decoded.trim_end_matches(['\n', '\r']);
        self.sink.append(&self.kind.tagged(&self.tag, line));
        if let Ok(mut capture) = self.capture.lock() {
            capture.push(line, raw.len(), self.cap);
        }
    }
}

/// Read a pipe to EOF in fixed-size chunks, logging every line and capturing
/// up to `cap` bytes. Lines longer than [`MAX_LINE_BYTES`] are split.
async fn pump<R>(mut reader: R, output: LineOutput)
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; READ_CHUNK];
    let mut pending: Vec<u8> = Vec::new();
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                let mut rest = &chunk[..n];
                while let Some(pos) = rest.iter().position(|b| *b == b'\n') {
                    pending.extend_from_slice(&rest[..=pos]);
                    output.emit(&pending);
                    pending.clear();
                    rest = &rest[pos + 1..];
                }
                pending.extend_from_slice(rest);
                if pending.len() >= MAX_LINE_BYTES {
                    output.emit(&pending);
                    pending.clear();
                }
            }
            Err(e) => {
                tracing::debug!(stage = %output.tag, error = %e, "Output reader stopped");
                break;
            }
        }
    }
    if !pending.is_empty() {
        output.emit(&pending);
    }
}

fn take_capture(capture: &Arc<Mutex<StreamCapture>>) -> StreamCapture {
    capture
        .lock()
        .map(|mut c| std::mem::take(&mut *c))
        .unwrap_or_default()
}

/// Production runner backed by `tokio::process`.
pub struct CommandRunner {
    sink: Arc<dyn DiagnosticSink>,
    silent_exit: SilentExitPolicy,
    drain_grace: Duration,
}

impl CommandRunner {
    pub fn new(sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            sink,
            silent_exit: SilentExitPolicy::default(),
            drain_grace: DRAIN_GRACE,
        }
    }

    pub fn with_silent_exit(mut self, policy: SilentExitPolicy) -> Self {
        self.silent_exit = policy;
        self
    }

    pub fn with_drain_grace(mut self, grace: Duration) -> Self {
        self.drain_grace = grace;
        self
    }

    /// Wait for a reader to hit EOF, abandoning it after the grace period.
    async fn drain(&self, task: Option<JoinHandle<()>>, tag: &str) {
        let Some(mut task) = task else {
            return;
        };
        if tokio::time::timeout(self.drain_grace, &mut task)
            .await
            .is_err()
        {
            tracing::warn!(
                stage = %tag,
                grace_ms = self.drain_grace.as_millis() as u64,
                "Output pipe still open after process exit; abandoning reader"
            );
            task.abort();
        }
    }

    fn failure_banner(&self, invocation: &ProcessInvocation, outcome: &ProcessOutcome) -> String {
        let exit = outcome
            .exit_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "none".to_string());
        let header = format!("========== COMMAND FAILED (exit {}) ==========", exit);
        let or_empty = |s: &str| {
            if s.trim().is_empty() {
                "(empty)".to_string()
            } else {
                s.trim_end().to_string()
            }
        };
        format!(
            "{}\nCommand: {}\nSTDOUT:\n{}\nSTDERR:\n{}\n{}",
            header,
            invocation.command_line(),
            or_empty(&outcome.stdout),
            or_empty(&outcome.stderr),
            "=".repeat(header.len())
        )
    }
}

#[async_trait]
impl ProcessRunner for CommandRunner {
    async fn run(&self, invocation: &ProcessInvocation) -> ProcessOutcome {
        let start = Instant::now();
        let tag = invocation.tag.clone();
        tracing::info!(
            stage = %tag,
            id = %invocation.id,
            command = %invocation.command_line(),
            "Starting process"
        );

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .current_dir(&invocation.working_dir)
            .envs(&invocation.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                let message = format!("Failed to start {}: {}", invocation.program, e);
                self.sink.append(&StreamKind::Stderr.tagged(&tag, &message));
                tracing::error!(stage = %tag, error = %e, "Process spawn failed");
                return ProcessOutcome::spawn_failure(invocation, message, start.elapsed());
            }
        };

        let stdout_capture = Arc::new(Mutex::new(StreamCapture::default()));
        let stderr_capture = Arc::new(Mutex::new(StreamCapture::default()));
        let cap = invocation.max_output_bytes;

        let stdout_task = child.stdout.take().map(|out| {
            tokio::spawn(pump(
                out,
                LineOutput {
                    kind: StreamKind::Stdout,
                    tag: tag.clone(),
                    cap,
                    sink: Arc::clone(&self.sink),
                    capture: Arc::clone(&stdout_capture),
                },
            ))
        });
        let stderr_task = child.stderr.take().map(|err| {
            tokio::spawn(pump(
                err,
                LineOutput {
                    kind: StreamKind::Stderr,
                    tag: tag.clone(),
                    cap,
                    sink: Arc::clone(&self.sink),
                    capture: Arc::clone(&stderr_capture),
                },
            ))
        });

        let (status, timed_out) = match invocation.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => (status.ok(), false),
                Err(_) => {
                    tracing::warn!(
                        stage = %tag,
                        timeout_secs = limit.as_secs_f64(),
                        "Process timed out, killing"
                    );
                    if let Err(e) = child.kill().await {
                        tracing::warn!(stage = %tag, error = %e, "Failed to kill process");
                    }
                    (None, true)
                }
            },
            None => (child.wait().await.ok(), false),
        };

        self.drain(stdout_task, &tag).await;
        self.drain(stderr_task, &tag).await;

        let stdout = take_capture(&stdout_capture);
        let raw_stderr = take_capture(&stderr_capture);
        let exit_code = status.and_then(|s| s.code());
        let mut stderr = noise::filter_stderr(&raw_stderr.text);
        let classification =
            Classification::classify(exit_code, timed_out, &stderr, self.silent_exit);

        if let Some(code) = exit_code
            && code != 0
            && !timed_out
            && stderr.trim().is_empty()
        {
            tracing::warn!(
                stage = %tag,
                exit_code = code,
                policy = %self.silent_exit,
                "Non-zero exit without diagnostic output"
            );
            if classification == Classification::RealFailure {
                stderr = format!(
                    "Process exited with code {} without diagnostic output",
                    code
                );
            }
        }

        let outcome = ProcessOutcome {
            invocation_id: invocation.id,
            exit_code,
            stdout: stdout.text,
            stderr,
            timed_out,
            stdout_truncated: stdout.truncated,
            stderr_truncated: raw_stderr.truncated,
            duration: start.elapsed(),
            spawn_error: None,
            classification,
        };

        if classification == Classification::RealFailure {
            self.sink
                .append_block(&self.failure_banner(invocation, &outcome));
        }

        tracing::info!(
            stage = %tag,
            exit_code = ?outcome.exit_code,
            classification = %outcome.classification,
            duration_ms = outcome.duration.as_millis() as u64,
            "Process finished"
        );

        outcome
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::diagnostics::MemorySink;
    use std::path::Path;
    use tempfile::tempdir;

    fn write_script(dir: &Path, body: &str) -> String {
        let path = dir.join("tool.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn script_invocation(dir: &Path, body: &str) -> ProcessInvocation {
        let script = write_script(dir, body);
        ProcessInvocation::new("test", "sh", dir).args([script])
    }

    fn runner() -> (CommandRunner, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        (CommandRunner::new(sink.clone()), sink)
    }

    #[test]
    fn test_classify_rules_in_order() {
        let expected = SilentExitPolicy::Expected;
        assert_eq!(
            Classification::classify(Some(0), false, "warning text", expected),
            Classification::Success
        );
        assert_eq!(
            Classification::classify(None, true, "boom", expected),
            Classification::ExpectedTermination
        );
        assert_eq!(
            Classification::classify(None, false, "boom", expected),
            Classification::ExpectedTermination
        );
        assert_eq!(
            Classification::classify(Some(1), false, "boom", expected),
            Classification::RealFailure
        );
        assert_eq!(
            Classification::classify(Some(1), false, "  ", expected),
            Classification::ExpectedTermination
        );
        assert_eq!(
            Classification::classify(Some(1), false, "", SilentExitPolicy::Failure),
            Classification::RealFailure
        );
    }

    #[test]
    fn test_command_line_quotes_whitespace_only() {
        let inv = ProcessInvocation::new("create-srs", "python", "/tmp").args([
            "-m",
            "src.cli.mvc_arch_cli",
            "--user-idea",
            "Library management",
            "",
        ]);
        assert_eq!(
            inv.command_line(),
            r#"python -m src.cli.mvc_arch_cli --user-idea "Library management" """#
        );
    }

    #[tokio::test]
    async fn test_success_captures_stdout_and_logs_lines() {
        let dir = tempdir().unwrap();
        let (runner, sink) = runner();
        let inv = script_invocation(dir.path(), "echo hello\necho world");

        let outcome = runner.run(&inv).await;
        assert_eq!(outcome.classification, Classification::Success);
        assert_eq!(outcome.exit_code, Some(0));
        assert_eq!(outcome.stdout, "hello\nworld\n");
        assert_eq!(outcome.invocation_id, inv.id);
        assert!(sink.contains("[test] hello"));
        assert!(sink.contains("[test] world"));
    }

    #[tokio::test]
    async fn test_stderr_text_with_nonzero_exit_is_real_failure() {
        let dir = tempdir().unwrap();
        let (runner, sink) = runner();
        let inv = script_invocation(
            dir.path(),
            "echo partial\necho 'Traceback: bad srs' >&2\nexit 1",
        );

        let outcome = runner.run(&inv).await;
        assert_eq!(outcome.classification, Classification::RealFailure);
        assert_eq!(outcome.exit_code, Some(1));
        assert_eq!(outcome.stderr, "Traceback: bad srs");
        assert_eq!(outcome.failure_summary(), "Traceback: bad srs");
        assert!(sink.contains("[test ERROR] Traceback: bad srs"));
        assert!(sink.contains("========== COMMAND FAILED (exit 1) =========="));
        assert!(sink.contains("STDOUT:"));
    }

    #[tokio::test]
    async fn test_digit_only_stderr_is_not_a_real_failure() {
        let dir = tempdir().unwrap();
        let (runner, sink) = runner();
        let inv = script_invocation(dir.path(), "echo 10 >&2\necho 20 >&2\nexit 3");

        let outcome = runner.run(&inv).await;
        assert_eq!(outcome.classification, Classification::ExpectedTermination);
        assert!(outcome.stderr.is_empty());
        assert!(sink.contains("[test ERROR] 10"));
        assert!(!sink.contains("COMMAND FAILED"));
    }

    #[tokio::test]
    async fn test_silent_exit_failure_policy_records_evidence() {
        let dir = tempdir().unwrap();
        let sink = Arc::new(MemorySink::new());
        let runner = CommandRunner::new(sink.clone()).with_silent_exit(SilentExitPolicy::Failure);
        let inv = script_invocation(dir.path(), "exit 2");

        let outcome = runner.run(&inv).await;
        assert_eq!(outcome.classification, Classification::RealFailure);
        assert!(!outcome.stderr.is_empty());
        assert!(outcome.stderr.contains("code 2"));
        assert!(sink.contains("COMMAND FAILED (exit 2)"));
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let dir = tempdir().unwrap();
        let (runner, _sink) = runner();
        let inv = script_invocation(dir.path(), "echo started\nexec sleep 10")
            .timeout(Some(Duration::from_millis(300)));

        let start = Instant::now();
        let outcome = runner.run(&inv).await;
        assert!(outcome.timed_out);
        assert_eq!(outcome.exit_code, None);
        assert_eq!(outcome.classification, Classification::ExpectedTermination);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_grandchild_holding_pipes_does_not_hang() {
        let dir = tempdir().unwrap();
        let sink = Arc::new(MemorySink::new());
        let runner = CommandRunner::new(sink).with_drain_grace(Duration::from_millis(200));
        let inv = script_invocation(dir.path(), "sleep 10 &\nwait")
            .timeout(Some(Duration::from_millis(300)));

        let start = Instant::now();
        let outcome = runner.run(&inv).await;
        assert!(outcome.timed_out);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_spawn_failure_is_reported() {
        let dir = tempdir().unwrap();
        let (runner, sink) = runner();
        let inv = ProcessInvocation::new("extract", "/nonexistent/mvc-tool-binary", dir.path());

        let outcome = runner.run(&inv).await;
        assert_eq!(outcome.classification, Classification::SpawnFailure);
        assert!(outcome.spawn_error.is_some());
        assert!(outcome.failure_summary().contains("Failed to start"));
        assert!(sink.contains("[extract ERROR] Failed to start"));
    }

    #[tokio::test]
    async fn test_env_overrides_merge_with_ambient_environment() {
        let dir = tempdir().unwrap();
        let (runner, _sink) = runner();
        let inv = script_invocation(
            dir.path(),
            "echo \"$MVC_TEST_VALUE\"\nif [ -n \"$PATH\" ]; then echo has-path; fi",
        )
        .env("MVC_TEST_VALUE", "merged");

        let outcome = runner.run(&inv).await;
        assert_eq!(outcome.stdout, "merged\nhas-path\n");
    }

    #[tokio::test]
    async fn test_runs_in_working_directory() {
        let dir = tempdir().unwrap();
        let (runner, _sink) = runner();
        let inv = script_invocation(dir.path(), "touch marker");

        let outcome = runner.run(&inv).await;
        assert_eq!(outcome.classification, Classification::Success);
        assert!(dir.path().join("marker").exists());
    }

    #[tokio::test]
    async fn test_output_beyond_cap_is_drained_and_flagged() {
        let dir = tempdir().unwrap();
        let (runner, sink) = runner();
        let inv = script_invocation(dir.path(), "for i in 1 2 3 4 5; do echo abcdef; done")
            .max_output_bytes(16);

        let outcome = runner.run(&inv).await;
        assert_eq!(outcome.classification, Classification::Success);
        assert!(outcome.stdout_truncated);
        assert!(!outcome.stderr_truncated);
        assert_eq!(outcome.stdout, "abcdef\nabcdef\n");
        assert_eq!(
            sink.lines().iter().filter(|l| l.contains("abcdef")).count(),
            5
        );
    }

    #[tokio::test]
    async fn test_unterminated_output_is_split_and_capped() {
        let dir = tempdir().unwrap();
        let (runner, sink) = runner();
        let inv = script_invocation(dir.path(), "head -c 1000000 /dev/zero | tr '\\0' a")
            .max_output_bytes(1024);

        let outcome = runner.run(&inv).await;
        assert_eq!(outcome.classification, Classification::Success);
        assert!(outcome.stdout_truncated);
        assert!(outcome.stdout.len() <= 1024);

        let lines = sink.lines();
        assert!(lines.len() >= 1_000_000 / MAX_LINE_BYTES);
        assert!(
            lines
                .iter()
                .all(|l| l.len() <= MAX_LINE_BYTES + READ_CHUNK + "[test] ".len())
        );
        let logged: usize = lines.iter().map(|l| l.len() - "[test] ".len()).sum();
        assert_eq!(logged, 1_000_000);
    }
}
