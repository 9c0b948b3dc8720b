use crate::artifacts::Artifact;
use crate::process::ProcessOutcome;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// States one stage invocation passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    Idle,
    PrerequisitesChecked,
    Blocked,
    Clarifying,
    Confirming,
    Running,
    Completed,
}

impl std::fmt::Display for StageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StageState::Idle => "idle",
            StageState::PrerequisitesChecked => "prerequisites-checked",
            StageState::Blocked => "blocked",
            StageState::Clarifying => "clarifying",
            StageState::Confirming => "confirming",
            StageState::Running => "running",
            StageState::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Why a stage did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageFailure {
    #[error("Unknown stage '{0}'")]
    UnknownStage(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("Input file not found: {}", path.display())]
    MissingInput { path: PathBuf },

    #[error("{reason}")]
    Cancelled { reason: String },

    #[error("Prompt failed: {0}")]
    Prompt(String),

    #[error("Failed to start the tool: {message}")]
    SpawnFailed { message: String },

    #[error("Tool failed ({}): {}", exit_label(*exit_code), first_line(diagnostics))]
    ProcessFailed {
        exit_code: Option<i32>,
        diagnostics: String,
    },

    #[error("Process finished but {artifact} was not found at {}", path.display())]
    ArtifactMissing { artifact: String, path: PathBuf },
}

fn exit_label(code: Option<i32>) -> String {
    code.map(|c| format!("exit {}", c))
        .unwrap_or_else(|| "no exit code".to_string())
}

fn first_line(text: &str) -> &str {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("no diagnostic output")
}

/// Final result of a stage invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// A prerequisite artifact is missing; run `producer` first
    Blocked {
        missing: Artifact,
        producer: &'static str,
    },
    /// `artifact` is the verified output, if the stage has one
    Success { artifact: Option<PathBuf> },
    Failure(StageFailure),
}

/// Everything the front end needs to present one stage invocation.
#[derive(Debug, Clone)]
pub struct StageReport {
    pub stage: String,
    pub title: String,
    pub states: Vec<StageState>,
    pub process: Option<ProcessOutcome>,
    pub outcome: StageOutcome,
    /// Human-readable success line from the stage definition
    pub success_message: Option<&'static str>,
    /// Stage to suggest next
    pub next: Option<&'static str>,
}

impl StageReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, StageOutcome::Success { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self.outcome,
            StageOutcome::Failure(StageFailure::Cancelled { .. })
        )
    }

    pub fn reached(&self, state: StageState) -> bool {
        self.states.contains(&state)
    }

    pub fn duration(&self) -> Option<Duration> {
        self.process.as_ref().map(|p| p.duration)
    }

    /// One-line summary for the terminal.
    pub fn message(&self) -> String {
        match &self.outcome {
            StageOutcome::Success { .. } => self
                .success_message
                .unwrap_or("Stage complete")
                .to_string(),
            StageOutcome::Blocked { missing, producer } => format!(
                "{} not found. Run `{}` first.",
                missing.name(),
                producer
            ),
            StageOutcome::Failure(failure) => failure.to_string(),
        }
    }

    /// Short status word used by the run history.
    pub fn status(&self) -> &'static str {
        match &self.outcome {
            StageOutcome::Success { .. } => "success",
            StageOutcome::Blocked { .. } => "blocked",
            StageOutcome::Failure(StageFailure::Cancelled { .. }) => "cancelled",
            StageOutcome::Failure(_) => "failed",
        }
    }
}

/// Accumulates state transitions until the outcome is known.
#[derive(Debug)]
pub(crate) struct ReportBuilder {
    stage: String,
    title: String,
    states: Vec<StageState>,
    success_message: Option<&'static str>,
    next: Option<&'static str>,
}

impl ReportBuilder {
    pub(crate) fn new(stage: &str) -> Self {
        Self {
            stage: stage.to_string(),
            title: format!("Running MVC Orchestrator ({})...", stage),
            states: vec![StageState::Idle],
            success_message: None,
            next: None,
        }
    }

    pub(crate) fn describe(
        &mut self,
        name: &str,
        title: String,
        success_message: &'static str,
        next: Option<&'static str>,
    ) {
        self.stage = name.to_string();
        self.title = title;
        self.success_message = Some(success_message);
        self.next = next;
    }

    pub(crate) fn enter(&mut self, state: StageState) {
        tracing::debug!(stage = %self.stage, state = %state, "Stage transition");
        self.states.push(state);
    }

    pub(crate) fn finish(
        mut self,
        outcome: StageOutcome,
        process: Option<ProcessOutcome>,
    ) -> StageReport {
        self.enter(StageState::Completed);
        StageReport {
            stage: self.stage,
            title: self.title,
            states: self.states,
            process,
            outcome,
            success_message: self.success_message,
            next: self.next,
        }
    }

    pub(crate) fn fail(self, failure: StageFailure) -> StageReport {
        self.finish(StageOutcome::Failure(failure), None)
    }
}
