//! Stage sequencing and gating.
//!
//! `PipelineOrchestrator::run_stage` drives one invocation through
//! `Idle → PrerequisitesChecked → {Blocked | Clarifying/Confirming → Running} → Completed`
//! and always returns a [`StageReport`]. Internal errors are folded into
//! [`StageFailure`] values; nothing here panics or returns `Err`.
//!
//! There is no cancellation token. A running stage ends only when its process
//! exits or its timeout fires.

mod command;
pub mod history;
mod report;

pub use command::{IO_ENCODING_VAR, ToolCommand};
pub use history::{HistoryEntry, RunHistory};
pub use report::{StageFailure, StageOutcome, StageReport, StageState};

use crate::artifacts::{ArtifactStore, read_text_source};
use crate::clarify::{ClarificationOutcome, ClarificationSession, Prompter};
use crate::process::{Classification, ProcessRunner};
use crate::project_config::ProjectToml;
use crate::stage::{Interaction, StageCatalog, StageDefinition, StageParams};
use report::ReportBuilder;
use std::sync::Arc;
use std::time::Duration;

/// Confirmation shown before `fix` modifies generated code.
pub const FIX_CONFIRMATION: &str =
    "This will modify files in generated_src/ based on the audit report. Continue?";

/// Receives state transitions as they happen. The CLI uses this to start and
/// stop its progress spinner around the process run.
///
/// Transitions are reported only for names that resolve to a stage. Every
/// resolved run starts with `Idle` and ends with `Completed`, whichever path
/// it takes. An unknown name produces a report and no transitions.
pub trait StageObserver: Send + Sync {
    fn on_transition(&self, _stage: &StageDefinition, _state: StageState) {}

    /// Called once with the finished report of every `run_stage` call.
    fn on_report(&self, _report: &StageReport) {}
}

/// Observer that ignores every transition.
#[derive(Debug, Default)]
pub struct NoopObserver;

impl StageObserver for NoopObserver {}

/// One entry of a pipeline run.
#[derive(Debug, Clone)]
pub struct StageRequest {
    pub stage: String,
    pub params: StageParams,
}

impl StageRequest {
    pub fn new(stage: impl Into<String>, params: StageParams) -> Self {
        Self {
            stage: stage.into(),
            params,
        }
    }
}

pub struct PipelineOrchestrator {
    catalog: StageCatalog,
    store: ArtifactStore,
    runner: Arc<dyn ProcessRunner>,
    prompter: Arc<dyn Prompter>,
    observer: Arc<dyn StageObserver>,
    tool: ToolCommand,
    settings: ProjectToml,
}

impl PipelineOrchestrator {
    pub fn new(
        store: ArtifactStore,
        runner: Arc<dyn ProcessRunner>,
        prompter: Arc<dyn Prompter>,
        tool: ToolCommand,
        settings: ProjectToml,
    ) -> Self {
        Self {
            catalog: StageCatalog::standard(),
            store,
            runner,
            prompter,
            observer: Arc::new(NoopObserver),
            tool,
            settings,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn StageObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn catalog(&self) -> &StageCatalog {
        &self.catalog
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Effective timeout for a stage after configuration overrides.
    pub fn timeout_for(&self, stage: &StageDefinition) -> Option<Duration> {
        if !stage.uses_timeout {
            return None;
        }
        let secs = stage
            .timeout_secs
            .unwrap_or(self.settings.runner.default_timeout_secs);
        // Zero disables the timeout, same as a per-stage override of 0.
        let base = (secs > 0).then(|| Duration::from_secs(secs));
        self.settings.stage_timeout(stage.name, base)
    }

    /// Run one stage to completion.
    pub async fn run_stage(&self, name: &str, params: StageParams) -> StageReport {
        let report = self.execute(name, params).await;
        self.observer.on_report(&report);
        report
    }

    async fn execute(&self, name: &str, params: StageParams) -> StageReport {
        let mut report = ReportBuilder::new(name);

        let stage = match self.catalog.resolve(name) {
            Ok(stage) => stage,
            Err(_) => return report.fail(StageFailure::UnknownStage(name.trim().to_string())),
        };
        report.describe(stage.name, stage.title(), stage.success_message(), stage.next);
        self.observer.on_transition(stage, StageState::Idle);

        let report = self.drive(stage, report, params).await;
        self.observer.on_transition(stage, StageState::Completed);
        report
    }

    async fn drive(
        &self,
        stage: &StageDefinition,
        mut report: ReportBuilder,
        mut params: StageParams,
    ) -> StageReport {
        if let Err(failure) = self.apply_override(stage, &mut params) {
            return report.fail(failure);
        }

        let prerequisites = match stage.prerequisites(&params) {
            Ok(p) => p,
            Err(e) => return report.fail(StageFailure::InvalidRequest(e.to_string())),
        };
        // Validate parameters before asking the human anything.
        if let Err(e) = stage.build_args(&params, &self.store) {
            return report.fail(StageFailure::InvalidRequest(e.to_string()));
        }

        let overridden = params.override_input.as_ref().and(stage.primary_input());
        let missing = prerequisites
            .into_iter()
            .filter(|artifact| Some(*artifact) != overridden)
            .find(|artifact| !self.store.exists(*artifact));
        self.enter(&mut report, stage, StageState::PrerequisitesChecked);

        if let Some(missing) = missing {
            tracing::info!(stage = stage.name, missing = %missing, "Stage blocked");
            self.enter(&mut report, stage, StageState::Blocked);
            return report.finish(
                StageOutcome::Blocked {
                    missing,
                    producer: missing.producer(),
                },
                None,
            );
        }

        match stage.interaction {
            Interaction::Clarify if !params.skip_clarification => {
                self.enter(&mut report, stage, StageState::Clarifying);
                let idea = params.idea.clone().unwrap_or_default();
                match ClarificationSession::new(idea).run(self.prompter.as_ref()) {
                    Ok(ClarificationOutcome::Completed(enriched)) => params.idea = Some(enriched),
                    Ok(ClarificationOutcome::Cancelled { reason }) => {
                        return report.fail(StageFailure::Cancelled { reason });
                    }
                    Err(e) => return report.fail(StageFailure::Prompt(e.to_string())),
                }
            }
            Interaction::Confirm if !params.assume_yes => {
                self.enter(&mut report, stage, StageState::Confirming);
                match self.prompter.confirm(FIX_CONFIRMATION, false) {
                    Ok(Some(true)) => {}
                    Ok(_) => {
                        return report.fail(StageFailure::Cancelled {
                            reason: "Fix operation cancelled by user".to_string(),
                        });
                    }
                    Err(e) => return report.fail(StageFailure::Prompt(e.to_string())),
                }
            }
            _ => {}
        }

        let args = match stage.build_args(&params, &self.store) {
            Ok(args) => args,
            Err(e) => return report.fail(StageFailure::InvalidRequest(e.to_string())),
        };
        let invocation = self
            .tool
            .invocation(stage, args, self.store.root())
            .timeout(self.timeout_for(stage))
            .max_output_bytes(self.settings.runner.max_output_bytes);

        self.enter(&mut report, stage, StageState::Running);
        let outcome = self.runner.run(&invocation).await;

        let result = match outcome.classification {
            Classification::SpawnFailure => StageOutcome::Failure(StageFailure::SpawnFailed {
                message: outcome.failure_summary(),
            }),
            Classification::RealFailure => StageOutcome::Failure(StageFailure::ProcessFailed {
                exit_code: outcome.exit_code,
                diagnostics: outcome.stderr.clone(),
            }),
            Classification::Success | Classification::ExpectedTermination => {
                self.verify_output(stage, &params).await
            }
        };

        report.finish(result, Some(outcome))
    }

    /// Run stages strictly in order, stopping at the first non-success.
    pub async fn run_pipeline(&self, requests: Vec<StageRequest>) -> Vec<StageReport> {
        let mut reports = Vec::with_capacity(requests.len());
        for request in requests {
            let report = self.run_stage(&request.stage, request.params).await;
            let proceed = report.is_success();
            reports.push(report);
            if !proceed {
                break;
            }
        }
        reports
    }

    fn enter(&self, report: &mut ReportBuilder, stage: &StageDefinition, state: StageState) {
        report.enter(state);
        self.observer.on_transition(stage, state);
    }

    /// Validate an override input and pin it to an absolute path.
    ///
    /// The override is handed to the tool in place of the artifact path; the
    /// artifact itself is left untouched.
    fn apply_override(
        &self,
        stage: &StageDefinition,
        params: &mut StageParams,
    ) -> Result<(), StageFailure> {
        let Some(path) = params.override_input.clone() else {
            return Ok(());
        };
        if stage.primary_input().is_none() {
            tracing::warn!(stage = stage.name, "Stage takes no input override; ignoring");
            params.override_input = None;
            return Ok(());
        }
        if !path.is_file() {
            return Err(StageFailure::MissingInput { path });
        }
        read_text_source(&path).map_err(|e| StageFailure::InvalidRequest(e.to_string()))?;

        let path = path.canonicalize().unwrap_or(path);
        tracing::info!(stage = stage.name, input = %path.display(), "Using input override");
        params.override_input = Some(path);
        Ok(())
    }

    async fn verify_output(&self, stage: &StageDefinition, params: &StageParams) -> StageOutcome {
        let candidates = match stage.completion_artifacts(params) {
            Ok(candidates) if candidates.is_empty() => {
                return StageOutcome::Success { artifact: None };
            }
            Ok(candidates) => candidates,
            Err(e) => return StageOutcome::Failure(StageFailure::InvalidRequest(e.to_string())),
        };

        let settle = &self.settings.settle;
        let immediate = candidates.iter().copied().find(|a| self.store.exists(*a));
        let found = match immediate {
            Some(found) => Some(found),
            None => {
                if settle.initial_delay_ms > 0 {
                    tokio::time::sleep(settle.initial_delay()).await;
                }
                self.store
                    .await_settled(&candidates, settle.retries, settle.interval())
                    .await
            }
        };

        match found {
            Some(artifact) => StageOutcome::Success {
                artifact: Some(self.store.resolved_path(artifact)),
            },
            None => {
                let expected = candidates[0];
                tracing::warn!(stage = stage.name, artifact = %expected, "Output artifact missing");
                StageOutcome::Failure(StageFailure::ArtifactMissing {
                    artifact: expected.name(),
                    path: self.store.resolved_path(expected),
                })
            }
        }
    }
}
