//! Shared wiring for every command that runs a stage.

use anyhow::Result;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use mvc_orchestrator::clarify::TerminalPrompter;
use mvc_orchestrator::config::Config;
use mvc_orchestrator::diagnostics::DiagnosticLog;
use mvc_orchestrator::orchestrator::{PipelineOrchestrator, StageReport, StageRequest};
use mvc_orchestrator::process::CommandRunner;
use mvc_orchestrator::stage::StageParams;
use mvc_orchestrator::ui::StageUI;

use super::super::Cli;

/// One CLI invocation's orchestrator, terminal UI and diagnostic log.
pub struct StageSession {
    pub config: Config,
    pub ui: Arc<StageUI>,
    log: Arc<DiagnosticLog>,
    orchestrator: PipelineOrchestrator,
}

impl StageSession {
    pub fn open(cli: &Cli, project_dir: PathBuf) -> Result<Self> {
        let config = Config::new(project_dir, cli.verbose, cli.yes)?;
        config.ensure_directories()?;

        let log = Arc::new(DiagnosticLog::open(&config.log_dir)?);
        let ui = Arc::new(StageUI::new(config.verbose).with_log_path(log.path()));
        let runner = CommandRunner::new(log.clone())
            .with_silent_exit(config.project().runner.silent_exit);

        tracing::debug!(
            interpreter = %config.interpreter,
            project = %config.project_dir.display(),
            "Opened stage session"
        );

        let orchestrator = PipelineOrchestrator::new(
            config.store(),
            Arc::new(runner),
            Arc::new(TerminalPrompter::new()),
            config.tool_command(),
            config.project().clone(),
        )
        .with_observer(ui.clone());

        Ok(Self {
            config,
            ui,
            log,
            orchestrator,
        })
    }

    pub fn params(&self) -> StageParams {
        StageParams::default().assume_yes(self.config.assume_yes)
    }

    pub fn orchestrator(&self) -> &PipelineOrchestrator {
        &self.orchestrator
    }

    pub async fn run(&self, stage: &str, params: StageParams) -> StageReport {
        let report = self.orchestrator.run_stage(stage, params).await;
        self.record(&report);
        report
    }

    pub async fn run_pipeline(&self, requests: Vec<StageRequest>) -> Vec<StageReport> {
        let reports = self.orchestrator.run_pipeline(requests).await;
        for report in &reports {
            self.record(report);
        }
        reports
    }

    fn record(&self, report: &StageReport) {
        if let Err(e) = self.config.history().record(report) {
            tracing::warn!(stage = %report.stage, error = %e, "Failed to record run history");
        }
    }

    /// Flush the diagnostic log and map the last report to an exit code.
    ///
    /// Success and user cancellation exit 0; everything else exits 1.
    pub fn finish(self, last: Option<&StageReport>) -> ExitCode {
        self.log.close();
        match last {
            Some(report) if !report.is_success() && !report.is_cancelled() => ExitCode::FAILURE,
            _ => ExitCode::SUCCESS,
        }
    }
}
