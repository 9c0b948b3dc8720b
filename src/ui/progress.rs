use crate::orchestrator::{StageObserver, StageOutcome, StageReport, StageState};
use crate::stage::StageDefinition;
use crate::ui::icons::{BLOCKED, CHECK, CLOCK, CROSS, NEXT, QUESTION, RUNNING, WARN};
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

/// Terminal UI for stage runs, rendered via `indicatif`.
///
/// A spinner is shown only while a progress-flagged stage's process runs;
/// prompts and reports print as plain lines so they never fight the spinner.
pub struct StageUI {
    multi: MultiProgress,
    spinner: Mutex<Option<ProgressBar>>,
    verbose: bool,
    log_path: Option<PathBuf>,
}

impl StageUI {
    pub fn new(verbose: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            spinner: Mutex::new(None),
            verbose,
            log_path: None,
        }
    }

    /// Point failure messages at the diagnostic log.
    pub fn with_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Print a line above any spinner. Without a terminal the line goes
    /// straight to stdout, since a hidden `MultiProgress` drops it.
    pub fn print_line(&self, msg: impl AsRef<str>) {
        if self.multi.is_hidden() {
            println!("{}", msg.as_ref());
        } else if self.multi.println(msg.as_ref()).is_err() {
            eprintln!("{}", msg.as_ref());
        }
    }

    /// Print a full-width cyan separator line.
    pub fn print_separator(&self) {
        self.print_line(format!("{}", style("═".repeat(70)).cyan()));
    }

    pub fn print_stage_header(&self, stage: &StageDefinition) {
        self.print_line("");
        self.print_separator();
        self.print_line(format!(
            "{} {}",
            style("▶").green().bold(),
            style(stage.title()).yellow().bold()
        ));
        self.print_separator();
    }

    fn start_spinner(&self, stage: &StageDefinition) {
        let spinner_style = ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {spinner} {msg} {elapsed:.dim}")
            .expect("progress bar template is a valid static string");

        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(spinner_style);
        bar.set_prefix(stage.name);
        bar.set_message(stage.title());
        bar.enable_steady_tick(Duration::from_millis(100));

        if let Ok(mut slot) = self.spinner.lock() {
            *slot = Some(bar);
        }
    }

    fn stop_spinner(&self) {
        if let Ok(mut slot) = self.spinner.lock()
            && let Some(bar) = slot.take()
        {
            bar.finish_and_clear();
        }
    }

    /// Print the outcome line, the next-step hint and, on failure, where to look.
    pub fn show_report(&self, report: &StageReport) {
        match &report.outcome {
            StageOutcome::Success { artifact } => {
                self.print_line(format!("{} {}", CHECK, style(report.message()).green().bold()));
                if self.verbose
                    && let Some(path) = artifact
                {
                    self.print_line(format!("   {}", style(path.display()).dim()));
                }
                if let Some(next) = report.next {
                    self.print_line(format!(
                        "{} Next step: {}",
                        NEXT,
                        style(format!("mvc-orchestrator {}", next)).cyan()
                    ));
                }
            }
            StageOutcome::Blocked { .. } => {
                self.print_line(format!("{} {}", BLOCKED, style(report.message()).yellow()));
            }
            StageOutcome::Failure(_) if report.is_cancelled() => {
                self.print_line(format!("{} {}", CROSS, style(report.message()).yellow()));
            }
            StageOutcome::Failure(_) => {
                self.print_line(format!("{} {}", CROSS, style(report.message()).red().bold()));
                if let Some(process) = &report.process
                    && (process.stdout_truncated || process.stderr_truncated)
                {
                    self.print_line(format!("{} Output was truncated", WARN));
                }
                if let Some(path) = &self.log_path {
                    self.print_line(format!("   See {} for details", style(path.display()).dim()));
                }
            }
        }

        if let Some(duration) = report.duration()
            && self.verbose
        {
            self.print_line(format!(
                "{} {}",
                CLOCK,
                style(format!("{:.1}s", duration.as_secs_f64())).dim()
            ));
        }
    }
}

impl StageObserver for StageUI {
    fn on_transition(&self, stage: &StageDefinition, state: StageState) {
        match state {
            StageState::Idle => self.print_stage_header(stage),
            StageState::Clarifying => {
                self.print_line(format!(
                    "{} {}",
                    QUESTION,
                    style("Answer these questions to create a better SRS").bold()
                ));
            }
            StageState::Running if stage.shows_progress => self.start_spinner(stage),
            StageState::Running => {
                self.print_line(format!("{} {}", RUNNING, stage.title()));
            }
            StageState::Completed => self.stop_spinner(),
            _ => {}
        }
    }

    fn on_report(&self, report: &StageReport) {
        self.stop_spinner();
        self.show_report(report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::StageCatalog;

    #[test]
    fn test_spinner_lifecycle() {
        let ui = StageUI::new(false);
        let catalog = StageCatalog::standard();
        let extract = catalog.resolve("extract").unwrap();

        ui.on_transition(extract, StageState::Running);
        assert!(ui.spinner.lock().unwrap().is_some());
        ui.on_transition(extract, StageState::Completed);
        assert!(ui.spinner.lock().unwrap().is_none());
    }

    #[test]
    fn test_no_spinner_for_quiet_stage() {
        let ui = StageUI::new(false);
        let catalog = StageCatalog::standard();
        let audit = catalog.resolve("audit").unwrap();

        ui.on_transition(audit, StageState::Running);
        assert!(ui.spinner.lock().unwrap().is_none());
    }
}
