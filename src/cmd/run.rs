//! Full pipeline run: `mvc-orchestrator run`.

use anyhow::Result;
use console::style;
use std::path::PathBuf;
use std::process::ExitCode;

use mvc_orchestrator::artifacts::Category;
use mvc_orchestrator::orchestrator::StageRequest;
use mvc_orchestrator::stage::StageParams;

use super::super::Cli;
use super::session::StageSession;

/// Stage requests for one end-to-end run, in execution order.
pub fn pipeline_requests(
    base: StageParams,
    idea: &str,
    categories: &[Category],
    no_clarify: bool,
) -> Vec<StageRequest> {
    let mut srs = base.clone().with_idea(idea);
    if no_clarify {
        srs = srs.without_clarification();
    }

    let mut requests = vec![
        StageRequest::new("create-srs", srs),
        StageRequest::new("extract", base.clone()),
        StageRequest::new("scaffold", base.clone()),
    ];
    let mut seen = Vec::new();
    for category in categories {
        if seen.contains(category) {
            continue;
        }
        seen.push(*category);
        requests.push(StageRequest::new(
            "generate-code",
            base.clone().with_category(*category),
        ));
    }
    requests.push(StageRequest::new("audit", base));
    requests
}

pub async fn cmd_run(
    cli: &Cli,
    project_dir: PathBuf,
    idea: &str,
    categories: &[Category],
    no_clarify: bool,
) -> Result<ExitCode> {
    use mvc_orchestrator::ui::icons::SPARKLE;

    let session = StageSession::open(cli, project_dir)?;
    let requests = pipeline_requests(session.params(), idea, categories, no_clarify);
    let planned = requests.len();

    let reports = session.run_pipeline(requests).await;
    let completed = reports.iter().filter(|r| r.is_success()).count();

    session.ui.print_line("");
    if completed == planned {
        session.ui.print_line(format!(
            "{}{}",
            SPARKLE,
            style(format!("Pipeline complete ({} stages)", planned))
                .green()
                .bold()
        ));
    } else {
        session.ui.print_line(format!(
            "Pipeline stopped after {}/{} stages",
            completed, planned
        ));
    }

    Ok(session.finish(reports.last()))
}
