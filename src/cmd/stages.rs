//! Single-stage commands: `create-srs`, `extract`, `scaffold`,
//! `generate-code`, `audit` and `fix`.

use anyhow::Result;
use console::style;
use std::path::PathBuf;
use std::process::ExitCode;

use mvc_orchestrator::artifacts::{Artifact, Category};

use super::super::Cli;
use super::session::StageSession;

/// Characters of the new SRS shown after `create-srs`.
const SRS_PREVIEW_CHARS: usize = 1000;
/// Component names listed per category after `extract`.
const ARCHITECTURE_NAMES_SHOWN: usize = 8;
/// Audit findings listed after `audit`.
const AUDIT_TOP_FINDINGS: usize = 3;

pub async fn cmd_create_srs(
    cli: &Cli,
    project_dir: PathBuf,
    idea: &str,
    no_clarify: bool,
) -> Result<ExitCode> {
    use mvc_orchestrator::ui::report::{preview, srs_summary};

    let session = StageSession::open(cli, project_dir)?;
    let mut params = session.params().with_idea(idea);
    if no_clarify {
        params = params.without_clarification();
    }

    let report = session.run("create-srs", params).await;
    if report.is_success() {
        match session.orchestrator().store().read_to_string(Artifact::SrsDocument) {
            Ok(text) => {
                session.ui.print_line("");
                session.ui.print_line(style("SRS preview:").bold().to_string());
                session.ui.print_line(preview(&text, SRS_PREVIEW_CHARS));
                session.ui.print_line("");
                for line in srs_summary(&text) {
                    session.ui.print_line(format!("  {}", line));
                }
            }
            Err(e) => tracing::warn!(error = %e, "Could not read SRS for preview"),
        }
    }

    Ok(session.finish(Some(&report)))
}

pub async fn cmd_extract(cli: &Cli, project_dir: PathBuf, srs: Option<PathBuf>) -> Result<ExitCode> {
    let session = StageSession::open(cli, project_dir)?;
    let mut params = session.params();
    if let Some(srs) = srs {
        params = params.with_override_input(srs);
    }

    let report = session.run("extract", params).await;
    if report.is_success() {
        show_architecture(&session);
    }

    Ok(session.finish(Some(&report)))
}

pub async fn cmd_scaffold(cli: &Cli, project_dir: PathBuf) -> Result<ExitCode> {
    use mvc_orchestrator::ui::icons::FOLDER;

    let session = StageSession::open(cli, project_dir)?;
    let report = session.run("scaffold", session.params()).await;

    if report.is_success() {
        let store = session.orchestrator().store();
        for category in Category::ALL {
            let files = store.list_files(Artifact::Scaffold(category));
            session.ui.print_line(format!(
                "  {}{:<12} {} file(s)",
                FOLDER,
                category.plural(),
                files.len()
            ));
        }
    }

    Ok(session.finish(Some(&report)))
}

pub async fn cmd_generate_code(
    cli: &Cli,
    project_dir: PathBuf,
    category: Category,
) -> Result<ExitCode> {
    use mvc_orchestrator::ui::icons::FILE;

    let session = StageSession::open(cli, project_dir)?;
    let report = session
        .run("generate-code", session.params().with_category(category))
        .await;

    if report.is_success() {
        let store = session.orchestrator().store();
        let files = store.list_files(Artifact::Generated(category));
        session.ui.print_line(format!(
            "Generated {} {} file(s):",
            files.len(),
            category
        ));
        for file in files {
            session.ui.print_line(format!("  {}{}", FILE, file.display()));
        }
    }

    Ok(session.finish(Some(&report)))
}

pub async fn cmd_audit(cli: &Cli, project_dir: PathBuf) -> Result<ExitCode> {
    use mvc_orchestrator::ui::report::audit_summary;

    let session = StageSession::open(cli, project_dir)?;
    let report = session.run("audit", session.params()).await;

    if report.is_success() {
        match session.orchestrator().store().load_audit_report() {
            Ok(audit) => {
                for line in audit_summary(&audit, AUDIT_TOP_FINDINGS) {
                    session.ui.print_line(format!("  {}", line));
                }
            }
            Err(e) => tracing::warn!(error = %e, "Could not read audit report"),
        }
    }

    Ok(session.finish(Some(&report)))
}

pub async fn cmd_fix(cli: &Cli, project_dir: PathBuf) -> Result<ExitCode> {
    let session = StageSession::open(cli, project_dir)?;
    let report = session.run("fix", session.params()).await;
    Ok(session.finish(Some(&report)))
}

/// Print the component tree of the freshly extracted architecture map.
fn show_architecture(session: &StageSession) {
    use mvc_orchestrator::ui::report::architecture_summary;

    match session.orchestrator().store().load_architecture() {
        Ok(map) => {
            for line in architecture_summary(&map, ARCHITECTURE_NAMES_SHOWN) {
                session.ui.print_line(format!("  {}", line));
            }
        }
        Err(e) => tracing::warn!(error = %e, "Could not read architecture map"),
    }
}
