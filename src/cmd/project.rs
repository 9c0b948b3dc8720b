//! Project setup and inspection: `init`, `import-srs`, and `status`.

use anyhow::Result;
use console::style;
use std::path::Path;
use std::process::ExitCode;

/// Characters of an imported SRS echoed back to the user.
const IMPORT_PREVIEW_CHARS: usize = 500;
/// Component names listed per category by `status`.
const STATUS_NAMES_SHOWN: usize = 5;

pub fn cmd_init(project_dir: &Path) -> Result<ExitCode> {
    use mvc_orchestrator::config::Config;
    use mvc_orchestrator::project_config::ProjectToml;

    let config = Config::new(project_dir.to_path_buf(), false, false)?;
    let was_initialized = config.config_file.exists();

    config.ensure_directories()?;

    if was_initialized {
        println!(
            "Project already initialized at {}",
            config.config_dir.display()
        );
        println!("Directory structure verified.");
        return Ok(ExitCode::SUCCESS);
    }

    ProjectToml::default().save(&config.config_file)?;

    println!("Initialized project at {}", config.project_dir.display());
    println!();
    println!("Created directory structure:");
    println!("  .mvc/");
    println!("  ├── config.toml   # Tool, runner and stage settings");
    println!("  └── logs/         # Diagnostic log of every tool run");
    println!("  data/             # SRS, architecture map and audit report");
    println!();
    println!("Next steps:");
    println!("  1. Run `mvc-orchestrator create-srs \"<idea>\"` or `mvc-orchestrator import-srs <file>`");
    println!("  2. Run `mvc-orchestrator extract` to build the architecture map");
    println!("  3. Run `mvc-orchestrator run --idea \"<idea>\"` to do everything at once");

    Ok(ExitCode::SUCCESS)
}

pub fn cmd_import_srs(project_dir: &Path, file: &Path) -> Result<ExitCode> {
    use mvc_orchestrator::artifacts::{Artifact, read_text_source};
    use mvc_orchestrator::config::Config;
    use mvc_orchestrator::ui::icons::CHECK;
    use mvc_orchestrator::ui::report::preview;

    let config = Config::new(project_dir.to_path_buf(), false, false)?;
    let text = read_text_source(file)?;

    let store = config.store();
    store.write(Artifact::SrsDocument, text.as_bytes())?;
    tracing::info!(source = %file.display(), "Imported SRS");

    println!(
        "{}{}",
        CHECK,
        style(format!(
            "SRS imported → {}",
            Artifact::SrsDocument.relative_path().display()
        ))
        .green()
        .bold()
    );
    println!();
    println!("{}", preview(&text, IMPORT_PREVIEW_CHARS));
    println!();
    println!("Next step: mvc-orchestrator extract");

    Ok(ExitCode::SUCCESS)
}

pub fn cmd_status(project_dir: &Path) -> Result<ExitCode> {
    use mvc_orchestrator::config::Config;
    use mvc_orchestrator::stage::STAGE_NAMES;
    use mvc_orchestrator::ui::report::{architecture_summary, ledger_line};

    let config = Config::new(project_dir.to_path_buf(), false, false)?;
    let store = config.store();

    println!();
    println!("Project: {}", config.project_dir.display());
    println!();
    println!("{}", style("Artifacts").bold());
    for status in store.ledger() {
        println!("  {}", ledger_line(&status));
    }

    if let Ok(map) = store.load_architecture() {
        println!();
        println!("{}", style("Architecture").bold());
        for line in architecture_summary(&map, STATUS_NAMES_SHOWN) {
            println!("  {}", line);
        }
    }

    println!();
    println!("{}", style("Last runs").bold());
    let history = config.history().entries()?;
    for stage in STAGE_NAMES {
        match history.iter().rfind(|e| e.stage == stage) {
            Some(entry) => println!(
                "  {:<14} {:<10} {:>8}ms  {}",
                stage,
                entry.status,
                entry.duration_ms,
                entry.timestamp.format("%Y-%m-%d %H:%M:%S")
            ),
            None => println!("  {:<14} {}", stage, style("never run").dim()),
        }
    }
    println!();

    Ok(ExitCode::SUCCESS)
}
