use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::artifacts::{ArtifactStore, DATA_DIR};
use crate::orchestrator::{RunHistory, ToolCommand, history::HISTORY_FILE};
use crate::project_config::{CONFIG_DIR, CONFIG_FILE, ProjectToml};

/// Environment variable naming the interpreter when the config file does not.
pub const INTERPRETER_ENV_VAR: &str = "MVC_PYTHON";

/// Runtime configuration.
///
/// Layers, lowest to highest: `.mvc/config.toml`, the environment
/// (`MVC_PYTHON`), then CLI flags.
#[derive(Debug, Clone)]
pub struct Config {
    pub project_dir: PathBuf,
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub log_dir: PathBuf,
    pub history_file: PathBuf,
    /// Resolved interpreter executable
    pub interpreter: String,
    pub verbose: bool,
    /// Accept confirmation gates without prompting
    pub assume_yes: bool,
    project: ProjectToml,
}

impl Config {
    pub fn new(project_dir: PathBuf, verbose: bool, assume_yes: bool) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let project = ProjectToml::load_or_default(&project_dir)?;
        let interpreter = resolve_interpreter(
            project.tool.interpreter.as_deref(),
            std::env::var(INTERPRETER_ENV_VAR).ok(),
            &project_dir,
        );

        let config_dir = project_dir.join(CONFIG_DIR);
        Ok(Self {
            config_file: config_dir.join(CONFIG_FILE),
            log_dir: config_dir.join("logs"),
            history_file: config_dir.join(HISTORY_FILE),
            config_dir,
            project_dir,
            interpreter,
            verbose,
            assume_yes,
            project,
        })
    }

    /// The parsed `.mvc/config.toml` (defaults if absent).
    pub fn project(&self) -> &ProjectToml {
        &self.project
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.log_dir).context("Failed to create log directory")?;
        std::fs::create_dir_all(self.project_dir.join(DATA_DIR))
            .context("Failed to create data directory")?;
        Ok(())
    }

    pub fn store(&self) -> ArtifactStore {
        ArtifactStore::new(&self.project_dir)
            .with_source_extension(&self.project.artifacts.source_extension)
    }

    pub fn tool_command(&self) -> ToolCommand {
        ToolCommand::new(self.interpreter.clone(), self.project.tool.entrypoint.clone())
            .with_env(self.project.tool.env.clone())
    }

    pub fn history(&self) -> RunHistory {
        RunHistory::new(self.history_file.clone())
    }
}

/// Pick the interpreter: explicit config, then `MVC_PYTHON`, then the
/// project's virtualenv, then `python` on the PATH.
pub fn resolve_interpreter(
    configured: Option<&str>,
    from_env: Option<String>,
    project_dir: &Path,
) -> String {
    if let Some(configured) = configured.map(str::trim).filter(|s| !s.is_empty()) {
        return configured.to_string();
    }
    if let Some(from_env) = from_env.filter(|s| !s.trim().is_empty()) {
        return from_env.trim().to_string();
    }

    let venv_candidates = [
        project_dir.join(".venv").join("Scripts").join("python.exe"),
        project_dir.join(".venv").join("bin").join("python"),
    ];
    venv_candidates
        .iter()
        .find(|candidate| candidate.is_file())
        .map(|candidate| candidate.to_string_lossy().into_owned())
        .unwrap_or_else(|| "python".to_string())
}
