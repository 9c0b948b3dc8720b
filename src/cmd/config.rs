//! Configuration view and validation commands: `mvc-orchestrator config`.

use anyhow::Result;
use std::process::ExitCode;

use super::super::ConfigCommands;

pub fn cmd_config(
    project_dir: &std::path::Path,
    command: Option<ConfigCommands>,
) -> Result<ExitCode> {
    use mvc_orchestrator::config::Config;
    use mvc_orchestrator::project_config::{CONFIG_DIR, CONFIG_FILE, ProjectToml};

    let config_dir = project_dir.join(CONFIG_DIR);
    let config_path = config_dir.join(CONFIG_FILE);

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("MVC Orchestrator Configuration");
            println!("==============================");
            println!();

            let toml = if config_path.exists() {
                println!("Config file: {}", config_path.display());
                ProjectToml::load(&config_path)?
            } else {
                println!("No config.toml found at {}", config_path.display());
                println!("Using default configuration.");
                ProjectToml::default()
            };
            println!();

            println!("[tool]");
            if let Some(interpreter) = &toml.tool.interpreter {
                println!("  interpreter = \"{}\"", interpreter);
            }
            println!("  entrypoint = {:?}", toml.tool.entrypoint);
            for (key, value) in &toml.tool.env {
                println!("  env.{} = \"{}\"", key, value);
            }
            println!();

            println!("[runner]");
            println!("  max_output_bytes = {}", toml.runner.max_output_bytes);
            println!("  default_timeout_secs = {}", toml.runner.default_timeout_secs);
            println!("  silent_exit = \"{}\"", toml.runner.silent_exit);
            println!();

            println!("[settle]");
            println!("  initial_delay_ms = {}", toml.settle.initial_delay_ms);
            println!("  retries = {}", toml.settle.retries);
            println!("  interval_ms = {}", toml.settle.interval_ms);
            println!();

            println!("[artifacts]");
            println!("  source_extension = \"{}\"", toml.artifacts.source_extension);
            println!();

            if !toml.stages.overrides.is_empty() {
                println!("[stages.overrides]");
                for (pattern, override_cfg) in &toml.stages.overrides {
                    println!("  \"{}\":", pattern);
                    if let Some(secs) = override_cfg.timeout_secs {
                        println!("    timeout_secs = {}", secs);
                    }
                }
                println!();
            }

            println!("Effective values (with env/CLI overrides):");
            let config = Config::new(project_dir.to_path_buf(), false, false)?;
            println!("  interpreter = \"{}\"", config.interpreter);
            println!("  log_dir = \"{}\"", config.log_dir.display());
            println!();

            if !config_path.exists() {
                println!("Run 'mvc-orchestrator config init' to create a config.toml file.");
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No config.toml found. Using defaults (valid).");
                return Ok(ExitCode::SUCCESS);
            }

            let toml = ProjectToml::load(&config_path)?;
            let warnings = toml.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("config.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(ExitCode::SUCCESS);
            }

            std::fs::create_dir_all(&config_dir)?;
            ProjectToml::default().save(&config_path)?;

            println!("Created config.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [tool] interpreter, entrypoint, env");
            println!("  - [runner] max_output_bytes, default_timeout_secs, silent_exit");
            println!("  - [settle] how long to wait for output artifacts");
            println!("  - [stages.overrides.\"pattern-*\"] for stage-specific timeouts");
            println!();
        }
    }

    Ok(ExitCode::SUCCESS)
}
