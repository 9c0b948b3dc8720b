use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use mvc_orchestrator::artifacts::Category;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod cmd;

#[derive(Parser)]
#[command(name = "mvc-orchestrator")]
#[command(version, about = "Drive the MVC code-generation pipeline stage by stage")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Accept confirmation prompts without asking
    #[arg(long, global = true)]
    pub yes: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the .mvc directory and a default config.toml
    Init,
    /// Create an SRS document from a project idea
    CreateSrs {
        /// Free-text description of the project
        idea: String,
        /// Skip the clarification questions
        #[arg(long)]
        no_clarify: bool,
    },
    /// Use an existing text SRS instead of generating one
    ImportSrs {
        /// Path to a .txt or .md file
        file: PathBuf,
    },
    /// Extract the MVC architecture map from the SRS
    #[command(alias = "index-srs")]
    Extract {
        /// Read the SRS from this file instead of data/srs_document.txt
        #[arg(long)]
        srs: Option<PathBuf>,
    },
    /// Create skeleton files from the architecture map
    Scaffold,
    /// Generate code for every scaffold file of one category
    #[command(alias = "generate_code")]
    GenerateCode {
        #[arg(short, long)]
        category: Category,
    },
    /// Audit generated code for MVC violations
    #[command(alias = "run-audit")]
    Audit,
    /// Apply audit recommendations to generated code
    #[command(alias = "run-fix")]
    Fix,
    /// Run the whole pipeline from idea to audit
    Run {
        #[arg(long)]
        idea: String,
        /// Categories to generate (comma-separated)
        #[arg(long, value_delimiter = ',', default_values_t = Category::ALL.to_vec())]
        categories: Vec<Category>,
        #[arg(long)]
        no_clarify: bool,
    },
    /// Show which artifacts exist and the last run of each stage
    Status,
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default config.toml file
    Init,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", style("Error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("mvc_orchestrator=debug")
        } else {
            EnvFilter::new("mvc_orchestrator=warn")
        }
    });

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Init => cmd::cmd_init(&project_dir),
        Commands::CreateSrs { idea, no_clarify } => {
            cmd::cmd_create_srs(&cli, project_dir, idea, *no_clarify).await
        }
        Commands::ImportSrs { file } => cmd::cmd_import_srs(&project_dir, file),
        Commands::Extract { srs } => cmd::cmd_extract(&cli, project_dir, srs.clone()).await,
        Commands::Scaffold => cmd::cmd_scaffold(&cli, project_dir).await,
        Commands::GenerateCode { category } => {
            cmd::cmd_generate_code(&cli, project_dir, *category).await
        }
        Commands::Audit => cmd::cmd_audit(&cli, project_dir).await,
        Commands::Fix => cmd::cmd_fix(&cli, project_dir).await,
        Commands::Run {
            idea,
            categories,
            no_clarify,
        } => cmd::cmd_run(&cli, project_dir, idea, categories, *no_clarify).await,
        Commands::Status => cmd::cmd_status(&project_dir),
        Commands::Config { command } => cmd::cmd_config(&project_dir, command.clone()),
    }
}
