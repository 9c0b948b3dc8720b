//! Stage definitions and the static stage catalog.
//!
//! This module provides:
//! - `StageDefinition` describing one external-tool invocation
//! - `StageParams` carrying the caller-supplied inputs for a run
//! - `StageCatalog`, the immutable name → definition table
//!
//! Argument building is a pure function of the definition, the params and the
//! artifact locations; nothing here touches the filesystem.

use crate::artifacts::{Artifact, ArtifactStore, Category, normalize_separators};
use crate::errors::CatalogError;
use std::path::PathBuf;

/// Canonical stage names in pipeline order.
pub const STAGE_NAMES: [&str; 6] = [
    "create-srs",
    "extract",
    "scaffold",
    "generate-code",
    "audit",
    "fix",
];

/// Legacy names accepted by [`StageCatalog::resolve`].
const ALIASES: [(&str, &str); 4] = [
    ("index-srs", "extract"),
    ("run-audit", "audit"),
    ("generate_code", "generate-code"),
    ("run-fix", "fix"),
];

/// Which stage a definition describes. Drives argument and artifact rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    CreateSrs,
    Extract,
    Scaffold,
    GenerateCode,
    Audit,
    Fix,
}

/// Human step required before the process may start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interaction {
    None,
    /// Collect clarification answers to enrich the input
    Clarify,
    /// Ask for explicit consent; the stage modifies files in place
    Confirm,
}

/// Caller-supplied inputs for one stage run.
#[derive(Debug, Clone, Default)]
pub struct StageParams {
    /// Free-text project idea (`create-srs`)
    pub idea: Option<String>,
    /// Layer to generate (`generate-code`)
    pub category: Option<Category>,
    /// Replacement for the stage's primary input artifact
    pub override_input: Option<PathBuf>,
    /// Run `create-srs` on the raw idea without the clarification session
    pub skip_clarification: bool,
    /// Treat the confirmation gate as already accepted
    pub assume_yes: bool,
}

impl StageParams {
    pub fn with_idea(mut self, idea: impl Into<String>) -> Self {
        self.idea = Some(idea.into());
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_override_input(mut self, path: impl Into<PathBuf>) -> Self {
        self.override_input = Some(path.into());
        self
    }

    pub fn without_clarification(mut self) -> Self {
        self.skip_clarification = true;
        self
    }

    pub fn assume_yes(mut self, yes: bool) -> Self {
        self.assume_yes = yes;
        self
    }
}

/// Immutable description of one pipeline stage.
#[derive(Debug, Clone)]
pub struct StageDefinition {
    pub kind: StageKind,
    /// Unique stage name
    pub name: &'static str,
    /// Subcommand passed to the external tool
    pub subcommand: &'static str,
    /// One-line description for help output
    pub description: &'static str,
    /// Whether `--output <artifact>` is appended to the arguments
    pub output_flag: bool,
    /// Whether the hard timeout applies at all
    pub uses_timeout: bool,
    /// Stage-specific timeout; `None` falls back to the runner default
    pub timeout_secs: Option<u64>,
    /// Whether a progress indicator is shown while the process runs
    pub shows_progress: bool,
    pub interaction: Interaction,
    /// Stage to suggest once this one succeeds
    pub next: Option<&'static str>,
}

impl StageDefinition {
    /// Human-readable progress title.
    pub fn title(&self) -> String {
        format!("Running MVC Orchestrator ({})...", self.name)
    }

    /// Message shown when the stage completes.
    pub fn success_message(&self) -> &'static str {
        match self.kind {
            StageKind::CreateSrs => "SRS created → data/srs_document.txt",
            StageKind::Extract => "Architecture extracted → data/architecture_map.json",
            StageKind::Scaffold => "Scaffold created → scaffolds/mvc_skeleton/",
            StageKind::GenerateCode => "Code generation complete",
            StageKind::Audit => "Audit complete → data/final_audit_report.json",
            StageKind::Fix => "Fix complete. Check the diagnostic log for details",
        }
    }

    /// Artifacts that must exist before the stage may run.
    pub fn prerequisites(&self, params: &StageParams) -> Result<Vec<Artifact>, CatalogError> {
        Ok(match self.kind {
            StageKind::CreateSrs | StageKind::Audit | StageKind::Fix => Vec::new(),
            StageKind::Extract => vec![Artifact::SrsDocument],
            StageKind::Scaffold => vec![Artifact::ArchitectureMap],
            StageKind::GenerateCode => vec![
                Artifact::ArchitectureMap,
                Artifact::Scaffold(self.require_category(params)?),
            ],
        })
    }

    /// The prerequisite an override path stands in for, if the stage has one.
    pub fn primary_input(&self) -> Option<Artifact> {
        match self.kind {
            StageKind::Extract => Some(Artifact::SrsDocument),
            StageKind::Scaffold => Some(Artifact::ArchitectureMap),
            _ => None,
        }
    }

    /// The artifact whose existence marks the stage as done.
    pub fn output(&self, params: &StageParams) -> Result<Option<Artifact>, CatalogError> {
        Ok(match self.kind {
            StageKind::CreateSrs => Some(Artifact::SrsDocument),
            StageKind::Extract => Some(Artifact::ArchitectureMap),
            StageKind::Scaffold => Some(Artifact::Scaffold(
                params.category.unwrap_or(Category::Model),
            )),
            StageKind::GenerateCode => {
                Some(Artifact::Generated(self.require_category(params)?))
            }
            StageKind::Audit => Some(Artifact::AuditReport),
            StageKind::Fix => None,
        })
    }

    /// Artifacts any one of which marks the stage as done.
    ///
    /// A `scaffold` run without a category is done once any category's
    /// scaffold directory holds source files; an architecture may lack models.
    pub fn completion_artifacts(&self, params: &StageParams) -> Result<Vec<Artifact>, CatalogError> {
        if self.kind == StageKind::Scaffold && params.category.is_none() {
            return Ok(Category::ALL.iter().map(|c| Artifact::Scaffold(*c)).collect());
        }
        Ok(self.output(params)?.into_iter().collect())
    }

    /// Build the stage arguments that follow the subcommand.
    ///
    /// Every embedded path is rendered with forward slashes.
    pub fn build_args(
        &self,
        params: &StageParams,
        store: &ArtifactStore,
    ) -> Result<Vec<String>, CatalogError> {
        let path_of = |artifact: Artifact| normalize_separators(&store.resolved_path(artifact));
        let input_or = |artifact: Artifact| {
            params
                .override_input
                .as_deref()
                .map(normalize_separators)
                .unwrap_or_else(|| path_of(artifact))
        };

        let mut args = match self.kind {
            StageKind::CreateSrs => {
                let idea = params
                    .idea
                    .as_deref()
                    .map(str::trim)
                    .filter(|idea| !idea.is_empty())
                    .ok_or(CatalogError::MissingParameter {
                        stage: self.name,
                        parameter: "a project idea",
                    })?;
                vec!["--user-idea".to_string(), idea.to_string()]
            }
            StageKind::Extract => vec!["--srs-path".to_string(), input_or(Artifact::SrsDocument)],
            StageKind::Scaffold | StageKind::Audit => {
                vec!["--arch-path".to_string(), input_or(Artifact::ArchitectureMap)]
            }
            StageKind::GenerateCode => vec![
                "--category".to_string(),
                self.require_category(params)?.to_string(),
                "--arch-path".to_string(),
                path_of(Artifact::ArchitectureMap),
            ],
            StageKind::Fix => Vec::new(),
        };

        if self.output_flag
            && let Some(output) = self.output(params)?
        {
            args.push("--output".to_string());
            args.push(path_of(output));
        }

        Ok(args)
    }

    fn require_category(&self, params: &StageParams) -> Result<Category, CatalogError> {
        params.category.ok_or(CatalogError::MissingParameter {
            stage: self.name,
            parameter: "a category",
        })
    }
}

/// The static stage table.
#[derive(Debug, Clone)]
pub struct StageCatalog {
    stages: Vec<StageDefinition>,
}

impl Default for StageCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl StageCatalog {
    /// The six stages of the MVC pipeline.
    pub fn standard() -> Self {
        let stage = |kind, name, subcommand, description| StageDefinition {
            kind,
            name,
            subcommand,
            description,
            output_flag: false,
            uses_timeout: true,
            timeout_secs: None,
            shows_progress: false,
            interaction: Interaction::None,
            next: None,
        };

        let stages = vec![
            StageDefinition {
                output_flag: true,
                shows_progress: true,
                interaction: Interaction::Clarify,
                next: Some("extract"),
                ..stage(
                    StageKind::CreateSrs,
                    "create-srs",
                    "create-srs",
                    "Create an SRS document from a project idea",
                )
            },
            StageDefinition {
                output_flag: true,
                shows_progress: true,
                next: Some("scaffold"),
                ..stage(
                    StageKind::Extract,
                    "extract",
                    "extract",
                    "Extract the MVC architecture map from the SRS",
                )
            },
            StageDefinition {
                next: Some("generate-code"),
                ..stage(
                    StageKind::Scaffold,
                    "scaffold",
                    "scaffold",
                    "Create skeleton files from the architecture map",
                )
            },
            StageDefinition {
                timeout_secs: Some(300),
                shows_progress: true,
                next: Some("audit"),
                ..stage(
                    StageKind::GenerateCode,
                    "generate-code",
                    "generate-code",
                    "Generate code for every scaffold file of one category",
                )
            },
            StageDefinition {
                next: Some("fix"),
                ..stage(
                    StageKind::Audit,
                    "audit",
                    "audit",
                    "Audit generated code for MVC violations",
                )
            },
            StageDefinition {
                interaction: Interaction::Confirm,
                ..stage(
                    StageKind::Fix,
                    "fix",
                    "run-fix",
                    "Apply audit recommendations to generated code",
                )
            },
        ];

        Self { stages }
    }

    /// Look up a stage by name or legacy alias.
    pub fn resolve(&self, name: &str) -> Result<&StageDefinition, CatalogError> {
        let name = name.trim();
        let canonical = ALIASES
            .iter()
            .find(|(alias, _)| *alias == name)
            .map(|(_, target)| *target)
            .unwrap_or(name);
        self.stages
            .iter()
            .find(|s| s.name == canonical)
            .ok_or_else(|| CatalogError::UnknownStage(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &StageDefinition> {
        self.stages.iter()
    }
}
