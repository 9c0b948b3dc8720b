//! Typed error hierarchy for the orchestrator.
//!
//! Three enums cover the library seams:
//! - `CatalogError`: stage lookup and argument building
//! - `ArtifactError`: artifact ledger reads and writes
//! - `ClarifyError`: prompt backend failures during clarification
//!
//! None of these escape `PipelineOrchestrator::run_stage`; the orchestrator folds
//! them into a `StageFailure` on the returned report.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from resolving a stage or building its arguments.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Unknown stage '{0}'")]
    UnknownStage(String),

    #[error("Stage {stage} requires {parameter}")]
    MissingParameter {
        stage: &'static str,
        parameter: &'static str,
    },

    #[error("Invalid category '{0}'. Valid values: model, view, controller")]
    InvalidCategory(String),
}

/// Errors from the artifact store.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Artifact {name} not found at {path}")]
    NotFound { name: String, path: PathBuf },

    #[error("Failed to read artifact at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write artifact at {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {name}: {source}")]
    ParseFailed {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{name} is a directory artifact and cannot be read as a file")]
    NotAFile { name: String },

    #[error(
        "'.{extension}' files are not supported. Save the document as plain text (.txt or .md) and try again."
    )]
    UnsupportedFormat { extension: String },

    #[error("{} is empty", path.display())]
    Empty { path: PathBuf },
}

/// Errors from the prompt backend.
///
/// A human cancelling is not an error; it is `Ok(None)` from the prompter.
#[derive(Debug, Error)]
pub enum ClarifyError {
    #[error("Prompt failed: {0}")]
    Prompt(String),

    #[error("Question {question} has no option at index {index}")]
    InvalidSelection { question: String, index: usize },
}

impl From<dialoguer::Error> for ClarifyError {
    fn from(err: dialoguer::Error) -> Self {
        ClarifyError::Prompt(err.to_string())
    }
}
