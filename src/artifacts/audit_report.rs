use crate::errors::ArtifactError;
use serde::{Deserialize, Serialize};

/// A single finding in the audit report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(default)]
    pub violation_type: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub problem: Option<String>,
}

impl Recommendation {
    pub fn violation_type(&self) -> &str {
        self.violation_type.as_deref().unwrap_or("Violation")
    }

    pub fn file(&self) -> &str {
        self.file.as_deref().unwrap_or("unknown")
    }

    pub fn problem(&self) -> &str {
        self.problem.as_deref().unwrap_or("Issue detected")
    }
}

/// Parsed `final_audit_report.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    #[serde(default)]
    pub passed: bool,
    #[serde(default)]
    pub recommendations: Vec<Recommendation>,
}

impl AuditReport {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ArtifactError> {
        serde_json::from_slice(bytes).map_err(|source| ArtifactError::ParseFailed {
            name: "final_audit_report.json".to_string(),
            source,
        })
    }

    /// The first `limit` recommendations and how many were left out.
    pub fn top(&self, limit: usize) -> (&[Recommendation], usize) {
        let shown = self.recommendations.len().min(limit);
        (
            &self.recommendations[..shown],
            self.recommendations.len() - shown,
        )
    }
}
