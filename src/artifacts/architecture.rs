use super::Category;
use crate::errors::ArtifactError;
use serde::{Deserialize, Serialize};

/// One entry of the architecture map. Only `name` is interpreted; the rest of
/// the object is kept as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Parsed `architecture_map.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArchitectureMap {
    #[serde(default, alias = "models")]
    pub model: Vec<Component>,
    #[serde(default, alias = "views")]
    pub view: Vec<Component>,
    #[serde(default, alias = "controllers")]
    pub controller: Vec<Component>,
}

impl ArchitectureMap {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ArtifactError> {
        serde_json::from_slice(bytes).map_err(|source| ArtifactError::ParseFailed {
            name: "architecture_map.json".to_string(),
            source,
        })
    }

    pub fn components(&self, category: Category) -> &[Component] {
        match category {
            Category::Model => &self.model,
            Category::View => &self.view,
            Category::Controller => &self.controller,
        }
    }

    pub fn names(&self, category: Category) -> Vec<&str> {
        self.components(category)
            .iter()
            .map(|c| c.name.as_str())
            .collect()
    }

    pub fn total(&self) -> usize {
        self.model.len() + self.view.len() + self.controller.len()
    }
}
