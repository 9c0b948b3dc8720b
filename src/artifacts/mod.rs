//! File-presence ledger for pipeline artifacts.
//!
//! Every stage output lives at a fixed location under the project root, and its
//! existence is the only record that the stage completed. Nothing here keeps a
//! separate success flag, and nothing here deletes an artifact.

mod architecture;
mod audit_report;

pub use architecture::{ArchitectureMap, Component};
pub use audit_report::{AuditReport, Recommendation};

use crate::errors::{ArtifactError, CatalogError};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

/// Root of the scaffold tree, relative to the project root.
pub const SCAFFOLD_ROOT: &str = "scaffolds/mvc_skeleton";

/// Root of the generated-source tree, relative to the project root.
pub const GENERATED_ROOT: &str = "generated_src";

/// Directory holding the document artifacts.
pub const DATA_DIR: &str = "data";

/// MVC layer selecting the scaffold and generated directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Model,
    View,
    Controller,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Model, Category::View, Category::Controller];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Model => "model",
            Category::View => "view",
            Category::Controller => "controller",
        }
    }

    /// Directory name used on disk (`models`, `views`, `controllers`).
    pub fn plural(&self) -> &'static str {
        match self {
            Category::Model => "models",
            Category::View => "views",
            Category::Controller => "controllers",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "model" | "models" => Ok(Category::Model),
            "view" | "views" => Ok(Category::View),
            "controller" | "controllers" => Ok(Category::Controller),
            _ => Err(CatalogError::InvalidCategory(s.to_string())),
        }
    }
}

/// A named output of some stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Artifact {
    SrsDocument,
    ArchitectureMap,
    Scaffold(Category),
    Generated(Category),
    AuditReport,
}

impl Artifact {
    /// Every artifact in pipeline order.
    pub fn all() -> Vec<Artifact> {
        let mut all = vec![Artifact::SrsDocument, Artifact::ArchitectureMap];
        all.extend(Category::ALL.iter().map(|c| Artifact::Scaffold(*c)));
        all.extend(Category::ALL.iter().map(|c| Artifact::Generated(*c)));
        all.push(Artifact::AuditReport);
        all
    }

    /// Logical name shown to the user.
    pub fn name(&self) -> String {
        self.relative_path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|_| !self.is_directory())
            .unwrap_or_else(|| normalize_separators(&self.relative_path()))
    }

    /// Location relative to the project root.
    pub fn relative_path(&self) -> PathBuf {
        match self {
            Artifact::SrsDocument => Path::new(DATA_DIR).join("srs_document.txt"),
            Artifact::ArchitectureMap => Path::new(DATA_DIR).join("architecture_map.json"),
            Artifact::Scaffold(category) => Path::new(SCAFFOLD_ROOT).join(category.plural()),
            Artifact::Generated(category) => Path::new(GENERATED_ROOT).join(category.plural()),
            Artifact::AuditReport => Path::new(DATA_DIR).join("final_audit_report.json"),
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, Artifact::Scaffold(_) | Artifact::Generated(_))
    }

    /// Name of the stage whose successful run creates this artifact.
    pub fn producer(&self) -> &'static str {
        match self {
            Artifact::SrsDocument => "create-srs",
            Artifact::ArchitectureMap => "extract",
            Artifact::Scaffold(_) => "scaffold",
            Artifact::Generated(_) => "generate-code",
            Artifact::AuditReport => "audit",
        }
    }
}

impl std::fmt::Display for Artifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name())
    }
}

/// Document formats that need a converter the external tool does not have.
pub const REJECTED_EXTENSIONS: [&str; 3] = ["doc", "docx", "pdf"];

/// Read a user-supplied text input, rejecting binary document formats and
/// blank files. Invalid UTF-8 is replaced rather than rejected.
pub fn read_text_source(path: &Path) -> Result<String, ArtifactError> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if REJECTED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ArtifactError::UnsupportedFormat { extension });
    }

    let bytes = std::fs::read(path).map_err(|source| ArtifactError::ReadFailed {
        path: path.to_path_buf(),
        source,
    })?;
    let text = String::from_utf8_lossy(&bytes).into_owned();
    if text.trim().is_empty() {
        return Err(ArtifactError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(text)
}

/// Render a path with forward slashes regardless of the host convention.
pub fn normalize_separators(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Snapshot of one artifact for the ledger view.
#[derive(Debug, Clone)]
pub struct ArtifactStatus {
    pub artifact: Artifact,
    pub path: PathBuf,
    pub exists: bool,
    pub modified: Option<DateTime<Local>>,
}

/// Existence-based state store rooted at one project directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    source_extension: String,
}

impl ArtifactStore {
    /// Create a store rooted at `root`. The root is never re-derived afterwards.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            source_extension: "py".to_string(),
        }
    }

    /// Set the extension that makes a directory artifact count as present.
    pub fn with_source_extension(mut self, extension: &str) -> Self {
        self.source_extension = extension.trim_start_matches('.').to_string();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolved_path(&self, artifact: Artifact) -> PathBuf {
        self.root.join(artifact.relative_path())
    }

    /// Whether the artifact is present.
    ///
    /// A file artifact is present when the file exists. A directory artifact is
    /// present when it holds at least one source file.
    pub fn exists(&self, artifact: Artifact) -> bool {
        let path = self.resolved_path(artifact);
        if artifact.is_directory() {
            !self.source_files(&path).is_empty()
        } else {
            path.is_file()
        }
    }

    pub fn read(&self, artifact: Artifact) -> Result<Vec<u8>, ArtifactError> {
        if artifact.is_directory() {
            return Err(ArtifactError::NotAFile {
                name: artifact.name(),
            });
        }
        let path = self.resolved_path(artifact);
        if !path.is_file() {
            return Err(ArtifactError::NotFound {
                name: artifact.name(),
                path,
            });
        }
        std::fs::read(&path).map_err(|source| ArtifactError::ReadFailed { path, source })
    }

    pub fn read_to_string(&self, artifact: Artifact) -> Result<String, ArtifactError> {
        let bytes = self.read(artifact)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Write the artifact, creating parent directories as needed.
    pub fn write(&self, artifact: Artifact, bytes: &[u8]) -> Result<(), ArtifactError> {
        if artifact.is_directory() {
            return Err(ArtifactError::NotAFile {
                name: artifact.name(),
            });
        }
        let path = self.resolved_path(artifact);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ArtifactError::WriteFailed {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(&path, bytes).map_err(|source| ArtifactError::WriteFailed { path, source })
    }

    /// Source files inside a directory artifact, relative to it and sorted.
    pub fn list_files(&self, artifact: Artifact) -> Vec<PathBuf> {
        let dir = self.resolved_path(artifact);
        self.source_files(&dir)
            .into_iter()
            .filter_map(|p| p.strip_prefix(&dir).ok().map(Path::to_path_buf))
            .collect()
    }

    pub fn status(&self, artifact: Artifact) -> ArtifactStatus {
        let path = self.resolved_path(artifact);
        let modified = std::fs::metadata(&path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Local>::from);
        ArtifactStatus {
            artifact,
            exists: self.exists(artifact),
            path,
            modified,
        }
    }

    /// Status of every known artifact, in pipeline order.
    pub fn ledger(&self) -> Vec<ArtifactStatus> {
        Artifact::all().into_iter().map(|a| self.status(a)).collect()
    }

    /// Wait for any of `candidates` to become visible and return the first
    /// one found.
    ///
    /// Checks once, then re-checks up to `retries` times with `interval` between
    /// checks. Returns `None` if none of them appears.
    pub async fn await_settled(
        &self,
        candidates: &[Artifact],
        retries: u32,
        interval: Duration,
    ) -> Option<Artifact> {
        let present = || candidates.iter().copied().find(|a| self.exists(*a));
        if let Some(found) = present() {
            return Some(found);
        }
        for attempt in 1..=retries {
            tokio::time::sleep(interval).await;
            if let Some(found) = present() {
                tracing::debug!(artifact = %found, attempt, "artifact settled");
                return Some(found);
            }
        }
        None
    }

    pub fn load_architecture(&self) -> Result<ArchitectureMap, ArtifactError> {
        let bytes = self.read(Artifact::ArchitectureMap)?;
        ArchitectureMap::from_slice(&bytes)
    }

    pub fn load_audit_report(&self) -> Result<AuditReport, ArtifactError> {
        let bytes = self.read(Artifact::AuditReport)?;
        AuditReport::from_slice(&bytes)
    }

    fn source_files(&self, dir: &Path) -> Vec<PathBuf> {
        if !dir.is_dir() {
            return Vec::new();
        }
        let mut files: Vec<PathBuf> = WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| {
                p.extension()
                    .map(|ext| ext == self.source_extension.as_str())
                    .unwrap_or(false)
            })
            .collect();
        files.sort();
        files
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tempfile::tempdir;

    #[test]
    fn test_artifact_names_and_paths() {
        assert_eq!(Artifact::SrsDocument.name(), "srs_document.txt");
        assert_eq!(Artifact::ArchitectureMap.name(), "architecture_map.json");
        assert_eq!(Artifact::AuditReport.name(), "final_audit_report.json");
        assert_eq!(
            Artifact::Scaffold(Category::Model).name(),
            "scaffolds/mvc_skeleton/models"
        );
        assert_eq!(
            Artifact::Generated(Category::Controller).name(),
            "generated_src/controllers"
        );
        assert_eq!(
            Artifact::SrsDocument.relative_path(),
            Path::new("data").join("srs_document.txt")
        );
    }

    #[test]
    fn test_artifact_producers() {
        assert_eq!(Artifact::SrsDocument.producer(), "create-srs");
        assert_eq!(Artifact::ArchitectureMap.producer(), "extract");
        assert_eq!(Artifact::Scaffold(Category::View).producer(), "scaffold");
        assert_eq!(Artifact::Generated(Category::View).producer(), "generate-code");
        assert_eq!(Artifact::AuditReport.producer(), "audit");
    }

    #[test]
    fn test_category_parse() {
        assert_eq!("model".parse::<Category>().unwrap(), Category::Model);
        assert_eq!("Views".parse::<Category>().unwrap(), Category::View);
        assert!(matches!(
            "widget".parse::<Category>(),
            Err(CatalogError::InvalidCategory(_))
        ));
    }

    #[test]
    fn test_normalize_separators() {
        assert_eq!(
            normalize_separators(Path::new(r"C:\work\data\srs_document.txt")),
            "C:/work/data/srs_document.txt"
        );
        assert_eq!(normalize_separators(Path::new("/a/b")), "/a/b");
    }

    #[test]
    fn test_write_read_exists() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());

        assert!(!store.exists(Artifact::SrsDocument));
        assert!(matches!(
            store.read(Artifact::SrsDocument),
            Err(ArtifactError::NotFound { .. })
        ));

        store.write(Artifact::SrsDocument, b"Library system").unwrap();
        assert!(store.exists(Artifact::SrsDocument));
        assert_eq!(
            store.read_to_string(Artifact::SrsDocument).unwrap(),
            "Library system"
        );
        assert!(dir.path().join("data/srs_document.txt").is_file());
    }

    #[test]
    fn test_directory_artifact_needs_source_files() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let models = store.resolved_path(Artifact::Scaffold(Category::Model));

        std::fs::create_dir_all(&models).unwrap();
        assert!(!store.exists(Artifact::Scaffold(Category::Model)));

        std::fs::write(models.join("README.md"), "notes").unwrap();
        assert!(!store.exists(Artifact::Scaffold(Category::Model)));

        std::fs::write(models.join("user.py"), "class User: pass").unwrap();
        std::fs::write(models.join("book.py"), "class Book: pass").unwrap();
        assert!(store.exists(Artifact::Scaffold(Category::Model)));
        assert_eq!(
            store.list_files(Artifact::Scaffold(Category::Model)),
            vec![PathBuf::from("book.py"), PathBuf::from("user.py")]
        );
    }

    #[test]
    fn test_custom_source_extension() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path()).with_source_extension(".ts");
        let views = store.resolved_path(Artifact::Generated(Category::View));
        std::fs::create_dir_all(&views).unwrap();
        std::fs::write(views.join("home.py"), "").unwrap();
        assert!(!store.exists(Artifact::Generated(Category::View)));
        std::fs::write(views.join("home.ts"), "").unwrap();
        assert!(store.exists(Artifact::Generated(Category::View)));
    }

    #[test]
    fn test_directory_artifact_cannot_be_read_or_written() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        assert!(matches!(
            store.read(Artifact::Generated(Category::Model)),
            Err(ArtifactError::NotAFile { .. })
        ));
        assert!(store.write(Artifact::Generated(Category::Model), b"x").is_err());
    }

    #[test]
    fn test_read_text_source_accepts_text() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("requirements.md");
        std::fs::write(&path, "# Library system\nUsers borrow books.").unwrap();
        assert!(read_text_source(&path).unwrap().starts_with("# Library"));
    }

    #[test]
    fn test_read_text_source_rejects_documents() {
        let dir = tempdir().unwrap();
        for name in ["srs.pdf", "srs.DOCX", "srs.doc"] {
            let path = dir.path().join(name);
            std::fs::write(&path, "binary").unwrap();
            assert!(
                matches!(
                    read_text_source(&path),
                    Err(ArtifactError::UnsupportedFormat { .. })
                ),
                "{}",
                name
            );
        }
    }

    #[test]
    fn test_read_text_source_rejects_blank_and_missing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("srs.txt");
        std::fs::write(&path, "  \n\n").unwrap();
        assert!(matches!(
            read_text_source(&path),
            Err(ArtifactError::Empty { .. })
        ));
        assert!(matches!(
            read_text_source(&dir.path().join("nope.txt")),
            Err(ArtifactError::ReadFailed { .. })
        ));
    }

    #[test]
    fn test_ledger_reports_every_artifact() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.write(Artifact::ArchitectureMap, b"{}").unwrap();

        let ledger = store.ledger();
        assert_eq!(ledger.len(), 9);
        let arch = ledger
            .iter()
            .find(|s| s.artifact == Artifact::ArchitectureMap)
            .unwrap();
        assert!(arch.exists);
        assert!(arch.modified.is_some());
        let srs = ledger
            .iter()
            .find(|s| s.artifact == Artifact::SrsDocument)
            .unwrap();
        assert!(!srs.exists);
        assert!(srs.modified.is_none());
    }

    #[tokio::test]
    async fn test_await_settled_sees_delayed_write() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let writer = store.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            writer.write(Artifact::AuditReport, b"{}").unwrap();
        });

        let settled = store
            .await_settled(&[Artifact::AuditReport], 10, Duration::from_millis(50))
            .await;
        assert_eq!(settled, Some(Artifact::AuditReport));
    }

    #[tokio::test]
    async fn test_await_settled_gives_up_after_window() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let writer = store.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(600)).await;
            writer.write(Artifact::AuditReport, b"{}").unwrap();
        });

        let start = Instant::now();
        let settled = store
            .await_settled(&[Artifact::AuditReport], 3, Duration::from_millis(50))
            .await;
        assert_eq!(settled, None);
        assert!(start.elapsed() >= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_await_settled_zero_retries_checks_once() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        assert!(
            store
                .await_settled(&[Artifact::SrsDocument], 0, Duration::from_secs(5))
                .await
                .is_none()
        );
        store.write(Artifact::SrsDocument, b"x").unwrap();
        assert!(
            store
                .await_settled(&[Artifact::SrsDocument], 0, Duration::from_secs(5))
                .await
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_await_settled_returns_first_present_candidate() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let controllers = store.resolved_path(Artifact::Scaffold(Category::Controller));
        std::fs::create_dir_all(&controllers).unwrap();
        std::fs::write(controllers.join("loan_controller.py"), "").unwrap();

        let candidates = Category::ALL.map(Artifact::Scaffold);
        assert_eq!(
            store
                .await_settled(&candidates, 0, Duration::from_millis(10))
                .await,
            Some(Artifact::Scaffold(Category::Controller))
        );
    }
}
