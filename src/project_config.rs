//! File-backed configuration for the orchestrator.
//!
//! Settings are read from `.mvc/config.toml` under the project root. Every
//! section is optional; a missing file yields the defaults.
//!
//! # Configuration File Format
//!
//! ```toml
//! [tool]
//! interpreter = "python"
//! entrypoint = ["-m", "src.cli.mvc_arch_cli"]
//! env = { PYTHONIOENCODING = "utf-8" }
//!
//! [runner]
//! max_output_bytes = 10485760
//! default_timeout_secs = 120
//! silent_exit = "expected"
//!
//! [settle]
//! initial_delay_ms = 500
//! retries = 3
//! interval_ms = 300
//!
//! [artifacts]
//! source_extension = "py"
//!
//! [stages.overrides."generate-*"]
//! timeout_secs = 600
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Name of the per-project configuration directory.
pub const CONFIG_DIR: &str = ".mvc";

/// Name of the configuration file inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "config.toml";

/// How a non-zero exit with no diagnostic output is classified.
///
/// | Policy     | Classification        | Use when                                     |
/// |------------|-----------------------|----------------------------------------------|
/// | `Expected` | `ExpectedTermination` | The tool exits non-zero for benign reasons   |
/// | `Failure`  | `RealFailure`         | The tool reports errors only via exit code   |
///
/// `Expected` is the default; the artifact check still catches a stage that
/// produced nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SilentExitPolicy {
    #[default]
    Expected,
    Failure,
}

impl std::fmt::Display for SilentExitPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SilentExitPolicy::Expected => write!(f, "expected"),
            SilentExitPolicy::Failure => write!(f, "failure"),
        }
    }
}

/// External tool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSection {
    /// Interpreter executable. When unset, `MVC_PYTHON` and the project's
    /// `.venv` are consulted before falling back to `python`.
    #[serde(default)]
    pub interpreter: Option<String>,
    /// Arguments placed between the interpreter and the stage subcommand
    #[serde(default = "default_entrypoint")]
    pub entrypoint: Vec<String>,
    /// Extra environment variables for the child process
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

fn default_entrypoint() -> Vec<String> {
    vec!["-m".to_string(), "src.cli.mvc_arch_cli".to_string()]
}

impl Default for ToolSection {
    fn default() -> Self {
        Self {
            interpreter: None,
            entrypoint: default_entrypoint(),
            env: BTreeMap::new(),
        }
    }
}

/// Process runner settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerSection {
    /// Per-stream capture cap in bytes
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
    /// Timeout applied to stages that do not set their own; `0` disables it
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,
    /// Classification of a silent non-zero exit
    #[serde(default)]
    pub silent_exit: SilentExitPolicy,
}

fn default_max_output_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for RunnerSection {
    fn default() -> Self {
        Self {
            max_output_bytes: default_max_output_bytes(),
            default_timeout_secs: default_timeout_secs(),
            silent_exit: SilentExitPolicy::default(),
        }
    }
}

/// Settle window used when waiting for an output artifact to appear.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettleSection {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_retries() -> u32 {
    3
}

fn default_interval_ms() -> u64 {
    300
}

impl Default for SettleSection {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            retries: default_retries(),
            interval_ms: default_interval_ms(),
        }
    }
}

impl SettleSection {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Artifact layout settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsSection {
    /// Extension of the source files that make a directory artifact "present"
    #[serde(default = "default_source_extension")]
    pub source_extension: String,
}

fn default_source_extension() -> String {
    "py".to_string()
}

impl Default for ArtifactsSection {
    fn default() -> Self {
        Self {
            source_extension: default_source_extension(),
        }
    }
}

/// Stage-specific override settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageOverride {
    /// Override timeout in seconds; `0` disables the timeout
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Stage override configuration section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StagesConfig {
    /// Pattern-based overrides (e.g., "generate-*" -> StageOverride)
    #[serde(default)]
    pub overrides: BTreeMap<String, StageOverride>,
}

/// The complete `.mvc/config.toml` structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectToml {
    #[serde(default)]
    pub tool: ToolSection,
    #[serde(default)]
    pub runner: RunnerSection,
    #[serde(default)]
    pub settle: SettleSection,
    #[serde(default)]
    pub artifacts: ArtifactsSection,
    #[serde(default)]
    pub stages: StagesConfig,
}

impl ProjectToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config.toml")
    }

    /// Load configuration from `<root>/.mvc/config.toml`.
    /// Returns default configuration if the file doesn't exist.
    pub fn load_or_default(project_dir: &Path) -> Result<Self> {
        let config_path = project_dir.join(CONFIG_DIR).join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Effective timeout for a stage, applying the first matching override.
    ///
    /// `default` is the catalog's built-in timeout for the stage. An override of
    /// `0` seconds disables the timeout.
    pub fn stage_timeout(&self, stage_name: &str, default: Option<Duration>) -> Option<Duration> {
        for (pattern, override_cfg) in &self.stages.overrides {
            if pattern_matches(pattern, stage_name)
                && let Some(secs) = override_cfg.timeout_secs
            {
                return (secs > 0).then(|| Duration::from_secs(secs));
            }
        }
        default
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.runner.max_output_bytes == 0 {
            warnings.push("runner.max_output_bytes is 0: no output will be captured".to_string());
        }
        if self.runner.default_timeout_secs == 0 {
            warnings.push("runner.default_timeout_secs is 0: stages without their own timeout run unbounded".to_string());
        }
        if self.settle.retries == 0 && self.settle.initial_delay_ms == 0 {
            warnings.push(
                "settle window is empty: output artifacts are checked exactly once".to_string(),
            );
        }
        if self.tool.entrypoint.is_empty() {
            warnings.push("tool.entrypoint is empty: the interpreter receives the stage directly".to_string());
        }
        if self.artifacts.source_extension.starts_with('.') {
            warnings.push(format!(
                "artifacts.source_extension '{}' should not include the leading dot",
                self.artifacts.source_extension
            ));
        }

        for pattern in self.stages.overrides.keys() {
            if !crate::stage::STAGE_NAMES
                .iter()
                .any(|name| pattern_matches(pattern, name))
            {
                warnings.push(format!(
                    "Override pattern '{}' does not match any stage",
                    pattern
                ));
            }
        }

        warnings
    }
}

/// Check if a pattern matches a stage name.
/// Supports simple glob patterns:
/// - `*` matches any sequence of characters
/// - `?` matches any single character
pub fn pattern_matches(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();
    let name: Vec<char> = name.to_lowercase().chars().collect();
    glob_match(&pattern, &name)
}

fn glob_match(pattern: &[char], text: &[char]) -> bool {
    match pattern.split_first() {
        None => text.is_empty(),
        Some(('*', rest)) => (0..=text.len()).any(|i| glob_match(rest, &text[i..])),
        Some(('?', rest)) => !text.is_empty() && glob_match(rest, &text[1..]),
        Some((c, rest)) => text.first() == Some(c) && glob_match(rest, &text[1..]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_silent_exit_policy_display_and_deserialize() {
        assert_eq!(SilentExitPolicy::Expected.to_string(), "expected");
        let toml = ProjectToml::parse("[runner]\nsilent_exit = \"failure\"\n").unwrap();
        assert_eq!(toml.runner.silent_exit, SilentExitPolicy::Failure);
        let err = ProjectToml::parse("[runner]\nsilent_exit = \"loud\"\n").unwrap_err();
        assert!(format!("{:#}", err).contains("loud"));
    }

    #[test]
    fn test_pattern_matches() {
        assert!(pattern_matches("generate-*", "generate-code"));
        assert!(pattern_matches("*", "audit"));
        assert!(pattern_matches("aud?t", "audit"));
        assert!(pattern_matches("EXTRACT", "extract"));
        assert!(!pattern_matches("generate-*", "scaffold"));
        assert!(!pattern_matches("fix?", "fix"));
    }

    #[test]
    fn test_parse_empty_uses_defaults() {
        let toml = ProjectToml::parse("").unwrap();
        assert_eq!(toml.runner.max_output_bytes, 10 * 1024 * 1024);
        assert_eq!(toml.runner.default_timeout_secs, 120);
        assert_eq!(toml.runner.silent_exit, SilentExitPolicy::Expected);
        assert_eq!(toml.settle.retries, 3);
        assert_eq!(toml.settle.interval_ms, 300);
        assert_eq!(toml.settle.initial_delay_ms, 500);
        assert_eq!(toml.tool.entrypoint, vec!["-m", "src.cli.mvc_arch_cli"]);
        assert_eq!(toml.artifacts.source_extension, "py");
    }

    #[test]
    fn test_parse_full() {
        let content = r#"
[tool]
interpreter = "/usr/bin/python3"
entrypoint = ["tool.py"]
env = { FOO = "bar" }

[runner]
max_output_bytes = 1024
silent_exit = "failure"

[settle]
retries = 5
interval_ms = 50
initial_delay_ms = 0

[stages.overrides."generate-*"]
timeout_secs = 600
"#;
        let toml = ProjectToml::parse(content).unwrap();
        assert_eq!(toml.tool.interpreter.as_deref(), Some("/usr/bin/python3"));
        assert_eq!(toml.tool.entrypoint, vec!["tool.py"]);
        assert_eq!(toml.tool.env.get("FOO").map(String::as_str), Some("bar"));
        assert_eq!(toml.runner.max_output_bytes, 1024);
        assert_eq!(toml.runner.default_timeout_secs, 120);
        assert_eq!(toml.runner.silent_exit, SilentExitPolicy::Failure);
        assert_eq!(toml.settle.retries, 5);
        assert_eq!(toml.settle.interval(), Duration::from_millis(50));
    }

    #[test]
    fn test_stage_timeout_override() {
        let content = r#"
[stages.overrides."generate-*"]
timeout_secs = 600

[stages.overrides.audit]
timeout_secs = 0
"#;
        let toml = ProjectToml::parse(content).unwrap();
        let default = Some(Duration::from_secs(120));
        assert_eq!(
            toml.stage_timeout("generate-code", default),
            Some(Duration::from_secs(600))
        );
        assert_eq!(toml.stage_timeout("audit", default), None);
        assert_eq!(toml.stage_timeout("extract", default), default);
    }

    #[test]
    fn test_validate_flags_unmatched_override() {
        let content = r#"
[stages.overrides."deploy-*"]
timeout_secs = 10
"#;
        let toml = ProjectToml::parse(content).unwrap();
        let warnings = toml.validate();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("deploy-*"));
    }

    #[test]
    fn test_validate_notes_disabled_default_timeout() {
        let toml = ProjectToml::parse("[runner]\ndefault_timeout_secs = 0\n").unwrap();
        let warnings = toml.validate();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("run unbounded"));
    }

    #[test]
    fn test_validate_default_is_clean() {
        assert!(ProjectToml::default().validate().is_empty());
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let err = ProjectToml::parse("[runner\nmax_output_bytes = 1").unwrap_err();
        assert!(err.to_string().contains("Failed to parse config.toml"));
    }

    #[test]
    fn test_load_or_default_and_save_roundtrip() {
        let dir = tempdir().unwrap();
        let missing = ProjectToml::load_or_default(dir.path()).unwrap();
        assert_eq!(missing.settle.retries, 3);

        let config_dir = dir.path().join(CONFIG_DIR);
        std::fs::create_dir_all(&config_dir).unwrap();
        let mut toml = ProjectToml::default();
        toml.settle.retries = 9;
        toml.save(&config_dir.join(CONFIG_FILE)).unwrap();

        let loaded = ProjectToml::load_or_default(dir.path()).unwrap();
        assert_eq!(loaded.settle.retries, 9);
    }
}
