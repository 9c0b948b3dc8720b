use crate::process::ProcessInvocation;
use crate::stage::StageDefinition;
use std::collections::BTreeMap;
use std::path::Path;

/// Environment entry that is always set for the tool.
pub const IO_ENCODING_VAR: (&str, &str) = ("PYTHONIOENCODING", "utf-8");

/// How the external tool is launched:
/// `<program> <entrypoint...> <subcommand> <args...>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub entrypoint: Vec<String>,
    pub env: BTreeMap<String, String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>, entrypoint: Vec<String>) -> Self {
        Self {
            program: program.into(),
            entrypoint,
            env: BTreeMap::new(),
        }
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Build the invocation for one stage, run from `working_dir`.
    pub fn invocation(
        &self,
        stage: &StageDefinition,
        args: Vec<String>,
        working_dir: &Path,
    ) -> ProcessInvocation {
        ProcessInvocation::new(stage.name, self.program.clone(), working_dir)
            .args(self.entrypoint.iter().cloned())
            .args([stage.subcommand])
            .args(args)
            .env(IO_ENCODING_VAR.0, IO_ENCODING_VAR.1)
            .envs(&self.env)
    }
}
