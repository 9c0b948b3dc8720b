pub mod artifacts;
pub mod clarify;
pub mod config;
pub mod diagnostics;
pub mod errors;
pub mod orchestrator;
pub mod process;
pub mod project_config;
pub mod stage;
pub mod ui;
