//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module          | Commands handled                                             |
//! |-----------------|--------------------------------------------------------------|
//! | `stages`        | `CreateSrs`, `Extract`, `Scaffold`, `GenerateCode`, `Audit`, `Fix` |
//! | `run`           | `Run`                                                        |
//! | `project`       | `Init`, `ImportSrs`, `Status`                                |
//! | `config`        | `Config`                                                     |
//!
//! `session` holds the wiring shared by every command that runs a stage.

pub mod config;
pub mod project;
pub mod run;
pub mod session;
pub mod stages;

pub use config::cmd_config;
pub use project::{cmd_import_srs, cmd_init, cmd_status};
pub use run::cmd_run;
pub use stages::{cmd_audit, cmd_create_srs, cmd_extract, cmd_fix, cmd_generate_code, cmd_scaffold};
