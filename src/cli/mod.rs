//! Command-line interface for dockhand.
//!
//! Provides the `run` and `analyze` commands.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, AnalyzeArgs, Cli, Commands, RunArgs};
