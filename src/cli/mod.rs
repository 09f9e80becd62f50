//! Command-line interface for bugforge.
//!
//! Provides commands for building datasets from search queries and
//! inspecting existing dataset files.

mod commands;

pub use commands::{parse_cli, run_with_cli, BuildArgs, Cli, Commands, InspectArgs};
