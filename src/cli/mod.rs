//! CLI layer for refine-rs.
//!
//! Provides the command-line interface using clap, with commands for
//! invoking agents and inspecting or changing settings.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::{execute, load_settings};
pub use output::OutputFormat;
pub use parser::{Cli, Commands, ConfigCommands};
