//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// refine-rs: tool-calling agents with a reflect-and-revise loop.
///
/// Runs a registered agent against a local Ollama server or a hosted
/// `OpenAI`-compatible backend, optionally critiquing and revising the
/// answer before it is printed.
#[derive(Parser, Debug)]
#[command(name = "refine-rs")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to a JSON settings file.
    ///
    /// Defaults to `<config dir>/refine-rs/config.json` when it exists.
    #[arg(short, long, env = "REFINE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run an agent on one input.
    #[command(after_help = r#"Examples:
  refine-rs invoke "讲个笑话"                      # Default agent and backend
  refine-rs invoke --reflect "讲个程序员笑话"      # Critique and revise once or twice
  refine-rs invoke -b deepseek --max-reflections 1 "讲个笑话"
"#)]
    Invoke {
        /// User input.
        input: String,

        /// Agent name (defaults to the configured default agent).
        #[arg(short, long)]
        agent: Option<String>,

        /// Backend to run on (ollama, gemini, deepseek).
        #[arg(short, long)]
        backend: Option<String>,

        /// Enable the reflection strategy for this run.
        #[arg(long)]
        reflect: bool,

        /// Maximum revise rounds for reflection.
        #[arg(long)]
        max_reflections: Option<usize>,

        /// Skip every enhancement strategy.
        #[arg(long, conflicts_with_all = ["reflect", "max_reflections"])]
        no_enhance: bool,
    },

    /// List registered agents.
    Agents,

    /// List registered tools.
    Tools {
        /// Only tools of this group.
        #[arg(short, long)]
        group: Option<String>,
    },

    /// List backends and whether each is configured.
    Backends,

    /// Show or change settings.
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Settings subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the effective settings (API keys masked).
    Show,

    /// Update settings and write them back to the settings file.
    #[command(after_help = r#"Examples:
  refine-rs config set --backend gemini --api-key "$GOOGLE_API_KEY"
  refine-rs config set --api-key sk-...          # Key for the active keyed backend, else deepseek
  refine-rs config set --backend ollama --model qwen2.5:7b
"#)]
    Set {
        /// New active backend.
        #[arg(short, long)]
        backend: Option<String>,

        /// New default agent.
        #[arg(short, long)]
        agent: Option<String>,

        /// Model for the target backend.
        #[arg(short, long)]
        model: Option<String>,

        /// API key for the target backend.
        #[arg(long)]
        api_key: Option<String>,

        /// Service URL for the target backend.
        #[arg(long)]
        base_url: Option<String>,

        /// Sampling temperature for the target backend.
        #[arg(long)]
        temperature: Option<f32>,
    },
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap_or_else(|e| panic!("parse failed: {e}"))
    }

    #[test]
    fn test_parse_invoke() {
        let cli = parse(&[
            "refine-rs",
            "invoke",
            "--reflect",
            "--max-reflections",
            "1",
            "-b",
            "gemini",
            "讲个笑话",
        ]);
        match cli.command {
            Commands::Invoke {
                input,
                backend,
                reflect,
                max_reflections,
                no_enhance,
                ..
            } => {
                assert_eq!(input, "讲个笑话");
                assert_eq!(backend.as_deref(), Some("gemini"));
                assert!(reflect);
                assert_eq!(max_reflections, Some(1));
                assert!(!no_enhance);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_no_enhance_conflicts_with_reflect() {
        let result = Cli::try_parse_from(["refine-rs", "invoke", "--reflect", "--no-enhance", "x"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = parse(&["refine-rs", "config", "show", "--format", "json", "-c", "cfg.json"]);
        assert_eq!(cli.format, "json");
        assert_eq!(cli.config, Some(PathBuf::from("cfg.json")));
        assert!(matches!(cli.command, Commands::Config(ConfigCommands::Show)));
    }
}
