//! CLI entry point for sluice.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Sluice CLI
#[derive(Parser, Debug)]
#[command(name = "sluice", version, about = "Streaming agent orchestrator CLI")]
pub struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one chat turn and print its event frames
    Chat(ChatArgs),
    /// List built-in tools
    Tools,
}

/// Arguments for the `chat` subcommand.
#[derive(Parser, Debug)]
pub struct ChatArgs {
    /// User prompt
    pub prompt: String,

    /// Model id (overrides config)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Agent instructions (overrides config)
    #[arg(short, long)]
    pub instructions: Option<String>,

    /// Completion/tool rounds allowed for this turn
    #[arg(long)]
    pub max_iterations: Option<u32>,

    /// User id the tools act for
    #[arg(long, default_value = "cli")]
    pub user: String,

    /// Built-in tools to offer the model (repeatable; default: all)
    #[arg(short, long = "tool")]
    pub tools: Vec<String>,

    /// Warehouse schema JSON to include in the developer preamble
    #[arg(long)]
    pub schema: Option<String>,
}

/// Install the global tracing subscriber. Logs go to stderr so stdout stays
/// a clean frame stream.
pub fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default = if verbose { "sluice=debug" } else { "sluice=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
