//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

/// IntentComposer - negotiate TMF921 intents from free-text requests
#[derive(Parser)]
#[command(
    name = "ic",
    about = "Interactive negotiation of TMF921 service intents",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Override the gateway base URL from the config
    #[arg(short = 'u', long = "base-url", global = true)]
    pub base_url: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start an interactive negotiation (default)
    Repl {
        /// Request to submit immediately
        request: Option<String>,
    },

    /// Check that the intent backend is reachable
    Health,

    /// Classify a request once and print the category
    Classify {
        /// Request text
        text: String,
    },

    /// Print the effective configuration as YAML
    Config,
}

/// Path of the log file written by `setup_logging`
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("intentcomposer")
        .join("logs")
        .join("intentcomposer.log");
    debug!(?path, "get_log_path: returning path");
    path
}
