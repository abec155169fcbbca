//! IntentComposer - interactive TMF921 intent negotiation
//!
//! CLI entry point.

use std::fs;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info};

use intentcomposer::cli::{Cli, Command, get_log_path};
use intentcomposer::config::Config;
use intentcomposer::gateway::{ClassifyRequest, Gateway, create_gateway};
use intentcomposer::repl;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    if let Some(base_url) = cli.base_url {
        debug!(%base_url, "main: overriding base-url from CLI");
        config.gateway.base_url = base_url;
    }
    config.validate().context("Invalid configuration")?;

    info!("IntentComposer loaded config: base-url={}", config.gateway.base_url);

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        None => repl::run_interactive(&config, None).await,
        Some(Command::Repl { request }) => repl::run_interactive(&config, request).await,
        Some(Command::Health) => cmd_health(&config).await,
        Some(Command::Classify { text }) => cmd_classify(&config, text).await,
        Some(Command::Config) => cmd_config(&config),
    }
}

/// Probe the backend's health endpoint
async fn cmd_health(config: &Config) -> Result<()> {
    debug!("cmd_health: called");
    let gateway = create_gateway(&config.gateway).context("Failed to create gateway")?;

    let health = gateway
        .health()
        .await
        .context(format!("Backend at {} is not reachable", config.gateway.base_url))?;

    if health.is_healthy() {
        println!("{} {} ({})", "✓".green(), config.gateway.base_url, health.status);
    } else {
        println!("{} {} ({})", "✗".red(), config.gateway.base_url, health.status);
    }
    for (key, value) in &health.details {
        println!("  {}: {}", key, value);
    }
    Ok(())
}

/// One-shot classification of a request
async fn cmd_classify(config: &Config, text: String) -> Result<()> {
    debug!(text_len = text.len(), "cmd_classify: called");
    if text.trim().is_empty() {
        return Err(eyre::eyre!("Request text is empty"));
    }

    let gateway = create_gateway(&config.gateway).context("Failed to create gateway")?;
    let response = gateway
        .classify(&ClassifyRequest {
            user_input: text.trim().to_string(),
        })
        .await
        .context("Classification failed")?;

    println!("{}", response.kind.to_string().bold());
    if !response.message.is_empty() {
        println!("{}", response.message);
    }
    Ok(())
}

/// Print the effective configuration
fn cmd_config(config: &Config) -> Result<()> {
    debug!("cmd_config: called");
    let yaml = serde_yaml::to_string(config).context("Failed to serialize config")?;
    print!("{}", yaml);
    Ok(())
}
