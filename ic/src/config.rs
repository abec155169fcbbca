//! Intent composer configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Intent backend connection
    pub gateway: GatewayConfig,

    /// Negotiation limits
    pub negotiation: NegotiationConfig,

    /// Intent export
    pub export: ExportConfig,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.gateway.base_url)
            .context(format!("Invalid gateway base-url '{}'", self.gateway.base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(eyre::eyre!(
                "Gateway base-url must use http or https, got '{}'",
                url.scheme()
            ));
        }
        if self.gateway.timeout_ms == 0 {
            return Err(eyre::eyre!("Gateway timeout-ms must be greater than zero"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .intentcomposer.yml
        let local_config = PathBuf::from(".intentcomposer.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/intentcomposer/intentcomposer.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("intentcomposer").join("intentcomposer.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read just the log level, before logging is set up
    ///
    /// Errors are swallowed; the full load reports them once logging works.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates: Vec<PathBuf> = match config_path {
            Some(path) => vec![path.clone()],
            None => {
                let mut paths = vec![PathBuf::from(".intentcomposer.yml")];
                if let Some(config_dir) = dirs::config_dir() {
                    paths.push(config_dir.join("intentcomposer").join("intentcomposer.yml"));
                }
                paths
            }
        };

        candidates
            .iter()
            .filter(|p| p.exists())
            .find_map(|p| Self::load_from_file(p).ok())
            .and_then(|c| c.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Intent backend connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Retries for transient failures (network, 408/429/5xx)
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Initial backoff between retries in milliseconds, doubled each attempt
    #[serde(rename = "retry-backoff-ms")]
    pub retry_backoff_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            // decomposition runs an LLM plus a vector search per service
            timeout_ms: 120_000,
            max_retries: 2,
            retry_backoff_ms: 500,
        }
    }
}

/// Negotiation limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NegotiationConfig {
    /// Clarification rounds allowed before the user must finish
    #[serde(rename = "max-clarification-rounds")]
    pub max_clarification_rounds: u32,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            max_clarification_rounds: 5,
        }
    }
}

/// Intent export
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Directory exported intents are written to
    pub dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self { dir: PathBuf::from(".") }
    }
}
