//! Configuration loading and config file resolution
//!
//! Config file priority order:
//! 1. Command-line argument (highest priority)
//! 2. `SPOTSCRAPE_CONFIG` environment variable
//! 3. `<config_dir>/spotscrape/config.toml` (OS-dependent default)
//!
//! A missing default file is not an error: compiled defaults are used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "SPOTSCRAPE_CONFIG";

/// Top-level TOML configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpotScrapeConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub spotify: SpotifyConfig,
    pub openai: OpenAiConfig,
    pub retry: RetryConfig,
    pub session: SessionConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5723,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Spotify credentials as written in the TOML file
///
/// Environment variables take precedence, see the service crate's
/// credential resolution.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpotifyConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
    pub access_token: Option<String>,
    /// Market used for album searches and top-track popularity
    pub market: Option<String>,
}

/// OpenAI-compatible chat completions settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    /// Upper bound for a single analyzed text chunk
    pub max_chunk_chars: usize,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            max_chunk_chars: 4000,
            temperature: 0.0,
            max_tokens: 1000,
        }
    }
}

/// Retry/backoff settings applied to every outbound call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub backoff_rate: f64,
    pub max_delay_ms: u64,
    /// Per-attempt deadline
    pub timeout_ms: u64,
    /// Outbound calls allowed in flight at once
    pub max_concurrency: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            backoff_rate: 2.0,
            max_delay_ms: 10_000,
            timeout_ms: 30_000,
            max_concurrency: 4,
        }
    }
}

/// Session store settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum retained message log entries (oldest evicted first)
    pub message_log_limit: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            message_log_limit: 500,
        }
    }
}

impl SpotScrapeConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SpotScrapeConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the service misbehave
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(Error::Config("retry.max_attempts must be at least 1".to_string()));
        }
        if self.retry.backoff_rate < 1.0 {
            return Err(Error::Config("retry.backoff_rate must be >= 1.0".to_string()));
        }
        if self.retry.max_concurrency == 0 {
            return Err(Error::Config("retry.max_concurrency must be at least 1".to_string()));
        }
        if self.retry.timeout_ms == 0 {
            return Err(Error::Config("retry.timeout_ms must be positive".to_string()));
        }
        if self.openai.max_chunk_chars == 0 {
            return Err(Error::Config("openai.max_chunk_chars must be positive".to_string()));
        }
        if self.session.message_log_limit == 0 {
            return Err(Error::Config("session.message_log_limit must be positive".to_string()));
        }
        Ok(())
    }
}

/// Where a resolved config path came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    CommandLine,
    Environment,
    Default,
}

/// Resolve the config file path following the priority order above
///
/// Returns `None` only when the platform has no config directory.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<(PathBuf, ConfigSource)> {
    if let Some(path) = cli_arg {
        return Some((path.to_path_buf(), ConfigSource::CommandLine));
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some((PathBuf::from(path), ConfigSource::Environment));
        }
    }

    default_config_path().map(|p| (p, ConfigSource::Default))
}

/// OS-dependent default config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("spotscrape").join("config.toml"))
}

/// Load configuration
///
/// An explicitly named file (CLI or environment) must exist. A missing
/// default file logs a warning and falls back to compiled defaults.
pub fn load_config(cli_arg: Option<&Path>) -> Result<SpotScrapeConfig> {
    let Some((path, source)) = resolve_config_path(cli_arg) else {
        warn!("No config directory for this platform, using defaults");
        return Ok(SpotScrapeConfig::default());
    };

    if !path.exists() {
        if source == ConfigSource::Default {
            warn!("Config file not found at {}, using defaults", path.display());
            return Ok(SpotScrapeConfig::default());
        }
        return Err(Error::Config(format!(
            "Config file not found: {}",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(&path)?;
    let config = SpotScrapeConfig::from_toml_str(&content)?;
    info!("Loaded config from {}", path.display());
    Ok(config)
}

/// Write configuration back to disk (creates parent directories)
pub fn write_config(config: &SpotScrapeConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;
    std::fs::write(path, content)?;
    Ok(())
}
