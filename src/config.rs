//! Configuration module for the dx-relay bridge.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

/// Command-line arguments for the relay
#[derive(Parser, Debug)]
#[command(name = "dx-relay")]
#[command(author = "dx-relay authors")]
#[command(version = "0.1.0")]
#[command(about = "Relays N3FJP call tab events to HamClock", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// N3FJP API server host
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// N3FJP API server port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Comma-delimited list of HamClock base URIs
    /// (e.g., http://clock1.local:8080,http://clock2.local:8080)
    #[arg(short, long)]
    pub targets: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub hamclock: HamClockConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// N3FJP API connection configuration
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    /// N3FJP API server host
    #[serde(default = "default_host")]
    pub host: String,
    /// N3FJP API server port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// HamClock target configuration
#[derive(Debug, Deserialize, Default)]
pub struct HamClockConfig {
    /// Comma-delimited list of HamClock base URIs
    #[serde(default)]
    pub targets: String,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    // N3FJP API server default port
    1100
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub targets: String,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = CliArgs::parse();
        Self::merge(cli)
    }

    fn merge(cli: CliArgs) -> Result<Self, ConfigError> {
        // Load TOML config if specified
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        // Merge CLI args with TOML config (CLI takes precedence)
        Ok(Config {
            host: cli.host.unwrap_or(toml_config.api.host),
            port: cli.port.unwrap_or(toml_config.api.port),
            targets: cli.targets.unwrap_or(toml_config.hamclock.targets),
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        })
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TomlConfig::default();
        assert_eq!(config.api.host, "127.0.0.1");
        assert_eq!(config.api.port, 1100);
        assert_eq!(config.hamclock.targets, "");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
            [api]
            host = "10.0.0.5"
            port = 1101

            [hamclock]
            targets = "http://clock1.local:8080, http://clock2.local:8080/"

            [logging]
            level = "trace"
        "#;

        let config: TomlConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.api.host, "10.0.0.5");
        assert_eq!(config.api.port, 1101);
        assert_eq!(
            config.hamclock.targets,
            "http://clock1.local:8080, http://clock2.local:8080/"
        );
        assert_eq!(config.logging.level, "trace");
    }

    #[test]
    fn test_cli_precedence() {
        let cli = CliArgs {
            config: None,
            host: Some("logger.shack".to_string()),
            port: None,
            targets: Some("http://clock.local:8080".to_string()),
            log_level: "info".to_string(),
        };

        let config = Config::merge(cli).unwrap();
        assert_eq!(config.host, "logger.shack");
        assert_eq!(config.port, 1100);
        assert_eq!(config.targets, "http://clock.local:8080");
    }
}
