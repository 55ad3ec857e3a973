//! Configuration management
//!
//! This module provides YAML-based configuration management with support for:
//! - Environment variable overrides
//! - Multiple configuration file locations
//! - Default values for all settings

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub openssl: OpensslConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Report changes without applying them
    #[serde(default)]
    pub noop: bool,
}

/// OpenSSL invocation settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OpensslConfig {
    /// Path to the openssl binary
    #[serde(default = "default_openssl_binary")]
    pub binary_path: PathBuf,
    /// Timeout for a single openssl invocation in seconds
    #[serde(default = "default_openssl_timeout")]
    pub timeout_secs: u64,
}

fn default_openssl_binary() -> PathBuf {
    PathBuf::from("openssl")
}

fn default_openssl_timeout() -> u64 {
    60
}

impl Default for OpensslConfig {
    fn default() -> Self {
        Self {
            binary_path: default_openssl_binary(),
            timeout_secs: default_openssl_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    /// Log output target (console or file)
    #[serde(default = "default_log_target")]
    pub target: LogTarget,
    /// Directory for log files (used when target is "file")
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// Log file name prefix
    #[serde(default = "default_log_prefix")]
    pub log_prefix: String,
    /// Enable daily log rotation
    #[serde(default = "default_log_rotation")]
    pub daily_rotation: bool,
}

/// Log output target
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    /// Log to stderr
    #[default]
    Console,
    /// Log to file with optional rotation
    File,
    /// Log to both console and file
    Both,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

fn default_log_target() -> LogTarget {
    LogTarget::Console
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("/var/log/openvox/x509")
}

fn default_log_prefix() -> String {
    "openvox-x509".to_string()
}

fn default_log_rotation() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            target: default_log_target(),
            log_dir: default_log_dir(),
            log_prefix: default_log_prefix(),
            daily_rotation: default_log_rotation(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values
    /// 2. Configuration file (YAML)
    /// 3. Environment variables (prefixed with OPENVOX_X509_)
    pub fn load() -> Result<Self> {
        // Try to load .env file if it exists
        let _ = dotenvy::dotenv();

        let config_path = std::env::var("OPENVOX_X509_CONFIG")
            .map(PathBuf::from)
            .ok()
            .or_else(Self::find_config_file);

        let mut config = match config_path {
            Some(ref path) if path.exists() => Self::from_file(path)?,
            Some(ref path) => {
                // Logging is not up yet
                eprintln!("[CONFIG] Config file not found: {:?}, using defaults", path);
                AppConfig::default()
            }
            None => AppConfig::default(),
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parse a configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        serde_norway::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Find the configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let paths = [
            // Current directory
            PathBuf::from("config.yaml"),
            PathBuf::from("config/config.yaml"),
            // System config directory
            PathBuf::from("/etc/openvox-x509/config.yaml"),
            // User config directory
            dirs::config_dir()
                .map(|p| p.join("openvox-x509/config.yaml"))
                .unwrap_or_default(),
        ];

        paths.into_iter().find(|p| p.exists())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(binary) = std::env::var("OPENVOX_X509_OPENSSL") {
            self.openssl.binary_path = PathBuf::from(binary);
        }
        if let Ok(timeout) = std::env::var("OPENVOX_X509_TIMEOUT") {
            if let Ok(t) = timeout.parse() {
                self.openssl.timeout_secs = t;
            }
        }
        if let Ok(noop) = std::env::var("OPENVOX_X509_NOOP") {
            self.noop = matches!(noop.to_lowercase().as_str(), "1" | "true" | "yes");
        }

        // Logging overrides
        if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("OPENVOX_X509_LOG_FORMAT") {
            self.logging.format = match format.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "compact" => LogFormat::Compact,
                _ => LogFormat::Pretty,
            };
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.openssl.binary_path.as_os_str().is_empty() {
            anyhow::bail!("OpenSSL binary path cannot be empty");
        }

        if self.openssl.timeout_secs == 0 {
            anyhow::bail!("OpenSSL timeout must be greater than 0");
        }

        if self.logging.target != LogTarget::Console && self.logging.log_prefix.is_empty() {
            anyhow::bail!("Log file prefix cannot be empty when logging to a file");
        }

        Ok(())
    }
}
