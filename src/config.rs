//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use crate::community::{CommunityResult, Credentials};
use crate::storage::{CorruptionPolicy, StoreConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub watch: WatchConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Local store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default = "default_data_key")]
    pub data_key: String,

    #[serde(default = "default_session_key")]
    pub session_key: String,

    #[serde(default = "default_language_key")]
    pub language_key: String,

    #[serde(default)]
    pub corruption_policy: CorruptionPolicy,

    #[serde(default = "default_max_update_retries")]
    pub max_update_retries: u32,
}

fn default_data_dir() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("novellahub").to_string_lossy().to_string())
        .unwrap_or_else(|| "./novellahub_data".to_string())
}

fn default_data_key() -> String {
    StoreConfig::default().data_key
}

fn default_session_key() -> String {
    StoreConfig::default().session_key
}

fn default_language_key() -> String {
    StoreConfig::default().language_key
}

fn default_max_update_retries() -> u32 {
    3
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            data_key: default_data_key(),
            session_key: default_session_key(),
            language_key: default_language_key(),
            corruption_policy: CorruptionPolicy::default(),
            max_update_retries: default_max_update_retries(),
        }
    }
}

impl StorageConfig {
    /// Data directory with a leading `~` expanded
    pub fn data_path(&self) -> PathBuf {
        match self.data_dir.strip_prefix("~/") {
            Some(rest) => dirs::home_dir()
                .map(|home| home.join(rest))
                .unwrap_or_else(|| PathBuf::from(&self.data_dir)),
            None => PathBuf::from(&self.data_dir),
        }
    }

    /// Settings for [`crate::storage::LocalStore`]
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            data_key: self.data_key.clone(),
            session_key: self.session_key.clone(),
            language_key: self.language_key.clone(),
            corruption_policy: self.corruption_policy,
            max_update_retries: self.max_update_retries,
            ..StoreConfig::default()
        }
    }
}

/// Password hashing cost (Argon2id)
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_memory_kib")]
    pub memory_kib: u32,

    #[serde(default = "default_iterations")]
    pub iterations: u32,

    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

fn default_memory_kib() -> u32 {
    19 * 1024 // 19 MiB
}

fn default_iterations() -> u32 {
    2
}

fn default_parallelism() -> u32 {
    1
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            memory_kib: default_memory_kib(),
            iterations: default_iterations(),
            parallelism: default_parallelism(),
        }
    }
}

impl AuthConfig {
    pub fn credentials(&self) -> CommunityResult<Credentials> {
        Credentials::new(self.memory_kib, self.iterations, self.parallelism)
    }
}

/// External change polling
#[derive(Debug, Clone, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval() -> u64 {
    500
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(path, &content)
    }

    fn parse(path: &Path, content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("novellahub").join("config.toml")),
            Some(PathBuf::from("./novellahub.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::debug!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::debug!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        if let Ok(data_dir) = std::env::var("NOVELLAHUB_DATA_DIR") {
            self.storage.data_dir = data_dir;
        }
        if let Ok(policy) = std::env::var("NOVELLAHUB_CORRUPTION_POLICY") {
            match policy.parse() {
                Ok(p) => self.storage.corruption_policy = p,
                Err(e) => tracing::warn!("Ignoring NOVELLAHUB_CORRUPTION_POLICY: {}", e),
            }
        }

        if let Ok(level) = std::env::var("NOVELLAHUB_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("NOVELLAHUB_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# NovellaHub Configuration
#
# Environment variables override these settings:
# - NOVELLAHUB_DATA_DIR
# - NOVELLAHUB_CORRUPTION_POLICY
# - NOVELLAHUB_LOG_LEVEL
# - NOVELLAHUB_LOG_FORMAT

[storage]
# Directory holding one file per store key
data_dir = "~/.local/share/novellahub"

# Keys of the root document, session pointer and language preference
data_key = "novellahub_data"
session_key = "novellahub_user"
language_key = "novellahub_lng"

# What to do with an unreadable document:
# "recover" backs it up under <data_key>.corrupt and starts fresh,
# "strict" refuses to continue
corruption_policy = "recover"

# Retries when another process writes during an update
max_update_retries = 3

[auth]
# Argon2id cost for new password hashes
memory_kib = 19456
iterations = 2
parallelism = 1

[watch]
# How often `watch` polls for changes from other processes (ms)
poll_interval_ms = 500

[logging]
# Log level: trace, debug, info, warn, error
level = "warn"

# Log format: pretty or json
format = "pretty"
"#
    .to_string()
}
