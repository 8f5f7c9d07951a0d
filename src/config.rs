//! Configuration for mudbus.
//!
//! Supports a YAML file and environment variable overrides.

use serde::Deserialize;

use crate::messages::Verbosity;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "MUDBUS_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "MUDBUS";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "MUDBUS_LOG";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Lifecycle settings.
    pub game: GameConfig,
    /// Command resolution settings.
    pub commands: CommandsConfig,
    /// Diagnostic output settings.
    pub diagnostics: DiagnosticsConfig,
}

/// Lifecycle settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Name used in logs.
    pub name: String,
    /// Delay between tick loop iterations, in milliseconds.
    pub tick_interval_ms: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            name: "mudbus".to_string(),
            tick_interval_ms: 100,
        }
    }
}

/// Command resolution settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    /// Match command tokens regardless of case.
    pub case_insensitive: bool,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            case_insensitive: true,
        }
    }
}

/// Diagnostic output settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Most verbose informational level forwarded to the log.
    pub verbosity: Verbosity,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `config.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `MUDBUS_CONFIG` (if set)
    /// 4. Environment variables prefixed `MUDBUS__`, e.g.
    ///    `MUDBUS__GAME__TICK_INTERVAL_MS=50`
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Load configuration from a YAML file only.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_string(), e.to_string()))?;

        serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Create config for testing.
    pub fn for_test() -> Self {
        let mut config = Self::default();
        config.game.tick_interval_ms = 5;
        config.diagnostics.verbosity = Verbosity::Debug;
        config
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{0}': {1}")]
    FileRead(String, String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Failed to load config: {0}")]
    Load(#[from] ::config::ConfigError),
}
