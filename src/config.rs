use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::server::GuardConfig;

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Path to the SQLite database
    pub database_path: ConfigValue<PathBuf>,
    /// Port the server listens on
    pub port: ConfigValue<u16>,
    /// Lifetime of a session token
    pub session_ttl_minutes: ConfigValue<i64>,
    /// Whether the route guard checks tokens against the session store
    pub verify_sessions: ConfigValue<bool>,
    /// User id the CLI acts as when `--user` is not given
    pub default_user: ConfigValue<String>,
    /// Route guard prefixes
    pub routes: GuardConfig,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    database_path: Option<PathBuf>,
    port: Option<u16>,
    session_ttl_minutes: Option<i64>,
    verify_sessions: Option<bool>,
    default_user: Option<String>,
    routes: Option<GuardConfig>,
}

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_SESSION_TTL_MINUTES: i64 = 7 * 24 * 60;
pub const DEFAULT_USER: &str = "local";

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut database_path = ConfigValue::new(
            Self::default_data_dir().join("firestarter.db"),
            ConfigSource::Default,
        );
        let mut port = ConfigValue::new(DEFAULT_PORT, ConfigSource::Default);
        let mut session_ttl_minutes =
            ConfigValue::new(DEFAULT_SESSION_TTL_MINUTES, ConfigSource::Default);
        let mut verify_sessions = ConfigValue::new(true, ConfigSource::Default);
        let mut default_user = ConfigValue::new(DEFAULT_USER.to_string(), ConfigSource::Default);
        let mut routes = GuardConfig::default();
        let mut config_file = None;

        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(db_path) = file_config.database_path {
                // Relative paths are relative to the config file
                let resolved_path = if db_path.is_relative() {
                    path.parent().map(|p| p.join(&db_path)).unwrap_or(db_path)
                } else {
                    db_path
                };
                database_path = ConfigValue::new(resolved_path, ConfigSource::File);
            }
            if let Some(value) = file_config.port {
                port = ConfigValue::new(value, ConfigSource::File);
            }
            if let Some(value) = file_config.session_ttl_minutes {
                session_ttl_minutes = ConfigValue::new(value, ConfigSource::File);
            }
            if let Some(value) = file_config.verify_sessions {
                verify_sessions = ConfigValue::new(value, ConfigSource::File);
            }
            if let Some(value) = file_config.default_user {
                default_user = ConfigValue::new(value, ConfigSource::File);
            }
            if let Some(value) = file_config.routes {
                routes = value;
            }
        }

        if let Ok(db_path) = std::env::var("FIRESTARTER_DATABASE_PATH") {
            database_path = ConfigValue::new(PathBuf::from(db_path), ConfigSource::Environment);
        }
        if let Some(value) = env_override("FIRESTARTER_PORT")? {
            port = ConfigValue::new(value, ConfigSource::Environment);
        }
        if let Some(value) = env_override("FIRESTARTER_SESSION_TTL_MINUTES")? {
            session_ttl_minutes = ConfigValue::new(value, ConfigSource::Environment);
        }
        if let Some(value) = env_override("FIRESTARTER_VERIFY_SESSIONS")? {
            verify_sessions = ConfigValue::new(value, ConfigSource::Environment);
        }
        if let Ok(user) = std::env::var("FIRESTARTER_DEFAULT_USER") {
            default_user = ConfigValue::new(user, ConfigSource::Environment);
        }

        if session_ttl_minutes.value <= 0 {
            return Err(ConfigError::InvalidValue(
                "session_ttl_minutes".to_string(),
                session_ttl_minutes.value.to_string(),
            ));
        }
        routes.validate().map_err(ConfigError::InvalidRoutes)?;

        Ok(Self {
            database_path,
            port,
            session_ttl_minutes,
            verify_sessions,
            default_user,
            routes,
            config_file,
        })
    }

    /// Default config directory (platform-specific), e.g. ~/.config/firestarter/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("firestarter")
    }

    /// Default data directory (platform-specific), e.g. ~/.local/share/firestarter/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("firestarter")
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path.value
    }
}

fn env_override<T: FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(name.to_string(), raw)),
        Err(_) => Ok(None),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
    InvalidValue(String, String),
    InvalidRoutes(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::InvalidValue(name, value) => {
                write!(f, "Invalid value for {}: '{}'", name, value)
            }
            ConfigError::InvalidRoutes(reason) => {
                write!(f, "Invalid route configuration: {}", reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
