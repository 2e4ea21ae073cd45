//! API server configuration.
//!
//! ## Sources (later wins)
//! 1. Defaults (this file)
//! 2. TOML file: `MOSTRADOR_CONFIG`, or `mostrador.toml` in the platform
//!    config directory when it exists
//! 3. Environment variables (`MOSTRADOR_*`, `.env` honored)
//!
//! The result is validated before the server starts.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

/// Default tracing filter when neither `RUST_LOG` nor the config sets one.
pub const DEFAULT_LOG_FILTER: &str = "info,mostrador=debug,sqlx=warn";

/// Full server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_addr: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file, created on first start.
    pub path: PathBuf,
    pub max_connections: u32,
    /// Milliseconds a write waits on another writer before answering 503.
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: PathBuf::from("mostrador.db"),
            max_connections: 5,
            busy_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 signing secret. Must be set in production.
    pub jwt_secret: String,

    /// Token lifetime in seconds (default: 8 hours, one shift)
    pub token_lifetime_secs: i64,

    /// bcrypt cost for new password hashes
    pub password_cost: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig {
            jwt_secret: "mostrador-dev-secret-change-in-production".to_string(),
            token_lifetime_secs: 8 * 60 * 60,
            password_cost: 12,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives. `RUST_LOG` takes precedence.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl ApiConfig {
    /// Loads defaults, then the config file, then the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut config = match config_file_path() {
            Some(path) => ApiConfig::from_file(&path)?,
            None => ApiConfig::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        ApiConfig::from_toml_str(&text)
    }

    /// Parses a TOML document; missing sections and keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Applies `MOSTRADOR_*` overrides read through `lookup`.
    ///
    /// ## Environment Variables
    /// - `MOSTRADOR_BIND_ADDR`, `MOSTRADOR_PORT`
    /// - `MOSTRADOR_DB_PATH`, `MOSTRADOR_DB_MAX_CONNECTIONS`
    /// - `MOSTRADOR_JWT_SECRET`, `MOSTRADOR_TOKEN_LIFETIME_SECS`, `MOSTRADOR_PASSWORD_COST`
    /// - `MOSTRADOR_LOG`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("MOSTRADOR_BIND_ADDR") {
            self.server.bind_addr = addr;
        }
        if let Some(port) = lookup("MOSTRADOR_PORT") {
            self.server.port = parse_var("MOSTRADOR_PORT", &port)?;
        }
        if let Some(path) = lookup("MOSTRADOR_DB_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(max) = lookup("MOSTRADOR_DB_MAX_CONNECTIONS") {
            self.database.max_connections = parse_var("MOSTRADOR_DB_MAX_CONNECTIONS", &max)?;
        }
        if let Some(ms) = lookup("MOSTRADOR_DB_BUSY_TIMEOUT_MS") {
            self.database.busy_timeout_ms = parse_var("MOSTRADOR_DB_BUSY_TIMEOUT_MS", &ms)?;
        }
        if let Some(secret) = lookup("MOSTRADOR_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(secs) = lookup("MOSTRADOR_TOKEN_LIFETIME_SECS") {
            self.auth.token_lifetime_secs = parse_var("MOSTRADOR_TOKEN_LIFETIME_SECS", &secs)?;
        }
        if let Some(cost) = lookup("MOSTRADOR_PASSWORD_COST") {
            self.auth.password_cost = parse_var("MOSTRADOR_PASSWORD_COST", &cost)?;
        }
        if let Some(filter) = lookup("MOSTRADOR_LOG") {
            self.logging.filter = filter;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must not be 0".to_string()));
        }
        if self.server.bind_addr.trim().is_empty() {
            return Err(ConfigError::MissingRequired("server.bind_addr".to_string()));
        }
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::MissingRequired("database.path".to_string()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(ConfigError::MissingRequired("auth.jwt_secret".to_string()));
        }
        if self.auth.token_lifetime_secs <= 0 {
            return Err(ConfigError::Invalid(
                "auth.token_lifetime_secs must be positive".to_string(),
            ));
        }
        if !(4..=31).contains(&self.auth.password_cost) {
            return Err(ConfigError::Invalid(
                "auth.password_cost must be between 4 and 31".to_string(),
            ));
        }
        Ok(())
    }

    /// `bind_addr:port`, as passed to the listener.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.bind_addr, self.server.port)
    }
}

fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("MOSTRADOR_CONFIG") {
        return Some(PathBuf::from(path));
    }
    ProjectDirs::from("mx", "Mostrador", "mostrador")
        .map(|dirs| dirs.config_dir().join("mostrador.toml"))
        .filter(|path| path.exists())
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(key.to_string()))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = ApiConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.listen_addr(), "0.0.0.0:8080");
        assert_eq!(config.logging.filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ApiConfig::from_toml_str(
            r#"
            [server]
            port = 9000

            [database]
            path = "/var/lib/mostrador/tienda.db"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.bind_addr, "0.0.0.0");
        assert_eq!(config.database.path, PathBuf::from("/var/lib/mostrador/tienda.db"));
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.database.busy_timeout_ms, 5_000);
        assert_eq!(config.auth, AuthConfig::default());
    }

    #[test]
    fn test_bad_toml_is_a_parse_error() {
        let err = ApiConfig::from_toml_str("[server]\nport = \"many\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = ApiConfig::from_toml_str("[server]\nport = 9000").unwrap();
        config
            .apply_env(env(&[
                ("MOSTRADOR_PORT", "7070"),
                ("MOSTRADOR_DB_PATH", "caja.db"),
                ("MOSTRADOR_JWT_SECRET", "s3cret"),
                ("MOSTRADOR_LOG", "warn"),
            ]))
            .unwrap();

        assert_eq!(config.server.port, 7070);
        assert_eq!(config.database.path, PathBuf::from("caja.db"));
        assert_eq!(config.auth.jwt_secret, "s3cret");
        assert_eq!(config.logging.filter, "warn");
    }

    #[test]
    fn test_unparsable_env_value() {
        let mut config = ApiConfig::default();
        let err = config
            .apply_env(env(&[("MOSTRADOR_PORT", "eighty")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(key) if key == "MOSTRADOR_PORT"));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = ApiConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = ApiConfig::default();
        config.auth.jwt_secret = "  ".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::MissingRequired(_))));

        let mut config = ApiConfig::default();
        config.database.max_connections = 0;
        assert!(config.validate().is_err());

        let mut config = ApiConfig::default();
        config.auth.password_cost = 2;
        assert!(config.validate().is_err());
    }
}
