//! # Database Configuration
//!
//! Pool settings for the SQLite database, set in code through the builder or
//! loaded from `PERK_*` environment variables with fallback to defaults.
//!
//! | Variable                       | Default          |
//! |--------------------------------|------------------|
//! | `PERK_DATABASE_PATH`           | `./perk_dev.db`  |
//! | `PERK_DB_MAX_CONNECTIONS`      | `5`              |
//! | `PERK_DB_MIN_CONNECTIONS`      | `1`              |
//! | `PERK_DB_CONNECT_TIMEOUT_SECS` | `30`             |
//! | `PERK_DB_BUSY_TIMEOUT_MS`      | `5000`           |
//! | `PERK_DB_RUN_MIGRATIONS`       | `true`           |

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default database file used by development tooling.
pub const DEFAULT_DATABASE_PATH: &str = "./perk_dev.db";

/// Database configuration.
///
/// ## Example
/// ```rust
/// use perk_db::DbConfig;
///
/// let config = DbConfig::new("/var/lib/perk/perk.db")
///     .max_connections(8)
///     .min_connections(1);
/// assert_eq!(config.max_connections, 8);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 5
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// How long to wait for a pooled connection.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// How long a writer waits on SQLite's write lock before failing.
    /// Default: 5 seconds
    pub busy_timeout: Duration,

    /// Whether to run migrations on connect.
    /// Default: true
    pub run_migrations: bool,
}

impl DbConfig {
    /// Creates a new database configuration with the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the SQLite busy timeout.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Creates an in-memory database configuration (for testing).
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1, // In-memory requires single connection
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    /// Loads configuration from `PERK_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration through `lookup`, with the same keys and defaults
    /// as [`DbConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = DbConfig::new(DEFAULT_DATABASE_PATH);

        let database_path = match lookup("PERK_DATABASE_PATH") {
            Some(path) if path.trim().is_empty() => {
                return Err(ConfigError::MissingRequired(
                    "PERK_DATABASE_PATH".to_string(),
                ))
            }
            Some(path) => PathBuf::from(path),
            None => defaults.database_path,
        };

        let config = DbConfig {
            database_path,
            max_connections: parse_or(&lookup, "PERK_DB_MAX_CONNECTIONS", defaults.max_connections)?,
            min_connections: parse_or(&lookup, "PERK_DB_MIN_CONNECTIONS", defaults.min_connections)?,
            connect_timeout: parse_or(&lookup, "PERK_DB_CONNECT_TIMEOUT_SECS", 30)
                .map(Duration::from_secs)?,
            idle_timeout: defaults.idle_timeout,
            busy_timeout: parse_or(&lookup, "PERK_DB_BUSY_TIMEOUT_MS", 5000)
                .map(Duration::from_millis)?,
            run_migrations: parse_or(&lookup, "PERK_DB_RUN_MIGRATIONS", defaults.run_migrations)?,
        };

        if config.max_connections == 0 || config.min_connections > config.max_connections {
            return Err(ConfigError::InvalidValue(
                "PERK_DB_MIN_CONNECTIONS/PERK_DB_MAX_CONNECTIONS".to_string(),
            ));
        }

        Ok(config)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_config_builder() {
        let config = DbConfig::new("/tmp/test.db")
            .max_connections(10)
            .min_connections(2)
            .busy_timeout(Duration::from_millis(250));

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.busy_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_defaults_without_variables() {
        let config = DbConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.database_path, PathBuf::from(DEFAULT_DATABASE_PATH));
        assert_eq!(config.max_connections, 5);
        assert!(config.run_migrations);
    }

    #[test]
    fn test_variables_override_defaults() {
        let config = DbConfig::from_lookup(lookup(&[
            ("PERK_DATABASE_PATH", "/data/perk.db"),
            ("PERK_DB_MAX_CONNECTIONS", "12"),
            ("PERK_DB_BUSY_TIMEOUT_MS", "750"),
            ("PERK_DB_RUN_MIGRATIONS", "false"),
        ]))
        .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/data/perk.db"));
        assert_eq!(config.max_connections, 12);
        assert_eq!(config.busy_timeout, Duration::from_millis(750));
        assert!(!config.run_migrations);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            DbConfig::from_lookup(lookup(&[("PERK_DB_MAX_CONNECTIONS", "lots")])),
            Err(ConfigError::InvalidValue(key)) if key == "PERK_DB_MAX_CONNECTIONS"
        ));
        assert!(matches!(
            DbConfig::from_lookup(lookup(&[("PERK_DB_MAX_CONNECTIONS", "0")])),
            Err(ConfigError::InvalidValue(_))
        ));
        assert!(matches!(
            DbConfig::from_lookup(lookup(&[("PERK_DATABASE_PATH", " ")])),
            Err(ConfigError::MissingRequired(_))
        ));
    }
}
