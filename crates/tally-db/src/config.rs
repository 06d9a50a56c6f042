//! Service configuration module.
//!
//! Configuration is loaded from environment variables with fallback to defaults.
//!
//! | Variable                      | Default      |
//! |-------------------------------|--------------|
//! | `TALLY_DATABASE_PATH`         | `./tally.db` |
//! | `TALLY_DB_MAX_CONNECTIONS`    | `5`          |
//! | `TALLY_DB_BUSY_TIMEOUT_SECS`  | `5`          |
//! | `TALLY_MAX_BATCH_LINES`       | `100`        |
//! | `TALLY_LOG`                   | `info`       |

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tally_core::MAX_BATCH_LINES;

use crate::pool::DbConfig;

/// Inventory service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// SQLite database file
    pub database_path: PathBuf,

    /// Pool size
    pub max_connections: u32,

    /// Seconds a writer waits for the SQLite write lock
    pub busy_timeout_secs: u64,

    /// Maximum lines accepted by one bulk operation
    pub max_batch_lines: usize,

    /// `tracing_subscriber::EnvFilter` directive
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_path: PathBuf::from("./tally.db"),
            max_connections: 5,
            busy_timeout_secs: 5,
            max_batch_lines: MAX_BATCH_LINES,
            log_filter: "info".to_string(),
        }
    }
}

impl Settings {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();

        let settings = Settings {
            database_path: lookup("TALLY_DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),

            max_connections: parse_or(&lookup, "TALLY_DB_MAX_CONNECTIONS", defaults.max_connections)?,

            busy_timeout_secs: parse_or(
                &lookup,
                "TALLY_DB_BUSY_TIMEOUT_SECS",
                defaults.busy_timeout_secs,
            )?,

            max_batch_lines: parse_or(&lookup, "TALLY_MAX_BATCH_LINES", defaults.max_batch_lines)?,

            log_filter: lookup("TALLY_LOG").unwrap_or(defaults.log_filter),
        };

        if settings.max_connections == 0 {
            return Err(ConfigError::InvalidValue("TALLY_DB_MAX_CONNECTIONS".to_string()));
        }
        if settings.max_batch_lines == 0 {
            return Err(ConfigError::InvalidValue("TALLY_MAX_BATCH_LINES".to_string()));
        }

        Ok(settings)
    }

    /// Pool configuration derived from these settings.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database_path.clone())
            .max_connections(self.max_connections)
            .busy_timeout(Duration::from_secs(self.busy_timeout_secs))
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.max_batch_lines, MAX_BATCH_LINES);
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_lookup(lookup(&[
            ("TALLY_DATABASE_PATH", "/var/lib/tally/inv.db"),
            ("TALLY_DB_MAX_CONNECTIONS", "8"),
            ("TALLY_DB_BUSY_TIMEOUT_SECS", " 12 "),
            ("TALLY_MAX_BATCH_LINES", "20"),
            ("TALLY_LOG", "tally_db=debug"),
        ]))
        .unwrap();

        assert_eq!(settings.database_path, PathBuf::from("/var/lib/tally/inv.db"));
        assert_eq!(settings.max_batch_lines, 20);
        assert_eq!(settings.log_filter, "tally_db=debug");

        let db = settings.db_config();
        assert_eq!(db.max_connections, 8);
        assert_eq!(db.busy_timeout, Duration::from_secs(12));
    }

    #[test]
    fn test_invalid_values() {
        let err = Settings::from_lookup(lookup(&[("TALLY_DB_MAX_CONNECTIONS", "lots")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(k) if k == "TALLY_DB_MAX_CONNECTIONS"));

        assert!(Settings::from_lookup(lookup(&[("TALLY_MAX_BATCH_LINES", "0")])).is_err());
    }
}
