//! Application configuration.
//!
//! Aggregates the operational, analytics and reconciliation sections into a
//! single Config struct that can be loaded from YAML files or environment
//! variables.

mod analytics;
mod operational;
mod reconciliation;

pub use analytics::{AnalyticsConfig, HttpLogSettings, LogType};
pub use operational::{OperationalConfig, PoolConfig, PostgresConfig, SqliteConfig, StorageType};
pub use reconciliation::ReconciliationConfig;

use serde::Deserialize;

use crate::reconcile::MAX_LOOKBACK_HOURS;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "RECEIPT_SYNC_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "RECEIPT_SYNC";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "RECEIPT_SYNC_LOG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Operational (OLTP) store.
    pub operational: OperationalConfig,
    /// Analytics log and targets.
    pub analytics: AnalyticsConfig,
    /// Gap scanning and replay.
    pub reconciliation: ReconciliationConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `config.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
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

        let config: Config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would only fail later at first use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let pool = &self.operational.pool;
        if pool.min_connections > pool.max_connections {
            return Err(ConfigError::Invalid(format!(
                "operational.pool.min_connections ({}) exceeds max_connections ({})",
                pool.min_connections, pool.max_connections
            )));
        }
        if pool.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "operational.pool.max_connections must be at least 1".to_string(),
            ));
        }
        if self.analytics.log_type == LogType::Http && self.analytics.http.endpoint.is_empty() {
            return Err(ConfigError::Invalid(
                "analytics.http.endpoint is required when analytics.type is http".to_string(),
            ));
        }
        if self.analytics.headers_target.is_empty() || self.analytics.items_target.is_empty() {
            return Err(ConfigError::Invalid(
                "analytics targets must not be empty".to_string(),
            ));
        }
        if self.analytics.pipeline_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "analytics.pipeline_interval_ms must be at least 1".to_string(),
            ));
        }
        let rc = &self.reconciliation;
        if rc.lookback_hours > MAX_LOOKBACK_HOURS {
            return Err(ConfigError::Invalid(format!(
                "reconciliation.lookback_hours ({}) exceeds {}",
                rc.lookback_hours, MAX_LOOKBACK_HOURS
            )));
        }
        if rc.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "reconciliation.poll_interval_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Create config for testing.
    pub fn for_test() -> Self {
        let mut config = Self::default();
        config.analytics.log_type = LogType::Memory;
        config
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serial_test::serial;

    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.operational.storage_type, StorageType::Sqlite);
        assert_eq!(config.operational.write_timeout_ms, 5000);
        assert_eq!(config.analytics.headers_target, "pos_raw_receipts");
        assert_eq!(config.reconciliation.lookback_hours, 24);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_pool() {
        let mut config = Config::for_test();
        config.operational.pool.min_connections = 20;
        config.operational.pool.max_connections = 10;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_requires_http_endpoint() {
        let mut config = Config::for_test();
        config.analytics.log_type = LogType::Http;
        config.analytics.http.endpoint.clear();
        assert!(config.validate().is_err());

        config.analytics.http.endpoint = "http://localhost:9000/append".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_intervals() {
        let mut config = Config::for_test();
        config.analytics.pipeline_interval_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::for_test();
        config.reconciliation.poll_interval_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_caps_lookback() {
        let mut config = Config::for_test();
        config.reconciliation.lookback_hours = MAX_LOOKBACK_HOURS;
        assert!(config.validate().is_ok());

        config.reconciliation.lookback_hours = u32::MAX;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    #[serial]
    fn test_load_rejects_oversized_lookback_from_env() {
        std::env::set_var("RECEIPT_SYNC__RECONCILIATION__LOOKBACK_HOURS", "4294967295");
        let result = Config::load(None);
        std::env::remove_var("RECEIPT_SYNC__RECONCILIATION__LOOKBACK_HOURS");

        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    #[serial]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "operational:\n  type: postgres\n  postgres:\n    uri: postgres://db/receipts\n  pool:\n    max_connections: 4\n    min_connections: 1\nreconciliation:\n  lookback_hours: 6"
        )
        .unwrap();

        let config = Config::load(file.path().to_str()).unwrap();

        assert_eq!(config.operational.storage_type, StorageType::Postgres);
        assert_eq!(config.operational.postgres.uri, "postgres://db/receipts");
        assert_eq!(config.operational.pool.max_connections, 4);
        assert_eq!(config.reconciliation.lookback_hours, 6);
        assert_eq!(config.analytics.items_target, "pos_raw_items");
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        std::env::set_var("RECEIPT_SYNC__RECONCILIATION__LOOKBACK_HOURS", "48");
        let result = Config::load(None);
        std::env::remove_var("RECEIPT_SYNC__RECONCILIATION__LOOKBACK_HOURS");

        assert_eq!(result.unwrap().reconciliation.lookback_hours, 48);
    }

    #[test]
    #[serial]
    fn test_load_rejects_invalid() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "analytics:\n  type: http\n  http:\n    endpoint: \"\"").unwrap();

        assert!(matches!(
            Config::load(file.path().to_str()),
            Err(ConfigError::Invalid(_))
        ));
    }
}
