//! Analytics log configuration types.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::ingest::{IngestTargets, DEFAULT_HEADERS_TARGET, DEFAULT_ITEMS_TARGET};
use crate::log::HttpLogConfig;

/// Analytics log discriminator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogType {
    /// In-process log with a local dedup pipeline.
    #[default]
    Memory,
    /// Remote append endpoint.
    Http,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    #[serde(rename = "type")]
    pub log_type: LogType,
    pub http: HttpLogSettings,
    /// Target for header records.
    pub headers_target: String,
    /// Target for item records.
    pub items_target: String,
    /// How often the local dedup pipeline tails the memory log.
    pub pipeline_interval_ms: u64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            log_type: LogType::Memory,
            http: HttpLogSettings::default(),
            headers_target: DEFAULT_HEADERS_TARGET.to_string(),
            items_target: DEFAULT_ITEMS_TARGET.to_string(),
            pipeline_interval_ms: 500,
        }
    }
}

impl AnalyticsConfig {
    pub fn targets(&self) -> IngestTargets {
        IngestTargets {
            headers: self.headers_target.clone(),
            items: self.items_target.clone(),
        }
    }

    pub fn pipeline_interval(&self) -> Duration {
        Duration::from_millis(self.pipeline_interval_ms)
    }
}

/// HTTP append endpoint settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpLogSettings {
    pub endpoint: String,
    pub timeout_secs: u64,
    /// Extra request headers, e.g. authorization.
    pub headers: HashMap<String, String>,
}

impl Default for HttpLogSettings {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            timeout_secs: 30,
            headers: HashMap::new(),
        }
    }
}

impl From<&HttpLogSettings> for HttpLogConfig {
    fn from(settings: &HttpLogSettings) -> Self {
        settings.headers.iter().fold(
            HttpLogConfig::default()
                .with_endpoint(settings.endpoint.clone())
                .with_timeout(Duration::from_secs(settings.timeout_secs)),
            |config, (key, value)| config.with_header(key.clone(), value.clone()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_targets_from_config() {
        let mut config = AnalyticsConfig::default();
        config.items_target = "items_v2".to_string();
        let targets = config.targets();
        assert_eq!(targets.headers, "pos_raw_receipts");
        assert_eq!(targets.items, "items_v2");
    }

    #[test]
    fn test_http_settings_convert() {
        let mut settings = HttpLogSettings::default();
        settings.endpoint = "http://log/append".to_string();
        settings.timeout_secs = 3;
        settings
            .headers
            .insert("Authorization".to_string(), "Bearer t".to_string());

        let config = HttpLogConfig::from(&settings);
        assert_eq!(config.endpoint, "http://log/append");
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(
            config.headers,
            vec![("Authorization".to_string(), "Bearer t".to_string())]
        );
    }
}
