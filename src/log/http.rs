//! HTTP transport for the analytics log.
//!
//! POSTs `{target, delivery_id, records}` as JSON with an `X-Delivery-Id`
//! header. The response body may carry `{"ack_timestamp": "..."}`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, error, warn};

use super::{Ack, AnalyticsLog, AppendRequest, LogError};

/// Header carrying the delivery id.
pub const DELIVERY_ID_HEADER: &str = "X-Delivery-Id";

/// Maximum response body characters kept in error messages.
const ERROR_BODY_LIMIT: usize = 200;

/// HTTP log configuration.
#[derive(Debug, Clone)]
pub struct HttpLogConfig {
    /// Append endpoint URL.
    pub endpoint: String,

    /// Request timeout.
    pub timeout: Duration,

    /// Additional headers to include.
    pub headers: Vec<(String, String)>,
}

impl Default for HttpLogConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            timeout: Duration::from_secs(30),
            headers: Vec::new(),
        }
    }
}

impl HttpLogConfig {
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }
}

/// Analytics log reached over HTTP.
pub struct HttpAnalyticsLog {
    client: Client,
    config: HttpLogConfig,
}

impl HttpAnalyticsLog {
    pub fn new(config: HttpLogConfig) -> Result<Self, LogError> {
        if config.endpoint.is_empty() {
            return Err(LogError::Config(
                "analytics log endpoint not configured".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(LogError::Http)?;

        Ok(Self { client, config })
    }

    fn parse_ack(body: &str) -> Result<Ack, LogError> {
        if body.trim().is_empty() {
            return Ok(Ack::default());
        }
        Ok(serde_json::from_str(body)?)
    }

    fn is_retryable_status(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }
}

#[async_trait]
impl AnalyticsLog for HttpAnalyticsLog {
    async fn append(&self, request: AppendRequest) -> Result<Ack, LogError> {
        let mut builder = self
            .client
            .post(&self.config.endpoint)
            .header(DELIVERY_ID_HEADER, request.delivery_id.to_string())
            .json(&request);

        for (key, value) in &self.config.headers {
            builder = builder.header(key, value);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.is_success() {
            debug!(
                target_table = %request.target,
                delivery_id = %request.delivery_id,
                records = request.records.len(),
                "Analytics append acknowledged"
            );
            return Self::parse_ack(&body);
        }

        if Self::is_retryable_status(status) {
            warn!(
                endpoint = %self.config.endpoint,
                status = %status,
                body = %body,
                "Analytics append returned retryable status"
            );
        } else {
            error!(
                endpoint = %self.config.endpoint,
                status = %status,
                body = %body,
                "Analytics append failed"
            );
        }

        Err(LogError::Rejected {
            target: request.target,
            status: status.as_u16(),
            body: body.chars().take(ERROR_BODY_LIMIT).collect(),
        })
    }

    fn name(&self) -> &str {
        "http"
    }
}
