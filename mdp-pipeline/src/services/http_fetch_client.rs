//! HTTP fetch client for the upstream feeds
//!
//! One GET per tick with a request timeout. Transient failures (connection
//! errors, timeouts, 500/502/503/504) are retried with exponential backoff;
//! any other status and undecodable bodies fail the tick immediately. A
//! successful payload is returned verbatim, no schema checks happen here.

use crate::error::PipelineResult;
use crate::sources::SourceKind;
use crate::utils::{retry_with_backoff, BackoffPolicy};
use chrono::{DateTime, Utc};
use mdp_common::config::HttpConfig;
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Statuses worth another attempt
const TRANSIENT_STATUSES: [u16; 4] = [500, 502, 503, 504];

/// Header Digitraffic asks clients to identify themselves with
const DIGITRAFFIC_USER_HEADER: &str = "digitraffic-user";

/// Payload exactly as received, tagged with its source and arrival time
#[derive(Debug, Clone, PartialEq)]
pub struct RawEnvelope {
    pub source: SourceKind,
    pub fetch_time: DateTime<Utc>,
    pub payload: Value,
}

/// Fetch errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// Connection failure or timeout
    #[error("Network error: {0}")]
    Network(String),

    /// Upstream answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// Body is empty or not JSON
    #[error("Decode error: {0}")]
    Decode(String),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Network(_) => true,
            FetchError::Status { status, .. } => TRANSIENT_STATUSES.contains(status),
            FetchError::Decode(_) => false,
        }
    }
}

/// Upstream HTTP client, constructed once per process run and shared by all sources
#[derive(Debug, Clone)]
pub struct FetchClient {
    http_client: reqwest::Client,
    policy: BackoffPolicy,
}

impl FetchClient {
    pub fn new(config: &HttpConfig) -> PipelineResult<Self> {
        let identity = HeaderValue::from_str(&config.user_agent).map_err(|e| {
            mdp_common::Error::Config(format!("Invalid user_agent '{}': {}", config.user_agent, e))
        })?;
        let mut headers = HeaderMap::new();
        headers.insert(DIGITRAFFIC_USER_HEADER, identity);

        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .timeout(config.timeout())
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            policy: BackoffPolicy::new(config.max_retries, config.backoff_base()),
        })
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// GET `url` and decode the body as JSON, retrying transient failures
    pub async fn fetch(
        &self,
        source: SourceKind,
        url: &str,
        timeout: Duration,
    ) -> Result<RawEnvelope, FetchError> {
        let operation = format!("fetch {}", source);
        let payload = retry_with_backoff(&operation, &self.policy, FetchError::is_transient, || {
            self.fetch_once(url, timeout)
        })
        .await?;

        Ok(RawEnvelope {
            source,
            fetch_time: mdp_common::time::now(),
            payload,
        })
    }

    async fn fetch_once(&self, url: &str, timeout: Duration) -> Result<Value, FetchError> {
        tracing::debug!(url = %url, "Requesting upstream feed");

        let response = self
            .http_client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(FetchError::Decode(format!("empty body from {}", url)));
        }

        serde_json::from_slice(&body)
            .map_err(|e| FetchError::Decode(format!("invalid JSON from {}: {}", url, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> FetchError {
        FetchError::Status {
            status: code,
            url: "http://upstream".to_string(),
        }
    }

    #[test]
    fn test_transient_classification() {
        assert!(FetchError::Network("reset".to_string()).is_transient());
        for code in [500, 502, 503, 504] {
            assert!(status(code).is_transient(), "{} should be retried", code);
        }
        for code in [400, 401, 404, 429, 501] {
            assert!(!status(code).is_transient(), "{} should not be retried", code);
        }
        assert!(!FetchError::Decode("eof".to_string()).is_transient());
    }

    #[test]
    fn test_client_uses_configured_retry_budget() {
        let config = HttpConfig {
            max_retries: 1,
            backoff_base_ms: 250,
            ..HttpConfig::default()
        };
        let client = FetchClient::new(&config).unwrap();
        assert_eq!(client.policy().max_retries, 1);
        assert_eq!(client.policy().delay_for(2), Duration::from_millis(500));
    }

    #[test]
    fn test_invalid_user_agent_is_config_error() {
        let config = HttpConfig {
            user_agent: "bad\nagent".to_string(),
            ..HttpConfig::default()
        };
        let err = FetchClient::new(&config).unwrap_err();
        assert_eq!(err.kind(), "common");
    }
}
