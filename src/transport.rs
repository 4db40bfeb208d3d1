//! Query transports
//!
//! The engine only needs "send this request, give me the raw response".
//! [`HttpTransport`] does that against a Graphite render endpoint; tests and
//! embedders can supply their own [`QueryTransport`].

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::config::TransportConfig;
use crate::error::TransportError;
use crate::request::Request;
use crate::response::RawResponse;

/// Executes one request against the metrics backend
///
/// Implementations own any retry, backoff or timeout policy.
#[async_trait]
pub trait QueryTransport: Send + Sync {
    /// Run the request and return the backend's raw answer
    async fn query(&self, request: &Request) -> Result<RawResponse, TransportError>;
}

/// Render API client over HTTP
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: url::Url,
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport from configuration
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let base_url = url::Url::parse(&config.base_url)
            .map_err(|e| TransportError::InvalidRequest(format!("{}: {}", config.base_url, e)))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { base_url, client })
    }

    /// Full URL for a request
    pub fn url_for(&self, request: &Request) -> Result<url::Url, TransportError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        url::Url::parse(&format!("{}{}", base, request.path()))
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))
    }
}

#[async_trait]
impl QueryTransport for HttpTransport {
    async fn query(&self, request: &Request) -> Result<RawResponse, TransportError> {
        let url = self.url_for(request)?;
        debug!(url = %url, "sending render request");

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        RawResponse::from_json(&body).map_err(|e| TransportError::Body(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn config(base_url: &str) -> TransportConfig {
        TransportConfig {
            base_url: base_url.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_url_for_joins_base_and_path() {
        let transport = HttpTransport::new(&config("http://graphite.local:8080/")).unwrap();
        let request = Request::new(
            "a.b",
            Utc.timestamp_opt(10, 0).unwrap(),
            Utc.timestamp_opt(20, 0).unwrap(),
        );
        let url = transport.url_for(&request).unwrap();
        assert_eq!(
            url.as_str(),
            "http://graphite.local:8080/render?format=json&target=a.b&from=10&until=20"
        );
    }

    #[test]
    fn test_url_for_keeps_base_path_prefix() {
        let transport = HttpTransport::new(&config("https://metrics.example.com/graphite")).unwrap();
        let request = Request::new(
            "a.b",
            Utc.timestamp_opt(10, 0).unwrap(),
            Utc.timestamp_opt(20, 0).unwrap(),
        );
        let url = transport.url_for(&request).unwrap();
        assert!(url.as_str().starts_with("https://metrics.example.com/graphite/render?"));
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            HttpTransport::new(&config("not a url")),
            Err(TransportError::InvalidRequest(_))
        ));
    }
}
