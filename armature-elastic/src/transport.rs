//! HTTP transport seam.
//!
//! Batches and scrolls never talk to an HTTP library directly; they build an
//! [`EngineRequest`] and hand it to a [`Transport`]. The default
//! [`ReqwestTransport`] covers normal use; connection pooling, TLS and timeouts
//! stay with `reqwest`.

use crate::{
    config::ElasticConfig,
    error::{ElasticError, Result},
};
use async_trait::async_trait;
use http::{Method, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

/// Sends one request to the engine and returns its raw response.
///
/// Implementations must not retry; a non-success status is returned as an
/// [`EngineResponse`] and interpreted by the caller.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and wait for the full response body.
    async fn send(&self, request: EngineRequest) -> Result<EngineResponse>;
}

/// A request addressed to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL without query string.
    pub url: String,
    /// Query parameters, in order.
    pub query: Vec<(String, String)>,
    /// Request headers, in order.
    pub headers: Vec<(String, String)>,
    /// Request body.
    pub body: Option<String>,
}

impl EngineRequest {
    /// Create a request with no query, headers or body.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Add a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Add a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Add every configured header.
    pub fn headers_from(mut self, config: &ElasticConfig) -> Self {
        self.headers.extend(
            config
                .headers
                .iter()
                .map(|(name, value)| (name.clone(), value.clone())),
        );
        self
    }

    /// Set the body.
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Look up a query parameter.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Raw engine response.
#[derive(Debug, Clone)]
pub struct EngineResponse {
    /// HTTP status code.
    pub status: StatusCode,
    /// Response body as text.
    pub body: String,
}

impl EngineResponse {
    /// Create a response.
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Check if the response was successful (2xx).
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Turn a non-success status into [`ElasticError::Transport`].
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ElasticError::Transport {
                status: self.status.as_u16(),
                body: self.body,
            })
        }
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// [`Transport`] backed by a `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    inner: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a client using the configured timeouts.
    pub fn new(config: &ElasticConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(format!("armature-elastic/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { inner })
    }

    /// Wrap an existing client.
    pub fn from_client(inner: reqwest::Client) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: EngineRequest) -> Result<EngineResponse> {
        debug!(method = %request.method, url = %request.url, "Sending engine request");

        let mut builder = self.inner.request(request.method, &request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        debug!(status = %status, bytes = body.len(), "Engine responded");

        Ok(EngineResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let config = ElasticConfig::new("http://foo.bar", "foo", "bar").with_header("X-Token", "t");
        let request = EngineRequest::new(Method::GET, config.scroll_url())
            .query("scroll", "1m")
            .query("scroll_id", "abc")
            .headers_from(&config)
            .body("{}");

        assert_eq!(request.url, "http://foo.bar/_search/scroll");
        assert_eq!(request.query_param("scroll"), Some("1m"));
        assert_eq!(request.query_param("scroll_id"), Some("abc"));
        assert_eq!(request.query_param("missing"), None);
        assert_eq!(request.headers, vec![("X-Token".to_string(), "t".to_string())]);
        assert_eq!(request.body.as_deref(), Some("{}"));
    }

    #[test]
    fn test_error_for_status() {
        let ok = EngineResponse::new(StatusCode::OK, "{}");
        assert!(ok.error_for_status().is_ok());

        let err = EngineResponse::new(StatusCode::NOT_FOUND, "missing")
            .error_for_status()
            .unwrap_err();
        assert_eq!(err.status_code(), Some(404));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_json_body() {
        let response = EngineResponse::new(StatusCode::OK, r#"{"took": 3}"#);
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["took"], 3);

        let bad = EngineResponse::new(StatusCode::OK, "not json");
        assert!(matches!(
            bad.json::<serde_json::Value>(),
            Err(ElasticError::Serialization(_))
        ));
    }

    #[test]
    fn test_reqwest_transport_builds() {
        let config = ElasticConfig::new("http://localhost:9200", "foo", "bar");
        assert!(ReqwestTransport::new(&config).is_ok());
    }
}
