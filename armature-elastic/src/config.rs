//! Connection configuration shared by batches and scrolls.

use crate::error::{ElasticError, Result};
use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

/// Connection configuration.
///
/// Built once and then shared (behind an `Arc`) by every batch and scroll
/// created from the same [`ElasticClient`](crate::ElasticClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElasticConfig {
    /// Engine base URL, without a trailing slash.
    pub endpoint: String,
    /// Headers sent with every request.
    pub headers: BTreeMap<String, String>,
    /// Target index (collection) name.
    pub index: String,
    /// Target document type (sub-type) name.
    pub doc_type: String,
    /// Request timeout handed to the HTTP client.
    pub request_timeout: Duration,
    /// Connection timeout handed to the HTTP client.
    pub connect_timeout: Duration,
}

impl ElasticConfig {
    /// Create a new configuration for one index and document type.
    pub fn new(
        endpoint: impl Into<String>,
        index: impl Into<String>,
        doc_type: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            headers: BTreeMap::new(),
            index: index.into(),
            doc_type: doc_type.into(),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// Load configuration from `{PREFIX}_*` environment variables.
    ///
    /// Required: `{PREFIX}_ENDPOINT`, `{PREFIX}_INDEX`, `{PREFIX}_DOC_TYPE`.
    /// Optional: `{PREFIX}_HEADERS` as `name:value` pairs separated by `;`,
    /// and `{PREFIX}_REQUEST_TIMEOUT_SECS`.
    pub fn from_env(prefix: &str) -> Result<Self> {
        let endpoint = load_var(prefix, "ENDPOINT")?;
        let index = load_var(prefix, "INDEX")?;
        let doc_type = load_var(prefix, "DOC_TYPE")?;

        let mut config = Self::new(endpoint, index, doc_type);

        if let Ok(raw) = load_var(prefix, "HEADERS") {
            for pair in raw.split(';').filter(|p| !p.trim().is_empty()) {
                let (name, value) = pair.split_once(':').ok_or_else(|| {
                    ElasticError::Config(format!("malformed header entry: {}", pair))
                })?;
                config = config.with_header(name.trim(), value.trim());
            }
        }

        if let Ok(raw) = load_var(prefix, "REQUEST_TIMEOUT_SECS") {
            let secs: u64 = raw.parse().map_err(|_| {
                ElasticError::Config(format!("invalid request timeout: {}", raw))
            })?;
            config = config.with_request_timeout(Duration::from_secs(secs));
        }

        config.validate()?;
        Ok(config)
    }

    /// Add a header sent with every request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Replace the whole header set.
    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    /// Set request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Check that the endpoint parses and that index and type are set.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.endpoint)?;

        if self.index.is_empty() {
            return Err(ElasticError::Config("index name is empty".to_string()));
        }
        if self.doc_type.is_empty() {
            return Err(ElasticError::Config("document type is empty".to_string()));
        }

        Ok(())
    }

    /// `{endpoint}/_bulk`
    pub(crate) fn bulk_url(&self) -> String {
        format!("{}/_bulk", self.endpoint)
    }

    /// `{endpoint}/{index}/{doc_type}/_search`
    pub(crate) fn search_url(&self) -> String {
        format!("{}/{}/{}/_search", self.endpoint, self.index, self.doc_type)
    }

    /// `{endpoint}/_search/scroll`
    pub(crate) fn scroll_url(&self) -> String {
        format!("{}/_search/scroll", self.endpoint)
    }

    pub(crate) fn has_content_type(&self) -> bool {
        self.headers
            .keys()
            .any(|name| name.eq_ignore_ascii_case("content-type"))
    }
}

fn load_var(prefix: &str, key: &str) -> Result<String> {
    let full_key = format!("{}_{}", prefix, key);
    env::var(&full_key).map_err(|_| ElasticError::Config(format!("{} is not set", full_key)))
}
