//! Error types for bulk and scroll operations.

use thiserror::Error;

/// Elastic helper error type.
#[derive(Error, Debug)]
pub enum ElasticError {
    /// The engine answered with a non-success HTTP status.
    #[error("Request failed with status {status}: {body}")]
    Transport {
        /// HTTP status code.
        status: u16,
        /// Response body, as returned by the engine.
        body: String,
    },

    /// Connection-level failure in the HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The caller broke the API contract (scroll state, missing ids).
    #[error("Usage error: {0}")]
    Usage(String),

    /// Bulk response item count differs from the submitted documents.
    #[error("Bulk response has {actual} items for {expected} documents")]
    ItemCountMismatch {
        /// Number of documents submitted.
        expected: usize,
        /// Number of items returned.
        actual: usize,
    },

    /// The engine response lacks a required field or has the wrong shape.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Endpoint URL does not parse.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ElasticError {
    /// Check if this error signals a contract violation rather than a
    /// transient condition.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::Usage(_) | Self::ItemCountMismatch { .. } | Self::UnexpectedResponse(_)
        )
    }

    /// Check if this error came from the HTTP layer.
    pub fn is_transport_error(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Http(_))
    }

    /// Get the HTTP status code, if the engine returned one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Result type alias for elastic operations.
pub type Result<T> = std::result::Result<T, ElasticError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let usage = ElasticError::Usage("scroll is not open".to_string());
        assert!(usage.is_usage_error());
        assert!(!usage.is_transport_error());
        assert_eq!(usage.status_code(), None);

        let mismatch = ElasticError::ItemCountMismatch {
            expected: 2,
            actual: 1,
        };
        assert!(mismatch.is_usage_error());
        assert!(mismatch.to_string().contains("1 items for 2 documents"));

        let transport = ElasticError::Transport {
            status: 503,
            body: "unavailable".to_string(),
        };
        assert!(transport.is_transport_error());
        assert!(!transport.is_usage_error());
        assert_eq!(transport.status_code(), Some(503));
    }
}
