//! Documents submitted through bulk batches.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A caller-owned document.
///
/// Pushing a batch writes the engine's answer back into the document:
/// `status` (and `error`, when the engine reports one) for every kind except
/// delete, plus the engine-assigned `id` for creates.
///
/// # Example
///
/// ```rust
/// use armature_elastic::Document;
/// use serde_json::json;
///
/// let doc = Document::new(json!({ "text": "hi" }));
/// assert!(doc.id.is_none());
///
/// let doc = Document::with_id("abc", json!({ "text": "hi" }));
/// assert_eq!(doc.id.as_deref(), Some("abc"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Source payload.
    #[serde(rename = "src")]
    pub source: Value,
    /// Engine identifier; required for update, replace and delete.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Status of the last bulk operation on this document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ItemStatus>,
    /// Error object of the last bulk operation, if it failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl Document {
    /// Create a document without an identifier.
    pub fn new(source: Value) -> Self {
        Self {
            source,
            ..Default::default()
        }
    }

    /// Create a document addressed by an existing identifier.
    pub fn with_id(id: impl Into<String>, source: Value) -> Self {
        Self {
            source,
            id: Some(id.into()),
            ..Default::default()
        }
    }

    /// Create a document from any serializable value.
    pub fn from_serializable<T: Serialize>(source: &T) -> Result<Self> {
        Ok(Self::new(serde_json::to_value(source)?))
    }

    /// Whether the last bulk operation on this document succeeded.
    ///
    /// `None` until a push has attached a status.
    pub fn succeeded(&self) -> Option<bool> {
        self.status.as_ref().map(ItemStatus::is_success)
    }
}

/// Per-item status reported by the bulk endpoint.
///
/// Engines report an HTTP code (`201`); some proxies and test doubles report
/// text (`"OK"`). Both are kept as received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemStatus {
    /// Numeric HTTP status.
    Code(u16),
    /// Textual status.
    Text(String),
}

impl ItemStatus {
    /// Check if the item operation was successful.
    pub fn is_success(&self) -> bool {
        match self {
            ItemStatus::Code(code) => (200..300).contains(code),
            ItemStatus::Text(text) => ["ok", "created", "updated", "deleted"]
                .iter()
                .any(|s| text.eq_ignore_ascii_case(s)),
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemStatus::Code(code) => write!(f, "{}", code),
            ItemStatus::Text(text) => f.write_str(text),
        }
    }
}

impl From<u16> for ItemStatus {
    fn from(code: u16) -> Self {
        ItemStatus::Code(code)
    }
}

impl From<&str> for ItemStatus {
    fn from(text: &str) -> Self {
        ItemStatus::Text(text.to_string())
    }
}
