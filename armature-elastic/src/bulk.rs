//! Bulk batches over the newline-delimited `_bulk` endpoint.
//!
//! Every document contributes one action line, followed by one payload line
//! for every kind except delete. The body always ends with a newline; the
//! engine rejects it otherwise.

use crate::{
    client::ElasticClient,
    document::{Document, ItemStatus},
    error::{ElasticError, Result},
    transport::EngineRequest,
};
use http::Method;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Bulk operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchKind {
    /// Create documents; the engine assigns ids.
    Create,
    /// Merge a partial document into an existing one.
    Update,
    /// Replace an existing document wholesale (the `index` action).
    Replace,
    /// Delete documents by id.
    Delete,
}

impl BatchKind {
    /// Action verb used on the wire.
    pub fn action(&self) -> &'static str {
        match self {
            BatchKind::Create => "create",
            BatchKind::Update => "update",
            BatchKind::Replace => "index",
            BatchKind::Delete => "delete",
        }
    }

    /// Whether documents must carry an id.
    pub fn requires_id(&self) -> bool {
        !matches!(self, BatchKind::Create)
    }
}

/// Action line: `{"<verb>": {"_index": .., "_type": .., "_id": ..}}`.
#[derive(Serialize)]
#[serde(rename_all = "lowercase")]
enum Action<'a> {
    Create(ActionMeta<'a>),
    Update(ActionMeta<'a>),
    Index(ActionMeta<'a>),
    Delete(ActionMeta<'a>),
}

#[derive(Serialize)]
struct ActionMeta<'a> {
    #[serde(rename = "_index")]
    index: &'a str,
    #[serde(rename = "_type")]
    doc_type: &'a str,
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
}

#[derive(Serialize)]
struct PartialDoc<'a> {
    doc: &'a Value,
}

/// One bulk request over a caller-owned slice of documents.
///
/// A batch is consumed by [`push`](Batch::push); build a new one per request.
pub struct Batch<'a> {
    client: &'a ElasticClient,
    kind: BatchKind,
    docs: &'a mut [Document],
}

impl<'a> Batch<'a> {
    /// Create a batch.
    pub fn new(client: &'a ElasticClient, kind: BatchKind, docs: &'a mut [Document]) -> Self {
        Self { client, kind, docs }
    }

    /// Get the batch kind.
    pub fn kind(&self) -> BatchKind {
        self.kind
    }

    /// Get the documents.
    pub fn docs(&self) -> &[Document] {
        &*self.docs
    }

    /// Number of documents in the batch.
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// Whether the batch has no documents.
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    fn action<'d>(&'d self, position: usize, doc: &'d Document) -> Result<Action<'d>> {
        let config = self.client.config();

        let id = if self.kind.requires_id() {
            let id = doc.id.as_deref().ok_or_else(|| {
                ElasticError::Usage(format!(
                    "{} requires a document id; document {} has none",
                    self.kind.action(),
                    position
                ))
            })?;
            Some(id)
        } else {
            None
        };

        let meta = ActionMeta {
            index: &config.index,
            doc_type: &config.doc_type,
            id,
        };

        Ok(match self.kind {
            BatchKind::Create => Action::Create(meta),
            BatchKind::Update => Action::Update(meta),
            BatchKind::Replace => Action::Index(meta),
            BatchKind::Delete => Action::Delete(meta),
        })
    }

    /// Render the newline-delimited request body.
    pub fn serialize(&self) -> Result<String> {
        let mut lines = Vec::with_capacity(self.docs.len() * 2);

        for (position, doc) in self.docs.iter().enumerate() {
            lines.push(serde_json::to_string(&self.action(position, doc)?)?);

            match self.kind {
                BatchKind::Create | BatchKind::Replace => {
                    lines.push(serde_json::to_string(&doc.source)?);
                }
                BatchKind::Update => {
                    lines.push(serde_json::to_string(&PartialDoc { doc: &doc.source })?);
                }
                BatchKind::Delete => {}
            }
        }

        let mut body = lines.join("\n");
        body.push('\n');
        Ok(body)
    }

    /// Send the batch and attach per-item results to the documents.
    ///
    /// An empty batch returns immediately without a request. A batch-level
    /// `errors` flag is logged, not returned: inspect each document's
    /// `status` to find the items that failed.
    pub async fn push(self) -> Result<BulkReport> {
        let kind = self.kind;
        let submitted = self.docs.len();

        if submitted == 0 {
            debug!(action = kind.action(), "Skipping empty bulk batch");
            return Ok(BulkReport::empty(kind));
        }

        let body = self.serialize()?;
        let config = self.client.config();

        let mut request = EngineRequest::new(Method::POST, config.bulk_url()).headers_from(config);
        if !config.has_content_type() {
            request = request.header("Content-Type", "application/x-ndjson");
        }

        debug!(
            action = kind.action(),
            documents = submitted,
            bytes = body.len(),
            "Pushing bulk batch"
        );

        let response = self.client.send(request.body(body)).await?;

        if kind == BatchKind::Delete {
            let (errors, took) = match response.json::<BulkResponse>() {
                Ok(parsed) => (parsed.errors, parsed.took),
                Err(_) => (false, None),
            };
            if errors {
                warn!(action = kind.action(), "Bulk response reported item errors");
            }
            return Ok(BulkReport {
                kind,
                items: submitted,
                errors,
                failed: 0,
                took,
            });
        }

        let parsed: BulkResponse = response.json()?;
        if parsed.errors {
            warn!(action = kind.action(), "Bulk response reported item errors");
        }

        if parsed.items.len() != submitted {
            return Err(ElasticError::ItemCountMismatch {
                expected: submitted,
                actual: parsed.items.len(),
            });
        }

        let mut results = Vec::with_capacity(submitted);
        for (position, item) in parsed.items.into_iter().enumerate() {
            if item.action() != kind.action() {
                return Err(ElasticError::UnexpectedResponse(format!(
                    "item {} is a {} result in a {} batch",
                    position,
                    item.action(),
                    kind.action()
                )));
            }
            let result = item.into_result();
            if kind == BatchKind::Create && result.id.is_none() {
                return Err(ElasticError::UnexpectedResponse(format!(
                    "create item {} has no _id",
                    position
                )));
            }
            results.push(result);
        }

        let mut failed = 0;
        for (doc, result) in self.docs.iter_mut().zip(results) {
            if kind == BatchKind::Create {
                doc.id = result.id;
            }
            if !result.status.is_success() {
                failed += 1;
            }
            doc.status = Some(result.status);
            doc.error = result.error;
        }

        debug!(
            action = kind.action(),
            documents = submitted,
            failed,
            "Bulk batch applied"
        );

        Ok(BulkReport {
            kind,
            items: submitted,
            errors: parsed.errors,
            failed,
            took: parsed.took,
        })
    }
}

/// Summary of a pushed batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkReport {
    /// Batch kind.
    pub kind: BatchKind,
    /// Number of documents submitted.
    pub items: usize,
    /// Batch-level errors flag from the engine.
    pub errors: bool,
    /// Items whose status is not a success.
    pub failed: usize,
    /// Engine processing time in milliseconds.
    pub took: Option<u64>,
}

impl BulkReport {
    fn empty(kind: BatchKind) -> Self {
        Self {
            kind,
            items: 0,
            errors: false,
            failed: 0,
            took: None,
        }
    }

    /// Whether every item went through.
    pub fn is_clean(&self) -> bool {
        !self.errors && self.failed == 0
    }
}

/// Bulk endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkResponse {
    /// Time taken in milliseconds.
    #[serde(default)]
    pub took: Option<u64>,
    /// Whether any item failed.
    #[serde(default, deserialize_with = "truthy")]
    pub errors: bool,
    /// Item results, in request order.
    #[serde(default)]
    pub items: Vec<BulkItem>,
}

/// One item of a bulk response, keyed by its action verb.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkItem {
    /// Create result.
    Create(BulkItemResult),
    /// Update result.
    Update(BulkItemResult),
    /// Index (replace) result.
    Index(BulkItemResult),
    /// Delete result.
    Delete(BulkItemResult),
}

impl BulkItem {
    /// Action verb of this item.
    pub fn action(&self) -> &'static str {
        match self {
            BulkItem::Create(_) => "create",
            BulkItem::Update(_) => "update",
            BulkItem::Index(_) => "index",
            BulkItem::Delete(_) => "delete",
        }
    }

    /// Get the item result.
    pub fn result(&self) -> &BulkItemResult {
        match self {
            BulkItem::Create(r) | BulkItem::Update(r) | BulkItem::Index(r) | BulkItem::Delete(r) => r,
        }
    }

    fn into_result(self) -> BulkItemResult {
        match self {
            BulkItem::Create(r) | BulkItem::Update(r) | BulkItem::Index(r) | BulkItem::Delete(r) => r,
        }
    }
}

/// Result of a single bulk item.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkItemResult {
    /// Index name.
    #[serde(rename = "_index", default)]
    pub index: Option<String>,
    /// Document ID.
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    /// Document version.
    #[serde(rename = "_version", default)]
    pub version: Option<i64>,
    /// Result keyword (`created`, `updated`, ...).
    #[serde(default)]
    pub result: Option<String>,
    /// Item status.
    pub status: ItemStatus,
    /// Error details.
    #[serde(default)]
    pub error: Option<Value>,
}

/// Accept `errors` as a boolean or any JSON value with the usual truthiness.
fn truthy<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => false,
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    })
}
