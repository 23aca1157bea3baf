//! Scroll cursors over large result sets.
//!
//! A [`Scroll`] moves through three states: unopened, open and closed. Opening
//! issues the initial search, which returns the first page together with a
//! cursor token; later pages are fetched with that token until the page count
//! computed at open time is reached. Closing releases the server-side cursor.
//!
//! Prefer [`Scroll::scoped`], which releases the cursor however the body
//! exits. A scroll dropped while still open releases its cursor in the
//! background when a Tokio runtime is available.

use crate::{
    client::ElasticClient,
    error::{ElasticError, Result},
    transport::EngineRequest,
};
use futures::{Stream, future::BoxFuture};
use http::Method;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Cursor lifetime used when none is given.
pub const DEFAULT_LIFETIME: &str = "1m";

/// One page of hits.
pub type Page = Vec<Hit>;

/// A search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    /// Index name.
    #[serde(rename = "_index", default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    /// Document type.
    #[serde(rename = "_type", default, skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
    /// Document ID.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Relevance score.
    #[serde(rename = "_score", default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Document source.
    #[serde(rename = "_source", default)]
    pub source: Value,
    /// Remaining hit fields (`sort`, `highlight`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Hit {
    /// Deserialize the source into a typed document.
    pub fn source_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.source.clone())?)
    }
}

/// `hits.total`: a bare count on older engines, an object on newer ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TotalHits {
    /// Bare count.
    Count(u64),
    /// `{ "value": n, "relation": "eq" }`
    Object {
        /// Hit count.
        value: u64,
    },
}

impl TotalHits {
    /// Get the hit count.
    pub fn value(&self) -> u64 {
        match self {
            TotalHits::Count(value) | TotalHits::Object { value } => *value,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ScrollResponse {
    #[serde(rename = "_scroll_id", default)]
    scroll_id: Option<String>,
    hits: HitsEnvelope,
}

#[derive(Debug, Deserialize)]
struct HitsEnvelope {
    #[serde(default)]
    total: Option<TotalHits>,
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug)]
struct Cursor {
    scroll_id: String,
    total_hits: u64,
    num_pages: u64,
    pages_served: u64,
    first_page: Option<Page>,
}

#[derive(Debug)]
enum ScrollState {
    Unopened,
    Open(Cursor),
    Closed,
}

impl ScrollState {
    fn cursor(&self) -> Option<&Cursor> {
        match self {
            ScrollState::Open(cursor) => Some(cursor),
            _ => None,
        }
    }

    fn cursor_mut(&mut self) -> Result<&mut Cursor> {
        match self {
            ScrollState::Open(cursor) => Ok(cursor),
            ScrollState::Unopened => Err(ElasticError::Usage("scroll is not open".to_string())),
            ScrollState::Closed => Err(ElasticError::Usage("scroll is closed".to_string())),
        }
    }
}

/// Number of pages needed for `total` hits at `page_size` hits per page.
fn page_count(total: u64, page_size: usize) -> u64 {
    if total == 0 || page_size == 0 {
        0
    } else {
        total.div_ceil(page_size as u64)
    }
}

/// Forward-only page cursor over a search.
///
/// Single use: once closed it cannot be reopened. Every method takes
/// `&mut self`, so one scroll never has two requests in flight.
#[derive(Debug)]
pub struct Scroll {
    client: ElasticClient,
    query: Value,
    lifetime: String,
    state: ScrollState,
}

impl Scroll {
    /// Create an unopened scroll.
    pub fn new(client: ElasticClient, query: Value) -> Self {
        Self {
            client,
            query,
            lifetime: DEFAULT_LIFETIME.to_string(),
            state: ScrollState::Unopened,
        }
    }

    /// Set the cursor lifetime (`"30s"`, `"5m"`, ...).
    pub fn with_lifetime(mut self, lifetime: impl Into<String>) -> Self {
        self.lifetime = lifetime.into();
        self
    }

    /// Get the query.
    pub fn query(&self) -> &Value {
        &self.query
    }

    /// Get the cursor lifetime.
    pub fn lifetime(&self) -> &str {
        &self.lifetime
    }

    /// Current cursor token, while open.
    pub fn scroll_id(&self) -> Option<&str> {
        self.state.cursor().map(|c| c.scroll_id.as_str())
    }

    /// Total hits reported at open time, while open.
    pub fn total_hits(&self) -> Option<u64> {
        self.state.cursor().map(|c| c.total_hits)
    }

    /// Page count computed at open time, while open.
    pub fn num_pages(&self) -> Option<u64> {
        self.state.cursor().map(|c| c.num_pages)
    }

    /// Whether the cursor is open.
    pub fn is_open(&self) -> bool {
        matches!(self.state, ScrollState::Open(_))
    }

    /// Whether the cursor has been closed.
    pub fn is_closed(&self) -> bool {
        matches!(self.state, ScrollState::Closed)
    }

    /// Issue the initial search and capture the first page.
    ///
    /// Fails with a usage error unless the scroll is unopened.
    pub async fn open(&mut self) -> Result<()> {
        match self.state {
            ScrollState::Unopened => {}
            ScrollState::Open(_) => {
                return Err(ElasticError::Usage("scroll is already open".to_string()));
            }
            ScrollState::Closed => {
                return Err(ElasticError::Usage(
                    "scroll is closed and cannot be reopened".to_string(),
                ));
            }
        }

        let config = self.client.config();
        let mut request = EngineRequest::new(Method::GET, config.search_url())
            .query("scroll", self.lifetime.as_str())
            .headers_from(config);
        if !config.has_content_type() {
            request = request.header("Content-Type", "application/json");
        }
        let request = request.body(serde_json::to_string(&self.query)?);

        debug!(index = %config.index, lifetime = %self.lifetime, "Opening scroll");

        let response: ScrollResponse = self.client.send(request).await?.json()?;

        let scroll_id = response.scroll_id.ok_or_else(|| {
            ElasticError::UnexpectedResponse("search response has no _scroll_id".to_string())
        })?;
        let total_hits = response
            .hits
            .total
            .ok_or_else(|| {
                ElasticError::UnexpectedResponse("search response has no hits.total".to_string())
            })?
            .value();
        let first_page = response.hits.hits;

        if total_hits > 0 && first_page.is_empty() {
            warn!(
                total_hits,
                "First scroll page is empty; set a non-zero size in the query"
            );
        }
        let num_pages = page_count(total_hits, first_page.len());

        debug!(scroll_id = %scroll_id, total_hits, num_pages, "Scroll opened");

        self.state = ScrollState::Open(Cursor {
            scroll_id,
            total_hits,
            num_pages,
            pages_served: 0,
            first_page: Some(first_page),
        });

        Ok(())
    }

    /// Fetch the next page, opening the scroll first if needed.
    ///
    /// Returns `Ok(None)` once every page has been served. The first page is
    /// the one captured at open time; each later page costs one request.
    pub async fn next_page(&mut self) -> Result<Option<Page>> {
        if matches!(self.state, ScrollState::Unopened) {
            self.open().await?;
        }

        let cursor = self.state.cursor_mut()?;

        if cursor.pages_served >= cursor.num_pages {
            return Ok(None);
        }

        if let Some(page) = cursor.first_page.take() {
            cursor.pages_served += 1;
            return Ok(Some(page));
        }

        let config = self.client.config();
        let request = EngineRequest::new(Method::GET, config.scroll_url())
            .query("scroll", self.lifetime.as_str())
            .query("scroll_id", cursor.scroll_id.as_str())
            .headers_from(config);

        let response: ScrollResponse = self.client.send(request).await?.json()?;

        if let Some(scroll_id) = response.scroll_id
            && scroll_id != cursor.scroll_id
        {
            debug!(scroll_id = %scroll_id, "Scroll token renewed");
            cursor.scroll_id = scroll_id;
        }

        cursor.pages_served += 1;
        let page = response.hits.hits;

        if page.is_empty() {
            debug!(
                pages_served = cursor.pages_served,
                num_pages = cursor.num_pages,
                "Scroll ended early"
            );
            cursor.pages_served = cursor.num_pages;
            return Ok(None);
        }

        Ok(Some(page))
    }

    /// Release the server-side cursor.
    ///
    /// Fails with a usage error before open or after a previous close. The
    /// scroll counts as closed even if the release request fails.
    pub async fn close(&mut self) -> Result<()> {
        let cursor = match std::mem::replace(&mut self.state, ScrollState::Closed) {
            ScrollState::Open(cursor) => cursor,
            ScrollState::Unopened => {
                self.state = ScrollState::Unopened;
                return Err(ElasticError::Usage("scroll is not open".to_string()));
            }
            ScrollState::Closed => {
                return Err(ElasticError::Usage("scroll is already closed".to_string()));
            }
        };

        release(&self.client, &cursor.scroll_id).await
    }

    /// Open the scroll, run `body`, then release the cursor.
    ///
    /// The cursor is released whether `body` finishes, stops early or fails.
    /// The body's result is returned; a failed release is only logged.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use armature_elastic::{ElasticClient, ElasticConfig};
    /// use serde_json::json;
    ///
    /// # async fn run() -> armature_elastic::Result<()> {
    /// let client = ElasticClient::new(ElasticConfig::new("http://localhost:9200", "articles", "article"))?;
    ///
    /// let ids = client
    ///     .scroll(json!({ "size": 100, "query": { "match_all": {} } }))
    ///     .scoped(|scroll| Box::pin(async move {
    ///         let mut ids = Vec::new();
    ///         while let Some(page) = scroll.next_page().await? {
    ///             ids.extend(page.into_iter().filter_map(|hit| hit.id));
    ///         }
    ///         Ok(ids)
    ///     }))
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn scoped<F, T>(mut self, body: F) -> Result<T>
    where
        F: for<'s> FnOnce(&'s mut Scroll) -> BoxFuture<'s, Result<T>>,
    {
        self.open().await?;

        let outcome = body(&mut self).await;
        let released = if self.is_open() {
            self.close().await
        } else {
            Ok(())
        };

        match (outcome, released) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(value), Err(release_error)) => {
                warn!(error = %release_error, "Failed to release scroll after body completed");
                Ok(value)
            }
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(release_error)) => {
                warn!(error = %release_error, "Failed to release scroll after body error");
                Err(e)
            }
        }
    }

    /// Read every page and return all hits, releasing the cursor.
    pub async fn collect_hits(self) -> Result<Vec<Hit>> {
        self.scoped(|scroll| {
            Box::pin(async move {
                let mut hits = Vec::new();
                while let Some(page) = scroll.next_page().await? {
                    hits.extend(page);
                }
                Ok(hits)
            })
        })
        .await
    }

    /// Lazy stream of pages over [`next_page`](Scroll::next_page).
    pub fn pages(&mut self) -> impl Stream<Item = Result<Page>> + '_ {
        futures::stream::try_unfold(self, |scroll| async move {
            Ok::<_, ElasticError>(scroll.next_page().await?.map(|page| (page, scroll)))
        })
    }
}

impl Drop for Scroll {
    fn drop(&mut self) {
        let ScrollState::Open(cursor) = std::mem::replace(&mut self.state, ScrollState::Closed)
        else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!(scroll_id = %cursor.scroll_id, "Scroll dropped while open; releasing in background");
                let client = self.client.clone();
                handle.spawn(async move {
                    if let Err(e) = release(&client, &cursor.scroll_id).await {
                        warn!(error = %e, "Background scroll release failed");
                    }
                });
            }
            Err(_) => {
                warn!(
                    scroll_id = %cursor.scroll_id,
                    "Scroll dropped while open outside a Tokio runtime; cursor left to expire"
                );
            }
        }
    }
}

async fn release(client: &ElasticClient, scroll_id: &str) -> Result<()> {
    let config = client.config();
    let request = EngineRequest::new(Method::DELETE, config.scroll_url())
        .query("scroll_id", scroll_id)
        .headers_from(config);

    client.send(request).await?;

    debug!(scroll_id = %scroll_id, "Scroll released");
    Ok(())
}
