//! Client handle shared by batches and scrolls.

use crate::{
    bulk::{Batch, BatchKind},
    config::ElasticConfig,
    document::Document,
    error::Result,
    scroll::Scroll,
    transport::{EngineRequest, EngineResponse, ReqwestTransport, Transport},
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Entry point for bulk batches and scroll cursors.
///
/// Cloning is cheap: the configuration and transport are shared.
#[derive(Clone)]
pub struct ElasticClient {
    config: Arc<ElasticConfig>,
    transport: Arc<dyn Transport>,
}

impl ElasticClient {
    /// Create a client using the default reqwest transport.
    pub fn new(config: ElasticConfig) -> Result<Self> {
        info!(endpoint = %config.endpoint, index = %config.index, "Initializing elastic client");

        config.validate()?;
        let transport = ReqwestTransport::new(&config)?;

        Ok(Self {
            config: Arc::new(config),
            transport: Arc::new(transport),
        })
    }

    /// Create a client over a custom transport.
    pub fn with_transport(config: ElasticConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config: Arc::new(config),
            transport,
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &ElasticConfig {
        &self.config
    }

    /// Get the transport.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    // =========================================================================
    // Bulk Operations
    // =========================================================================

    /// Build a batch of the given kind over `docs`.
    pub fn batch<'a>(&'a self, kind: BatchKind, docs: &'a mut [Document]) -> Batch<'a> {
        Batch::new(self, kind, docs)
    }

    /// Batch that creates `docs` with engine-assigned ids.
    pub fn create<'a>(&'a self, docs: &'a mut [Document]) -> Batch<'a> {
        self.batch(BatchKind::Create, docs)
    }

    /// Batch that merges each document's source into the stored document.
    pub fn update<'a>(&'a self, docs: &'a mut [Document]) -> Batch<'a> {
        self.batch(BatchKind::Update, docs)
    }

    /// Batch that replaces each stored document with the given source.
    pub fn replace<'a>(&'a self, docs: &'a mut [Document]) -> Batch<'a> {
        self.batch(BatchKind::Replace, docs)
    }

    /// Batch that deletes `docs` by id.
    pub fn delete<'a>(&'a self, docs: &'a mut [Document]) -> Batch<'a> {
        self.batch(BatchKind::Delete, docs)
    }

    // =========================================================================
    // Scroll
    // =========================================================================

    /// Create an unopened scroll cursor for `query`.
    ///
    /// The page size is taken from the query (`"size"`), as the engine does.
    pub fn scroll(&self, query: Value) -> Scroll {
        Scroll::new(self.clone(), query)
    }

    /// Send a request and reject non-success statuses.
    pub(crate) async fn send(&self, request: EngineRequest) -> Result<EngineResponse> {
        debug!(method = %request.method, url = %request.url, "Dispatching request");

        let response = self.transport.send(request).await?;

        debug!(status = %response.status, "Received response");

        response.error_for_status()
    }
}

impl std::fmt::Debug for ElasticClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElasticClient")
            .field("endpoint", &self.config.endpoint)
            .field("index", &self.config.index)
            .field("doc_type", &self.config.doc_type)
            .finish()
    }
}
