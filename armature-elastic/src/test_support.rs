//! Recording transport for unit tests.

use crate::{
    client::ElasticClient,
    config::ElasticConfig,
    error::Result,
    transport::{EngineRequest, EngineResponse, Transport},
};
use async_trait::async_trait;
use http::StatusCode;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Transport that records every request and replays queued responses.
///
/// An empty queue answers `200 {}`.
#[derive(Default)]
pub(crate) struct MockTransport {
    requests: Mutex<Vec<EngineRequest>>,
    responses: Mutex<VecDeque<EngineResponse>>,
}

impl MockTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn respond(&self, status: u16, body: impl Into<String>) {
        let status = StatusCode::from_u16(status).unwrap();
        self.responses
            .lock()
            .unwrap()
            .push_back(EngineResponse::new(status, body));
    }

    pub(crate) fn respond_json(&self, body: Value) {
        self.respond(200, body.to_string());
    }

    pub(crate) fn requests(&self) -> Vec<EngineRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: EngineRequest) -> Result<EngineResponse> {
        self.requests.lock().unwrap().push(request);
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| EngineResponse::new(StatusCode::OK, "{}")))
    }
}

pub(crate) fn dummy_config() -> ElasticConfig {
    ElasticConfig::new("http://foo.bar", "foo", "bar")
}

pub(crate) fn mock_client(transport: &Arc<MockTransport>) -> ElasticClient {
    ElasticClient::with_transport(dummy_config(), transport.clone()).unwrap()
}
