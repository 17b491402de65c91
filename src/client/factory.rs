//! Builds instrumented clients for a traceparent.

use std::sync::Arc;

use axum::Router;

use crate::client::http::TracedHttpClient;
use crate::client::producer::{RecordTransport, TracedProducer};
use crate::client::web::TracedWebDriver;
use crate::client::ClientError;
use crate::trace::Traceparent;

const USER_AGENT: &str = concat!("trace-harness/", env!("CARGO_PKG_VERSION"));

/// Pure factory: the same inputs always give an equivalently wired client.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientFactory;

impl ClientFactory {
    pub fn new() -> Self {
        Self
    }

    pub fn http_client(&self, traceparent: Arc<Traceparent>) -> Result<TracedHttpClient, ClientError> {
        let inner = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(TracedHttpClient::new(inner, traceparent))
    }

    pub fn web_driver(
        &self,
        app: &Router,
        traceparent: Arc<Traceparent>,
    ) -> Result<TracedWebDriver, ClientError> {
        TracedWebDriver::new(app.clone(), traceparent)
    }

    pub fn producer(
        &self,
        transport: Arc<dyn RecordTransport>,
        traceparent: Arc<Traceparent>,
    ) -> TracedProducer {
        TracedProducer::new(transport, traceparent)
    }
}
