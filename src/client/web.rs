//! In-process web driver for an axum application.
//!
//! # Design Decisions
//! - Requests go straight into the router via `tower::ServiceExt::oneshot`, no socket
//! - The traceparent is attached by `SetRequestHeaderLayer::if_not_present`, so an
//!   explicit header on a request overrides the default one

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Method, Request, Response};
use axum::Router;
use tower::{Layer, ServiceExt};
use tower_http::set_header::{SetRequestHeader, SetRequestHeaderLayer};

use crate::client::ClientError;
use crate::trace::{Traceparent, TRACEPARENT_HEADER};

/// Test driver whose default request carries the test case's traceparent.
#[derive(Clone)]
pub struct TracedWebDriver {
    service: SetRequestHeader<Router, HeaderValue>,
    traceparent: Arc<Traceparent>,
}

impl std::fmt::Debug for TracedWebDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TracedWebDriver")
            .field("traceparent", &self.traceparent)
            .finish_non_exhaustive()
    }
}

impl TracedWebDriver {
    pub fn new(app: Router, traceparent: Arc<Traceparent>) -> Result<Self, ClientError> {
        let value = HeaderValue::from_str(&traceparent.header_value())
            .map_err(|e| ClientError::InvalidHeader(e.to_string()))?;
        let layer =
            SetRequestHeaderLayer::if_not_present(HeaderName::from_static(TRACEPARENT_HEADER), value);

        Ok(Self {
            service: layer.layer(app),
            traceparent,
        })
    }

    pub fn traceparent(&self) -> &Traceparent {
        &self.traceparent
    }

    /// Dispatch a request into the application.
    pub async fn perform(&self, request: Request<Body>) -> Response<Body> {
        let result: Result<Response<Body>, Infallible> = self.service.clone().oneshot(request).await;
        match result {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }

    pub async fn get(&self, uri: &str) -> Result<Response<Body>, ClientError> {
        self.send(Method::GET, uri, Body::empty()).await
    }

    pub async fn post(&self, uri: &str, body: impl Into<Body>) -> Result<Response<Body>, ClientError> {
        self.send(Method::POST, uri, body.into()).await
    }

    async fn send(&self, method: Method, uri: &str, body: Body) -> Result<Response<Body>, ClientError> {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(body)
            .map_err(|e| ClientError::InvalidRequest(e.to_string()))?;
        Ok(self.perform(request).await)
    }
}
