//! HTTP client carrying the test case's traceparent.

use std::sync::Arc;

use reqwest::{IntoUrl, Method, RequestBuilder};

use crate::trace::{Traceparent, TRACEPARENT_HEADER};

/// `reqwest::Client` wrapper adding the `traceparent` header to every request.
///
/// The header is read from the shared traceparent each time a request is built,
/// never baked into the client's default headers.
#[derive(Debug, Clone)]
pub struct TracedHttpClient {
    inner: reqwest::Client,
    traceparent: Arc<Traceparent>,
}

impl TracedHttpClient {
    pub fn new(inner: reqwest::Client, traceparent: Arc<Traceparent>) -> Self {
        Self { inner, traceparent }
    }

    pub fn traceparent(&self) -> &Traceparent {
        &self.traceparent
    }

    /// The wrapped client, for requests that must not carry the header.
    pub fn inner(&self) -> &reqwest::Client {
        &self.inner
    }

    pub fn request<U: IntoUrl>(&self, method: Method, url: U) -> RequestBuilder {
        self.inner
            .request(method, url)
            .header(TRACEPARENT_HEADER, self.traceparent.header_value())
    }

    pub fn get<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    pub fn post<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    pub fn put<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.request(Method::PUT, url)
    }

    pub fn patch<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.request(Method::PATCH, url)
    }

    pub fn delete<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.request(Method::DELETE, url)
    }
}
