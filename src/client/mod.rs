//! Instrumented clients.
//!
//! # Data Flow
//! ```text
//! Arc<Traceparent> of the test case
//!     → factory.rs builds a client around it
//!     → http.rs      reqwest requests get `traceparent`
//!     → web.rs       in-process axum requests get `traceparent`
//!     → producer.rs  records get a `traceparent` header appended
//! ```
//!
//! # Design Decisions
//! - Clients hold the shared `Arc<Traceparent>`, not a copied string
//! - Building a client never performs I/O

pub mod factory;
pub mod http;
pub mod producer;
pub mod web;

use thiserror::Error;

pub use factory::ClientFactory;
pub use http::TracedHttpClient;
pub use producer::{
    InMemoryTransport, ProducerError, ProducerInterceptor, ProducerRecord, RecordMetadata,
    RecordTransport, TraceparentInterceptor, TracedProducer,
};
pub use web::TracedWebDriver;

/// Errors raised while building or using an instrumented client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid header value: {0}")]
    InvalidHeader(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}
