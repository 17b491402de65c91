//! Message producer carrying the test case's traceparent.
//!
//! # Responsibilities
//! - Model outbound records with appendable headers
//! - Run every record through an interceptor chain before the transport sees it
//! - Provide an in-memory transport for assertions
//!
//! # Design Decisions
//! - Headers are a list, not a map: interceptors append, like broker record headers
//! - The traceparent interceptor only appends; payload, key and topic pass through
//! - Acknowledgement and close callbacks default to no-ops

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use thiserror::Error;

use crate::trace::{Traceparent, TRACEPARENT_HEADER};

/// Errors raised while producing records.
#[derive(Debug, Error)]
pub enum ProducerError {
    #[error("failed to serialize record payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("transport rejected record for topic `{topic}`: {reason}")]
    Transport { topic: String, reason: String },
}

/// A single header of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeader {
    pub name: String,
    pub value: Vec<u8>,
}

/// An outbound record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerRecord {
    pub topic: String,
    pub key: Option<String>,
    pub payload: Vec<u8>,
    headers: Vec<RecordHeader>,
}

impl ProducerRecord {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            key: None,
            payload: payload.into(),
            headers: Vec::new(),
        }
    }

    /// Record with a JSON-encoded payload.
    pub fn json<T: Serialize>(topic: impl Into<String>, value: &T) -> Result<Self, ProducerError> {
        Ok(Self::new(topic, serde_json::to_vec(value)?))
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Append a header; existing headers of the same name are kept.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.headers.push(RecordHeader {
            name: name.into(),
            value: value.into(),
        });
    }

    pub fn headers(&self) -> &[RecordHeader] {
        &self.headers
    }

    /// Values of every header named `name`, in insertion order.
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a [u8]> + 'a {
        self.headers
            .iter()
            .filter(move |h| h.name == name)
            .map(|h| h.value.as_slice())
    }

    /// Last value of header `name` as UTF-8, if any.
    pub fn last_header_str(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|h| h.name == name)
            .and_then(|h| std::str::from_utf8(&h.value).ok())
    }
}

/// Where a record landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMetadata {
    pub topic: String,
    pub offset: u64,
}

/// Underlying messaging transport.
pub trait RecordTransport: Send + Sync {
    fn send(&self, record: ProducerRecord) -> Result<RecordMetadata, ProducerError>;
}

/// Hook invoked around every outbound record.
pub trait ProducerInterceptor: Send + Sync {
    /// Transform a record before it is handed to the transport.
    fn on_send(&self, record: ProducerRecord) -> ProducerRecord;

    fn on_acknowledgement(&self, _result: &Result<RecordMetadata, ProducerError>) {}

    fn close(&self) {}
}

/// Appends the `traceparent` header to every record.
#[derive(Debug, Clone)]
pub struct TraceparentInterceptor {
    traceparent: Arc<Traceparent>,
}

impl TraceparentInterceptor {
    pub fn new(traceparent: Arc<Traceparent>) -> Self {
        Self { traceparent }
    }
}

impl ProducerInterceptor for TraceparentInterceptor {
    fn on_send(&self, mut record: ProducerRecord) -> ProducerRecord {
        record.add_header(TRACEPARENT_HEADER, self.traceparent.header_value());
        record
    }
}

/// Producer sending through a transport after running its interceptors.
pub struct TracedProducer {
    transport: Arc<dyn RecordTransport>,
    interceptors: Vec<Arc<dyn ProducerInterceptor>>,
    traceparent: Arc<Traceparent>,
}

impl std::fmt::Debug for TracedProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TracedProducer")
            .field("traceparent", &self.traceparent)
            .field("interceptors", &self.interceptors.len())
            .finish_non_exhaustive()
    }
}

impl TracedProducer {
    pub fn new(transport: Arc<dyn RecordTransport>, traceparent: Arc<Traceparent>) -> Self {
        let interceptor: Arc<dyn ProducerInterceptor> =
            Arc::new(TraceparentInterceptor::new(traceparent.clone()));
        Self {
            transport,
            interceptors: vec![interceptor],
            traceparent,
        }
    }

    /// Add an interceptor running after the ones already registered.
    pub fn with_interceptor(mut self, interceptor: Arc<dyn ProducerInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn traceparent(&self) -> &Traceparent {
        &self.traceparent
    }

    pub fn send(&self, record: ProducerRecord) -> Result<RecordMetadata, ProducerError> {
        let record = self
            .interceptors
            .iter()
            .fold(record, |record, interceptor| interceptor.on_send(record));
        let topic = record.topic.clone();

        let result = self.transport.send(record);
        for interceptor in &self.interceptors {
            interceptor.on_acknowledgement(&result);
        }

        match &result {
            Ok(meta) => tracing::debug!(topic = %meta.topic, offset = meta.offset, "Record sent"),
            Err(e) => tracing::warn!(topic = %topic, error = %e, "Record send failed"),
        }
        result
    }

    pub fn send_json<T: Serialize>(
        &self,
        topic: impl Into<String>,
        value: &T,
    ) -> Result<RecordMetadata, ProducerError> {
        self.send(ProducerRecord::json(topic, value)?)
    }
}

impl Drop for TracedProducer {
    fn drop(&mut self) {
        for interceptor in &self.interceptors {
            interceptor.close();
        }
    }
}

/// Transport keeping every record in memory.
#[derive(Debug, Default)]
pub struct InMemoryTransport {
    records: Mutex<Vec<ProducerRecord>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ProducerRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn records_for(&self, topic: &str) -> Vec<ProducerRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.topic == topic)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordTransport for InMemoryTransport {
    fn send(&self, record: ProducerRecord) -> Result<RecordMetadata, ProducerError> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let offset = records.iter().filter(|r| r.topic == record.topic).count() as u64;
        let meta = RecordMetadata {
            topic: record.topic.clone(),
            offset,
        };
        records.push(record);
        Ok(meta)
    }
}
