//! Trace identifiers.
//!
//! # Responsibilities
//! - Generate a synthetic trace/span id pair per test case
//! - Render and parse the canonical `traceparent` header value
//!
//! # Design Decisions
//! - Ids are random, never derived from time or counters
//! - The same traceparent is reused verbatim for every outbound call of a test case;
//!   no per-call span ids are minted

pub mod traceparent;

pub use traceparent::{Traceparent, TraceparentError, TRACEPARENT_HEADER};
