//! W3C-style traceparent generation and parsing.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Header (and record header) name carrying the traceparent.
pub const TRACEPARENT_HEADER: &str = "traceparent";

const VERSION: &str = "00";
const FLAGS: &str = "00";
const TRACE_ID_BYTES: usize = 16;
const SPAN_ID_BYTES: usize = 8;

/// Errors produced when building or parsing a traceparent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraceparentError {
    #[error("malformed traceparent `{0}`")]
    Malformed(String),

    #[error("unsupported traceparent version `{0}`")]
    UnsupportedVersion(String),

    #[error("invalid trace id `{0}`: expected 32 lowercase hex chars, not all zero")]
    InvalidTraceId(String),

    #[error("invalid span id `{0}`: expected 16 lowercase hex chars, not all zero")]
    InvalidSpanId(String),
}

/// Synthetic trace identifier pair for one test case.
///
/// Rendered as `00-<trace id>-<span id>-00` by [`fmt::Display`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Traceparent {
    trace_id: String,
    span_id: String,
}

impl Traceparent {
    /// Build a traceparent from already-encoded ids.
    pub fn new(
        trace_id: impl Into<String>,
        span_id: impl Into<String>,
    ) -> Result<Self, TraceparentError> {
        let trace_id = trace_id.into();
        let span_id = span_id.into();

        if !is_valid_id(&trace_id, TRACE_ID_BYTES) {
            return Err(TraceparentError::InvalidTraceId(trace_id));
        }
        if !is_valid_id(&span_id, SPAN_ID_BYTES) {
            return Err(TraceparentError::InvalidSpanId(span_id));
        }

        Ok(Self { trace_id, span_id })
    }

    /// Generate a fresh random traceparent.
    ///
    /// Uniqueness is the goal, so the thread-local (non-cryptographic) RNG is enough.
    pub fn random() -> Self {
        let mut rng = rand::thread_rng();

        let mut trace = [0u8; TRACE_ID_BYTES];
        while trace == [0u8; TRACE_ID_BYTES] {
            rng.fill(&mut trace);
        }

        let mut span = [0u8; SPAN_ID_BYTES];
        while span == [0u8; SPAN_ID_BYTES] {
            rng.fill(&mut span);
        }

        Self {
            trace_id: to_hex(&trace),
            span_id: to_hex(&span),
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn span_id(&self) -> &str {
        &self.span_id
    }

    /// Canonical header value, identical to the `Display` output.
    pub fn header_value(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Traceparent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}-{}", VERSION, self.trace_id, self.span_id, FLAGS)
    }
}

impl FromStr for Traceparent {
    type Err = TraceparentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('-').collect();
        let [version, trace_id, span_id, flags] = parts.as_slice() else {
            return Err(TraceparentError::Malformed(s.to_string()));
        };

        if *version != VERSION {
            return Err(TraceparentError::UnsupportedVersion(version.to_string()));
        }
        if flags.len() != 2 || !flags.bytes().all(is_lower_hex) {
            return Err(TraceparentError::Malformed(s.to_string()));
        }

        Self::new(*trace_id, *span_id)
    }
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

fn is_lower_hex(b: u8) -> bool {
    b.is_ascii_digit() || (b'a'..=b'f').contains(&b)
}

fn is_valid_id(id: &str, bytes: usize) -> bool {
    id.len() == bytes * 2 && id.bytes().all(is_lower_hex) && id.bytes().any(|b| b != b'0')
}
