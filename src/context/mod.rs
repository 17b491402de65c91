//! Test-case scoped context.
//!
//! # Data Flow
//! ```text
//! runner creates TestCaseId
//!     → resolver asks store.get_or_compute(id, key, ..)
//!     → first caller computes, everyone else gets the same Arc
//! end of test case
//!     → store.remove(id) drops every value of that test case
//! ```

pub mod store;

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use store::{ContextError, ContextStore};

/// Store keys used by the trace resolver.
pub mod keys {
    pub const TRACEPARENT: &str = "traceparent";
    pub const HTTP_CLIENT: &str = "httpClient";
    pub const WEB_DRIVER: &str = "webDriver";
    pub const MESSAGE_PRODUCER: &str = "messageProducer";
}

/// Opaque handle identifying one execution of one test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TestCaseId(Uuid);

impl TestCaseId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TestCaseId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for TestCaseId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for TestCaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
