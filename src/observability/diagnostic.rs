//! Thread-scoped diagnostic map and the traceparent bridge.
//!
//! # Responsibilities
//! - Hold a per-thread key/value map used to correlate log lines
//! - Mirror the active traceparent into that map when correlation is enabled
//!
//! # Design Decisions
//! - Storage is a `thread_local!`; no cross-thread locking
//! - Every accessor returns `DiagnosticError` instead of panicking, the bridge
//!   swallows and logs those errors
//! - The bridge only ever touches the two keys it owns
//!
//! # Precondition
//! Bind and unbind must happen on the thread that runs the test body. The harness
//! runner guarantees this; external runners driving the bridge directly must too.

use std::cell::RefCell;
use std::collections::BTreeMap;

use thiserror::Error;

use crate::config::TracingConfig;
use crate::trace::Traceparent;

/// Diagnostic key holding the trace id.
pub const TRACE_ID_KEY: &str = "traceId";

/// Diagnostic key holding the span id.
pub const SPAN_ID_KEY: &str = "spanId";

thread_local! {
    static DIAGNOSTIC_MAP: RefCell<BTreeMap<String, String>> = const { RefCell::new(BTreeMap::new()) };
}

/// Failure to reach the calling thread's diagnostic map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DiagnosticError {
    #[error("diagnostic map unavailable: thread-local storage is being destroyed")]
    Unavailable,

    #[error("diagnostic map is already borrowed on this thread")]
    Busy,
}

fn with_map<R>(f: impl FnOnce(&BTreeMap<String, String>) -> R) -> Result<R, DiagnosticError> {
    DIAGNOSTIC_MAP
        .try_with(|map| {
            map.try_borrow()
                .map(|map| f(&map))
                .map_err(|_| DiagnosticError::Busy)
        })
        .map_err(|_| DiagnosticError::Unavailable)?
}

fn with_map_mut<R>(
    f: impl FnOnce(&mut BTreeMap<String, String>) -> R,
) -> Result<R, DiagnosticError> {
    DIAGNOSTIC_MAP
        .try_with(|map| {
            map.try_borrow_mut()
                .map(|mut map| f(&mut map))
                .map_err(|_| DiagnosticError::Busy)
        })
        .map_err(|_| DiagnosticError::Unavailable)?
}

/// Set `key` in the calling thread's map, returning the previous value.
pub fn put(key: &str, value: &str) -> Result<Option<String>, DiagnosticError> {
    with_map_mut(|map| map.insert(key.to_string(), value.to_string()))
}

/// Read `key` from the calling thread's map.
pub fn get(key: &str) -> Option<String> {
    with_map(|map| map.get(key).cloned()).ok().flatten()
}

pub fn contains_key(key: &str) -> bool {
    with_map(|map| map.contains_key(key)).unwrap_or(false)
}

/// Remove `key` from the calling thread's map, returning the removed value.
pub fn remove(key: &str) -> Result<Option<String>, DiagnosticError> {
    with_map_mut(|map| map.remove(key))
}

/// Copy of the calling thread's map; empty when the map cannot be read.
pub fn snapshot() -> BTreeMap<String, String> {
    with_map(|map| map.clone()).unwrap_or_default()
}

/// Remove every entry of the calling thread's map.
pub fn clear() -> Result<(), DiagnosticError> {
    with_map_mut(|map| map.clear())
}

/// Mirrors a test case's traceparent into the diagnostic map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiagnosticBridge {
    enabled: bool,
}

impl DiagnosticBridge {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn from_config(config: &TracingConfig) -> Self {
        Self::new(config.correlate_trace_to_diagnostic_context)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Set `traceId`/`spanId` on the calling thread. Never fails.
    pub fn bind(&self, traceparent: &Traceparent) {
        if !self.enabled {
            return;
        }

        let result = put(TRACE_ID_KEY, traceparent.trace_id())
            .and_then(|_| put(SPAN_ID_KEY, traceparent.span_id()));

        if let Err(e) = result {
            tracing::warn!(error = %e, traceparent = %traceparent, "Failed to bind traceparent to diagnostic context");
        }
    }

    /// Remove `traceId`/`spanId` from the calling thread. Idempotent, never fails.
    pub fn unbind(&self) {
        if !self.enabled {
            return;
        }

        for key in [TRACE_ID_KEY, SPAN_ID_KEY] {
            if let Err(e) = remove(key) {
                tracing::warn!(error = %e, key, "Failed to unbind diagnostic context entry");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_bridge_never_writes() {
        let bridge = DiagnosticBridge::new(false);
        bridge.bind(&Traceparent::random());
        assert!(!contains_key(TRACE_ID_KEY));
        assert!(!contains_key(SPAN_ID_KEY));
    }

    #[test]
    fn test_bind_and_unbind() {
        let bridge = DiagnosticBridge::new(true);
        let tp = Traceparent::random();

        bridge.bind(&tp);
        assert_eq!(get(TRACE_ID_KEY).as_deref(), Some(tp.trace_id()));
        assert_eq!(get(SPAN_ID_KEY).as_deref(), Some(tp.span_id()));

        bridge.unbind();
        assert!(!contains_key(TRACE_ID_KEY));
        assert!(!contains_key(SPAN_ID_KEY));

        // Second unbind is a no-op
        bridge.unbind();
    }

    #[test]
    fn test_unbind_keeps_unrelated_keys() {
        let bridge = DiagnosticBridge::new(true);
        put("requestId", "r-1").unwrap();

        bridge.bind(&Traceparent::random());
        bridge.unbind();

        assert_eq!(get("requestId").as_deref(), Some("r-1"));
        remove("requestId").unwrap();
    }

    #[test]
    fn test_rebind_keeps_single_pair() {
        let bridge = DiagnosticBridge::new(true);
        let first = Traceparent::random();
        let second = Traceparent::random();

        bridge.bind(&first);
        bridge.bind(&second);

        let map = snapshot();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(TRACE_ID_KEY).map(String::as_str), Some(second.trace_id()));
        bridge.unbind();
    }

    #[test]
    fn test_maps_are_thread_scoped() {
        put("owner", "main").unwrap();
        let seen = std::thread::spawn(|| get("owner")).join().unwrap();
        assert_eq!(seen, None);
        clear().unwrap();
    }
}
