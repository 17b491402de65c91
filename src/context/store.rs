//! Per-test-case value store with compute-once semantics.
//!
//! # Design Decisions
//! - `DashMap<TestCaseId, HashMap<key, slot>>`; a slot is a shared `OnceCell`
//! - The shard lock is only held while fetching the slot, never while computing,
//!   so a compute function may resolve a different key of the same test case
//! - Values are type-erased `Arc`s; callers get the same `Arc` back every time
//! - Entries only leave the store through `remove`; scope bounds memory, not size

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use thiserror::Error;

use crate::context::TestCaseId;
use crate::error::BoxError;
use crate::observability::Metrics;

type Value = Arc<dyn Any + Send + Sync>;
type Slot = Arc<OnceCell<Value>>;

/// Errors raised by the context store.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("context key `{key}` holds a value of another type than `{expected}`")]
    TypeMismatch { key: &'static str, expected: &'static str },

    #[error("failed to compute context key `{key}`: {source}")]
    Compute {
        key: &'static str,
        #[source]
        source: BoxError,
    },
}

/// Shared store of lazily computed values, namespaced by test case.
#[derive(Debug, Default)]
pub struct ContextStore {
    entries: DashMap<TestCaseId, HashMap<&'static str, Slot>>,
    metrics: Metrics,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metrics(metrics: Metrics) -> Self {
        Self {
            entries: DashMap::new(),
            metrics,
        }
    }

    /// Return the value for `(test_case, key)`, computing it on first access.
    ///
    /// `compute` runs at most once per pair, even when called from many threads.
    /// Calling this for the same pair from inside `compute` deadlocks.
    pub fn get_or_compute<T, F>(
        &self,
        test_case: TestCaseId,
        key: &'static str,
        compute: F,
    ) -> Result<Arc<T>, ContextError>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        self.try_get_or_compute(test_case, key, || Ok::<_, Infallible>(compute()))
    }

    /// Fallible variant of [`get_or_compute`](Self::get_or_compute).
    ///
    /// A failed computation leaves the slot empty, so a later call may retry.
    pub fn try_get_or_compute<T, E, F>(
        &self,
        test_case: TestCaseId,
        key: &'static str,
        compute: F,
    ) -> Result<Arc<T>, ContextError>
    where
        T: Send + Sync + 'static,
        E: Into<BoxError>,
        F: FnOnce() -> Result<T, E>,
    {
        let slot = self.slot(test_case, key);

        let value = slot.get_or_try_init(|| {
            let value = compute().map_err(|e| ContextError::Compute {
                key,
                source: e.into(),
            })?;
            self.metrics.record_context_computation(key);
            tracing::trace!(test_case = %test_case, key, "Context value computed");
            Ok::<Value, ContextError>(Arc::new(value))
        })?;

        downcast(key, Arc::clone(value))
    }

    /// Read a value without computing it.
    pub fn get<T>(&self, test_case: TestCaseId, key: &'static str) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        let slot = self.entries.get(&test_case)?.get(key).cloned()?;
        let value = slot.get()?;
        downcast(key, Arc::clone(value)).ok()
    }

    /// Whether a value has been computed for `(test_case, key)`.
    pub fn contains(&self, test_case: TestCaseId, key: &'static str) -> bool {
        self.entries
            .get(&test_case)
            .and_then(|slots| slots.get(key).map(|slot| slot.get().is_some()))
            .unwrap_or(false)
    }

    /// Evict every entry of `test_case`, returning how many computed values were dropped.
    pub fn remove(&self, test_case: TestCaseId) -> usize {
        match self.entries.remove(&test_case) {
            Some((_, slots)) => slots.values().filter(|slot| slot.get().is_some()).count(),
            None => 0,
        }
    }

    /// Number of test cases currently holding entries.
    pub fn test_case_count(&self) -> usize {
        self.entries.len()
    }

    fn slot(&self, test_case: TestCaseId, key: &'static str) -> Slot {
        // The entry guard is dropped at the end of this statement.
        Arc::clone(
            self.entries
                .entry(test_case)
                .or_default()
                .entry(key)
                .or_default(),
        )
    }
}

fn downcast<T>(key: &'static str, value: Value) -> Result<Arc<T>, ContextError>
where
    T: Send + Sync + 'static,
{
    value.downcast::<T>().map_err(|_| ContextError::TypeMismatch {
        key,
        expected: type_name::<T>(),
    })
}
