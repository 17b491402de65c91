//! Metrics collection.
//!
//! # Metrics
//! - `harness_context_computations_total` (counter): store values computed, by key
//! - `harness_hook_invocations_total` (counter): hooks invoked, by phase
//! - `harness_tests_total` (counter): finished test cases, by outcome
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; installing a recorder is up to the host
//! - Each harness carries its own `Metrics` switch, so disabling recording in one
//!   harness leaves the others in the process untouched

/// Per-harness recording switch handed to every component that records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metrics {
    enabled: bool,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Metrics {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn disabled() -> Self {
        Self::new(false)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn record_context_computation(&self, key: &'static str) {
        if self.enabled {
            ::metrics::counter!("harness_context_computations_total", "key" => key).increment(1);
        }
    }

    pub fn record_hook_invocation(&self, phase: &'static str) {
        if self.enabled {
            ::metrics::counter!("harness_hook_invocations_total", "phase" => phase).increment(1);
        }
    }

    pub fn record_test_outcome(&self, outcome: &'static str) {
        if self.enabled {
            ::metrics::counter!("harness_tests_total", "outcome" => outcome).increment(1);
        }
    }
}
