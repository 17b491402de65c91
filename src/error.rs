//! Crate-level error types.

use thiserror::Error;

use crate::inject::TraceTarget;
use crate::lifecycle::Phase;

/// Boxed error used for failures raised by user code (hooks, test bodies).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Configuration problems found while introspecting a test class.
///
/// These are fatal and reported before any test of the class runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscoveryError {
    #[error("{class}: traceable field `{field}` requests {target}, which is unavailable: {reason}")]
    UnsupportedField {
        class: String,
        field: String,
        target: TraceTarget,
        reason: String,
    },

    #[error("{class}: test `{test}` requests parameter {target}, which is unavailable: {reason}")]
    UnsupportedParameter {
        class: String,
        test: String,
        target: TraceTarget,
        reason: String,
    },

    #[error("{class}: hook `{declaration}` targets method `{method}`, but `{type_name}` has no such zero-argument method")]
    MissingMethod {
        class: String,
        declaration: String,
        method: String,
        type_name: String,
    },

    #[error("{class}: hook `{declaration}` holds `{type_name}`, which is not invokable; name a method to call")]
    UnsupportedShape {
        class: String,
        declaration: String,
        type_name: String,
    },

    #[error("{class}: hook `{declaration}` is instance-scoped but runs in {phase}, where no test instance exists")]
    InstanceHookInClassPhase {
        class: String,
        declaration: String,
        phase: Phase,
    },
}

/// Errors that abort a whole harness run.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("failed to start worker runtime: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("worker thread `{0}` panicked")]
    WorkerPanicked(String),
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
