//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Harness components produce:
//!     → logging.rs (structured log events)
//!     → diagnostic.rs (thread-scoped traceId/spanId for log correlation)
//!     → metrics.rs (counters)
//! ```
//!
//! # Design Decisions
//! - Log lines carry the active test case's trace ids when correlation is on
//! - Diagnostic bookkeeping is best-effort and never fails a test

pub mod diagnostic;
pub mod logging;
pub mod metrics;

pub use diagnostic::DiagnosticBridge;
pub use metrics::Metrics;
