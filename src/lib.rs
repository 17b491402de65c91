//! Test-scoped trace propagation and lifecycle hooks.
//!
//! Every test case gets its own synthetic `traceparent`. The harness injects it,
//! together with HTTP, web-driver and messaging clients that carry it, into
//! test fixtures and parameters, and runs declarative lifecycle hooks around
//! each test.

pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod inject;
pub mod lifecycle;
pub mod observability;
pub mod runner;
pub mod trace;

pub use config::HarnessConfig;
pub use context::{ContextStore, TestCaseId};
pub use error::{BoxError, DiscoveryError, HarnessError};
pub use inject::{Injectable, TraceResolver, TraceTarget};
pub use lifecycle::{HookDeclaration, HookShape, HookValue, MethodTarget, Phase};
pub use runner::{ClassReport, Harness, TestClass, TestContext, TestResult};
pub use trace::{Traceparent, TRACEPARENT_HEADER};
