//! Trace injection into test fixtures and test parameters.
//!
//! # Data Flow
//! ```text
//! TestCaseScope opened (extension.rs)
//!     → fields registered with TestClass::traceable get their value
//!     → Params tuples and TestContext::resolve ask the resolver
//!     → resolver.rs reads the store, computing on first access:
//!         Traceparent  → random ids, bound to the diagnostic map
//!         HttpClient   → factory, around the same Arc<Traceparent>
//!         WebDriver    → factory, over the registered axum Router
//!         Producer     → factory, over the registered RecordTransport
//! TestCaseScope dropped
//!     → store.remove + bridge.unbind
//! ```
//!
//! # Design Decisions
//! - The injectable set is closed: `Injectable` is sealed, so an unsupported
//!   field or parameter type fails to compile
//! - A target whose collaborator is missing is rejected at discovery
//! - Field and parameter resolution go through the same store entry, so both see
//!   the same `Arc`

pub mod extension;
pub mod resolver;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::client::{TracedHttpClient, TracedProducer, TracedWebDriver};
use crate::context::{keys, ContextError, TestCaseId};
use crate::trace::Traceparent;

pub use extension::{FieldInjector, TestCaseScope, TraceExtension};
pub use resolver::TraceResolver;

/// What a traceable field or parameter asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TraceTarget {
    Traceparent,
    HttpClient,
    WebDriver,
    Producer,
}

impl TraceTarget {
    /// Store key holding this target's value.
    pub fn key(self) -> &'static str {
        match self {
            TraceTarget::Traceparent => keys::TRACEPARENT,
            TraceTarget::HttpClient => keys::HTTP_CLIENT,
            TraceTarget::WebDriver => keys::WEB_DRIVER,
            TraceTarget::Producer => keys::MESSAGE_PRODUCER,
        }
    }
}

impl fmt::Display for TraceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TraceTarget::Traceparent => "Traceparent",
            TraceTarget::HttpClient => "HttpClient",
            TraceTarget::WebDriver => "WebDriver",
            TraceTarget::Producer => "Producer",
        };
        f.write_str(name)
    }
}

/// A resolved value, tagged by target.
#[derive(Debug, Clone)]
pub enum Injected {
    Traceparent(Arc<Traceparent>),
    HttpClient(Arc<TracedHttpClient>),
    WebDriver(Arc<TracedWebDriver>),
    Producer(Arc<TracedProducer>),
}

/// Errors raised while resolving a trace target.
#[derive(Debug, Error)]
pub enum InjectError {
    #[error(transparent)]
    Context(#[from] ContextError),

    #[error("{target} requires a registered {collaborator}")]
    MissingCollaborator {
        target: TraceTarget,
        collaborator: &'static str,
    },

    #[error("resolved value is not a {0}")]
    TypeMismatch(TraceTarget),
}

mod sealed {
    pub trait Sealed {}
}

/// Types that can be injected into fields and parameters.
///
/// Sealed: implemented only for the four shared handles below.
pub trait Injectable: sealed::Sealed + Sized + Send + Sync + 'static {
    const TARGET: TraceTarget;

    fn from_injected(value: Injected) -> Option<Self>;
}

macro_rules! injectable {
    ($ty:ty, $variant:ident) => {
        impl sealed::Sealed for Arc<$ty> {}

        impl Injectable for Arc<$ty> {
            const TARGET: TraceTarget = TraceTarget::$variant;

            fn from_injected(value: Injected) -> Option<Self> {
                match value {
                    Injected::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

injectable!(Traceparent, Traceparent);
injectable!(TracedHttpClient, HttpClient);
injectable!(TracedWebDriver, WebDriver);
injectable!(TracedProducer, Producer);

/// Typed parameter list of a test body.
///
/// Implemented for `()` and tuples of up to four [`Injectable`]s.
pub trait Params: Sized {
    fn targets() -> Vec<TraceTarget>;

    fn resolve(resolver: &TraceResolver, test_case: TestCaseId) -> Result<Self, InjectError>;
}

impl Params for () {
    fn targets() -> Vec<TraceTarget> {
        Vec::new()
    }

    fn resolve(_resolver: &TraceResolver, _test_case: TestCaseId) -> Result<Self, InjectError> {
        Ok(())
    }
}

macro_rules! params_tuple {
    ($($ty:ident),+) => {
        impl<$($ty: Injectable),+> Params for ($($ty,)+) {
            fn targets() -> Vec<TraceTarget> {
                vec![$(<$ty as Injectable>::TARGET),+]
            }

            fn resolve(resolver: &TraceResolver, test_case: TestCaseId) -> Result<Self, InjectError> {
                Ok(($(resolver.resolve_as::<$ty>(test_case)?,)+))
            }
        }
    };
}

params_tuple!(A);
params_tuple!(A, B);
params_tuple!(A, B, C);
params_tuple!(A, B, C, D);
