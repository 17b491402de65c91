//! Lifecycle hook subsystem.
//!
//! # Data Flow
//! ```text
//! Discovery (dispatcher.rs):
//!     Declarations → check static values are invokable → reject instance
//!     hooks in BeforeAll/AfterAll → HookDispatcher
//!
//! Dispatch (dispatcher.rs):
//!     Phase → declarations of that phase, in order → read value
//!     (static or from the test instance) → named method or shape → invoke
//! ```
//!
//! # Design Decisions
//! - Each phase invokes each of its declarations exactly once
//! - Setup phases stop at the first failure; teardown phases always run every hook
//! - Panics inside hooks are caught and reported like errors
//! - Closures expose no named methods; only `MethodTarget` objects do

pub mod dispatcher;
pub mod hooks;

pub use dispatcher::HookDispatcher;
pub use hooks::{
    HookDeclaration, HookError, HookShape, HookValue, MethodTarget, Phase, Scope, ValueAccessor,
};
