//! Test runner subsystem.
//!
//! # Data Flow
//! ```text
//! TestClass (class.rs): fixture factory + traceable fields + tests + hooks
//!     → Harness::run (harness.rs)
//!         → discovery: field/parameter targets, hook declarations
//!         → BeforeAll
//!         → workers pull tests from a shared index, each test case:
//!             open scope → fixture → inject fields → BeforeEach
//!             → resolve params → body → AfterEach → close scope
//!         → AfterAll
//!     → ClassReport (report.rs)
//! ```
//!
//! # Design Decisions
//! - One scoped thread per worker, each with a current-thread tokio runtime,
//!   so a test case never leaves its thread
//! - Panics in fixtures, hooks and bodies become failures, never abort the run
//! - Reports keep registration order whatever the execution order was

pub mod class;
pub mod harness;
pub mod report;

pub use class::{TestCase, TestClass, TestContext, TestResult};
pub use harness::{Harness, HarnessBuilder};
pub use report::{ClassReport, Failure, FailureOrigin, TestOutcome, TestReport};
