//! Per-test outcomes and class reports.

use serde::Serialize;

use crate::context::TestCaseId;
use crate::lifecycle::HookError;
use crate::trace::Traceparent;

/// Where a failure was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureOrigin {
    BeforeAll,
    BeforeEach,
    Injection,
    Body,
    AfterEach,
    AfterAll,
    Fixture,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub origin: FailureOrigin,
    pub message: String,
}

impl Failure {
    pub fn new(origin: FailureOrigin, message: impl Into<String>) -> Self {
        Self {
            origin,
            message: message.into(),
        }
    }

    pub fn from_hook(origin: FailureOrigin, error: &HookError) -> Self {
        Self::new(origin, error.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum TestOutcome {
    Passed,
    Failed {
        primary: Failure,
        suppressed: Vec<Failure>,
    },
}

impl TestOutcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, TestOutcome::Passed)
    }

    pub fn primary(&self) -> Option<&Failure> {
        match self {
            TestOutcome::Passed => None,
            TestOutcome::Failed { primary, .. } => Some(primary),
        }
    }

    pub fn suppressed(&self) -> &[Failure] {
        match self {
            TestOutcome::Passed => &[],
            TestOutcome::Failed { suppressed, .. } => suppressed,
        }
    }

    /// Add a failure: the first one becomes primary, later ones are suppressed.
    pub fn record(&mut self, failure: Failure) {
        match self {
            TestOutcome::Passed => {
                *self = TestOutcome::Failed {
                    primary: failure,
                    suppressed: Vec::new(),
                }
            }
            TestOutcome::Failed { suppressed, .. } => suppressed.push(failure),
        }
    }

    pub(crate) fn label(&self) -> &'static str {
        match self {
            TestOutcome::Passed => "passed",
            TestOutcome::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TestReport {
    pub name: String,
    pub test_case: TestCaseId,
    /// Absent when the test never reached trace injection.
    pub traceparent: Option<Traceparent>,
    pub outcome: TestOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassReport {
    pub class: String,
    /// In registration order.
    pub tests: Vec<TestReport>,
    pub after_all: Vec<Failure>,
}

impl ClassReport {
    pub fn test(&self, name: &str) -> Option<&TestReport> {
        self.tests.iter().find(|t| t.name == name)
    }

    pub fn passed(&self) -> usize {
        self.tests.iter().filter(|t| t.outcome.is_passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.tests.len() - self.passed()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.after_all.is_empty()
    }
}
