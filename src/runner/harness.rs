//! The harness: discovery, phase ordering and parallel test execution.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use axum::Router;
use tokio::runtime::{self, Runtime};
use tracing::{debug, info, warn};

use crate::client::RecordTransport;
use crate::config::HarnessConfig;
use crate::context::{ContextStore, TestCaseId};
use crate::error::{panic_message, DiscoveryError, HarnessError};
use crate::inject::{TraceExtension, TraceResolver};
use crate::lifecycle::{HookDispatcher, Phase};
use crate::observability::{DiagnosticBridge, Metrics};
use crate::runner::class::{TestCase, TestClass, TestContext};
use crate::runner::report::{ClassReport, Failure, FailureOrigin, TestOutcome, TestReport};
use crate::trace::Traceparent;

/// Builder for [`Harness`].
#[derive(Default)]
pub struct HarnessBuilder {
    config: HarnessConfig,
    web_app: Option<Router>,
    transport: Option<Arc<dyn RecordTransport>>,
}

impl HarnessBuilder {
    pub fn config(mut self, config: HarnessConfig) -> Self {
        self.config = config;
        self
    }

    /// Application behind injected web drivers.
    pub fn web_application(mut self, app: Router) -> Self {
        self.web_app = Some(app);
        self
    }

    /// Transport behind injected producers.
    pub fn message_transport(mut self, transport: Arc<dyn RecordTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Harness {
        let metrics = Metrics::new(self.config.observability.metrics_enabled);
        let bridge = DiagnosticBridge::from_config(&self.config.tracing);
        let store = Arc::new(ContextStore::with_metrics(metrics));
        let mut resolver = TraceResolver::new(store, bridge);
        if let Some(app) = self.web_app {
            resolver = resolver.with_web_application(app);
        }
        if let Some(transport) = self.transport {
            resolver = resolver.with_transport(transport);
        }

        Harness {
            config: self.config,
            extension: TraceExtension::new(Arc::new(resolver)),
            metrics,
        }
    }
}

/// Runs test classes.
#[derive(Debug)]
pub struct Harness {
    config: HarnessConfig,
    extension: TraceExtension,
    metrics: Metrics,
}

impl Harness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::default()
    }

    pub fn new(config: HarnessConfig) -> Self {
        Self::builder().config(config).build()
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn resolver(&self) -> &TraceResolver {
        self.extension.resolver()
    }

    pub fn store(&self) -> &Arc<ContextStore> {
        self.resolver().store()
    }

    pub fn extension(&self) -> &TraceExtension {
        &self.extension
    }

    /// Recording switch of this harness only.
    pub fn metrics(&self) -> Metrics {
        self.metrics
    }

    /// Run every test of `class`.
    ///
    /// Discovery problems abort the run before any hook or test executes.
    /// Test failures are part of the returned report, not errors. AfterAll
    /// runs once BeforeAll has, even when the workers cannot finish.
    pub fn run<F: 'static>(&self, class: &TestClass<F>) -> Result<ClassReport, HarnessError> {
        let dispatcher = self.discover(class)?;
        info!(class = class.name(), tests = class.tests().len(), "Running test class");

        let tests = match dispatcher.dispatch(Phase::BeforeAll, None) {
            Ok(()) => self.run_parallel(class, &dispatcher),
            Err(failures) => {
                let failure = failures
                    .first()
                    .map(|e| Failure::from_hook(FailureOrigin::BeforeAll, e))
                    .unwrap_or_else(|| Failure::new(FailureOrigin::BeforeAll, "BeforeAll failed"));
                warn!(class = class.name(), error = %failure.message, "BeforeAll failed, skipping tests");
                Ok(class
                    .tests()
                    .iter()
                    .map(|test| self.skipped(test, failure.clone()))
                    .collect())
            }
        };

        let after_all = match dispatcher.dispatch(Phase::AfterAll, None) {
            Ok(()) => Vec::new(),
            Err(failures) => failures
                .iter()
                .map(|e| Failure::from_hook(FailureOrigin::AfterAll, e))
                .collect(),
        };

        let tests = tests?;
        let report = ClassReport {
            class: class.name().to_string(),
            tests,
            after_all,
        };
        info!(
            class = class.name(),
            passed = report.passed(),
            failed = report.failed(),
            "Test class finished"
        );
        Ok(report)
    }

    fn discover<'c, F: 'static>(&self, class: &'c TestClass<F>) -> Result<HookDispatcher<'c, F>, DiscoveryError> {
        let resolver = self.resolver();

        for field in class.fields() {
            resolver
                .check_supported(field.target())
                .map_err(|reason| DiscoveryError::UnsupportedField {
                    class: class.name().to_string(),
                    field: field.name().to_string(),
                    target: field.target(),
                    reason,
                })?;
        }

        for test in class.tests() {
            for &target in test.targets() {
                resolver
                    .check_supported(target)
                    .map_err(|reason| DiscoveryError::UnsupportedParameter {
                        class: class.name().to_string(),
                        test: test.name().to_string(),
                        target,
                        reason,
                    })?;
            }
        }

        Ok(HookDispatcher::discover(class.name(), class.hooks())?.with_metrics(self.metrics))
    }

    fn run_parallel<F: 'static>(
        &self,
        class: &TestClass<F>,
        dispatcher: &HookDispatcher<'_, F>,
    ) -> Result<Vec<TestReport>, HarnessError> {
        let total = class.tests().len();
        if total == 0 {
            return Ok(Vec::new());
        }

        let workers = self.config.runner.parallelism.clamp(1, total);
        let next = AtomicUsize::new(0);
        debug!(class = class.name(), workers, "Starting workers");

        let mut indexed = thread::scope(|s| -> Result<Vec<(usize, TestReport)>, HarnessError> {
            let next = &next;
            let mut handles = Vec::with_capacity(workers);
            for worker in 0..workers {
                let name = format!("{}-worker-{}", class.name(), worker);
                let handle = thread::Builder::new()
                    .name(name.clone())
                    .spawn_scoped(s, move || self.worker(class, dispatcher, next))?;
                handles.push((name, handle));
            }

            let mut reports = Vec::with_capacity(total);
            for (name, handle) in handles {
                let worker_reports = handle
                    .join()
                    .map_err(|_| HarnessError::WorkerPanicked(name))??;
                reports.extend(worker_reports);
            }
            Ok(reports)
        })?;

        indexed.sort_by_key(|(index, _)| *index);
        Ok(indexed.into_iter().map(|(_, report)| report).collect())
    }

    fn worker<F: 'static>(
        &self,
        class: &TestClass<F>,
        dispatcher: &HookDispatcher<'_, F>,
        next: &AtomicUsize,
    ) -> Result<Vec<(usize, TestReport)>, HarnessError> {
        let runtime = runtime::Builder::new_current_thread().enable_all().build()?;
        let mut reports = Vec::new();

        loop {
            let index = next.fetch_add(1, Ordering::Relaxed);
            let Some(test) = class.tests().get(index) else {
                break;
            };
            reports.push((index, self.run_test(class, dispatcher, test, &runtime)));
        }
        Ok(reports)
    }

    /// BeforeEach, body and AfterEach of one test case, all on the calling thread.
    fn run_test<F: 'static>(
        &self,
        class: &TestClass<F>,
        dispatcher: &HookDispatcher<'_, F>,
        test: &TestCase<F>,
        runtime: &Runtime,
    ) -> TestReport {
        let scope = self
            .extension
            .open(format!("{}::{}", class.name(), test.name()));
        let test_case = scope.test_case();
        let mut outcome = TestOutcome::Passed;
        let mut traceparent = None;

        let instance = match panic::catch_unwind(AssertUnwindSafe(|| (class.factory)())) {
            Ok(Ok(instance)) => Some(instance),
            Ok(Err(e)) => {
                outcome.record(Failure::new(FailureOrigin::Fixture, e.to_string()));
                None
            }
            Err(payload) => {
                outcome.record(Failure::new(FailureOrigin::Fixture, panic_message(payload.as_ref())));
                None
            }
        };

        if let Some(mut instance) = instance {
            let injected =
                panic::catch_unwind(AssertUnwindSafe(|| scope.inject_fields(&mut instance, class.fields())));
            match injected {
                Ok(Ok(tp)) => traceparent = Some(Traceparent::clone(&tp)),
                Ok(Err(e)) => outcome.record(Failure::new(FailureOrigin::Injection, e.to_string())),
                Err(payload) => outcome.record(Failure::new(
                    FailureOrigin::Injection,
                    panic_message(payload.as_ref()),
                )),
            }

            if outcome.is_passed() {
                match dispatcher.dispatch(Phase::BeforeEach, Some(&instance)) {
                    Ok(()) => {
                        let ctx = TestContext::new(&scope, runtime);
                        let result =
                            panic::catch_unwind(AssertUnwindSafe(|| (test.run)(&mut instance, &ctx)));
                        match result {
                            Ok(Ok(Ok(()))) => {}
                            Ok(Ok(Err(e))) => {
                                outcome.record(Failure::new(FailureOrigin::Body, e.to_string()))
                            }
                            Ok(Err(e)) => {
                                outcome.record(Failure::new(FailureOrigin::Injection, e.to_string()))
                            }
                            Err(payload) => outcome.record(Failure::new(
                                FailureOrigin::Body,
                                panic_message(payload.as_ref()),
                            )),
                        }
                    }
                    Err(failures) => {
                        for e in &failures {
                            outcome.record(Failure::from_hook(FailureOrigin::BeforeEach, e));
                        }
                    }
                }
            }

            // AfterEach runs whenever an instance exists, so cleanup is not skipped.
            if let Err(failures) = dispatcher.dispatch(Phase::AfterEach, Some(&instance)) {
                for e in &failures {
                    outcome.record(Failure::from_hook(FailureOrigin::AfterEach, e));
                }
            }
        }

        drop(scope);
        self.metrics.record_test_outcome(outcome.label());
        if let Some(failure) = outcome.primary() {
            warn!(test = test.name(), origin = ?failure.origin, error = %failure.message, "Test failed");
        }

        TestReport {
            name: test.name().to_string(),
            test_case,
            traceparent,
            outcome,
        }
    }

    fn skipped<F>(&self, test: &TestCase<F>, failure: Failure) -> TestReport {
        self.metrics.record_test_outcome("failed");
        TestReport {
            name: test.name().to_string(),
            test_case: TestCaseId::new(),
            traceparent: None,
            outcome: TestOutcome::Failed {
                primary: failure,
                suppressed: Vec::new(),
            },
        }
    }
}
