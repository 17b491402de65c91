//! Declarative test class registry.

use std::future::Future;
use std::sync::Arc;

use tokio::runtime::Runtime;

use crate::context::TestCaseId;
use crate::error::BoxError;
use crate::inject::{FieldInjector, Injectable, InjectError, Params, TestCaseScope, TraceTarget};
use crate::lifecycle::HookDeclaration;
use crate::trace::Traceparent;

/// Result of a test body.
pub type TestResult = Result<(), BoxError>;

type Factory<F> = Arc<dyn Fn() -> Result<F, BoxError> + Send + Sync>;
type Body<F> = Arc<dyn Fn(&mut F, &TestContext<'_>) -> Result<TestResult, InjectError> + Send + Sync>;

/// What a running test body can reach.
pub struct TestContext<'a> {
    scope: &'a TestCaseScope<'a>,
    runtime: &'a Runtime,
}

impl<'a> TestContext<'a> {
    pub(crate) fn new(scope: &'a TestCaseScope<'a>, runtime: &'a Runtime) -> Self {
        Self { scope, runtime }
    }

    pub fn test_case(&self) -> TestCaseId {
        self.scope.test_case()
    }

    pub fn display_name(&self) -> &str {
        self.scope.display_name()
    }

    /// Resolve a trace target on demand; same value as field injection.
    pub fn resolve<T: Injectable>(&self) -> Result<T, InjectError> {
        self.scope.resolve()
    }

    pub fn traceparent(&self) -> Result<Arc<Traceparent>, InjectError> {
        self.scope.traceparent()
    }

    /// Drive a future to completion on the worker's own runtime, on this thread.
    pub fn block_on<Fut: Future>(&self, future: Fut) -> Fut::Output {
        self.runtime.block_on(future)
    }
}

/// A registered test.
pub struct TestCase<F> {
    name: String,
    targets: Vec<TraceTarget>,
    pub(crate) run: Body<F>,
}

impl<F> TestCase<F> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Targets of the body's declared parameters.
    pub fn targets(&self) -> &[TraceTarget] {
        &self.targets
    }
}

/// A test class: fixture factory, traceable fields, tests and hooks.
///
/// ```ignore
/// let class = TestClass::new("EpicApi", Fixture::default)
///     .traceable("traceparent", |f: &mut Fixture, tp: Arc<Traceparent>| f.traceparent = Some(tp))
///     .hook(HookDeclaration::new(Phase::AfterAll, "cleanup", HookValue::runnable(cleanup)))
///     .test("creates epic", |f, (client,): (Arc<TracedHttpClient>,), ctx| { ... });
/// ```
pub struct TestClass<F> {
    name: String,
    pub(crate) factory: Factory<F>,
    fields: Vec<FieldInjector<F>>,
    tests: Vec<TestCase<F>>,
    hooks: Vec<HookDeclaration<F>>,
}

impl<F: 'static> TestClass<F> {
    pub fn new(name: impl Into<String>, factory: impl Fn() -> F + Send + Sync + 'static) -> Self {
        Self::try_new(name, move || Ok::<_, BoxError>(factory()))
    }

    /// Class whose fixture construction may fail.
    pub fn try_new<E, Fac>(name: impl Into<String>, factory: Fac) -> Self
    where
        E: Into<BoxError>,
        Fac: Fn() -> Result<F, E> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            factory: Arc::new(move || factory().map_err(Into::<BoxError>::into)),
            fields: Vec::new(),
            tests: Vec::new(),
            hooks: Vec::new(),
        }
    }

    /// Register a traceable field; the target follows the setter's value type.
    pub fn traceable<T, S>(mut self, field: impl Into<String>, setter: S) -> Self
    where
        T: Injectable,
        S: Fn(&mut F, T) + Send + Sync + 'static,
    {
        self.fields.push(FieldInjector::new(field, setter));
        self
    }

    /// Register a test whose body receives the resolved `P` parameters.
    pub fn test<P, B>(mut self, name: impl Into<String>, body: B) -> Self
    where
        P: Params + 'static,
        B: Fn(&mut F, P, &TestContext<'_>) -> TestResult + Send + Sync + 'static,
    {
        let run: Body<F> = Arc::new(move |instance: &mut F, ctx: &TestContext<'_>| -> Result<TestResult, InjectError> {
            let params = P::resolve(ctx.scope.resolver(), ctx.test_case())?;
            Ok(body(instance, params, ctx))
        });

        self.tests.push(TestCase {
            name: name.into(),
            targets: P::targets(),
            run,
        });
        self
    }

    pub fn hook(mut self, declaration: HookDeclaration<F>) -> Self {
        self.hooks.push(declaration);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldInjector<F>] {
        &self.fields
    }

    pub fn tests(&self) -> &[TestCase<F>] {
        &self.tests
    }

    pub fn hooks(&self) -> &[HookDeclaration<F>] {
        &self.hooks
    }
}

impl<F> std::fmt::Debug for TestClass<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestClass")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("tests", &self.tests.iter().map(|t| &t.name).collect::<Vec<_>>())
            .field("hooks", &self.hooks)
            .finish()
    }
}
