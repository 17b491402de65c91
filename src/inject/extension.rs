//! Per-test-case scope: opens, injects fields and cleans up.
//!
//! # Responsibilities
//! - Hand out one `TestCaseScope` per test case execution
//! - Assign traceable fields on the fixture before the body runs
//! - Evict the test case's store entries and diagnostic bindings when it ends
//!
//! # Design Decisions
//! - Cleanup lives in `Drop`, so it also runs when the body or a hook panics
//! - The scope must be dropped on the thread that ran the test body,
//!   otherwise `unbind` clears another thread's diagnostic map

use std::sync::Arc;

use tracing::{debug, info};

use crate::context::{keys, TestCaseId};
use crate::inject::{Injectable, InjectError, TraceResolver, TraceTarget};
use crate::trace::Traceparent;

/// Assigns one resolved value into a fixture field.
pub struct FieldInjector<F> {
    name: String,
    target: TraceTarget,
    inject: Arc<dyn Fn(&TraceResolver, TestCaseId, &mut F) -> Result<(), InjectError> + Send + Sync>,
}

impl<F> FieldInjector<F> {
    /// Injector whose target is inferred from the setter's value type.
    pub fn new<T, S>(name: impl Into<String>, setter: S) -> Self
    where
        F: 'static,
        T: Injectable,
        S: Fn(&mut F, T) + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            target: T::TARGET,
            inject: Arc::new(move |resolver: &TraceResolver, test_case: TestCaseId, instance: &mut F| {
                let value = resolver.resolve_as::<T>(test_case)?;
                setter(instance, value);
                Ok(())
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> TraceTarget {
        self.target
    }
}

impl<F> Clone for FieldInjector<F> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            target: self.target,
            inject: Arc::clone(&self.inject),
        }
    }
}

impl<F> std::fmt::Debug for FieldInjector<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldInjector")
            .field("name", &self.name)
            .field("target", &self.target)
            .finish()
    }
}

/// Opens test case scopes over a shared resolver.
#[derive(Debug, Clone)]
pub struct TraceExtension {
    resolver: Arc<TraceResolver>,
}

impl TraceExtension {
    pub fn new(resolver: Arc<TraceResolver>) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &TraceResolver {
        &self.resolver
    }

    /// Start a new test case execution.
    pub fn open(&self, display_name: impl Into<String>) -> TestCaseScope<'_> {
        let scope = TestCaseScope {
            resolver: &self.resolver,
            test_case: TestCaseId::new(),
            display_name: display_name.into(),
        };
        debug!(test = %scope.display_name, test_case = %scope.test_case, "Test case scope opened");
        scope
    }
}

/// Guard for one test case execution.
#[derive(Debug)]
pub struct TestCaseScope<'a> {
    resolver: &'a TraceResolver,
    test_case: TestCaseId,
    display_name: String,
}

impl<'a> TestCaseScope<'a> {
    pub fn test_case(&self) -> TestCaseId {
        self.test_case
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn resolver(&self) -> &'a TraceResolver {
        self.resolver
    }

    pub fn traceparent(&self) -> Result<Arc<Traceparent>, InjectError> {
        self.resolver.traceparent(self.test_case)
    }

    pub fn resolve<T: Injectable>(&self) -> Result<T, InjectError> {
        self.resolver.resolve_as(self.test_case)
    }

    /// Resolve the traceparent, then assign every traceable field of `instance`.
    ///
    /// Returns the traceparent, which also binds the diagnostic map when
    /// correlation is enabled.
    pub fn inject_fields<F>(
        &self,
        instance: &mut F,
        fields: &[FieldInjector<F>],
    ) -> Result<Arc<Traceparent>, InjectError> {
        let traceparent = self.traceparent()?;
        info!(test = %self.display_name, traceparent = %traceparent, "Starting test execution");

        for field in fields {
            debug!(test = %self.display_name, field = %field.name, target = %field.target, "Injecting field");
            (field.inject)(self.resolver, self.test_case, instance)?;
        }
        Ok(traceparent)
    }
}

impl Drop for TestCaseScope<'_> {
    fn drop(&mut self) {
        match self.resolver.store().get::<Traceparent>(self.test_case, keys::TRACEPARENT) {
            Some(traceparent) => {
                info!(test = %self.display_name, traceparent = %traceparent, "Finished test execution")
            }
            None => info!(test = %self.display_name, "Finished test execution"),
        }
        let evicted = self.resolver.store().remove(self.test_case);
        self.resolver.bridge().unbind();
        debug!(test_case = %self.test_case, evicted, "Test case scope closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::TracedHttpClient;
    use crate::context::ContextStore;
    use crate::observability::diagnostic::{self, TRACE_ID_KEY};
    use crate::observability::DiagnosticBridge;

    #[derive(Default)]
    struct Fixture {
        traceparent: Option<Arc<Traceparent>>,
        client: Option<Arc<TracedHttpClient>>,
    }

    fn extension(correlate: bool) -> TraceExtension {
        let resolver = TraceResolver::new(Arc::new(ContextStore::new()), DiagnosticBridge::new(correlate));
        TraceExtension::new(Arc::new(resolver))
    }

    #[test]
    fn test_fields_and_resolution_share_values() {
        let extension = extension(false);
        let fields = vec![
            FieldInjector::new("traceparent", |f: &mut Fixture, v: Arc<Traceparent>| {
                f.traceparent = Some(v)
            }),
            FieldInjector::new("client", |f: &mut Fixture, v: Arc<TracedHttpClient>| {
                f.client = Some(v)
            }),
        ];
        let mut fixture = Fixture::default();

        let scope = extension.open("shares values");
        let tp = scope.inject_fields(&mut fixture, &fields).unwrap();
        let resolved: Arc<Traceparent> = scope.resolve().unwrap();

        let field = fixture.traceparent.as_ref().unwrap();
        assert!(Arc::ptr_eq(field, &resolved));
        assert!(Arc::ptr_eq(field, &tp));
        assert_eq!(fixture.client.as_ref().unwrap().traceparent(), tp.as_ref());
        assert_eq!(fields[1].target(), TraceTarget::HttpClient);
    }

    #[test]
    fn test_drop_evicts_and_unbinds() {
        let extension = extension(true);
        let scope = extension.open("cleanup");
        let id = scope.test_case();
        scope.traceparent().unwrap();
        assert!(diagnostic::contains_key(TRACE_ID_KEY));

        drop(scope);

        assert_eq!(extension.resolver().store().test_case_count(), 0);
        assert!(!extension.resolver().store().contains(id, "traceparent"));
        assert!(!diagnostic::contains_key(TRACE_ID_KEY));
    }

    #[test]
    fn test_finish_log_names_the_traceparent() {
        let extension = extension(false);
        let mut traceparent = None;

        let logs = crate::observability::logging::capture::logs(|| {
            let scope = extension.open("logged");
            traceparent = Some(scope.traceparent().unwrap());
        });

        let traceparent = traceparent.unwrap().to_string();
        let finished = logs
            .lines()
            .find(|line| line.contains("Finished test execution"))
            .unwrap();
        assert!(finished.contains(&traceparent), "{finished}");
    }

    #[test]
    fn test_each_scope_gets_a_new_traceparent() {
        let extension = extension(false);
        let first = extension.open("first").traceparent().unwrap();
        let second = extension.open("second").traceparent().unwrap();
        assert_ne!(first, second);
    }
}
