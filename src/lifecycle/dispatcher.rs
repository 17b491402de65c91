//! Discovers and dispatches lifecycle hooks of one test class.

use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, warn};

use crate::error::{panic_message, BoxError, DiscoveryError};
use crate::lifecycle::hooks::{plan, HookDeclaration, HookError, Phase, ValueAccessor};
use crate::observability::Metrics;

/// Validated hook declarations of a class.
///
/// Construction through [`discover`](Self::discover) guarantees every static
/// declaration is invokable and no instance hook sits in a class-level phase.
pub struct HookDispatcher<'a, F> {
    class: &'a str,
    declarations: &'a [HookDeclaration<F>],
    metrics: Metrics,
}

impl<'a, F> HookDispatcher<'a, F> {
    pub fn discover(
        class: &'a str,
        declarations: &'a [HookDeclaration<F>],
    ) -> Result<Self, DiscoveryError> {
        for decl in declarations {
            match decl.accessor() {
                ValueAccessor::Static(value) => {
                    plan(decl.method(), value.clone())
                        .map_err(|e| e.into_discovery(class, decl.name()))?;
                }
                ValueAccessor::Instance(_) if decl.phase().is_class_level() => {
                    return Err(DiscoveryError::InstanceHookInClassPhase {
                        class: class.to_string(),
                        declaration: decl.name().to_string(),
                        phase: decl.phase(),
                    });
                }
                // Instance values only exist once a test instance does.
                ValueAccessor::Instance(_) => {}
            }
        }

        debug!(class, hooks = declarations.len(), "Lifecycle hooks discovered");
        Ok(Self {
            class,
            declarations,
            metrics: Metrics::default(),
        })
    }

    /// Record hook invocations through `metrics`.
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Declarations of `phase`, in declaration order.
    pub fn hooks(&self, phase: Phase) -> impl Iterator<Item = &'a HookDeclaration<F>> + '_ {
        self.declarations.iter().filter(move |d| d.phase() == phase)
    }

    pub fn count(&self, phase: Phase) -> usize {
        self.hooks(phase).count()
    }

    /// Run every hook of `phase`.
    ///
    /// Setup phases stop at the first failure and return it alone. Teardown
    /// phases run every hook and return all failures in declaration order.
    pub fn dispatch(&self, phase: Phase, instance: Option<&F>) -> Result<(), Vec<HookError>> {
        let mut failures = Vec::new();

        for decl in self.hooks(phase) {
            if let Err(e) = self.invoke(decl, instance) {
                warn!(class = self.class, hook = decl.name(), phase = %phase, error = %e, "Lifecycle hook failed");
                failures.push(e);
                if phase.is_setup() {
                    break;
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(failures)
        }
    }

    fn invoke(&self, decl: &HookDeclaration<F>, instance: Option<&F>) -> Result<(), HookError> {
        let value = match decl.accessor() {
            ValueAccessor::Static(value) => value.clone(),
            ValueAccessor::Instance(read) => {
                let instance = instance.ok_or_else(|| HookError::MissingInstance {
                    declaration: decl.name().to_string(),
                })?;
                guard(decl, || Ok(read(instance)))?
            }
        };

        let invocation = plan(decl.method(), value).map_err(|e| e.into_hook(decl.name()))?;

        self.metrics.record_hook_invocation(decl.phase().as_str());
        debug!(class = self.class, hook = decl.name(), phase = %decl.phase(), "Invoking lifecycle hook");

        guard(decl, || invocation.invoke())
    }
}

/// Run user code of `decl`, turning errors and panics into hook errors.
fn guard<F, T>(
    decl: &HookDeclaration<F>,
    call: impl FnOnce() -> Result<T, BoxError>,
) -> Result<T, HookError> {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(HookError::Failed {
            declaration: decl.name().to_string(),
            phase: decl.phase(),
            source,
        }),
        Err(payload) => Err(HookError::Panicked {
            declaration: decl.name().to_string(),
            phase: decl.phase(),
            message: panic_message(payload.as_ref()),
        }),
    }
}

impl<F> std::fmt::Debug for HookDispatcher<'_, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookDispatcher")
            .field("class", &self.class)
            .field("declarations", &self.declarations)
            .finish()
    }
}
