//! Hook declarations and the callable shapes they may hold.

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{BoxError, DiscoveryError};

/// Lifecycle phase a hook runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    BeforeAll,
    BeforeEach,
    AfterEach,
    AfterAll,
}

impl Phase {
    pub const ALL: [Phase; 4] = [
        Phase::BeforeAll,
        Phase::BeforeEach,
        Phase::AfterEach,
        Phase::AfterAll,
    ];

    /// Setup phases abort what they guard on failure.
    pub fn is_setup(self) -> bool {
        matches!(self, Phase::BeforeAll | Phase::BeforeEach)
    }

    /// Phases running once per class, without a test instance.
    pub fn is_class_level(self) -> bool {
        matches!(self, Phase::BeforeAll | Phase::AfterAll)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::BeforeAll => "before_all",
            Phase::BeforeEach => "before_each",
            Phase::AfterEach => "after_each",
            Phase::AfterAll => "after_all",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::BeforeAll => "BeforeAll",
            Phase::BeforeEach => "BeforeEach",
            Phase::AfterEach => "AfterEach",
            Phase::AfterAll => "AfterAll",
        };
        f.write_str(name)
    }
}

/// Where a declaration's value lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Static,
    Instance,
}

type Produced = Box<dyn Any + Send>;

/// The invokable shapes a hook may hold.
#[derive(Clone)]
pub enum HookShape {
    Runnable(Arc<dyn Fn() + Send + Sync>),
    Supplier(Arc<dyn Fn() -> Produced + Send + Sync>),
    FailableRunnable(Arc<dyn Fn() -> Result<(), BoxError> + Send + Sync>),
    FailableSupplier(Arc<dyn Fn() -> Result<Produced, BoxError> + Send + Sync>),
}

impl HookShape {
    pub fn runnable(f: impl Fn() + Send + Sync + 'static) -> Self {
        HookShape::Runnable(Arc::new(f))
    }

    /// A value-producing hook; the produced value is discarded.
    pub fn supplier<T, F>(f: F) -> Self
    where
        T: Send + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        HookShape::Supplier(Arc::new(move || Box::new(f()) as Produced))
    }

    pub fn failable_runnable<E, F>(f: F) -> Self
    where
        E: Into<BoxError>,
        F: Fn() -> Result<(), E> + Send + Sync + 'static,
    {
        HookShape::FailableRunnable(Arc::new(move || f().map_err(Into::<BoxError>::into)))
    }

    pub fn failable_supplier<T, E, F>(f: F) -> Self
    where
        T: Send + 'static,
        E: Into<BoxError>,
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
    {
        HookShape::FailableSupplier(Arc::new(move || {
            f().map(|v| Box::new(v) as Produced).map_err(Into::<BoxError>::into)
        }))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            HookShape::Runnable(_) => "runnable",
            HookShape::Supplier(_) => "supplier",
            HookShape::FailableRunnable(_) => "failable runnable",
            HookShape::FailableSupplier(_) => "failable supplier",
        }
    }

    pub fn invoke(&self) -> Result<(), BoxError> {
        match self {
            HookShape::Runnable(f) => {
                f();
                Ok(())
            }
            HookShape::Supplier(f) => {
                drop(f());
                Ok(())
            }
            HookShape::FailableRunnable(f) => f(),
            HookShape::FailableSupplier(f) => f().map(drop),
        }
    }
}

impl fmt::Debug for HookShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HookShape({})", self.kind())
    }
}

/// An object exposing zero-argument methods by name.
///
/// Used by declarations with an explicit method name.
pub trait MethodTarget: Send + Sync {
    fn has_method(&self, name: &str) -> bool;

    fn call_method(&self, name: &str) -> Result<(), BoxError>;

    fn type_name(&self) -> &'static str {
        type_name::<Self>()
    }
}

/// The value held by a hook declaration.
#[derive(Clone)]
pub enum HookValue {
    Shape(HookShape),
    Object(Arc<dyn MethodTarget>),
}

impl HookValue {
    pub fn runnable(f: impl Fn() + Send + Sync + 'static) -> Self {
        HookValue::Shape(HookShape::runnable(f))
    }

    pub fn object(target: Arc<dyn MethodTarget>) -> Self {
        HookValue::Object(target)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            HookValue::Shape(shape) => shape.kind(),
            HookValue::Object(target) => target.type_name(),
        }
    }
}

impl fmt::Debug for HookValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookValue::Shape(shape) => shape.fmt(f),
            HookValue::Object(target) => write!(f, "Object({})", target.type_name()),
        }
    }
}

impl From<HookShape> for HookValue {
    fn from(shape: HookShape) -> Self {
        HookValue::Shape(shape)
    }
}

impl<T: MethodTarget + 'static> From<Arc<T>> for HookValue {
    fn from(target: Arc<T>) -> Self {
        HookValue::Object(target)
    }
}

/// How a declaration reaches its value.
#[derive(Clone)]
pub enum ValueAccessor<F> {
    Static(HookValue),
    /// Reads the hook value from the test instance.
    Instance(Arc<dyn Fn(&F) -> HookValue + Send + Sync>),
}

/// A hook registered on a test class.
#[derive(Clone)]
pub struct HookDeclaration<F> {
    name: String,
    phase: Phase,
    method: Option<String>,
    accessor: ValueAccessor<F>,
}

impl<F> HookDeclaration<F> {
    /// Declaration holding a class-wide value.
    pub fn new(phase: Phase, name: impl Into<String>, value: impl Into<HookValue>) -> Self {
        Self {
            name: name.into(),
            phase,
            method: None,
            accessor: ValueAccessor::Static(value.into()),
        }
    }

    /// Declaration whose value is read from each test instance.
    pub fn instance(
        phase: Phase,
        name: impl Into<String>,
        accessor: impl Fn(&F) -> HookValue + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            phase,
            method: None,
            accessor: ValueAccessor::Instance(Arc::new(accessor)),
        }
    }

    /// Call the named zero-argument method on the value instead of invoking it.
    ///
    /// An empty name means "no explicit method".
    pub fn invoke(mut self, method: impl Into<String>) -> Self {
        let method = method.into();
        self.method = (!method.is_empty()).then_some(method);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    pub fn scope(&self) -> Scope {
        match self.accessor {
            ValueAccessor::Static(_) => Scope::Static,
            ValueAccessor::Instance(_) => Scope::Instance,
        }
    }

    pub fn accessor(&self) -> &ValueAccessor<F> {
        &self.accessor
    }
}

impl<F> fmt::Debug for HookDeclaration<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookDeclaration")
            .field("name", &self.name)
            .field("phase", &self.phase)
            .field("scope", &self.scope())
            .field("method", &self.method)
            .finish()
    }
}

/// Errors raised while invoking a hook.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("hook `{declaration}` failed in {phase}: {source}")]
    Failed {
        declaration: String,
        phase: Phase,
        #[source]
        source: BoxError,
    },

    #[error("hook `{declaration}` panicked in {phase}: {message}")]
    Panicked {
        declaration: String,
        phase: Phase,
        message: String,
    },

    #[error("hook `{declaration}` targets method `{method}`, but `{type_name}` has no such zero-argument method")]
    MissingMethod {
        declaration: String,
        method: String,
        type_name: String,
    },

    #[error("hook `{declaration}` holds `{type_name}`, which is not invokable")]
    UnsupportedShape {
        declaration: String,
        type_name: String,
    },

    #[error("hook `{declaration}` is instance-scoped but no test instance is available")]
    MissingInstance { declaration: String },
}

impl HookError {
    pub fn declaration(&self) -> &str {
        match self {
            HookError::Failed { declaration, .. }
            | HookError::Panicked { declaration, .. }
            | HookError::MissingMethod { declaration, .. }
            | HookError::UnsupportedShape { declaration, .. }
            | HookError::MissingInstance { declaration } => declaration,
        }
    }
}

/// A value paired with how to call it.
pub(crate) enum Invocation {
    Method(Arc<dyn MethodTarget>, String),
    Shape(HookShape),
}

impl Invocation {
    pub(crate) fn invoke(&self) -> Result<(), BoxError> {
        match self {
            Invocation::Method(target, method) => target.call_method(method),
            Invocation::Shape(shape) => shape.invoke(),
        }
    }
}

/// Why a value cannot be invoked.
pub(crate) enum PlanError {
    MissingMethod { method: String, type_name: String },
    UnsupportedShape { type_name: String },
}

impl PlanError {
    pub(crate) fn into_discovery(self, class: &str, declaration: &str) -> DiscoveryError {
        match self {
            PlanError::MissingMethod { method, type_name } => DiscoveryError::MissingMethod {
                class: class.to_string(),
                declaration: declaration.to_string(),
                method,
                type_name,
            },
            PlanError::UnsupportedShape { type_name } => DiscoveryError::UnsupportedShape {
                class: class.to_string(),
                declaration: declaration.to_string(),
                type_name,
            },
        }
    }

    pub(crate) fn into_hook(self, declaration: &str) -> HookError {
        match self {
            PlanError::MissingMethod { method, type_name } => HookError::MissingMethod {
                declaration: declaration.to_string(),
                method,
                type_name,
            },
            PlanError::UnsupportedShape { type_name } => HookError::UnsupportedShape {
                declaration: declaration.to_string(),
                type_name,
            },
        }
    }
}

/// Decide how to invoke `value`.
///
/// An explicit method is looked up on the runtime value; closures expose no
/// methods. Without one, the value must be one of the callable shapes.
pub(crate) fn plan(method: Option<&str>, value: HookValue) -> Result<Invocation, PlanError> {
    match (method, value) {
        (Some(method), HookValue::Object(target)) if target.has_method(method) => {
            Ok(Invocation::Method(target, method.to_string()))
        }
        (Some(method), value) => Err(PlanError::MissingMethod {
            method: method.to_string(),
            type_name: value.type_name().to_string(),
        }),
        (None, HookValue::Shape(shape)) => Ok(Invocation::Shape(shape)),
        (None, HookValue::Object(target)) => Err(PlanError::UnsupportedShape {
            type_name: target.type_name().to_string(),
        }),
    }
}
