//! Resolves trace targets to store-backed, per-test-case values.

use std::sync::Arc;

use axum::Router;

use crate::client::{ClientFactory, RecordTransport, TracedHttpClient, TracedProducer, TracedWebDriver};
use crate::context::{keys, ContextStore, TestCaseId};
use crate::inject::{Injectable, Injected, InjectError, TraceTarget};
use crate::observability::DiagnosticBridge;
use crate::trace::Traceparent;

const WEB_APPLICATION: &str = "web application";
const MESSAGE_TRANSPORT: &str = "message transport";

/// Maps a [`TraceTarget`] to the value shared by one test case.
pub struct TraceResolver {
    store: Arc<ContextStore>,
    bridge: DiagnosticBridge,
    factory: ClientFactory,
    web_app: Option<Router>,
    transport: Option<Arc<dyn RecordTransport>>,
}

impl std::fmt::Debug for TraceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceResolver")
            .field("store", &self.store)
            .field("bridge", &self.bridge)
            .field("web_app", &self.web_app.is_some())
            .field("transport", &self.transport.is_some())
            .finish()
    }
}

impl TraceResolver {
    pub fn new(store: Arc<ContextStore>, bridge: DiagnosticBridge) -> Self {
        Self {
            store,
            bridge,
            factory: ClientFactory::new(),
            web_app: None,
            transport: None,
        }
    }

    /// Application driven by injected web drivers.
    pub fn with_web_application(mut self, app: Router) -> Self {
        self.web_app = Some(app);
        self
    }

    /// Transport behind injected producers.
    pub fn with_transport(mut self, transport: Arc<dyn RecordTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn store(&self) -> &Arc<ContextStore> {
        &self.store
    }

    pub fn bridge(&self) -> DiagnosticBridge {
        self.bridge
    }

    /// Whether `target` can be produced, with the reason when it cannot.
    pub fn check_supported(&self, target: TraceTarget) -> Result<(), String> {
        match target {
            TraceTarget::Traceparent | TraceTarget::HttpClient => Ok(()),
            TraceTarget::WebDriver if self.web_app.is_none() => {
                Err(format!("no {WEB_APPLICATION} registered"))
            }
            TraceTarget::Producer if self.transport.is_none() => {
                Err(format!("no {MESSAGE_TRANSPORT} registered"))
            }
            TraceTarget::WebDriver | TraceTarget::Producer => Ok(()),
        }
    }

    /// The test case's traceparent, created and bound to the diagnostic map on first access.
    pub fn traceparent(&self, test_case: TestCaseId) -> Result<Arc<Traceparent>, InjectError> {
        let traceparent = self.store.get_or_compute(test_case, keys::TRACEPARENT, || {
            let traceparent = Traceparent::random();
            self.bridge.bind(&traceparent);
            traceparent
        })?;
        Ok(traceparent)
    }

    pub fn http_client(&self, test_case: TestCaseId) -> Result<Arc<TracedHttpClient>, InjectError> {
        let client = self
            .store
            .try_get_or_compute(test_case, keys::HTTP_CLIENT, || {
                let traceparent = self.traceparent(test_case)?;
                self.factory
                    .http_client(traceparent)
                    .map_err(crate::error::BoxError::from)
            })?;
        Ok(client)
    }

    pub fn web_driver(&self, test_case: TestCaseId) -> Result<Arc<TracedWebDriver>, InjectError> {
        let app = self
            .web_app
            .as_ref()
            .ok_or(InjectError::MissingCollaborator {
                target: TraceTarget::WebDriver,
                collaborator: WEB_APPLICATION,
            })?;

        let driver = self
            .store
            .try_get_or_compute(test_case, keys::WEB_DRIVER, || {
                let traceparent = self.traceparent(test_case)?;
                self.factory
                    .web_driver(app, traceparent)
                    .map_err(crate::error::BoxError::from)
            })?;
        Ok(driver)
    }

    pub fn producer(&self, test_case: TestCaseId) -> Result<Arc<TracedProducer>, InjectError> {
        let transport = self
            .transport
            .as_ref()
            .ok_or(InjectError::MissingCollaborator {
                target: TraceTarget::Producer,
                collaborator: MESSAGE_TRANSPORT,
            })?;

        let producer = self
            .store
            .try_get_or_compute(test_case, keys::MESSAGE_PRODUCER, || {
                let traceparent = self.traceparent(test_case)?;
                Ok::<_, InjectError>(self.factory.producer(Arc::clone(transport), traceparent))
            })?;
        Ok(producer)
    }

    pub fn resolve(&self, test_case: TestCaseId, target: TraceTarget) -> Result<Injected, InjectError> {
        Ok(match target {
            TraceTarget::Traceparent => Injected::Traceparent(self.traceparent(test_case)?),
            TraceTarget::HttpClient => Injected::HttpClient(self.http_client(test_case)?),
            TraceTarget::WebDriver => Injected::WebDriver(self.web_driver(test_case)?),
            TraceTarget::Producer => Injected::Producer(self.producer(test_case)?),
        })
    }

    /// Resolve the target implied by `T`.
    pub fn resolve_as<T: Injectable>(&self, test_case: TestCaseId) -> Result<T, InjectError> {
        let value = self.resolve(test_case, T::TARGET)?;
        T::from_injected(value).ok_or(InjectError::TypeMismatch(T::TARGET))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::InMemoryTransport;
    use crate::observability::diagnostic::{self, SPAN_ID_KEY, TRACE_ID_KEY};

    fn resolver(correlate: bool) -> TraceResolver {
        TraceResolver::new(Arc::new(ContextStore::new()), DiagnosticBridge::new(correlate))
    }

    #[test]
    fn test_clients_share_the_traceparent_arc() {
        let resolver = resolver(false)
            .with_transport(Arc::new(InMemoryTransport::new()));
        let id = TestCaseId::new();

        let tp = resolver.traceparent(id).unwrap();
        let client = resolver.http_client(id).unwrap();
        let producer = resolver.producer(id).unwrap();

        assert_eq!(client.traceparent(), tp.as_ref());
        assert_eq!(producer.traceparent(), tp.as_ref());
        assert!(Arc::ptr_eq(&client, &resolver.http_client(id).unwrap()));
    }

    #[test]
    fn test_client_first_creates_traceparent() {
        let resolver = resolver(false);
        let id = TestCaseId::new();

        let client = resolver.http_client(id).unwrap();
        assert!(resolver.store().contains(id, keys::TRACEPARENT));
        assert_eq!(client.traceparent(), resolver.traceparent(id).unwrap().as_ref());
    }

    #[test]
    fn test_missing_collaborators() {
        let resolver = resolver(false);

        assert!(resolver.check_supported(TraceTarget::Traceparent).is_ok());
        assert!(resolver.check_supported(TraceTarget::WebDriver).is_err());
        assert!(resolver.check_supported(TraceTarget::Producer).is_err());

        let err = resolver.web_driver(TestCaseId::new()).unwrap_err();
        assert!(matches!(
            err,
            InjectError::MissingCollaborator {
                target: TraceTarget::WebDriver,
                ..
            }
        ));
    }

    #[test]
    fn test_binding_happens_once_when_traceparent_is_created() {
        let resolver = resolver(true);
        let id = TestCaseId::new();

        let tp = resolver.traceparent(id).unwrap();
        assert_eq!(diagnostic::get(TRACE_ID_KEY).as_deref(), Some(tp.trace_id()));
        assert_eq!(diagnostic::get(SPAN_ID_KEY).as_deref(), Some(tp.span_id()));

        resolver.bridge().unbind();
        // A cached value does not bind again
        resolver.traceparent(id).unwrap();
        assert!(!diagnostic::contains_key(TRACE_ID_KEY));
    }

    #[test]
    fn test_resolve_as_infers_target() {
        let resolver = resolver(false);
        let id = TestCaseId::new();

        let tp: Arc<Traceparent> = resolver.resolve_as(id).unwrap();
        assert!(Arc::ptr_eq(&tp, &resolver.traceparent(id).unwrap()));
    }
}
