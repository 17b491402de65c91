//! Shared utilities for integration tests.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Mutex};

use axum::http::HeaderMap;
use axum::routing::get;
use axum::Router;
use tempfile::TempDir;
use tokio::net::TcpListener;

use trace_harness::config::HarnessConfig;
use trace_harness::{BoxError, MethodTarget, TRACEPARENT_HEADER};

/// Config with the given parallelism and metrics off.
#[allow(dead_code)]
pub fn config(parallelism: usize, correlate: bool) -> HarnessConfig {
    let mut config = HarnessConfig::default();
    config.runner.parallelism = parallelism;
    config.tracing.correlate_trace_to_diagnostic_context = correlate;
    config.observability.metrics_enabled = false;
    config
}

/// Router answering `GET /echo` with the request's `traceparent` header.
///
/// The headers of every request are also pushed to `captured`.
#[allow(dead_code)]
pub fn echo_router(captured: Arc<Mutex<Vec<HeaderMap>>>) -> Router {
    Router::new().route(
        "/echo",
        get(move |headers: HeaderMap| {
            let captured = captured.clone();
            async move {
                let value = header(&headers, TRACEPARENT_HEADER);
                captured.lock().unwrap().push(headers);
                value
            }
        }),
    )
}

fn header(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// A real HTTP backend running the echo router on its own thread and runtime.
#[allow(dead_code)]
pub struct EchoBackend {
    pub addr: SocketAddr,
    captured: Arc<Mutex<Vec<HeaderMap>>>,
}

#[allow(dead_code)]
impl EchoBackend {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Every `traceparent` value received so far.
    pub fn captured(&self) -> Vec<String> {
        self.received(TRACEPARENT_HEADER)
    }

    /// Every `user-agent` value received so far.
    pub fn user_agents(&self) -> Vec<String> {
        self.received("user-agent")
    }

    fn received(&self, name: &str) -> Vec<String> {
        self.captured
            .lock()
            .unwrap()
            .iter()
            .map(|headers| header(headers, name))
            .collect()
    }
}

/// Start an echo backend on an ephemeral port.
///
/// The server outlives the test; the process exit tears it down.
#[allow(dead_code)]
pub fn start_echo_backend() -> EchoBackend {
    let captured = Arc::new(Mutex::new(Vec::new()));
    let router = echo_router(captured.clone());
    let (tx, rx) = mpsc::channel();

    std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async move {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            tx.send(listener.local_addr().unwrap()).unwrap();
            axum::serve(listener, router).await.unwrap();
        });
    });

    EchoBackend {
        addr: rx.recv().unwrap(),
        captured,
    }
}

/// A temporary file exposing `delete` and `reset` as named methods.
#[allow(dead_code)]
pub struct TempResource {
    _dir: TempDir,
    path: PathBuf,
    calls: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl TempResource {
    pub fn create() -> Arc<Self> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resource.txt");
        fs::write(&path, "data").unwrap();
        Arc::new(Self {
            _dir: dir,
            path,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn calls(&self, method: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == method).count()
    }
}

impl MethodTarget for TempResource {
    fn has_method(&self, name: &str) -> bool {
        matches!(name, "delete" | "reset")
    }

    fn call_method(&self, name: &str) -> Result<(), BoxError> {
        self.calls.lock().unwrap().push(name.to_string());
        match name {
            "delete" => fs::remove_file(&self.path)?,
            "reset" => fs::write(&self.path, "")?,
            other => return Err(format!("no method `{other}`").into()),
        }
        Ok(())
    }
}
