//! End-to-end trace propagation through the harness.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::Request;

use trace_harness::client::{InMemoryTransport, TracedHttpClient, TracedProducer, TracedWebDriver};
use trace_harness::lifecycle::HookValue;
use trace_harness::observability::diagnostic::{self, SPAN_ID_KEY, TRACE_ID_KEY};
use trace_harness::{
    DiscoveryError, Harness, HarnessError, HookDeclaration, Phase, TestClass, TestContext, TestResult,
    TraceTarget, Traceparent, TRACEPARENT_HEADER,
};

mod common;

#[derive(Default)]
struct ApiTest {
    traceparent: Option<Arc<Traceparent>>,
    client: Option<Arc<TracedHttpClient>>,
}

fn api_test(name: &str) -> TestClass<ApiTest> {
    TestClass::new(name, ApiTest::default)
        .traceable("traceparent", |t: &mut ApiTest, tp: Arc<Traceparent>| {
            t.traceparent = Some(tp)
        })
        .traceable("client", |t: &mut ApiTest, c: Arc<TracedHttpClient>| t.client = Some(c))
}

#[test]
fn test_field_and_parameter_traceparent_are_identical() {
    let class = api_test("Identity").test(
        "field equals parameter",
        |t: &mut ApiTest, (tp, client): (Arc<Traceparent>, Arc<TracedHttpClient>), ctx: &TestContext<'_>| {
            let field = t.traceparent.as_ref().ok_or("traceparent not injected")?;
            assert_eq!(field, &tp);
            assert!(Arc::ptr_eq(field, &tp));
            assert!(Arc::ptr_eq(t.client.as_ref().ok_or("client not injected")?, &client));
            assert!(Arc::ptr_eq(&ctx.resolve::<Arc<Traceparent>>()?, &tp));
            Ok(())
        },
    );

    let report = Harness::new(common::config(1, false)).run(&class).unwrap();
    assert!(report.is_success(), "{report:?}");
}

#[test]
fn test_http_request_carries_traceparent() {
    let backend = common::start_echo_backend();
    let url = backend.url("/echo");
    let echoed = Arc::new(Mutex::new(String::new()));
    let sink = echoed.clone();

    let class = api_test("Http").test(
        "sends header",
        move |t: &mut ApiTest, (): (), ctx: &TestContext<'_>| {
            let client = t.client.clone().ok_or("client not injected")?;
            let response = ctx.block_on(client.get(url.as_str()).send())?;
            *sink.lock().unwrap() = ctx.block_on(response.text())?;
            Ok(())
        },
    );

    let report = Harness::new(common::config(1, false)).run(&class).unwrap();
    assert!(report.is_success(), "{report:?}");

    let tp = report.tests[0].traceparent.clone().unwrap();
    let header = echoed.lock().unwrap().clone();
    assert_eq!(header, tp.to_string());
    assert!(header.contains(tp.trace_id()));
    assert_eq!(header.matches(tp.span_id()).count(), 1);
    assert_eq!(backend.captured(), vec![tp.to_string()]);
    assert_eq!(
        backend.user_agents(),
        vec![format!("trace-harness/{}", env!("CARGO_PKG_VERSION"))]
    );
}

#[test]
fn test_captured_header_has_canonical_form() {
    let backend = common::start_echo_backend();
    let url = backend.url("/echo");

    let class = api_test("Render").test(
        "render",
        move |t: &mut ApiTest, (): (), ctx: &TestContext<'_>| {
            let client = t.client.clone().ok_or("client not injected")?;
            ctx.block_on(client.get(url.as_str()).send())?;
            Ok(())
        },
    );

    let report = Harness::new(common::config(1, false)).run(&class).unwrap();
    assert!(report.is_success(), "{report:?}");

    let captured = backend.captured();
    let parts: Vec<&str> = captured[0].split('-').collect();
    assert_eq!(parts.len(), 4);
    assert_eq!(parts[0], "00");
    assert_eq!(parts[1].len(), 32);
    assert_eq!(parts[2].len(), 16);
    assert_eq!(parts[3], "00");
    assert!(parts[1..3]
        .iter()
        .all(|p| p.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())));

    let parsed: Traceparent = captured[0].parse().unwrap();
    assert_eq!(Some(parsed), report.tests[0].traceparent);
}

#[test]
fn test_diagnostic_map_follows_test_case_when_enabled() {
    let factory_saw_trace = Arc::new(Mutex::new(Vec::new()));
    let seen = factory_saw_trace.clone();
    let after_each_saw_trace = Arc::new(AtomicUsize::new(0));
    let after_each = after_each_saw_trace.clone();

    let body = |t: &mut ApiTest, (): (), _ctx: &TestContext<'_>| -> TestResult {
        let tp = t.traceparent.as_ref().ok_or("traceparent not injected")?;
        assert_eq!(diagnostic::get(TRACE_ID_KEY).as_deref(), Some(tp.trace_id()));
        assert_eq!(diagnostic::get(SPAN_ID_KEY).as_deref(), Some(tp.span_id()));
        Ok(())
    };

    let class = TestClass::new("Correlated", move || {
        seen.lock().unwrap().push(diagnostic::contains_key(TRACE_ID_KEY));
        ApiTest::default()
    })
    .traceable("traceparent", |t: &mut ApiTest, tp: Arc<Traceparent>| t.traceparent = Some(tp))
    .hook(HookDeclaration::new(
        Phase::AfterEach,
        "check binding",
        HookValue::runnable(move || {
            if diagnostic::contains_key(TRACE_ID_KEY) {
                after_each.fetch_add(1, Ordering::SeqCst);
            }
        }),
    ))
    .test("first", body)
    .test("second", body);

    let report = Harness::new(common::config(1, true)).run(&class).unwrap();
    assert!(report.is_success(), "{report:?}");

    // Both tests ran on one worker; the second fixture saw the first test's entries gone.
    assert_eq!(*factory_saw_trace.lock().unwrap(), vec![false, false]);
    assert_eq!(after_each_saw_trace.load(Ordering::SeqCst), 2);
}

#[test]
fn test_diagnostic_map_untouched_when_disabled() {
    let class = api_test("Uncorrelated").test(
        "no entries",
        |_t: &mut ApiTest, (_tp,): (Arc<Traceparent>,), _ctx: &TestContext<'_>| {
            assert!(!diagnostic::contains_key(TRACE_ID_KEY));
            assert!(!diagnostic::contains_key(SPAN_ID_KEY));
            Ok(())
        },
    );

    let report = Harness::new(common::config(1, false)).run(&class).unwrap();
    assert!(report.is_success(), "{report:?}");
}

#[test]
fn test_producer_records_carry_traceparent() {
    let transport = Arc::new(InMemoryTransport::new());
    let harness = Harness::builder()
        .config(common::config(2, false))
        .message_transport(transport.clone())
        .build();

    let class = TestClass::new("Messaging", || ()).test(
        "publishes",
        |_: &mut (), (producer,): (Arc<TracedProducer>,), _ctx: &TestContext<'_>| {
            producer.send_json("create.epic.command", &serde_json::json!({ "title": "Migrate" }))?;
            Ok(())
        },
    );

    let report = harness.run(&class).unwrap();
    assert!(report.is_success(), "{report:?}");

    let tp = report.tests[0].traceparent.clone().unwrap();
    let records = transport.records_for("create.epic.command");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].payload, br#"{"title":"Migrate"}"#);
    assert_eq!(
        records[0].last_header_str(TRACEPARENT_HEADER),
        Some(tp.to_string().as_str())
    );
}

#[test]
fn test_web_driver_default_request_carries_traceparent() {
    let harness = Harness::builder()
        .config(common::config(1, false))
        .web_application(common::echo_router(Arc::default()))
        .build();

    let class = TestClass::new("Web", || ()).test(
        "drives app",
        |_: &mut (), (driver, tp): (Arc<TracedWebDriver>, Arc<Traceparent>), ctx: &TestContext<'_>| {
            let response = ctx.block_on(driver.get("/echo"))?;
            let bytes = ctx.block_on(axum::body::to_bytes(response.into_body(), 1024))?;
            assert_eq!(bytes, tp.to_string().as_bytes());

            let explicit = Request::builder()
                .uri("/echo")
                .header(TRACEPARENT_HEADER, "explicit")
                .body(Body::empty())?;
            let response = ctx.block_on(driver.perform(explicit));
            let bytes = ctx.block_on(axum::body::to_bytes(response.into_body(), 1024))?;
            assert_eq!(bytes, "explicit".as_bytes());
            Ok(())
        },
    );

    let report = harness.run(&class).unwrap();
    assert!(report.is_success(), "{report:?}");
}

#[test]
fn test_unsupported_field_fails_before_any_hook_runs() {
    let before_all = Arc::new(AtomicUsize::new(0));
    let counter = before_all.clone();

    #[derive(Default)]
    struct NeedsDriver {
        driver: Option<Arc<TracedWebDriver>>,
    }

    let class = TestClass::new("NoApplication", NeedsDriver::default)
        .traceable("driver", |t: &mut NeedsDriver, d: Arc<TracedWebDriver>| t.driver = Some(d))
        .hook(HookDeclaration::new(
            Phase::BeforeAll,
            "count",
            HookValue::runnable(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        ))
        .test("never runs", |_t: &mut NeedsDriver, (): (), _ctx: &TestContext<'_>| {
            panic!("test must not run")
        });

    let err = Harness::new(common::config(1, false)).run(&class).unwrap_err();
    match err {
        HarnessError::Discovery(DiscoveryError::UnsupportedField { field, target, .. }) => {
            assert_eq!(field, "driver");
            assert_eq!(target, TraceTarget::WebDriver);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(before_all.load(Ordering::SeqCst), 0);
}
