//! Integration tests against a local dashboard stand-in.
//!
//! An axum server plays the vendor API: rate limiting, pagination, 204
//! responses. The engine talks to it over real HTTP.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use chrono::Utc;
use dashbeat::{
    ApiError, ApiRequest, DashboardApi, DashboardInventory, Event, EventSink, Invoker, MetricKind,
    Orchestrator, OrganizationTarget, OutputError, ReqwestTransport, RetryPolicy, RetryingInvoker,
    metrics,
};
use serde_json::{Value, json};
use tokio::net::TcpListener;

// =============================================================================
// Test Helpers
// =============================================================================

/// Start `router` on a random port and return its base URL.
async fn start_server(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let addr = listener.local_addr().expect("Failed to get local addr");

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    format!("http://{}", addr)
}

fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts)
        .with_backoff(Duration::from_millis(5), Duration::from_millis(50))
        .without_jitter()
}

fn invoker(policy: RetryPolicy) -> RetryingInvoker {
    RetryingInvoker::new(
        ReqwestTransport::new(Duration::from_secs(5)).unwrap(),
        policy,
    )
}

/// Endpoint that answers 429 `failures` times, then 200.
fn flaky_router(
    failures: usize,
    hits: Arc<AtomicUsize>,
    retry_after: Option<&'static str>,
) -> Router {
    Router::new().route(
        "/flaky",
        get(move || {
            let hits = Arc::clone(&hits);
            async move {
                let n = hits.fetch_add(1, Ordering::SeqCst);
                if n < failures {
                    let mut headers = HeaderMap::new();
                    if let Some(value) = retry_after {
                        headers.insert(header::RETRY_AFTER, value.parse().unwrap());
                    }
                    (StatusCode::TOO_MANY_REQUESTS, headers, "slow down").into_response()
                } else {
                    (StatusCode::OK, r#"{"ok": true}"#).into_response()
                }
            }
        }),
    )
}

#[derive(Default)]
struct MemorySink(Mutex<Vec<Event>>);

impl EventSink for MemorySink {
    fn emit(&self, event: Event) -> Result<(), OutputError> {
        self.0.lock().unwrap().push(event);
        Ok(())
    }
}

// =============================================================================
// Retry Tests
// =============================================================================

#[tokio::test]
async fn test_rate_limited_three_times_then_ok() {
    let hits = Arc::new(AtomicUsize::new(0));
    let base = start_server(flaky_router(3, Arc::clone(&hits), None)).await;

    let response = invoker(fast_policy(5))
        .invoke(&ApiRequest::get(format!("{base}/flaky")))
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.attempts, 4);
    assert_eq!(hits.load(Ordering::SeqCst), 4);
    let body: Value = response.json().unwrap();
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn test_rate_limited_every_attempt_is_terminal() {
    let hits = Arc::new(AtomicUsize::new(0));
    let base = start_server(flaky_router(usize::MAX, Arc::clone(&hits), None)).await;

    let err = invoker(fast_policy(5))
        .invoke(&ApiRequest::get(format!("{base}/flaky")))
        .await
        .unwrap_err();

    match err {
        ApiError::Exhausted { attempts, request, .. } => {
            assert_eq!(attempts, 5);
            assert!(request.contains("/flaky"));
        }
        other => panic!("expected Exhausted, got {other:?}"),
    }
    assert_eq!(hits.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_retry_after_hint_is_capped() {
    let hits = Arc::new(AtomicUsize::new(0));
    // The server asks for 30s; the policy caps any sleep at 50ms.
    let base = start_server(flaky_router(1, Arc::clone(&hits), Some("30"))).await;

    let started = Instant::now();
    let response = invoker(fast_policy(3))
        .invoke(&ApiRequest::get(format!("{base}/flaky")))
        .await
        .unwrap();

    assert_eq!(response.attempts, 2);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let router = Router::new().route(
        "/missing",
        get(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { StatusCode::NOT_FOUND }
        }),
    );
    let base = start_server(router).await;

    let err = invoker(fast_policy(5))
        .invoke(&ApiRequest::get(format!("{base}/missing")))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Status { status: 404, .. }));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

// =============================================================================
// End-to-End Cycle
// =============================================================================

#[derive(Clone)]
struct Dashboard {
    base: Arc<Mutex<String>>,
}

async fn devices(
    State(state): State<Dashboard>,
    Path(org): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) != Some("Bearer key") {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if org != "org1" {
        return StatusCode::NOT_FOUND.into_response();
    }
    if query.get("page").map(String::as_str) == Some("2") {
        return axum::Json(json!([
            {"serial": "S2", "model": "MX64", "networkId": "N_1"},
            {"serial": "", "model": "MR33"}
        ]))
        .into_response();
    }

    let base = state.base.lock().unwrap().clone();
    let link = format!("<{base}/api/v1/organizations/org1/devices?perPage=1000&page=2>; rel=next");
    (
        [(header::LINK, link)],
        axum::Json(json!([
            {"serial": "S1", "model": "X1", "lat": 48.85, "lng": 2.35,
             "details": [{"name": "Catalyst serial", "value": "ABC"}]}
        ])),
    )
        .into_response()
}

async fn loss_and_latency(Query(query): Query<HashMap<String, String>>) -> Response {
    assert_eq!(query.get("timespan").map(String::as_str), Some("70"));
    let ts = (Utc::now() - chrono::TimeDelta::seconds(5)).to_rfc3339();
    axum::Json(json!([
        {"serial": "S1", "uplink": "wan1", "ip": "8.8.8.8", "timeSeries": [
            {"ts": ts, "lossPercent": 2.5, "latencyMs": 10.0},
            {"ts": ts, "lossPercent": null, "latencyMs": null}
        ]},
        {"serial": "S9", "uplink": "wan1", "timeSeries": [
            {"ts": ts, "lossPercent": 0.0, "latencyMs": 1.0}
        ]}
    ]))
    .into_response()
}

async fn performance(Path(serial): Path<String>) -> Response {
    match serial.as_str() {
        "S2" => StatusCode::NO_CONTENT.into_response(),
        _ => axum::Json(json!({"perfScore": 90.0})).into_response(),
    }
}

#[tokio::test]
async fn test_cycle_end_to_end() {
    let state = Dashboard {
        base: Arc::new(Mutex::new(String::new())),
    };
    let router = Router::new()
        .route("/api/v1/organizations/{org}/devices", get(devices))
        .route(
            "/api/v1/organizations/{org}/devices/uplinksLossAndLatency",
            get(loss_and_latency),
        )
        .route("/api/v1/devices/{serial}/appliance/performance", get(performance))
        .with_state(state.clone());
    let base = start_server(router).await;
    *state.base.lock().unwrap() = base.clone();

    let api = DashboardApi::new(Arc::new(invoker(fast_policy(3))));
    let sink = Arc::new(MemorySink::default());
    let orchestrator = Orchestrator::new(
        Arc::new(DashboardInventory::new(api.clone())),
        vec![
            metrics::build(MetricKind::DeviceUplinksLossAndLatency, api.clone(), 2),
            metrics::build(MetricKind::DevicePerformanceScore, api, 2),
        ],
        sink.clone(),
    );
    let targets = [
        OrganizationTarget::new("org1", &base, "key", Duration::from_secs(60)),
        OrganizationTarget::new("org2", &base, "key", Duration::from_secs(60)),
    ];

    let report = orchestrator.run_cycle(&targets).await;

    assert!(report.organizations[0].is_success(), "{:?}", report.organizations[0]);
    assert!(matches!(
        report.organizations[1].outcome,
        Err(dashbeat::CollectorError::Upstream(ApiError::Status { status: 404, .. }))
    ));

    let events = sink.0.lock().unwrap().clone();
    let uplink: Vec<&Event> = events
        .iter()
        .filter(|e| e.metricset == MetricKind::DeviceUplinksLossAndLatency)
        .collect();
    // S9 is not in the inventory and the null measurement is skipped.
    assert_eq!(uplink.len(), 1);
    let fields = &uplink[0].fields;
    assert_eq!(fields["device.serial"], json!("S1"));
    assert_eq!(fields["device.model"], json!("X1"));
    assert_eq!(fields["device.location"], json!([2.35, 48.85]));
    assert_eq!(fields["device.details.Catalyst serial"], json!("ABC"));
    assert_eq!(fields["uplink.loss_percent"], json!(2.5));
    assert_eq!(fields["uplink.latency_ms"], json!(10.0));
    assert_eq!(uplink[0].organization_id, "org1");

    // Only S2 is an appliance; its 204 becomes a status code without a score.
    let perf: Vec<&Event> = events
        .iter()
        .filter(|e| e.metricset == MetricKind::DevicePerformanceScore)
        .collect();
    assert_eq!(perf.len(), 1);
    assert_eq!(perf[0].fields["device.serial"], json!("S2"));
    assert_eq!(perf[0].fields["device.performance.http_status_code"], json!(204));
    assert!(!perf[0].fields.contains_key("device.performance.score"));
}
