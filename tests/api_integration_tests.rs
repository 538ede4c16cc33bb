//! Integration Tests for API Endpoints
//!
//! Tests the full request/response cycle for each endpoint, and the
//! behaviour of requests while the store connection is down.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use kv_facade::{
    api::create_router,
    store::{
        spawn_connector, ConnectionState, Connector, Dialer, KvStore, Lease, MemoryStore,
        RetryPolicy, StoreError, StoreResult,
    },
    AppState,
};
use serde_json::{json, Value};
use tower::ServiceExt;

// == Helper Functions ==

fn create_test_app() -> Router {
    create_router(AppState::in_memory())
}

async fn send(app: &Router, method: &str, uri: &str, body: Body) -> axum::response::Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(body)
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_to_text(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

// == Cache Endpoint Tests ==

#[tokio::test]
async fn test_cache_get_unused_name_is_empty_object() {
    let app = create_test_app();

    let response = send(&app, "GET", "/cache/never_written", Body::empty()).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_to_json(response.into_body()).await, json!({}));
}

#[tokio::test]
async fn test_cache_store_then_read_widget() {
    let app = create_test_app();

    let set_response = send(&app, "POST", "/cache/widget", Body::from(r#"{"x":1}"#)).await;
    assert_eq!(set_response.status(), StatusCode::OK);
    assert_eq!(body_to_json(set_response.into_body()).await, json!("OK"));

    let get_response = send(&app, "GET", "/cache/widget", Body::empty()).await;
    assert_eq!(get_response.status(), StatusCode::OK);
    assert_eq!(
        body_to_text(get_response.into_body()).await,
        r#"{"x":1}"#
    );
}

#[tokio::test]
async fn test_cache_overwrite_is_last_write_wins() {
    let app = create_test_app();

    send(&app, "POST", "/cache/doc", Body::from(r#"{"a":1,"b":2}"#)).await;
    send(&app, "POST", "/cache/doc", Body::from(r#"{"c":3}"#)).await;

    let response = send(&app, "GET", "/cache/doc", Body::empty()).await;
    assert_eq!(body_to_json(response.into_body()).await, json!({"c": 3}));
}

#[tokio::test]
async fn test_cache_empty_body_stores_empty_object() {
    let app = create_test_app();

    send(&app, "POST", "/cache/blank", Body::from(r#"{"old":true}"#)).await;
    let response = send(&app, "POST", "/cache/blank", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, "GET", "/cache/blank", Body::empty()).await;
    assert_eq!(body_to_json(response.into_body()).await, json!({}));
}

#[tokio::test]
async fn test_cache_invalid_body_is_bad_request() {
    let app = create_test_app();

    let response = send(&app, "POST", "/cache/bad", Body::from("{not json")).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert!(json.get("error").is_some());
}

#[tokio::test]
async fn test_cache_corrupt_stored_value_is_server_error() {
    let store = Arc::new(MemoryStore::new());
    store.set("cache:mangled", "{{{").await.unwrap();
    let app = create_router(AppState::new(store));

    let response = send(&app, "GET", "/cache/mangled", Body::empty()).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

// == Counter Endpoint Tests ==

#[tokio::test]
async fn test_counter_alice_scenario() {
    let app = create_test_app();

    for expected in ["1", "2", "3"] {
        let response = send(&app, "POST", "/counter/alice", Body::empty()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_to_text(response.into_body()).await, expected);
    }

    let response = send(&app, "GET", "/counter/alice", Body::empty()).await;
    assert_eq!(body_to_text(response.into_body()).await, "3");

    let response = send(&app, "DELETE", "/counter/alice", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_to_text(response.into_body()).await, "2");

    let response = send(&app, "GET", "/counter/alice", Body::empty()).await;
    assert_eq!(body_to_text(response.into_body()).await, "2");
}

#[tokio::test]
async fn test_counter_can_go_negative() {
    let app = create_test_app();

    send(&app, "DELETE", "/counter/debt", Body::empty()).await;
    let response = send(&app, "DELETE", "/counter/debt", Body::empty()).await;

    assert_eq!(body_to_text(response.into_body()).await, "-2");
}

#[tokio::test]
async fn test_counter_responses_are_plain_text() {
    let app = create_test_app();

    for method in ["GET", "POST", "DELETE"] {
        let response = send(&app, method, "/counter/typed", Body::empty()).await;
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=UTF-8"
        );
    }
}

#[tokio::test]
async fn test_concurrent_increments_accumulate() {
    let app = create_test_app();

    let requests: Vec<_> = (0..50)
        .map(|_| {
            let app = app.clone();
            tokio::spawn(async move { send(&app, "POST", "/counter/busy", Body::empty()).await })
        })
        .collect();
    for request in requests {
        assert_eq!(request.await.unwrap().status(), StatusCode::OK);
    }

    let response = send(&app, "GET", "/counter/busy", Body::empty()).await;
    assert_eq!(body_to_text(response.into_body()).await, "50");
}

// == Info Endpoint Tests ==

#[tokio::test]
async fn test_info_page() {
    let app = create_router(AppState::with_host(Arc::new(MemoryStore::new()), "web-1"));

    let response = send(&app, "GET", "/", Body::empty()).await;

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_to_text(response.into_body()).await;
    assert!(html.contains("web-1"));
    assert!(html.contains("+09:00"));
}

// == Store Outage Tests ==

/// In-process "server" that can be switched between up and down.
///
/// While down, dials are refused and commands on an open connection fail
/// as if the socket had been reset.
#[derive(Clone)]
struct FakeServer {
    up: Arc<AtomicBool>,
    data: Arc<MemoryStore>,
}

impl FakeServer {
    fn check(&self) -> StoreResult<()> {
        if self.up.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Closed("connection reset by peer".into()))
        }
    }
}

#[async_trait]
impl KvStore for FakeServer {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.check()?;
        self.data.get(key).await
    }
    async fn set(&self, key: &str, value: &str) -> StoreResult<Option<String>> {
        self.check()?;
        self.data.set(key, value).await
    }
    async fn incr(&self, key: &str) -> StoreResult<i64> {
        self.check()?;
        self.data.incr(key).await
    }
    async fn decr(&self, key: &str) -> StoreResult<i64> {
        self.check()?;
        self.data.decr(key).await
    }
}

#[async_trait]
impl Dialer for FakeServer {
    type Conn = FakeServer;

    fn describe(&self) -> String {
        "fake".to_string()
    }

    async fn dial(&self) -> StoreResult<FakeServer> {
        if self.up.load(Ordering::SeqCst) {
            Ok(self.clone())
        } else {
            Err(StoreError::Refused("ECONNREFUSED".into()))
        }
    }
}

/// Store that runs every operation through a supervised connection and
/// reports failures back to the supervisor.
struct SupervisedStore {
    connector: Connector<FakeServer>,
}

impl SupervisedStore {
    fn settle<T>(&self, lease: &Lease<FakeServer>, result: StoreResult<T>) -> StoreResult<T> {
        if let Err(err) = &result {
            self.connector.report(lease, err);
        }
        result
    }
}

#[async_trait]
impl KvStore for SupervisedStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let lease = self.connector.acquire().await?;
        let result = lease.conn.get(key).await;
        self.settle(&lease, result)
    }
    async fn set(&self, key: &str, value: &str) -> StoreResult<Option<String>> {
        let lease = self.connector.acquire().await?;
        let result = lease.conn.set(key, value).await;
        self.settle(&lease, result)
    }
    async fn incr(&self, key: &str) -> StoreResult<i64> {
        let lease = self.connector.acquire().await?;
        let result = lease.conn.incr(key).await;
        self.settle(&lease, result)
    }
    async fn decr(&self, key: &str) -> StoreResult<i64> {
        let lease = self.connector.acquire().await?;
        let result = lease.conn.decr(key).await;
        self.settle(&lease, result)
    }
}

fn supervised_app(
    up: bool,
    policy: RetryPolicy,
) -> (Router, Arc<AtomicBool>, Connector<FakeServer>) {
    let server = FakeServer {
        up: Arc::new(AtomicBool::new(up)),
        data: Arc::new(MemoryStore::new()),
    };
    let switch = Arc::clone(&server.up);
    let (connector, _handle) = spawn_connector(server, policy);
    let app = create_router(AppState::with_host(
        Arc::new(SupervisedStore {
            connector: connector.clone(),
        }),
        "test",
    ));
    (app, switch, connector)
}

#[tokio::test(start_paused = true)]
async fn test_requests_wait_for_reconnect_after_refusal() {
    let (app, switch, _connector) = supervised_app(false, RetryPolicy::default());

    let pending = tokio::spawn({
        let app = app.clone();
        async move { send(&app, "POST", "/counter/queued", Body::empty()).await }
    });

    // Nothing can succeed while the store keeps refusing
    tokio::time::sleep(Duration::from_millis(4_000)).await;
    assert!(!pending.is_finished());

    // Server comes back; the next scheduled retry connects and the request completes
    switch.store(true, Ordering::SeqCst);
    let response = pending.await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_to_text(response.into_body()).await, "1");

    let response = send(&app, "GET", "/counter/queued", Body::empty()).await;
    assert_eq!(body_to_text(response.into_body()).await, "1");
}

#[tokio::test(start_paused = true)]
async fn test_server_restart_fails_one_request_then_waits_out_retry_delay() {
    let (app, switch, connector) = supervised_app(true, RetryPolicy::default());

    let response = send(&app, "POST", "/counter/flaky", Body::empty()).await;
    assert_eq!(body_to_text(response.into_body()).await, "1");

    // The server goes away under a live connection
    switch.store(false, Ordering::SeqCst);
    let response = send(&app, "POST", "/counter/flaky", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_ne!(connector.state(), ConnectionState::Connected);

    // Back up at once, but the redial still waits for the forced-close delay
    switch.store(true, Ordering::SeqCst);
    let pending = tokio::spawn({
        let app = app.clone();
        async move { send(&app, "POST", "/counter/flaky", Body::empty()).await }
    });
    tokio::time::sleep(Duration::from_millis(4_999)).await;
    assert!(!pending.is_finished());

    let response = pending.await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_to_text(response.into_body()).await, "2");
    assert_eq!(connector.state(), ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_requests_fail_fast_after_retries_exhausted() {
    let policy = RetryPolicy {
        max_attempts: 3,
        ..RetryPolicy::default()
    };
    let (app, switch, _connector) = supervised_app(false, policy);

    let response = send(&app, "GET", "/cache/anything", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    // Even once the server is reachable again, the connector stays down
    switch.store(true, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(60)).await;

    let response = send(&app, "POST", "/counter/anything", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("exhausted"));
}

#[tokio::test(start_paused = true)]
async fn test_queued_requests_fail_when_connector_closes() {
    let (app, _switch, connector) = supervised_app(false, RetryPolicy::default());

    let pending = tokio::spawn({
        let app = app.clone();
        async move { send(&app, "GET", "/counter/waiting", Body::empty()).await }
    });
    tokio::time::sleep(Duration::from_millis(1_000)).await;
    assert!(!pending.is_finished());

    connector.close();

    let response = pending.await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("shutdown"));
}
