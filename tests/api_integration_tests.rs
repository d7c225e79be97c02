//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycle for each endpoint, and routing between
//! two nodes over real sockets.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use peercache::{
    create_router, AppState, CacheError, CacheOptions, EvictionPolicy, GetterFn, Group,
    GroupRegistry, HttpPool, PeerPicker,
};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceExt;

// == Helper Functions ==

const TEST_ADDR: &str = "http://127.0.0.1:7301";

/// Getter answering `"{key}@{node}"`, failing for keys starting with `missing`.
fn node_getter(
    node: &'static str,
    loads: Arc<AtomicUsize>,
) -> GetterFn<impl Fn(String) -> std::future::Ready<anyhow::Result<Vec<u8>>>> {
    GetterFn(move |key: String| {
        loads.fetch_add(1, Ordering::SeqCst);
        let result = if key.starts_with("missing") {
            Err(anyhow::anyhow!("{} not exist", key))
        } else {
            Ok(format!("{}@{}", key, node).into_bytes())
        };
        std::future::ready(result)
    })
}

fn create_app_with(options: CacheOptions, loads: Arc<AtomicUsize>) -> Router {
    let pool = Arc::new(HttpPool::new(TEST_ADDR, 50, Duration::from_secs(1)).unwrap());
    pool.set_peers([TEST_ADDR]).unwrap();

    let group = Group::new("scores", options, node_getter("solo", loads));
    group.register_peers(pool.clone()).unwrap();
    let registry = Arc::new(GroupRegistry::new());
    registry.register(group).unwrap();

    create_router(AppState::new(registry, pool))
}

fn create_test_app() -> Router {
    create_app_with(CacheOptions::default(), Arc::new(AtomicUsize::new(0)))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_bytes(body: Body) -> Vec<u8> {
    axum::body::to_bytes(body, usize::MAX).await.unwrap().to_vec()
}

async fn body_to_json(body: Body) -> Value {
    serde_json::from_slice(&body_bytes(body).await).unwrap()
}

// == Fetch Endpoint Tests ==

#[tokio::test]
async fn test_fetch_endpoint_returns_raw_bytes() {
    let app = create_test_app();

    let response = app.oneshot(get("/_peercache/scores/Tom")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/octet-stream"
    );
    assert_eq!(body_bytes(response.into_body()).await, b"Tom@solo");
}

#[tokio::test]
async fn test_fetch_endpoint_decodes_key() {
    let app = create_test_app();

    let response = app
        .oneshot(get("/_peercache/scores/a%20b%2Fc"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response.into_body()).await, b"a b/c@solo");
}

#[tokio::test]
async fn test_fetch_endpoint_unknown_group() {
    let app = create_test_app();

    let response = app.oneshot(get("/_peercache/missing/Tom")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("missing"));
}

#[tokio::test]
async fn test_fetch_endpoint_load_error() {
    let app = create_test_app();

    let response = app
        .oneshot(get("/_peercache/scores/missing-key"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("not exist"));
}

#[tokio::test]
async fn test_fetch_endpoint_caches_value() {
    let loads = Arc::new(AtomicUsize::new(0));
    let app = create_app_with(CacheOptions::default(), loads.clone());

    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(get("/_peercache/scores/Tom"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(loads.load(Ordering::SeqCst), 1);
}

// == TTL Expiration via API Tests ==

#[tokio::test]
async fn test_ttl_expiration_via_api() {
    let loads = Arc::new(AtomicUsize::new(0));
    let options = CacheOptions {
        policy: EvictionPolicy::Lru,
        max_bytes: 0,
        default_ttl: Duration::from_secs(1),
        max_jitter: Duration::ZERO,
    };
    let app = create_app_with(options, loads.clone());

    let response = app
        .clone()
        .oneshot(get("/_peercache/scores/ttl_test"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Wait for TTL to expire
    tokio::time::sleep(Duration::from_millis(1100)).await;

    let response = app
        .oneshot(get("/_peercache/scores/ttl_test"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // The expired entry was loaded again.
    assert_eq!(loads.load(Ordering::SeqCst), 2);
}

// == PEERS Endpoint Tests ==

#[tokio::test]
async fn test_get_peers_endpoint() {
    let app = create_test_app();

    let response = app.oneshot(get("/peers")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["self_addr"], TEST_ADDR);
    assert_eq!(json["peers"], serde_json::json!([TEST_ADDR]));
}

#[tokio::test]
async fn test_set_peers_endpoint() {
    let app = create_test_app();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/peers")
                .header("content-type", "application/json")
                .body(Body::from(
                    r#"{"peers":["http://127.0.0.1:7302/","http://127.0.0.1:7301"]}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/peers")).await.unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(
        json["peers"],
        serde_json::json!(["http://127.0.0.1:7301", "http://127.0.0.1:7302"])
    );
}

#[tokio::test]
async fn test_set_peers_rejects_bad_address() {
    let app = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/peers")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"peers":["10.0.0.2:3000"]}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert!(json.get("error").is_some());
}

#[tokio::test]
async fn test_invalid_json_request() {
    let app = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/peers")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"invalid json"#))
                .unwrap(),
        )
        .await
        .unwrap();

    // Axum returns 400 or 422 for JSON parsing errors
    assert!(
        response.status() == StatusCode::BAD_REQUEST
            || response.status() == StatusCode::UNPROCESSABLE_ENTITY
    );
}

// == STATS Endpoint Tests ==

#[tokio::test]
async fn test_stats_endpoint() {
    let app = create_test_app();

    // Load, then hit
    for _ in 0..2 {
        let _ = app
            .clone()
            .oneshot(get("/_peercache/scores/stats_key"))
            .await
            .unwrap();
    }
    // Failed load
    let _ = app
        .clone()
        .oneshot(get("/_peercache/scores/missing-key"))
        .await
        .unwrap();

    let response = app.oneshot(get("/stats")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    let group = &json["groups"][0];
    assert_eq!(group["name"], "scores");
    assert_eq!(group["gets"].as_u64().unwrap(), 3);
    assert_eq!(group["cache_hits"].as_u64().unwrap(), 1);
    assert_eq!(group["local_loads"].as_u64().unwrap(), 1);
    assert_eq!(group["local_load_errors"].as_u64().unwrap(), 1);
    assert_eq!(group["entries"].as_u64().unwrap(), 1);
    assert!(group.get("hit_rate").is_some());
}

// == HEALTH Endpoint Tests ==

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app();

    let response = app.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"].as_str().unwrap(), "healthy");
    assert!(json.get("timestamp").is_some());
}

// == Two Node Tests ==

struct Node {
    group: Arc<Group>,
    pool: Arc<HttpPool>,
    loads: Arc<AtomicUsize>,
}

/// Starts two nodes on ephemeral ports, each knowing both addresses.
async fn spawn_cluster() -> (Node, Node) {
    let listener_a = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let listener_b = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr_a = format!("http://{}", listener_a.local_addr().unwrap());
    let addr_b = format!("http://{}", listener_b.local_addr().unwrap());
    let peers = [addr_a.clone(), addr_b.clone()];

    let a = start_node(listener_a, &addr_a, &peers, "a").await;
    let b = start_node(listener_b, &addr_b, &peers, "b").await;
    (a, b)
}

async fn start_node(
    listener: TcpListener,
    addr: &str,
    peers: &[String],
    name: &'static str,
) -> Node {
    let loads = Arc::new(AtomicUsize::new(0));
    let pool = Arc::new(HttpPool::new(addr, 50, Duration::from_secs(5)).unwrap());
    pool.set_peers(peers).unwrap();

    let registry = Arc::new(GroupRegistry::new());
    let group = registry
        .register(Group::new(
            "scores",
            CacheOptions::default(),
            node_getter(name, loads.clone()),
        ))
        .unwrap();
    group.register_peers(pool.clone()).unwrap();

    let app = create_router(AppState::new(registry, pool.clone()));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Node { group, pool, loads }
}

/// First probe key whose owner, as seen from `node`, is remote.
fn key_owned_remotely(node: &Node, prefix: &str) -> String {
    (0..1000)
        .map(|i| format!("{}{}", prefix, i))
        .find(|key| node.pool.pick_peer(key).is_some())
        .unwrap()
}

fn key_owned_locally(node: &Node, prefix: &str) -> String {
    (0..1000)
        .map(|i| format!("{}{}", prefix, i))
        .find(|key| node.pool.pick_peer(key).is_none())
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_remote_key_is_loaded_by_owner() {
    let (a, b) = spawn_cluster().await;
    let key = key_owned_remotely(&a, "key");

    let value = a.group.get(&key).await.unwrap();

    assert_eq!(value.to_string(), format!("{}@b", key));
    assert_eq!(b.loads.load(Ordering::SeqCst), 1);
    assert_eq!(a.loads.load(Ordering::SeqCst), 0);
    // Both the owner and the requester keep a copy.
    assert!(b.group.cache().get(&key).is_some());
    assert!(a.group.cache().get(&key).is_some());
    assert_eq!(a.group.stats().peer_loads, 1);

    // Served from A's cache from now on.
    a.group.get(&key).await.unwrap();
    assert_eq!(b.loads.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_local_key_is_loaded_locally() {
    let (a, b) = spawn_cluster().await;
    let key = key_owned_locally(&a, "key");

    let value = a.group.get(&key).await.unwrap();

    assert_eq!(value.to_string(), format!("{}@a", key));
    assert_eq!(a.loads.load(Ordering::SeqCst), 1);
    assert_eq!(b.loads.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_remote_failure_is_not_retried_locally() {
    let (a, b) = spawn_cluster().await;
    let key = key_owned_remotely(&a, "missing");

    let result = a.group.get(&key).await;

    match result {
        Err(CacheError::Remote { peer, message }) => {
            assert_eq!(peer, b.pool.self_addr());
            assert!(message.contains("not exist"), "message: {}", message);
        }
        other => panic!("expected remote error, got {:?}", other),
    }
    assert_eq!(a.loads.load(Ordering::SeqCst), 0);
    assert_eq!(a.group.stats().peer_errors, 1);
    assert!(a.group.cache().get(&key).is_none());
}
