//! Shared utilities for integration testing.
//!
//! `start_target` runs a mock target on an ephemeral port: a token endpoint
//! plus a handful of routes that answer 403 unless `X-Proxy-Token` carries
//! the most recently issued token. `serve_gateway` runs the gateway over
//! plain HTTP in front of it.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use auth_gateway::config::{
    AuthPolicyConfig, BufferPoolConfig, ClientCredentials, GatewayConfig, ListenerConfig,
    ObservabilityConfig, TargetConfig, TimeoutConfig, TlsConfig,
};
use auth_gateway::http::AppState;
use auth_gateway::lifecycle::startup;
use auth_gateway::{HttpServer, Shutdown};
use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

pub const CLIENT_ID: &str = "proxy-admin";
pub const CLIENT_SECRET: &str = "s3cret";

pub const MARKER_PAGE: &str = "<html><head></head><body><h1>Hello</h1></body></html>";
pub const LARGE_CHUNK: usize = 16 * 1024;
pub const LARGE_CHUNKS: usize = 64;

/// Observable state of the mock target.
#[derive(Default)]
pub struct TargetState {
    pub token: Mutex<String>,
    pub auth_calls: AtomicU32,
    pub auth_failures_remaining: AtomicU32,
    pub auth_delay_ms: AtomicU64,
    pub last_headers: Mutex<Option<HeaderMap>>,
    pub large_chunks_sent: AtomicUsize,
    pub large_stream_closed: AtomicBool,
}

#[derive(Clone)]
pub struct MockTarget {
    pub addr: SocketAddr,
    pub state: Arc<TargetState>,
}

impl MockTarget {
    pub fn auth_calls(&self) -> u32 {
        self.state.auth_calls.load(Ordering::SeqCst)
    }

    /// Fail the next `n` auth calls with a 500.
    pub fn fail_auth(&self, n: u32) {
        self.state.auth_failures_remaining.store(n, Ordering::SeqCst);
    }

    pub fn delay_auth(&self, delay: Duration) {
        self.state
            .auth_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Invalidate whatever token the gateway holds.
    pub fn rotate_token(&self) {
        *self.state.token.lock().unwrap() = "rotated-elsewhere".to_string();
    }

    pub fn current_token(&self) -> String {
        self.state.token.lock().unwrap().clone()
    }

    pub fn last_headers(&self) -> HeaderMap {
        self.state
            .last_headers
            .lock()
            .unwrap()
            .clone()
            .expect("target saw no request")
    }
}

pub async fn start_target() -> MockTarget {
    let state = Arc::new(TargetState::default());

    let protected = Router::new()
        .route("/echo/headers", get(echo_headers))
        .route("/echo/body", post(echo_body))
        .route("/wheredidicomefrom", get(marker_page))
        .route("/static/data.bin", get(binary))
        .route("/large", get(large))
        .route("/slow", get(slow))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token));

    let app = Router::new()
        .route("/api/v1/auth", post(auth))
        .merge(protected)
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockTarget { addr, state }
}

async fn auth(State(state): State<Arc<TargetState>>, Json(body): Json<Value>) -> Response {
    let n = state.auth_calls.fetch_add(1, Ordering::SeqCst) + 1;

    let delay = state.auth_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let failing = state
        .auth_failures_remaining
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if failing {
        return (StatusCode::INTERNAL_SERVER_ERROR, "auth backend not ready").into_response();
    }

    if body["client_id"] != CLIENT_ID || body["client_secret"] != CLIENT_SECRET {
        return (StatusCode::UNAUTHORIZED, "invalid credentials").into_response();
    }

    let token = format!("token-{n}");
    *state.token.lock().unwrap() = token.clone();
    Json(json!({ "master_token": token })).into_response()
}

async fn require_token(
    State(state): State<Arc<TargetState>>,
    request: Request,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get("x-proxy-token")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let valid = state.token.lock().unwrap().clone();

    if presented.as_deref() != Some(valid.as_str()) {
        return (StatusCode::FORBIDDEN, "stale or missing token").into_response();
    }
    next.run(request).await
}

async fn echo_headers(State(state): State<Arc<TargetState>>, headers: HeaderMap) -> Response {
    *state.last_headers.lock().unwrap() = Some(headers);
    (
        [("x-upstream", "mock"), ("keep-alive", "timeout=5")],
        "headers recorded",
    )
        .into_response()
}

async fn echo_body(body: Bytes) -> Bytes {
    body
}

async fn marker_page(State(state): State<Arc<TargetState>>, headers: HeaderMap) -> Response {
    *state.last_headers.lock().unwrap() = Some(headers);
    ([(header::CONTENT_TYPE, "text/html")], MARKER_PAGE).into_response()
}

pub fn binary_payload() -> Vec<u8> {
    (0..=255u8).cycle().take(100 * 1024).collect()
}

async fn binary() -> Response {
    (
        [(header::CONTENT_TYPE, "application/octet-stream")],
        binary_payload(),
    )
        .into_response()
}

/// Marks the large stream closed when the response body is dropped.
struct StreamGuard(Arc<TargetState>);

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.0.large_stream_closed.store(true, Ordering::SeqCst);
    }
}

async fn large(State(state): State<Arc<TargetState>>) -> Response {
    let guard = StreamGuard(state);
    let stream = futures_util::stream::unfold(guard, |guard| async move {
        let sent = guard.0.large_chunks_sent.load(Ordering::SeqCst);
        if sent >= LARGE_CHUNKS {
            return None;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
        guard.0.large_chunks_sent.fetch_add(1, Ordering::SeqCst);
        Some((
            Ok::<_, std::io::Error>(Bytes::from(vec![b'x'; LARGE_CHUNK])),
            guard,
        ))
    });
    Body::from_stream(stream).into_response()
}

async fn slow() -> &'static str {
    tokio::time::sleep(Duration::from_secs(2)).await;
    "finally"
}

/// Gateway configuration pointing at `target` over plain HTTP.
pub fn gateway_config(target: SocketAddr) -> GatewayConfig {
    GatewayConfig {
        listener: ListenerConfig {
            bind_host: "127.0.0.1".into(),
            port: 0,
            tls: TlsConfig::default(),
        },
        target: TargetConfig {
            scheme: "http".into(),
            host: target.ip().to_string(),
            port: target.port(),
        },
        credentials: ClientCredentials {
            client_id: CLIENT_ID.into(),
            client_secret: CLIENT_SECRET.into(),
        },
        auth: AuthPolicyConfig {
            reauth_cooldown_ms: 60_000,
            max_retries: 3,
            retry_interval_ms: 10,
        },
        buffers: BufferPoolConfig { pool_size: 8 },
        timeouts: TimeoutConfig {
            connect_ms: 1_000,
            response_ms: 5_000,
        },
        observability: ObservabilityConfig::default(),
    }
}

pub struct Gateway {
    pub addr: SocketAddr,
    pub state: AppState,
    pub shutdown: Shutdown,
}

impl Gateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Authenticate against `target` and serve the gateway on an ephemeral port.
pub async fn start_gateway(target: &MockTarget) -> Gateway {
    let state = startup::prepare(&gateway_config(target.addr))
        .await
        .expect("gateway startup");
    serve_gateway(state)
}

pub fn serve_gateway(state: AppState) -> Gateway {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(state.clone());
    tokio::spawn(server.run(listener, shutdown.listener()));

    Gateway {
        addr,
        state,
        shutdown,
    }
}

/// Client for talking to the gateway.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Poll `check` every 10ms until it holds or `within` elapses.
pub async fn eventually<F>(within: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + within;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
