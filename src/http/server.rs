//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with the forwarding handler on every path
//! - Wire up middleware (request ID, tracing)
//! - Serve over TLS (or plain TCP for local testing) on a bound listener
//! - Drain in-flight requests on shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{routing::any, Router};
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use url::Url;

use crate::auth::CredentialManager;
use crate::buffer::BufferPool;
use crate::http::forward::forward_handler;
use crate::http::intercept::ResponseInterceptor;
use crate::lifecycle::shutdown::ShutdownListener;

/// Time allowed for in-flight requests to finish after shutdown is signalled.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub client: reqwest::Client,
    pub target: Arc<Url>,
    pub credentials: Arc<CredentialManager>,
    pub buffers: Arc<BufferPool>,
    pub interceptor: Arc<ResponseInterceptor>,
    pub response_timeout: Duration,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    tls: Option<RustlsConfig>,
}

impl HttpServer {
    /// Create a plain-TCP server around `state`.
    pub fn new(state: AppState) -> Self {
        Self {
            router: Self::build_router(state),
            tls: None,
        }
    }

    /// Terminate TLS with `config`.
    pub fn with_tls(mut self, config: RustlsConfig) -> Self {
        self.tls = Some(config);
        self
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/", any(forward_handler))
            .route("/{*path}", any(forward_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// Serve until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: std::net::TcpListener,
        mut shutdown: ShutdownListener,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        let handle = Handle::new();

        tokio::spawn({
            let handle = handle.clone();
            async move {
                shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
                handle.graceful_shutdown(Some(DRAIN_TIMEOUT));
            }
        });

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        match self.tls {
            Some(tls) => {
                tracing::info!(address = %addr, "HTTPS server starting");
                axum_server::from_tcp_rustls(listener, tls)
                    .handle(handle)
                    .serve(app)
                    .await?;
            }
            None => {
                tracing::warn!(address = %addr, "HTTP server starting without TLS");
                axum_server::from_tcp(listener)
                    .handle(handle)
                    .serve(app)
                    .await?;
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
