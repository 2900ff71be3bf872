//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order
//! - Acquire the first credential before anything listens
//! - Load TLS material, bind the listener and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal and maps to a non-zero exit code
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only when a token is held)
//! - A shutdown signal during initial authentication abandons startup; the
//!   port is never bound

use std::path::Path;
use std::sync::Arc;

use metrics_exporter_prometheus::BuildError;

use crate::auth::{CredentialManager, HttpAuthenticator, InitialAuthError};
use crate::buffer::BufferPool;
use crate::config::{ConfigError, GatewayConfig};
use crate::http::{AppState, HttpServer, ResponseInterceptor};
use crate::lifecycle::Shutdown;
use crate::net::{self, ListenerError};
use crate::observability;

/// Every way the gateway can fail to come up.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to install metrics exporter: {0}")]
    Metrics(#[from] BuildError),

    #[error("failed to build upstream client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("invalid target URL: {0}")]
    Target(#[from] url::ParseError),

    #[error("initial authentication failed: {0}")]
    Authentication(#[from] InitialAuthError),

    #[error("failed to load TLS material: {0}")]
    Tls(#[source] std::io::Error),

    #[error("listener error: {0}")]
    Bind(#[from] ListenerError),

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Log the effective configuration. The client secret is never printed.
fn log_config(config: &GatewayConfig) {
    tracing::info!(
        listen_port = config.listener.port,
        tls_cert = %config.listener.tls.cert_path,
        tls_key = %config.listener.tls.key_path,
        target_scheme = %config.target.scheme,
        target_host = %config.target.host,
        target_port = config.target.port,
        client_id = %config.credentials.client_id,
        client_secret = "[REDACTED]",
        reauth_cooldown_ms = config.auth.reauth_cooldown_ms,
        max_retries = config.auth.max_retries,
        retry_interval_ms = config.auth.retry_interval_ms,
        buffer_pool_size = config.buffers.pool_size,
        connect_timeout_ms = config.timeouts.connect_ms,
        response_timeout_ms = config.timeouts.response_ms,
        "Configuration loaded"
    );
}

/// Build every shared component and acquire the initial credential.
///
/// Returns the handler state ready to be served; nothing is bound yet.
pub async fn prepare(config: &GatewayConfig) -> Result<AppState, StartupError> {
    log_config(config);

    let buffers = Arc::new(BufferPool::new(config.buffers.pool_size));
    let client = net::build_upstream_client(&config.timeouts).map_err(StartupError::Client)?;
    let target = Arc::new(config.target.base_url()?);

    let authenticator = HttpAuthenticator::new(
        client.clone(),
        &config.target,
        config.credentials.clone(),
        config.timeouts.response(),
    )?;
    let credentials = Arc::new(CredentialManager::new(
        Arc::new(authenticator),
        config.auth.clone(),
    ));
    credentials.perform_initial_authentication().await?;

    Ok(AppState {
        client,
        target,
        credentials,
        buffers,
        interceptor: Arc::new(ResponseInterceptor::default()),
        response_timeout: config.timeouts.response(),
    })
}

/// Start the gateway and serve until `shutdown` fires.
pub async fn run(config: GatewayConfig, shutdown: &Shutdown) -> Result<(), StartupError> {
    let mut shutdown_rx = shutdown.listener();

    if let Some(addr) = config.observability.metrics_address {
        observability::init_metrics(addr)?;
    }

    let state = tokio::select! {
        state = prepare(&config) => state?,
        _ = shutdown_rx.recv() => {
            tracing::info!("Shutdown requested during startup, exiting before bind");
            return Ok(());
        }
    };

    let tls = net::load_tls_config(
        Path::new(&config.listener.tls.cert_path),
        Path::new(&config.listener.tls.key_path),
    )
    .await
    .map_err(StartupError::Tls)?;

    let listener = net::bind(&config.listener)?;

    HttpServer::new(state)
        .with_tls(tls)
        .run(listener, shutdown_rx)
        .await
        .map_err(StartupError::Serve)
}
