//! Authenticating HTTPS gateway.
//!
//! Terminates TLS from clients and forwards every request to a single
//! target, attaching a bearer token the gateway obtained itself.
//!
//! # Architecture Overview
//!
//! ```text
//!                          ┌──────────────────────────────────────────────┐
//!                          │                 AUTH GATEWAY                 │
//!                          │                                              │
//!     Client Request       │  ┌─────────┐    ┌─────────┐    ┌──────────┐  │
//!     ─────────────────────┼─▶│   net   │───▶│  http   │───▶│ upstream │──┼──▶ Target
//!                          │  │listener │    │ forward │    │  client  │  │    Server
//!                          │  └─────────┘    └────┬────┘    └──────────┘  │
//!                          │                      │  X-Proxy-Token        │
//!     Client Response      │  ┌─────────┐    ┌────┴────┐    ┌──────────┐  │
//!     ◀────────────────────┼──│ buffer  │◀───│intercept│    │   auth   │──┼──▶ /api/v1/auth
//!                          │  │  pool   │    │or stream│    │ manager  │  │
//!                          │  └─────────┘    └─────────┘    └──────────┘  │
//!                          └──────────────────────────────────────────────┘
//! ```

use std::process::ExitCode;

use auth_gateway::config::{self, ObservabilityConfig};
use auth_gateway::lifecycle::{signals, startup, Shutdown, StartupError};
use auth_gateway::observability;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match config::load_from_env() {
        Ok(config) => config,
        Err(e) => {
            observability::init_logging(&ObservabilityConfig::default());
            tracing::error!(error = %StartupError::from(e), "Gateway failed to start");
            return ExitCode::FAILURE;
        }
    };

    observability::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "auth-gateway starting");

    let shutdown = Shutdown::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            signals::wait_for_signal().await;
            shutdown.trigger();
        }
    });

    match startup::run(config, &shutdown).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Gateway failed to start");
            ExitCode::FAILURE
        }
    }
}
