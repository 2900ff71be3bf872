//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound:
//!     listener.rs (bind after authentication)
//!     → tls.rs (rustls handshake via axum-server)
//!     → Hand off to HTTP layer
//!
//! Outbound:
//!     client.rs (shared reqwest client for auth and forwarding)
//! ```

pub mod client;
pub mod listener;
pub mod tls;

pub use client::build_upstream_client;
pub use listener::{bind, ListenerError};
pub use tls::load_tls_config;
