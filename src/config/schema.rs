//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! Values are populated from the environment by [`crate::config::loader`].

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use url::Url;

/// Length of every pooled copy buffer (32 KiB).
pub const BUFFER_SIZE: usize = 32 * 1024;

/// Root configuration for the gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Inbound listener (port, TLS material).
    pub listener: ListenerConfig,

    /// The single upstream target.
    pub target: TargetConfig,

    /// Client identity presented to the auth endpoint.
    pub credentials: ClientCredentials,

    /// Initial authentication and refresh policy.
    pub auth: AuthPolicyConfig,

    /// Streaming buffer pool.
    pub buffers: BufferPoolConfig,

    /// Upstream timeouts.
    pub timeouts: TimeoutConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Interface to bind.
    pub bind_host: String,

    /// Port to accept HTTPS connections on.
    pub port: u16,

    /// Certificate and key served to clients.
    pub tls: TlsConfig,
}

impl ListenerConfig {
    /// `host:port` string suitable for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            cert_path: "cert.pem".to_string(),
            key_path: "key.pem".to_string(),
        }
    }
}

/// The upstream target every request is forwarded to.
#[derive(Debug, Clone)]
pub struct TargetConfig {
    /// `https` in production; `http` is accepted for local targets.
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl TargetConfig {
    /// Base URL of the target, e.g. `https://backend:8443/`.
    pub fn base_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&format!("{}://{}:{}", self.scheme, self.host, self.port))
    }

    /// URL of the token endpoint.
    pub fn auth_url(&self) -> Result<Url, url::ParseError> {
        self.base_url()?.join(AUTH_PATH)
    }
}

/// Path of the backend token endpoint.
pub const AUTH_PATH: &str = "/api/v1/auth";

/// Client identity. The secret never appears in `Debug` output.
#[derive(Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Initial authentication and background refresh policy.
#[derive(Debug, Clone)]
pub struct AuthPolicyConfig {
    /// Minimum time between two refresh attempts, in milliseconds.
    pub reauth_cooldown_ms: u64,

    /// Number of initial authentication attempts before giving up.
    pub max_retries: u32,

    /// Sleep between initial authentication attempts, in milliseconds.
    pub retry_interval_ms: u64,
}

impl AuthPolicyConfig {
    pub fn reauth_cooldown(&self) -> Duration {
        Duration::from_millis(self.reauth_cooldown_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

/// Buffer pool sizing.
#[derive(Debug, Clone)]
pub struct BufferPoolConfig {
    /// Number of [`BUFFER_SIZE`] buffers allocated at startup.
    pub pool_size: usize,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self { pool_size: 2048 }
    }
}

/// Upstream timeouts.
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in milliseconds.
    pub connect_ms: u64,

    /// Time allowed for the upstream exchange up to response headers, in
    /// milliseconds. This covers sending the request body; streaming the
    /// response body back is not bounded.
    pub response_ms: u64,
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    pub fn response(&self) -> Duration {
        Duration::from_millis(self.response_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: 5_000,
            response_ms: 30_000,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Default)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,

    /// Prometheus listener address; metrics export is off when unset.
    pub metrics_address: Option<SocketAddr>,
}
