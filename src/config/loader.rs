//! Configuration loading from the environment.

use std::str::FromStr;

use crate::config::schema::{
    AuthPolicyConfig, BufferPoolConfig, ClientCredentials, GatewayConfig, ListenerConfig,
    LogFormat, ObservabilityConfig, TargetConfig, TimeoutConfig, TlsConfig,
};
use crate::config::validation::{validate_config, ValidationError};

pub const ENV_LISTEN_PORT: &str = "RUST_PROXY_SERVER_PORT";
pub const ENV_TARGET_HOST: &str = "TARGET_SERVER_HOST";
pub const ENV_TARGET_PORT: &str = "TARGET_SERVER_PORT";
pub const ENV_TARGET_SCHEME: &str = "TARGET_SERVER_SCHEME";
pub const ENV_CLIENT_ID: &str = "RUST_PROXY_ADMIN_ID";
pub const ENV_CLIENT_SECRET: &str = "RUST_PROXY_ADMIN_SECRET";
pub const ENV_REAUTH_COOLDOWN_MS: &str = "RUST_PROXY_REAUTH_COOLDOWN_MS";
pub const ENV_RETRY_ATTEMPTS: &str = "RUST_PROXY_RETRY_ATTEMPTS";
pub const ENV_RETRY_INTERVAL_MS: &str = "RUST_PROXY_RETRY_INTERVAL_MS";
pub const ENV_TLS_CERT: &str = "RUST_PROXY_TLS_CERT";
pub const ENV_TLS_KEY: &str = "RUST_PROXY_TLS_KEY";
pub const ENV_BUFFER_POOL_SIZE: &str = "RUST_PROXY_BUFFER_POOL_SIZE";
pub const ENV_CONNECT_TIMEOUT_MS: &str = "RUST_PROXY_CONNECT_TIMEOUT_MS";
pub const ENV_RESPONSE_TIMEOUT_MS: &str = "RUST_PROXY_RESPONSE_TIMEOUT_MS";
pub const ENV_LOG_FORMAT: &str = "RUST_PROXY_LOG_FORMAT";
pub const ENV_METRICS_ADDRESS: &str = "RUST_PROXY_METRICS_ADDRESS";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("required environment variable {0:?} is not set or is empty")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from the process environment.
pub fn load_from_env() -> Result<GatewayConfig, ConfigError> {
    load_with(|key| std::env::var(key).ok())
}

/// Load and validate configuration from an arbitrary variable lookup.
///
/// Blank values are treated as unset.
pub fn load_with<F>(lookup: F) -> Result<GatewayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let env = Env { lookup };

    let config = GatewayConfig {
        listener: ListenerConfig {
            bind_host: "0.0.0.0".to_string(),
            port: env.required_parsed(ENV_LISTEN_PORT)?,
            tls: TlsConfig {
                cert_path: env
                    .optional(ENV_TLS_CERT)
                    .unwrap_or_else(|| TlsConfig::default().cert_path),
                key_path: env
                    .optional(ENV_TLS_KEY)
                    .unwrap_or_else(|| TlsConfig::default().key_path),
            },
        },
        target: TargetConfig {
            scheme: env
                .optional(ENV_TARGET_SCHEME)
                .map(|s| s.to_ascii_lowercase())
                .unwrap_or_else(|| "https".to_string()),
            host: env.required(ENV_TARGET_HOST)?,
            port: env.required_parsed(ENV_TARGET_PORT)?,
        },
        credentials: ClientCredentials {
            client_id: env.required(ENV_CLIENT_ID)?,
            client_secret: env.required(ENV_CLIENT_SECRET)?,
        },
        auth: AuthPolicyConfig {
            reauth_cooldown_ms: env.required_parsed(ENV_REAUTH_COOLDOWN_MS)?,
            max_retries: env.required_parsed(ENV_RETRY_ATTEMPTS)?,
            retry_interval_ms: env.required_parsed(ENV_RETRY_INTERVAL_MS)?,
        },
        buffers: BufferPoolConfig {
            pool_size: env
                .optional_parsed(ENV_BUFFER_POOL_SIZE)?
                .unwrap_or(BufferPoolConfig::default().pool_size),
        },
        timeouts: TimeoutConfig {
            connect_ms: env
                .optional_parsed(ENV_CONNECT_TIMEOUT_MS)?
                .unwrap_or(TimeoutConfig::default().connect_ms),
            response_ms: env
                .optional_parsed(ENV_RESPONSE_TIMEOUT_MS)?
                .unwrap_or(TimeoutConfig::default().response_ms),
        },
        observability: ObservabilityConfig {
            log_format: match env.optional(ENV_LOG_FORMAT).as_deref() {
                None => LogFormat::Pretty,
                Some(v) if v.eq_ignore_ascii_case("pretty") => LogFormat::Pretty,
                Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
                Some(other) => {
                    return Err(ConfigError::Invalid {
                        var: ENV_LOG_FORMAT,
                        value: other.to_string(),
                        reason: "expected \"pretty\" or \"json\"".to_string(),
                    })
                }
            },
            metrics_address: env.optional_parsed(ENV_METRICS_ADDRESS)?,
        },
    };

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, var: &'static str) -> Option<String> {
        (self.lookup)(var)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, var: &'static str) -> Result<String, ConfigError> {
        self.optional(var).ok_or(ConfigError::Missing(var))
    }

    fn required_parsed<T>(&self, var: &'static str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.required(var)?;
        parse(var, raw)
    }

    fn optional_parsed<T>(&self, var: &'static str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(var).map(|raw| parse(var, raw)).transpose()
    }
}

fn parse<T>(var: &'static str, raw: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|e| ConfigError::Invalid {
        var,
        reason: e.to_string(),
        value: raw,
    })
}
