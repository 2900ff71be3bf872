//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! process environment
//!     → loader.rs (lookup, presence & parse checks)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Required variables have no defaults; a missing one aborts startup
//! - Optional tuning knobs fall back to documented defaults
//! - Validation separates parsing from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_from_env, load_with, ConfigError};
pub use schema::{
    AuthPolicyConfig, BufferPoolConfig, ClientCredentials, GatewayConfig, ListenerConfig,
    LogFormat, ObservabilityConfig, TargetConfig, TimeoutConfig, TlsConfig, BUFFER_SIZE,
};
