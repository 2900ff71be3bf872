//! Credential subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     manager.rs (initial authentication, retry with fixed interval)
//!     → authenticator.rs (POST /api/v1/auth)
//!     → store.rs (token stored, state = Authenticated)
//!
//! Forwarding observes 403:
//!     manager.rs trigger_refresh (spawned, never awaited by the request)
//!     → single-flight + cooldown gate
//!     → authenticator.rs
//!     → store.rs (atomic replace; old token kept on failure)
//! ```

pub mod authenticator;
pub mod manager;
pub mod store;

pub use authenticator::{Authenticator, HttpAuthenticator};
pub use manager::{AuthState, CredentialManager, InitialAuthError, RefreshOutcome};
pub use store::{Credential, CredentialStore};

use reqwest::StatusCode;

/// Errors produced while obtaining a token.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("POST {url} answered {status}: {body}")]
    Rejected {
        url: String,
        status: StatusCode,
        body: String,
    },

    #[error("POST {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to decode auth response: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("auth endpoint returned an empty token")]
    EmptyToken,

    #[error("auth endpoint returned a token that is not a valid header value")]
    InvalidToken,
}
