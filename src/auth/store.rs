//! Credential storage.
//!
//! # Responsibilities
//! - Hold the current bearer token for the process lifetime
//! - Serve many concurrent readers without blocking
//! - Replace the token atomically on refresh
//!
//! # Design Decisions
//! - `ArcSwapOption` gives lock-free reads; a writer swaps in a new `Arc`
//!   and readers holding the old one finish with it undisturbed
//! - The token is validated as a header value once, when it is stored,
//!   so forwarding never fails on a malformed credential

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use axum::http::HeaderValue;

use crate::auth::AuthError;

/// An opaque bearer token, ready to be attached to outbound requests.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
    header: HeaderValue,
}

impl Credential {
    /// Wrap a token returned by the auth endpoint.
    pub fn new(token: impl Into<String>) -> Result<Self, AuthError> {
        let token = token.into();
        if token.is_empty() {
            return Err(AuthError::EmptyToken);
        }
        let mut header = HeaderValue::from_str(&token).map_err(|_| AuthError::InvalidToken)?;
        header.set_sensitive(true);
        Ok(Self { token, header })
    }

    /// The raw token.
    pub fn expose(&self) -> &str {
        &self.token
    }

    /// The token as a (sensitive) header value.
    pub fn header_value(&self) -> HeaderValue {
        self.header.clone()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

/// Holds the current credential; empty until the first successful
/// authentication.
#[derive(Debug, Default)]
pub struct CredentialStore {
    current: ArcSwapOption<Credential>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self {
            current: ArcSwapOption::empty(),
        }
    }

    /// Snapshot of the current credential.
    pub fn read(&self) -> Option<Arc<Credential>> {
        self.current.load_full()
    }

    /// Replace the current credential.
    pub fn write(&self, credential: Credential) {
        self.current.store(Some(Arc::new(credential)));
    }

    pub fn is_empty(&self) -> bool {
        self.current.load().is_none()
    }
}
