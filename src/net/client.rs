//! Upstream HTTP client.
//!
//! One `reqwest::Client` is shared by the authenticator and the forwarding
//! engine so both reuse the same connection pool.
//!
//! # Design Decisions
//! - Certificate validation is disabled: the target is an internal service
//!   reached over a trusted network, often with a self-signed certificate
//! - Redirects are returned to the caller untouched
//! - Environment proxies are ignored; the target is always dialled directly

use reqwest::redirect::Policy;

use crate::config::TimeoutConfig;

/// Build the client used for every upstream call.
pub fn build_upstream_client(timeouts: &TimeoutConfig) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .redirect(Policy::none())
        .no_proxy()
        .connect_timeout(timeouts.connect())
        .build()
}
