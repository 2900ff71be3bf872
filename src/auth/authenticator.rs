//! Token acquisition from the backend auth endpoint.

use std::time::Duration;

use futures_util::future::BoxFuture;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::auth::store::Credential;
use crate::auth::AuthError;
use crate::config::{ClientCredentials, TargetConfig};

/// Source of fresh credentials.
///
/// Boxed futures keep the trait object-safe so the lifecycle manager can hold
/// an `Arc<dyn Authenticator>`.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self) -> BoxFuture<'_, Result<Credential, AuthError>>;
}

#[derive(Serialize)]
struct AuthRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
}

#[derive(Deserialize)]
struct AuthResponse {
    master_token: String,
}

/// Authenticator that POSTs the client identity to `/api/v1/auth`.
///
/// The client it is built with is expected to skip certificate validation
/// (see [`crate::net::client`]); the backend is trusted by network placement.
/// Each call is bounded by `timeout`, body included.
pub struct HttpAuthenticator {
    client: reqwest::Client,
    url: Url,
    credentials: ClientCredentials,
    timeout: Duration,
}

impl HttpAuthenticator {
    pub fn new(
        client: reqwest::Client,
        target: &TargetConfig,
        credentials: ClientCredentials,
        timeout: Duration,
    ) -> Result<Self, url::ParseError> {
        Ok(Self {
            client,
            url: target.auth_url()?,
            credentials,
            timeout,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn request_token(&self) -> Result<Credential, AuthError> {
        tracing::info!(url = %self.url, "Posting to auth endpoint");

        let response = self
            .client
            .post(self.url.clone())
            .timeout(self.timeout)
            .json(&AuthRequest {
                client_id: &self.credentials.client_id,
                client_secret: &self.credentials.client_secret,
            })
            .send()
            .await
            .map_err(|source| AuthError::Transport {
                url: self.url.to_string(),
                source,
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            tracing::warn!(status = %status, "Authentication failed with non-OK status");
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected {
                url: self.url.to_string(),
                status,
                body,
            });
        }

        let payload: AuthResponse = response.json().await.map_err(AuthError::Decode)?;
        Credential::new(payload.master_token)
    }
}

impl Authenticator for HttpAuthenticator {
    fn authenticate(&self) -> BoxFuture<'_, Result<Credential, AuthError>> {
        Box::pin(self.request_token())
    }
}
