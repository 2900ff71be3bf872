//! Forwarding errors and their client-facing status codes.

use std::error::Error;
use std::io;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// A forwarded request that produced no upstream response.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    /// The outbound request could not be assembled.
    #[error("failed to build upstream request: {0}")]
    Build(#[source] reqwest::Error),

    /// The upstream could not be reached or dropped the exchange.
    #[error("upstream request failed: {0}")]
    Upstream(#[source] reqwest::Error),

    /// No response headers within the configured window.
    #[error("upstream did not respond within {0:?}")]
    Timeout(Duration),

    /// Reading a response body that had to be buffered failed.
    #[error("failed to read upstream body: {0}")]
    Body(#[source] io::Error),
}

impl ForwardError {
    pub fn status(&self) -> StatusCode {
        match self {
            ForwardError::Build(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ForwardError::Upstream(e) if e.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
            ForwardError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ForwardError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ForwardError::Body(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ForwardError {
    fn into_response(self) -> Response {
        let status = self.status();
        let reason = status.canonical_reason().unwrap_or("Upstream error");
        (status, reason).into_response()
    }
}

/// Find the inbound body failure inside an upstream error chain.
///
/// The inbound body is streamed into the outbound request, so a client that
/// goes away mid-upload surfaces as an `axum::Error` beneath the
/// `reqwest::Error`.
pub fn inbound_body_error<'a>(error: &'a (dyn Error + 'static)) -> Option<&'a axum::Error> {
    let mut current = Some(error);
    while let Some(err) = current {
        if let Some(body_err) = err.downcast_ref::<axum::Error>() {
            return Some(body_err);
        }
        current = err.source();
    }
    None
}

/// Whether an error chain describes the peer closing the connection.
pub fn is_client_disconnect(error: &(dyn Error + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(err) = current {
        if let Some(io_err) = err.downcast_ref::<io::Error>() {
            if matches!(
                io_err.kind(),
                io::ErrorKind::BrokenPipe
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::UnexpectedEof
            ) {
                return true;
            }
        }
        if let Some(hyper_err) = err.downcast_ref::<hyper::Error>() {
            if hyper_err.is_incomplete_message()
                || hyper_err.is_canceled()
                || hyper_err.is_body_write_aborted()
            {
                return true;
            }
        }
        current = err.source();
    }
    false
}
