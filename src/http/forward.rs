//! The forwarding engine.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → acquire pooled buffer (waits when the pool is exhausted)
//!     → request.rs (URL, header copy, X-Proxy-Token, identity encoding)
//!     → upstream call (one per inbound request, response-header timeout)
//!     → 403? trigger background refresh, return the 403 as-is
//!     → registered path + 200: buffer fully, intercept.rs rewrite
//!       otherwise: response.rs streaming copy
//! ```

use std::net::SocketAddr;
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::{ConnectInfo, State};
use axum::http::{request, HeaderMap, Request, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::http::error::{inbound_body_error, is_client_disconnect, ForwardError};
use crate::http::request::{build_outbound, copy_headers};
use crate::http::response::{read_fully, streaming_body, upstream_reader};
use crate::http::server::AppState;
use crate::observability::metrics;

/// Handler bound to every path.
pub async fn forward_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let (parts, body) = request.into_parts();
    let method = parts.method.clone();
    let request_id = parts
        .headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    tracing::info!(
        request_id = %request_id,
        peer = %peer,
        method = %method,
        uri = %parts.uri,
        "Received request"
    );

    let response = match forward(&state, parts, body, &request_id).await {
        Ok(response) => response,
        Err(err) => error_response(err, &request_id),
    };

    metrics::record_request(method.as_str(), response.status().as_u16(), start);
    response
}

async fn forward(
    state: &AppState,
    parts: request::Parts,
    body: Body,
    request_id: &str,
) -> Result<Response, ForwardError> {
    let path = parts.uri.path().to_owned();
    let mut buffer = state.buffers.acquire().await;
    let intercept = state.interceptor.has_handler(&path);
    let credential = state.credentials.current_token();

    let outbound = build_outbound(
        &state.client,
        &state.target,
        &parts,
        body,
        credential.as_deref(),
        intercept,
    )
    .map_err(ForwardError::Build)?;

    tracing::info!(
        request_id,
        method = %outbound.method(),
        url = %outbound.url(),
        "Forwarding request to target"
    );

    let upstream =
        match tokio::time::timeout(state.response_timeout, state.client.execute(outbound)).await {
            Ok(result) => result.map_err(ForwardError::Upstream)?,
            Err(_) => return Err(ForwardError::Timeout(state.response_timeout)),
        };

    let status = upstream.status();
    tracing::info!(request_id, status = status.as_u16(), "Received response from target");

    if status == StatusCode::FORBIDDEN {
        tracing::warn!(
            request_id,
            "Received 403 Forbidden from target. Triggering re-authentication."
        );
        drop(state.credentials.trigger_refresh());
    }

    let mut headers = HeaderMap::with_capacity(upstream.headers().len());
    copy_headers(upstream.headers(), &mut headers);

    let body = if intercept && status == StatusCode::OK {
        let mut reader = upstream_reader(upstream);
        let raw = read_fully(&mut reader, &mut buffer[..])
            .await
            .map_err(ForwardError::Body)?;
        Body::from(state.interceptor.transform(&path, Bytes::from(raw), &mut headers))
    } else {
        streaming_body(upstream_reader(upstream), buffer, path)
    };

    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}

fn error_response(err: ForwardError, request_id: &str) -> Response {
    if let ForwardError::Upstream(source) = &err {
        if let Some(body_err) = inbound_body_error(source) {
            if is_client_disconnect(body_err) {
                tracing::info!(
                    request_id,
                    error = %body_err,
                    "Client connection closed prematurely during proxying"
                );
                metrics::record_client_disconnect();
                // Nobody is left to read a body.
                return StatusCode::BAD_GATEWAY.into_response();
            }
            tracing::warn!(request_id, error = %body_err, "Failed to read request body");
            return StatusCode::BAD_REQUEST.into_response();
        }
    }

    tracing::error!(request_id, error = %err, status = err.status().as_u16(), "Proxying failed");
    err.into_response()
}
