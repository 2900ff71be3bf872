//! Outbound request construction.
//!
//! # Responsibilities
//! - Map the inbound URI onto the target base URL
//! - Copy inbound headers, minus the restricted hop-level set
//! - Attach the current credential as `X-Proxy-Token`
//! - Ask for identity encoding when the response will be rewritten
//!
//! # Design Decisions
//! - The inbound body is streamed to the upstream, never buffered
//! - Bodiless requests are forwarded without a body so the upstream sees no
//!   spurious chunked encoding

use axum::body::{Body, HttpBody};
use axum::http::{header, request, HeaderMap, HeaderName, HeaderValue, Uri};
use url::Url;

use crate::auth::Credential;

/// Header carrying the gateway's credential to the target.
pub const PROXY_TOKEN_HEADER: HeaderName = HeaderName::from_static("x-proxy-token");

/// Headers that are never copied between inbound and outbound messages.
pub const RESTRICTED_HEADERS: [&str; 5] = [
    "connection",
    "host",
    "keep-alive",
    "transfer-encoding",
    "upgrade",
];

pub fn is_restricted(name: &HeaderName) -> bool {
    RESTRICTED_HEADERS.contains(&name.as_str())
}

/// Append every non-restricted header of `from` onto `to`, keeping repeated
/// values.
pub fn copy_headers(from: &HeaderMap, to: &mut HeaderMap) {
    for (name, value) in from {
        if !is_restricted(name) {
            to.append(name.clone(), value.clone());
        }
    }
}

/// Target URL for an inbound request: base scheme/host/port plus the
/// inbound path and query.
pub fn upstream_url(base: &Url, uri: &Uri) -> Url {
    let mut url = base.clone();
    url.set_path(uri.path());
    url.set_query(uri.query());
    url
}

/// Build the single upstream request for an inbound request.
pub fn build_outbound(
    client: &reqwest::Client,
    target: &Url,
    parts: &request::Parts,
    body: Body,
    credential: Option<&Credential>,
    suppress_encoding: bool,
) -> reqwest::Result<reqwest::Request> {
    let mut headers = HeaderMap::with_capacity(parts.headers.len() + 2);
    copy_headers(&parts.headers, &mut headers);

    if suppress_encoding {
        headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("identity"));
    }
    if let Some(credential) = credential {
        headers.insert(PROXY_TOKEN_HEADER, credential.header_value());
    }

    let mut builder = client
        .request(parts.method.clone(), upstream_url(target, &parts.uri))
        .headers(headers);

    if !body.is_end_stream() && body.size_hint().exact() != Some(0) {
        builder = builder.body(reqwest::Body::wrap_stream(body.into_data_stream()));
    }

    builder.build()
}
