//! Response interception.
//!
//! A small table maps exact request paths to a [`ResponseTransform`]. Only
//! registered paths answered with 200 are buffered and rewritten; everything
//! else streams straight through.

use std::collections::HashMap;

use axum::http::{header, HeaderMap, HeaderValue};
use axum::body::Bytes;

/// Path whose HTML gets the gateway marker injected.
pub const MARKER_PATH: &str = "/wheredidicomefrom";

/// Fragment inserted immediately before the first `</body>`.
pub const MARKER_HTML: &str =
    r#"<p style="color: green; font-weight: bold;">Injected by the Rust Proxy!</p>"#;

const BODY_CLOSE: &[u8] = b"</body>";

/// Rewrite applied to a fully buffered response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseTransform {
    /// Insert [`MARKER_HTML`] before the first `</body>`.
    InjectMarker,
    /// Return the body unchanged.
    Passthrough,
}

impl ResponseTransform {
    fn apply(&self, body: Bytes) -> Bytes {
        match self {
            ResponseTransform::Passthrough => body,
            ResponseTransform::InjectMarker => inject_before_body_close(body),
        }
    }
}

/// Route table consulted by the forwarding engine.
#[derive(Debug, Clone)]
pub struct ResponseInterceptor {
    routes: HashMap<String, ResponseTransform>,
}

impl ResponseInterceptor {
    /// An interceptor with no routes.
    pub fn empty() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    pub fn with_route(mut self, path: impl Into<String>, transform: ResponseTransform) -> Self {
        self.routes.insert(path.into(), transform);
        self
    }

    /// Whether responses for `path` are buffered and transformed.
    pub fn has_handler(&self, path: &str) -> bool {
        self.routes.contains_key(path)
    }

    /// Transform a buffered body for `path`, fixing up `headers` to match.
    ///
    /// Unregistered paths are returned unchanged.
    pub fn transform(&self, path: &str, body: Bytes, headers: &mut HeaderMap) -> Bytes {
        let Some(transform) = self.routes.get(path) else {
            return body;
        };

        let out = transform.apply(body);

        if *transform == ResponseTransform::InjectMarker {
            // The body was requested with identity encoding; drop any stale
            // claim otherwise.
            headers.remove(header::CONTENT_ENCODING);
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(out.len()));
            tracing::info!(path, length = out.len(), "Injected marker into response");
        }

        out
    }
}

impl Default for ResponseInterceptor {
    fn default() -> Self {
        Self::empty().with_route(MARKER_PATH, ResponseTransform::InjectMarker)
    }
}

fn inject_before_body_close(body: Bytes) -> Bytes {
    let Some(pos) = body
        .windows(BODY_CLOSE.len())
        .position(|window| window == BODY_CLOSE)
    else {
        return body;
    };

    let mut out = Vec::with_capacity(body.len() + MARKER_HTML.len());
    out.extend_from_slice(&body[..pos]);
    out.extend_from_slice(MARKER_HTML.as_bytes());
    out.extend_from_slice(&body[pos..]);
    Bytes::from(out)
}
