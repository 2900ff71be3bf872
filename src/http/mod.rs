//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TLS connection
//!     → server.rs (Axum setup, request ID, trace layer)
//!     → forward.rs (one upstream call per request)
//!         → request.rs (outbound URL and headers)
//!         → response.rs (pooled streaming copy) or intercept.rs (rewrite)
//!         → error.rs (502/504 mapping, disconnect classification)
//!     → Send to client
//! ```

pub mod error;
pub mod forward;
pub mod intercept;
pub mod request;
pub mod response;
pub mod server;

pub use error::ForwardError;
pub use intercept::{ResponseInterceptor, ResponseTransform};
pub use request::PROXY_TOKEN_HEADER;
pub use server::{AppState, HttpServer};
