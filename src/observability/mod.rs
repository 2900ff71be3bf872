//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Request ID (`x-request-id`) is attached by the HTTP layer and appears
//!   on every request log line
//! - Metrics are cheap (atomic increments) and silent when no exporter is set

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::init_metrics;
