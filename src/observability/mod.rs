//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! fetcher / coordinator produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (reload outcomes, fetch latency, config generation)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Every log line carries the project/key/field it concerns as fields
//! - Metric updates are fire-and-forget and are no-ops until a recorder is
//!   installed

pub mod logging;
pub mod metrics;
