//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! authority, http, monitor
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Request ID is attached to every HTTP span
//! - Metric calls are no-ops until an exporter is installed, so library code
//!   and tests record unconditionally

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
