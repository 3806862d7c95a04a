//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! capture middleware
//!     → sink.rs (one RequestRecord per request)
//!     → logging.rs (tracing subscriber: stderr + rotation.rs file)
//!     → metrics.rs (counters, Prometheus endpoint)
//! ```
//!
//! # Design Decisions
//! - Records travel as tracing events so one subscriber owns all output
//! - Log file rotates by size, rotated files are gzip-compressed
//! - Metrics exporter is opt-in

pub mod logging;
pub mod metrics;
pub mod rotation;
pub mod sink;

pub use sink::{MemorySink, RecordSink, TracingSink};
