//! # Dispatcher
//!
//! Scan distribution.
//!
//! Responsibilities:
//! - Follow the sensor's published `Arc<Scan>` snapshots
//! - Fan out to multiple sinks
//! - Isolate slow sinks so publication is never blocked

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod sinks;

pub use contracts::{Scan, ScanSink};
pub use dispatcher::{create_dispatcher, Dispatcher, DispatcherBuilder, DispatcherConfig};
pub use error::DispatcherError;
pub use handle::SinkHandle;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use sinks::{FileSink, LogSink};
