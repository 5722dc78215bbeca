//! ScanSink trait - Dispatcher output interface

use crate::{LidarError, Scan};

/// Scan output trait
///
/// All sink implementations must implement this trait.
#[trait_variant::make(ScanSink: Send)]
pub trait LocalScanSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Write one published scan
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn write(&mut self, scan: &Scan) -> Result<(), LidarError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), LidarError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), LidarError>;
}
