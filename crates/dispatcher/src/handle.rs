//! SinkHandle - one sink behind its own bounded queue and worker task

use std::sync::Arc;

use contracts::{Scan, ScanSink};
use observability::{record_scan_dispatched, record_sink_queue_depth};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use crate::metrics::SinkMetrics;

/// Handle to a running sink worker
pub struct SinkHandle {
    name: String,
    tx: mpsc::Sender<Arc<Scan>>,
    metrics: Arc<SinkMetrics>,
    worker: JoinHandle<()>,
}

impl SinkHandle {
    /// Spawn the worker task for `sink`
    pub fn spawn<S: ScanSink + Send + 'static>(sink: S, queue_capacity: usize) -> Self {
        let name = sink.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(SinkMetrics::new());

        let worker = tokio::spawn(sink_worker(sink, rx, Arc::clone(&metrics), name.clone()));

        Self {
            name,
            tx,
            metrics,
            worker,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Queue a snapshot without waiting
    ///
    /// Returns false when the scan was dropped (queue full or worker gone).
    pub fn try_send(&self, scan: Arc<Scan>) -> bool {
        match self.tx.try_send(scan) {
            Ok(()) => {
                let depth = self.tx.max_capacity() - self.tx.capacity();
                self.metrics.set_queue_len(depth);
                record_sink_queue_depth(&self.name, depth);
                true
            }
            Err(mpsc::error::TrySendError::Full(scan)) => {
                self.metrics.record_dropped();
                record_scan_dispatched(&self.name, false);
                warn!(sink = %self.name, cycle = scan.cycle, "Sink queue full, scan dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(sink = %self.name, "Sink worker closed unexpectedly");
                false
            }
        }
    }

    /// Close the queue and wait for the worker to drain it
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.worker.await {
            error!(sink = %self.name, error = ?e, "Sink worker panicked");
        }
        debug!(sink = %self.name, "Sink handle shut down");
    }
}

#[instrument(name = "sink_worker", skip(sink, rx, metrics), fields(sink = %name))]
async fn sink_worker<S: ScanSink>(
    mut sink: S,
    mut rx: mpsc::Receiver<Arc<Scan>>,
    metrics: Arc<SinkMetrics>,
    name: String,
) {
    debug!("Sink worker started");

    while let Some(scan) = rx.recv().await {
        metrics.set_queue_len(rx.len());

        match sink.write(&scan).await {
            Ok(()) => {
                metrics.record_written(scan.cycle);
                record_scan_dispatched(&name, true);
            }
            Err(e) => {
                // A failing sink keeps consuming; other sinks are unaffected
                metrics.record_failed();
                record_scan_dispatched(&name, false);
                error!(cycle = scan.cycle, error = %e, "Sink write failed");
            }
        }
    }

    if let Err(e) = sink.flush().await {
        error!(error = %e, "Flush failed on shutdown");
    }
    if let Err(e) = sink.close().await {
        error!(error = %e, "Close failed on shutdown");
    }
    debug!("Sink worker stopped");
}
