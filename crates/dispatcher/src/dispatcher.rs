//! Dispatcher - follows published scans and fans them out to sinks

use std::collections::HashSet;
use std::sync::Arc;

use contracts::{CycleStatus, Scan, SinkConfig, SinkType};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use crate::error::DispatcherError;
use crate::handle::SinkHandle;
use crate::metrics::MetricsSnapshot;
use crate::sinks::{FileSink, LogSink};

#[derive(Debug, Clone, Default)]
pub struct DispatcherConfig {
    pub sinks: Vec<SinkConfig>,
}

/// Builder for creating a Dispatcher
pub struct DispatcherBuilder {
    config: DispatcherConfig,
    scans: watch::Receiver<Arc<Scan>>,
}

impl DispatcherBuilder {
    pub fn new(config: DispatcherConfig, scans: watch::Receiver<Arc<Scan>>) -> Self {
        Self { config, scans }
    }

    /// Create every sink and its worker
    #[instrument(name = "dispatcher_build", skip(self), fields(sink_count = self.config.sinks.len()))]
    pub fn build(self) -> Result<Dispatcher, DispatcherError> {
        let mut names = HashSet::new();
        if let Some(dup) = self.config.sinks.iter().find(|s| !names.insert(s.name.as_str())) {
            return Err(DispatcherError::DuplicateSink(dup.name.clone()));
        }

        let handles = self
            .config
            .sinks
            .iter()
            .map(create_sink_handle)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Dispatcher {
            handles,
            scans: self.scans,
        })
    }
}

#[instrument(
    name = "dispatcher_create_sink_handle",
    skip(config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
fn create_sink_handle(config: &SinkConfig) -> Result<SinkHandle, DispatcherError> {
    match config.sink_type {
        SinkType::Log => Ok(SinkHandle::spawn(
            LogSink::from_params(&config.name, &config.params),
            config.queue_capacity,
        )),
        SinkType::File => {
            let sink = FileSink::from_params(&config.name, &config.params)
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
    }
}

/// Fans every published scan out to all sinks
pub struct Dispatcher {
    handles: Vec<SinkHandle>,
    scans: watch::Receiver<Arc<Scan>>,
}

impl Dispatcher {
    /// Build with pre-made handles (for testing)
    pub fn with_handles(handles: Vec<SinkHandle>, scans: watch::Receiver<Arc<Scan>>) -> Self {
        Self { handles, scans }
    }

    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect()
    }

    /// Run until the publishing sensor is dropped
    ///
    /// A sink that falls behind only sees the snapshots it has room for;
    /// the dispatcher itself never waits on a sink. Returns the final
    /// per-sink counters.
    #[instrument(name = "dispatcher_run", skip(self))]
    pub async fn run(mut self) -> Vec<(String, MetricsSnapshot)> {
        info!(sinks = self.handles.len(), "Dispatcher started");

        let mut dispatched: u64 = 0;
        while self.scans.changed().await.is_ok() {
            let scan = Arc::clone(&self.scans.borrow_and_update());
            if scan.status == CycleStatus::Pending {
                continue;
            }

            for handle in &self.handles {
                handle.try_send(Arc::clone(&scan));
            }
            dispatched += 1;

            if dispatched.is_multiple_of(100) {
                debug!(scans = dispatched, "Dispatcher progress");
            }
        }

        info!(scans = dispatched, "Scan publisher closed, shutting down");

        let counters: Vec<_> = self
            .handles
            .iter()
            .map(|h| (h.name().to_string(), Arc::clone(h.metrics())))
            .collect();
        for handle in self.handles {
            handle.shutdown().await;
        }

        info!("Dispatcher shutdown complete");
        counters
            .into_iter()
            .map(|(name, metrics)| (name, metrics.snapshot()))
            .collect()
    }

    pub fn spawn(self) -> JoinHandle<Vec<(String, MetricsSnapshot)>> {
        tokio::spawn(self.run())
    }
}

/// Build a dispatcher from sink configs
pub fn create_dispatcher(
    sinks: Vec<SinkConfig>,
    scans: watch::Receiver<Arc<Scan>>,
) -> Result<Dispatcher, DispatcherError> {
    DispatcherBuilder::new(DispatcherConfig { sinks }, scans).build()
}
