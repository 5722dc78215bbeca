//! Pipeline orchestrator - wires the sensor to the mock renderer and sinks.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use capture::{LidarSensor, MockDepthSource, MockRendererConfig};
use contracts::LidarConfig;
use tokio::sync::watch;
use tracing::{info, warn};

use super::PipelineStats;

/// How long sinks get to drain after the sensor stops
const DISPATCHER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub lidar: LidarConfig,
    pub renderer: MockRendererConfig,
    /// Stop after this many cycles (None = unlimited)
    pub max_cycles: Option<u64>,
    /// Stop after this long (None = no timeout)
    pub timeout: Option<Duration>,
    /// Prometheus port (None = disabled)
    pub metrics_port: Option<u16>,
}

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until `max_cycles`, the timeout, or `shutdown` flips to true
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let lidar = &self.config.lidar;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!(port, "Metrics endpoint available");
        }

        info!(scene = %self.config.renderer.scene, "Running against mock renderer");
        let source = Arc::new(MockDepthSource::new(
            format!("{}-mock", lidar.name),
            self.config.renderer.clone(),
        ));
        let mut sensor = LidarSensor::initialize(lidar.clone(), source)
            .context("Failed to initialize LIDAR sensor")?;

        if lidar.sinks.is_empty() {
            warn!("No sinks configured - scans will only be summarized");
        }
        let dispatcher = dispatcher::create_dispatcher(lidar.sinks.clone(), sensor.subscribe())
            .context("Failed to create dispatcher")?;
        let active_sinks = lidar.sinks.len();
        let dispatcher_handle = dispatcher.spawn();
        info!(active_sinks, "Dispatcher started");

        // Fold the external shutdown signal and the timeout into one stop flag
        let (stop_tx, stop_rx) = watch::channel(false);
        let watchdog = tokio::spawn(stop_on_signal_or_timeout(
            shutdown,
            self.config.timeout,
            stop_tx,
        ));

        let cycle_metrics = sensor.run(stop_rx, self.config.max_cycles).await;
        watchdog.abort();

        info!("Shutting down pipeline...");
        let segments = sensor.geometry().segment_count();
        let scan_len = sensor.geometry().scan_len();
        let abandoned_readbacks = sensor.shutdown();

        let sink_metrics = match tokio::time::timeout(DISPATCHER_DRAIN_TIMEOUT, dispatcher_handle).await {
            Ok(Ok(metrics)) => metrics,
            Ok(Err(e)) => {
                warn!(error = %e, "Dispatcher task failed");
                Vec::new()
            }
            Err(_) => {
                warn!("Dispatcher did not drain in time");
                Vec::new()
            }
        };

        let stats = PipelineStats {
            cycles: cycle_metrics.total_cycles,
            duration: start_time.elapsed(),
            segments,
            scan_len,
            active_sinks,
            abandoned_readbacks,
            cycle_metrics,
            sink_metrics,
        };

        info!(
            cycles = stats.cycles,
            duration_secs = stats.duration.as_secs_f64(),
            scans_per_sec = format!("{:.2}", stats.scans_per_sec()),
            "Pipeline shutdown complete"
        );

        Ok(stats)
    }
}

async fn stop_on_signal_or_timeout(
    mut shutdown: watch::Receiver<bool>,
    timeout: Option<Duration>,
    stop_tx: watch::Sender<bool>,
) {
    let deadline = async {
        match timeout {
            Some(timeout) => tokio::time::sleep(timeout).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        _ = deadline => {
            warn!(timeout_secs = timeout.map(|t| t.as_secs_f64()), "Pipeline timed out");
        }
        _ = wait_for_true(&mut shutdown) => {
            info!("Shutdown requested");
        }
    }

    let _ = stop_tx.send(true);
}

/// Resolves once the flag is set; never resolves if its sender goes away unset
async fn wait_for_true(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}
