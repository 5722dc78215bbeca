//! Capture / readback controller
//!
//! Drives one scan cycle per update period:
//!
//! ```text
//! Idle -> Capturing(i) -> AwaitingReadback(i) -> Decoding(i) -> Extracted(i)
//!      -> Merging -> Filtering -> Published -> Idle
//! ```
//!
//! All segment captures are submitted up front. Readback completions arrive
//! on renderer threads and are forwarded through a bounded channel; the
//! cycle collects them until every segment is in or the cycle deadline
//! passes, then stitches whatever is ready and publishes a snapshot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_channel::{Receiver, Sender, TrySendError};
use contracts::{
    CaptureRequest, CycleReport, CycleStatus, DepthSource, LidarConfig, LidarError, Pose,
    ReadbackCallback, ReadbackCompletion, ReadbackToken, Scan, ScanGeometry, ScanWindow,
    SegmentRangeOutput,
};
use metrics::counter;
use observability::{record_cycle_metrics, CycleMetricsAggregator};
use scan_engine::ScanEngine;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, trace, warn};

use crate::pose::compose;
use crate::publisher::ScanPublisher;
use crate::readback::ReadbackSlots;

/// Controller state within a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CycleState {
    #[default]
    Idle,
    Capturing(usize),
    AwaitingReadback(usize),
    Decoding(usize),
    Extracted(usize),
    Merging,
    Filtering,
    Published,
}

/// Simulated LIDAR sensor
///
/// Owns the scan engine, the outstanding readback slots and the snapshot
/// publisher. Consumers subscribe to `Arc<Scan>` snapshots.
pub struct LidarSensor {
    engine: ScanEngine,
    source: Arc<dyn DepthSource>,
    slots: ReadbackSlots,
    publisher: ScanPublisher,
    completion_rx: Receiver<ReadbackCompletion>,
    callback: ReadbackCallback,
    torn_down: Arc<AtomicBool>,
    period: Duration,
    mount: Pose,
    cycle: u64,
    state: CycleState,
}

impl std::fmt::Debug for LidarSensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LidarSensor")
            .field("name", &self.engine.config().name)
            .field("source", &self.source.name())
            .field("cycle", &self.cycle)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl LidarSensor {
    /// Validate the configuration, plan geometry and allocate buffers
    ///
    /// # Errors
    /// `Configuration` when the update rate, scan windows, range, camera or
    /// noise settings are invalid.
    #[instrument(name = "lidar_initialize", skip(config, source), fields(sensor = %config.name, source = %source.name()))]
    pub fn initialize(config: LidarConfig, source: Arc<dyn DepthSource>) -> Result<Self, LidarError> {
        let period = config.capture_period().ok_or_else(|| {
            LidarError::configuration(
                "update_rate_hz",
                format!("must be positive and finite, got {}", config.update_rate_hz),
            )
        })?;
        let engine = ScanEngine::new(&config)?;
        let segments = engine.geometry().segment_count();
        let torn_down = Arc::new(AtomicBool::new(false));
        let (callback, completion_rx) = completion_channel(segments, &torn_down);

        info!(
            segments,
            scan_len = engine.geometry().scan_len(),
            period_ms = period.as_secs_f64() * 1000.0,
            near = engine.geometry().clip.near,
            far = engine.geometry().clip.far,
            "LIDAR sensor initialized"
        );

        Ok(Self {
            publisher: ScanPublisher::new(engine.scan().clone()),
            slots: ReadbackSlots::new(segments),
            mount: config.mount,
            engine,
            source,
            completion_rx,
            callback,
            torn_down,
            period,
            cycle: 0,
            state: CycleState::Idle,
        })
    }

    pub fn name(&self) -> &str {
        &self.engine.config().name
    }

    pub fn geometry(&self) -> &ScanGeometry {
        self.engine.geometry()
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    /// Completed cycles
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Requests still awaiting readback
    pub fn outstanding(&self) -> usize {
        self.slots.outstanding()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Scan>> {
        self.publisher.subscribe()
    }

    /// Most recent published snapshot
    pub fn latest(&self) -> Arc<Scan> {
        self.publisher.latest()
    }

    /// Change the scan windows at runtime
    ///
    /// Outstanding readbacks are cancelled and the geometry is re-planned.
    /// On error the previous plan stays active.
    pub fn reconfigure(&mut self, horizontal: ScanWindow, vertical: ScanWindow) -> Result<(), LidarError> {
        self.engine.reconfigure(horizontal, vertical)?;

        let segments = self.engine.geometry().segment_count();
        for token in self.slots.reset(segments) {
            self.source.cancel(token);
        }
        self.completion_rx.close();
        let (callback, completion_rx) = completion_channel(segments, &self.torn_down);
        self.callback = callback;
        self.completion_rx = completion_rx;

        info!(
            sensor = %self.name(),
            segments,
            scan_len = self.engine.geometry().scan_len(),
            "LIDAR sensor reconfigured"
        );
        Ok(())
    }

    fn transition(&mut self, next: CycleState) {
        trace!(from = ?self.state, to = ?next, "Cycle state transition");
        self.state = next;
    }

    /// Run one capture cycle and publish the resulting snapshot
    ///
    /// Never fails: readback errors, malformed buffers and a missed deadline
    /// degrade the cycle, leaving the affected bins `NaN`.
    #[instrument(name = "lidar_cycle", skip(self), fields(sensor = %self.engine.config().name, cycle = self.cycle + 1))]
    pub async fn run_cycle(&mut self) -> CycleReport {
        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + self.period;
        self.cycle += 1;
        let cycle = self.cycle;
        let timestamp = self.source.sim_time();
        let link_pose = self.source.link_pose();

        let geometry = self.engine.geometry().clone();
        let segment_total = geometry.segment_count();
        let mut report = CycleReport {
            cycle,
            segments_total: segment_total,
            ..Default::default()
        };

        // 1. Submit every segment
        for segment in &geometry.segments {
            self.transition(CycleState::Capturing(segment.index));
            let token = ReadbackToken {
                segment: segment.index,
                cycle,
            };
            if let Some(previous) = self.slots.submit(token) {
                self.source.cancel(previous);
                report.cancelled += 1;
                debug!(
                    segment = segment.index,
                    previous_cycle = previous.cycle,
                    "Cancelled outstanding readback"
                );
            }
            self.source.request_capture(
                CaptureRequest {
                    token,
                    geometry: *segment,
                    clip: geometry.clip,
                },
                Arc::clone(&self.callback),
            );
            self.transition(CycleState::AwaitingReadback(segment.index));
        }

        // 2. Collect completions until all are in or the deadline passes
        let mut outputs: Vec<Option<SegmentRangeOutput>> = vec![None; segment_total];
        let mut pending = segment_total;
        while pending > 0 {
            let completion = match tokio::time::timeout_at(deadline, self.completion_rx.recv()).await {
                Ok(Ok(completion)) => completion,
                Ok(Err(_)) => {
                    warn!("Completion channel closed");
                    break;
                }
                Err(_) => {
                    report.deadline_missed = true;
                    warn!(pending, "Cycle deadline missed, publishing ready segments");
                    break;
                }
            };

            let token = completion.token;
            let latency = if token.cycle == cycle {
                self.slots.complete(token)
            } else {
                None
            };
            let Some(latency) = latency else {
                report.stale_discarded += 1;
                counter!("lidar_stale_readbacks_total").increment(1);
                trace!(
                    segment = token.segment,
                    token_cycle = token.cycle,
                    "Stale readback discarded"
                );
                continue;
            };
            pending -= 1;

            match completion.result {
                Ok(buffer) => {
                    self.transition(CycleState::Decoding(token.segment));
                    let processed = if buffer.segment == token.segment {
                        cpu_bound(|| self.engine.process_readback(&buffer))
                    } else {
                        Err(LidarError::malformed_buffer(token.segment, 0, buffer.data.len()))
                    };
                    match processed {
                        Ok(output) => {
                            outputs[token.segment] = Some(output);
                            report.segments_ready += 1;
                            self.transition(CycleState::Extracted(token.segment));
                            trace!(
                                segment = token.segment,
                                latency_ms = latency.as_secs_f64() * 1000.0,
                                "Segment extracted"
                            );
                        }
                        Err(e) => {
                            report.malformed_buffers += 1;
                            counter!("lidar_malformed_buffers_total").increment(1);
                            warn!(segment = token.segment, error = %e, "Malformed readback, segment dropped");
                        }
                    }
                }
                Err(e) => {
                    report.readback_errors += 1;
                    counter!("lidar_readback_errors_total").increment(1);
                    warn!(segment = token.segment, error = %e, "Readback failed, segment dropped");
                }
            }
        }

        // 3. Merge, filter, publish
        self.transition(CycleState::Merging);
        let stitch = cpu_bound(|| self.engine.merge(outputs.iter().flatten()));
        self.transition(CycleState::Filtering);
        let filter = cpu_bound(|| self.engine.finalize());

        let status = if report.segments_ready == segment_total && !report.deadline_missed {
            CycleStatus::Complete
        } else {
            CycleStatus::Degraded
        };
        let mount = self.mount;
        let scan = self.engine.scan_mut();
        scan.cycle = cycle;
        scan.timestamp = timestamp;
        scan.pose = compose(&link_pose, &mount);
        scan.status = status;
        report.valid_returns = scan.valid_returns();

        self.publisher.publish(self.engine.scan());
        self.transition(CycleState::Published);

        report.status = status;
        report.rows_copied = stitch.rows_copied;
        report.rows_skipped = stitch.rows_skipped;
        report.geometry_inconsistencies = stitch.inconsistencies;
        report.duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        record_cycle_metrics(&report);

        if report.is_degraded() {
            warn!(
                ready = report.segments_ready,
                total = segment_total,
                malformed = report.malformed_buffers,
                readback_errors = report.readback_errors,
                deadline_missed = report.deadline_missed,
                "Degraded scan published"
            );
        } else {
            debug!(
                valid_returns = report.valid_returns,
                angle_filtered = filter.angle_filtered,
                range_excluded = filter.range_excluded,
                duration_ms = report.duration_ms,
                "Scan published"
            );
        }

        self.transition(CycleState::Idle);
        report
    }

    /// Run cycles at the update rate until shutdown is signalled or
    /// `max_cycles` cycles have been published
    pub async fn run(
        &mut self,
        mut shutdown: watch::Receiver<bool>,
        max_cycles: Option<u64>,
    ) -> CycleMetricsAggregator {
        let mut aggregator = CycleMetricsAggregator::new();
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            sensor = %self.name(),
            period_ms = self.period.as_secs_f64() * 1000.0,
            max_cycles = ?max_cycles,
            "Capture loop started"
        );

        loop {
            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Shutdown signal received, stopping capture loop");
                        break;
                    }
                }

                _ = ticker.tick() => {
                    let report = self.run_cycle().await;
                    aggregator.update(&report);
                    if max_cycles.is_some_and(|max| report.cycle >= max) {
                        info!(cycles = report.cycle, "Reached max cycles");
                        break;
                    }
                }
            }
        }

        aggregator
    }

    /// Release the sensor
    ///
    /// Outstanding readbacks are cancelled and any completion delivered
    /// afterwards is ignored. Returns the number of abandoned requests.
    pub fn shutdown(mut self) -> usize {
        let abandoned = self.teardown();
        info!(sensor = %self.name(), abandoned, cycles = self.cycle, "LIDAR sensor shut down");
        abandoned
    }

    fn teardown(&mut self) -> usize {
        if self.torn_down.swap(true, Ordering::AcqRel) {
            return 0;
        }
        self.completion_rx.close();
        let abandoned = self.slots.drain();
        for token in &abandoned {
            self.source.cancel(*token);
        }
        abandoned.len()
    }
}

impl Drop for LidarSensor {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Run rayon-backed stage work off the async scheduler
///
/// On a multi-threaded runtime the worker hands its other tasks to a peer
/// while `work` runs. A current-thread runtime has no peer, so the work
/// runs inline there.
fn cpu_bound<T>(work: impl FnOnce() -> T) -> T {
    match Handle::try_current().map(|handle| handle.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => tokio::task::block_in_place(work),
        _ => work(),
    }
}

/// Build the renderer-facing callback and the controller-side receiver
///
/// The callback forwards completions without blocking; after teardown it
/// drops them.
fn completion_channel(
    segments: usize,
    torn_down: &Arc<AtomicBool>,
) -> (ReadbackCallback, Receiver<ReadbackCompletion>) {
    let (tx, rx) = async_channel::bounded(segments.max(1) * 2);
    let torn_down = Arc::clone(torn_down);
    let callback: ReadbackCallback = Arc::new(move |completion: ReadbackCompletion| {
        if torn_down.load(Ordering::Acquire) {
            trace!(segment = completion.token.segment, "Readback after shutdown ignored");
            return;
        }
        forward_completion(&tx, completion);
    });
    (callback, rx)
}

fn forward_completion(tx: &Sender<ReadbackCompletion>, completion: ReadbackCompletion) {
    let token = completion.token;
    match tx.try_send(completion) {
        Ok(_) => {
            trace!(segment = token.segment, cycle = token.cycle, "completion queued");
        }
        Err(TrySendError::Full(_)) => {
            counter!("lidar_readback_dropped_total").increment(1);
            warn!(segment = token.segment, cycle = token.cycle, "Completion queue full, readback dropped");
        }
        Err(TrySendError::Closed(_)) => {
            trace!(segment = token.segment, cycle = token.cycle, "Completion channel closed");
        }
    }
}
