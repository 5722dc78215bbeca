//! Scan cycle metrics
//!
//! Recorded from the `CycleReport` produced by every capture cycle.

use contracts::CycleReport;
use metrics::{counter, gauge, histogram};

/// Record metrics for one cycle
pub fn record_cycle_metrics(report: &CycleReport) {
    let status = if report.is_degraded() {
        "degraded"
    } else {
        "complete"
    };
    counter!("lidar_cycles_total", "status" => status).increment(1);
    if report.is_degraded() {
        counter!("lidar_degraded_cycles_total").increment(1);
    }
    if report.deadline_missed {
        counter!("lidar_deadline_misses_total").increment(1);
    }

    gauge!("lidar_last_cycle").set(report.cycle as f64);
    gauge!("lidar_segments_ready").set(report.segments_ready as f64);
    gauge!("lidar_valid_returns").set(report.valid_returns as f64);
    histogram!("lidar_cycle_duration_ms").record(report.duration_ms);

    if report.cancelled > 0 {
        counter!("lidar_cancelled_readbacks_total").increment(report.cancelled as u64);
    }
}

/// Record a scan handed to a sink
pub fn record_scan_dispatched(sink_name: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "lidar_scans_dispatched_total",
        "sink" => sink_name.to_string(),
        "status" => status
    )
    .increment(1);
}

/// Record a sink's queue depth
pub fn record_sink_queue_depth(sink_name: &str, depth: usize) {
    gauge!("lidar_sink_queue_depth", "sink" => sink_name.to_string()).set(depth as f64);
}

/// In-memory cycle statistics, for the end-of-run summary
#[derive(Debug, Clone, Default)]
pub struct CycleMetricsAggregator {
    pub total_cycles: u64,
    pub degraded_cycles: u64,
    pub deadline_misses: u64,
    pub malformed_buffers: u64,
    pub readback_errors: u64,
    pub stale_discarded: u64,
    pub geometry_inconsistencies: u64,
    pub rows_skipped: u64,
    pub duration_stats: RunningStats,
    pub valid_return_stats: RunningStats,
}

impl CycleMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, report: &CycleReport) {
        self.total_cycles += 1;
        if report.is_degraded() {
            self.degraded_cycles += 1;
        }
        if report.deadline_missed {
            self.deadline_misses += 1;
        }
        self.malformed_buffers += report.malformed_buffers as u64;
        self.readback_errors += report.readback_errors as u64;
        self.stale_discarded += report.stale_discarded as u64;
        self.geometry_inconsistencies += report.geometry_inconsistencies as u64;
        self.rows_skipped += report.rows_skipped as u64;

        self.duration_stats.push(report.duration_ms);
        self.valid_return_stats.push(report.valid_returns as f64);
    }

    pub fn summary(&self) -> CycleMetricsSummary {
        CycleMetricsSummary {
            total_cycles: self.total_cycles,
            degraded_cycles: self.degraded_cycles,
            degraded_rate: if self.total_cycles > 0 {
                self.degraded_cycles as f64 / self.total_cycles as f64 * 100.0
            } else {
                0.0
            },
            deadline_misses: self.deadline_misses,
            malformed_buffers: self.malformed_buffers,
            readback_errors: self.readback_errors,
            stale_discarded: self.stale_discarded,
            geometry_inconsistencies: self.geometry_inconsistencies,
            cycle_duration_ms: StatsSummary::from(&self.duration_stats),
            valid_returns: StatsSummary::from(&self.valid_return_stats),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Default)]
pub struct CycleMetricsSummary {
    pub total_cycles: u64,
    pub degraded_cycles: u64,
    pub degraded_rate: f64,
    pub deadline_misses: u64,
    pub malformed_buffers: u64,
    pub readback_errors: u64,
    pub stale_discarded: u64,
    pub geometry_inconsistencies: u64,
    pub cycle_duration_ms: StatsSummary,
    pub valid_returns: StatsSummary,
}

impl std::fmt::Display for CycleMetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Scan Cycle Summary ===")?;
        writeln!(f, "Total cycles: {}", self.total_cycles)?;
        writeln!(
            f,
            "Degraded cycles: {} ({:.2}%)",
            self.degraded_cycles, self.degraded_rate
        )?;
        writeln!(f, "Deadline misses: {}", self.deadline_misses)?;
        writeln!(f, "Malformed buffers: {}", self.malformed_buffers)?;
        writeln!(f, "Readback errors: {}", self.readback_errors)?;
        writeln!(f, "Stale readbacks: {}", self.stale_discarded)?;
        if self.geometry_inconsistencies > 0 {
            writeln!(f, "Geometry inconsistencies: {}", self.geometry_inconsistencies)?;
        }
        writeln!(f, "Cycle duration (ms): {}", self.cycle_duration_ms)?;
        writeln!(f, "Valid returns: {}", self.valid_returns)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online mean/variance (Welford)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
            return;
        }

        self.min = self.min.min(value);
        self.max = self.max.max(value);
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
