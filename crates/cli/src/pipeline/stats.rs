//! Pipeline run statistics.

use std::time::Duration;

use dispatcher::MetricsSnapshot;
use observability::CycleMetricsAggregator;

#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    pub cycles: u64,
    pub duration: Duration,
    pub segments: usize,
    pub scan_len: usize,
    pub active_sinks: usize,
    /// Readbacks still in flight when the sensor shut down
    pub abandoned_readbacks: usize,
    pub cycle_metrics: CycleMetricsAggregator,
    pub sink_metrics: Vec<(String, MetricsSnapshot)>,
}

impl PipelineStats {
    pub fn scans_per_sec(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.cycles as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    pub fn print_summary(&self) {
        println!("\n=== Pipeline Statistics ===\n");
        println!("Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Cycles: {}", self.cycles);
        println!("   ├─ Scans/s: {:.2}", self.scans_per_sec());
        println!("   ├─ Segments per cycle: {}", self.segments);
        println!("   ├─ Bins per scan: {}", self.scan_len);
        println!("   └─ Abandoned readbacks: {}", self.abandoned_readbacks);

        println!("\n{}", self.cycle_metrics.summary());

        if !self.sink_metrics.is_empty() {
            println!("Sinks ({})", self.active_sinks);
            for (i, (name, snapshot)) in self.sink_metrics.iter().enumerate() {
                let prefix = if i + 1 == self.sink_metrics.len() {
                    "└─"
                } else {
                    "├─"
                };
                println!("   {prefix} {name}: {snapshot}");
            }
        }

        println!();
    }
}
