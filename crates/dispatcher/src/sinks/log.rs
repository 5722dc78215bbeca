//! LogSink - logs a scan summary via tracing

use std::collections::HashMap;

use contracts::{LidarError, Scan, ScanSink};
use tracing::{info, instrument, warn};

/// Logs one line per scan (or per `every` scans)
pub struct LogSink {
    name: String,
    every: u64,
    seen: u64,
}

impl LogSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            every: 1,
            seen: 0,
        }
    }

    /// Params: `every` (log every Nth scan, default 1)
    pub fn from_params(name: impl Into<String>, params: &HashMap<String, String>) -> Self {
        let mut sink = Self::new(name);
        if let Some(raw) = params.get("every") {
            match raw.parse::<u64>() {
                Ok(every) if every > 0 => sink.every = every,
                _ => warn!(sink = %sink.name, every = %raw, "Invalid 'every' param, logging every scan"),
            }
        }
        sink
    }

    fn log_scan_summary(&self, scan: &Scan) {
        let (count, min, sum) = scan
            .ranges
            .iter()
            .filter(|r| !r.is_nan())
            .fold((0usize, f64::INFINITY, 0.0), |(n, min, sum), &r| {
                (n + 1, min.min(r), sum + r)
            });
        let mean = if count > 0 { sum / count as f64 } else { f64::NAN };

        info!(
            sink = %self.name,
            frame_id = %scan.frame_id,
            cycle = scan.cycle,
            timestamp = scan.timestamp,
            status = ?scan.status,
            bins = scan.len(),
            valid_returns = count,
            min_range = if count > 0 { min } else { f64::NAN },
            mean_range = mean,
            "Scan received"
        );
    }
}

impl ScanSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "log_sink_write", skip(self, scan), fields(sink = %self.name, cycle = scan.cycle))]
    async fn write(&mut self, scan: &Scan) -> Result<(), LidarError> {
        self.seen += 1;
        if (self.seen - 1).is_multiple_of(self.every) {
            self.log_scan_summary(scan);
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), LidarError> {
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), LidarError> {
        info!(sink = %self.name, scans = self.seen, "LogSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{RangeBounds, ScanWindow};

    fn make_scan() -> Scan {
        let mut scan = Scan::empty(
            "lidar",
            ScanWindow::new(4, -1.0, 1.0),
            ScanWindow::planar(),
            RangeBounds::new(0.1, 10.0),
        );
        scan.ranges[1] = 2.0;
        scan
    }

    #[tokio::test]
    async fn test_log_sink_write() {
        let mut sink = LogSink::new("test_log");
        assert!(sink.write(&make_scan()).await.is_ok());
        assert!(sink.close().await.is_ok());
        assert_eq!(sink.seen, 1);
    }

    #[test]
    fn test_log_sink_params() {
        let params = HashMap::from([("every".to_string(), "10".to_string())]);
        let sink = LogSink::from_params("sampled", &params);
        assert_eq!(sink.name(), "sampled");
        assert_eq!(sink.every, 10);

        let params = HashMap::from([("every".to_string(), "0".to_string())]);
        assert_eq!(LogSink::from_params("bad", &params).every, 1);
    }
}
