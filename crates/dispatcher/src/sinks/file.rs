//! FileSink - writes each scan as JSON under `<base_path>/scans/`

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use contracts::{LidarError, Scan, ScanSink};
use tracing::{debug, instrument};

#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    pub base_path: PathBuf,
    /// Pretty-print JSON
    pub pretty: bool,
}

impl FileSinkConfig {
    /// Params: `base_path` (default `./output`), `pretty` (`true`/`false`)
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let base_path = params
            .get("base_path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./output"));
        let pretty = params
            .get("pretty")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));

        Self { base_path, pretty }
    }
}

/// One JSON file per scan, named by cycle
///
/// Bins without a return are written as `null`.
pub struct FileSink {
    name: String,
    config: FileSinkConfig,
    scan_dir: PathBuf,
    written: u64,
}

impl FileSink {
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        let scan_dir = config.base_path.join("scans");
        fs::create_dir_all(&scan_dir)?;

        Ok(Self {
            name: name.into(),
            config,
            scan_dir,
            written: 0,
        })
    }

    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        Self::new(name, FileSinkConfig::from_params(params))
    }

    pub fn scan_dir(&self) -> &Path {
        &self.scan_dir
    }

    fn write_scan_to_disk(&self, scan: &Scan) -> std::io::Result<PathBuf> {
        let path = self.scan_dir.join(format!("{}.json", scan.cycle));
        let mut writer = BufWriter::new(File::create(&path)?);
        let encoded = if self.config.pretty {
            serde_json::to_writer_pretty(&mut writer, scan)
        } else {
            serde_json::to_writer(&mut writer, scan)
        };
        encoded.map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        writer.flush()?;
        Ok(path)
    }
}

impl ScanSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "file_sink_write", skip(self, scan), fields(sink = %self.name, cycle = scan.cycle))]
    async fn write(&mut self, scan: &Scan) -> Result<(), LidarError> {
        let path = self
            .write_scan_to_disk(scan)
            .map_err(|e| LidarError::sink_write(&self.name, e.to_string()))?;
        self.written += 1;
        debug!(path = %path.display(), "Scan written");
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), LidarError> {
        Ok(())
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), LidarError> {
        debug!(sink = %self.name, scans = self.written, dir = %self.scan_dir.display(), "FileSink closed");
        Ok(())
    }
}
