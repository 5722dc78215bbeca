//! Per-sensor scan assembly: decode -> extract per segment, then
//! stitch -> filter -> noise into stable scan storage.

use contracts::{
    DepthBuffer, LidarConfig, LidarError, Scan, ScanGeometry, ScanWindow, SegmentRangeOutput,
};
use tracing::{debug, instrument};

use crate::decoder::decode;
use crate::extractor::extract;
use crate::filter::{FilterStats, ScanFilter};
use crate::noise::{noise_from_config, NoiseModel};
use crate::planner::{plan_geometry, plan_scan};
use crate::stitcher::{stitch, StitchReport};

/// Outcome of one assemble pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblyReport {
    pub stitch: StitchReport,
    pub filter: FilterStats,
    pub valid_returns: usize,
}

/// Scan assembly state for one sensor
///
/// Owns the geometry plan, the filter/noise stages and the scan buffer that
/// is overwritten every cycle.
pub struct ScanEngine {
    config: LidarConfig,
    geometry: ScanGeometry,
    filter: ScanFilter,
    noise: Box<dyn NoiseModel>,
    scan: Scan,
}

impl std::fmt::Debug for ScanEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanEngine")
            .field("geometry", &self.geometry)
            .field("filter", &self.filter)
            .field("noise", &self.noise.name())
            .finish_non_exhaustive()
    }
}

impl ScanEngine {
    /// Plan geometry and build the stages
    ///
    /// # Errors
    /// `Configuration` for any invalid window, range, camera or noise setting.
    pub fn new(config: &LidarConfig) -> Result<Self, LidarError> {
        let geometry = plan_scan(config)?;
        let noise = noise_from_config(&config.noise, config.range)?;
        Ok(Self::from_parts(config.clone(), geometry, noise))
    }

    /// Build with a custom noise model
    pub fn with_noise(
        config: &LidarConfig,
        noise: Box<dyn NoiseModel>,
    ) -> Result<Self, LidarError> {
        let geometry = plan_scan(config)?;
        Ok(Self::from_parts(config.clone(), geometry, noise))
    }

    fn from_parts(config: LidarConfig, geometry: ScanGeometry, noise: Box<dyn NoiseModel>) -> Self {
        let scan = Scan::empty(
            config.name.clone(),
            geometry.horizontal,
            geometry.vertical,
            geometry.range,
        );
        Self {
            filter: ScanFilter::new(&config.filter),
            config,
            geometry,
            noise,
            scan,
        }
    }

    pub fn geometry(&self) -> &ScanGeometry {
        &self.geometry
    }

    pub fn config(&self) -> &LidarConfig {
        &self.config
    }

    /// Current scan buffer
    pub fn scan(&self) -> &Scan {
        &self.scan
    }

    /// Mutable access for metadata (cycle, timestamp, pose, status)
    pub fn scan_mut(&mut self) -> &mut Scan {
        &mut self.scan
    }

    /// Re-plan for new scan windows and reallocate the scan buffer
    ///
    /// On error the previous geometry stays in effect.
    #[instrument(name = "scan_engine_reconfigure", skip(self))]
    pub fn reconfigure(
        &mut self,
        horizontal: ScanWindow,
        vertical: ScanWindow,
    ) -> Result<(), LidarError> {
        let geometry = plan_geometry(horizontal, vertical, self.config.range, self.config.camera)?;
        self.config.horizontal = horizontal;
        self.config.vertical = vertical;
        self.scan = Scan::empty(
            self.config.name.clone(),
            geometry.horizontal,
            geometry.vertical,
            geometry.range,
        );
        self.geometry = geometry;
        debug!(
            segments = self.geometry.segment_count(),
            scan_len = self.scan.len(),
            "Scan engine reconfigured"
        );
        Ok(())
    }

    /// Decode and extract one readback
    ///
    /// # Errors
    /// `MalformedBuffer` when the buffer does not match the segment's planned
    /// dimensions or its byte length is wrong.
    pub fn process_readback(&self, buffer: &DepthBuffer) -> Result<SegmentRangeOutput, LidarError> {
        let Some(segment) = self.geometry.segments.get(buffer.segment) else {
            return Err(LidarError::malformed_buffer(
                buffer.segment,
                0,
                buffer.data.len(),
            ));
        };
        if buffer.width != segment.buffer_width || buffer.height != segment.buffer_height {
            return Err(LidarError::malformed_buffer(
                segment.index,
                segment.buffer_len(),
                buffer.expected_len(),
            ));
        }

        let depth = decode(buffer, self.geometry.clip, self.geometry.range)?;
        extract(&depth, segment, &self.geometry)
    }

    /// Stitch, filter and add noise into the scan buffer
    #[instrument(level = "debug", name = "scan_engine_assemble", skip_all)]
    pub fn assemble<'a>(
        &mut self,
        outputs: impl IntoIterator<Item = &'a SegmentRangeOutput>,
    ) -> AssemblyReport {
        let stitch = self.merge(outputs);
        let filter = self.finalize();
        AssemblyReport {
            stitch,
            filter,
            valid_returns: self.scan.valid_returns(),
        }
    }

    /// Overwrite the scan arrays with the stitched segments
    pub fn merge<'a>(
        &mut self,
        outputs: impl IntoIterator<Item = &'a SegmentRangeOutput>,
    ) -> StitchReport {
        stitch(
            &self.geometry,
            outputs,
            &mut self.scan.ranges,
            &mut self.scan.intensities,
        )
    }

    /// Angle filter -> range filter -> noise over the merged scan
    pub fn finalize(&mut self) -> FilterStats {
        let Scan {
            ranges,
            intensities,
            horizontal,
            ..
        } = &mut self.scan;

        let stats = self.filter.apply(horizontal, ranges, intensities);
        self.noise.apply(ranges);
        stats
    }
}
