//! Angle and range filters, applied in that order to the stitched scan.

use contracts::{
    AngleFilterConfig, AngleFilterPolicy, FilterConfig, RangeFilterConfig, RangeFilterPolicy,
    ScanWindow,
};
use tracing::instrument;

use crate::planner::ANGLE_EPSILON;

/// Bins touched by one filter pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub angle_filtered: usize,
    pub range_clamped: usize,
    pub range_excluded: usize,
}

/// Configured filter stage
#[derive(Debug, Clone, Default)]
pub struct ScanFilter {
    angle: Option<AngleFilterConfig>,
    range: Option<RangeFilterConfig>,
    apply_to_intensity: bool,
}

impl ScanFilter {
    pub fn new(config: &FilterConfig) -> Self {
        Self {
            angle: config.angle,
            range: config.range,
            apply_to_intensity: config.apply_to_intensity,
        }
    }

    /// True when neither filter is configured
    pub fn is_passthrough(&self) -> bool {
        self.angle.is_none() && self.range.is_none()
    }

    /// Filter `ranges`/`intensities` in place
    ///
    /// Bins removed by the angle filter are left alone by the range filter,
    /// so a zeroed bin stays zero.
    #[instrument(level = "trace", name = "filter_apply", skip_all)]
    pub fn apply(
        &self,
        horizontal: &ScanWindow,
        ranges: &mut [f64],
        intensities: &mut [f64],
    ) -> FilterStats {
        let mut stats = FilterStats::default();
        if self.is_passthrough() {
            return stats;
        }

        let samples = horizontal.samples as usize;
        let kept: Vec<bool> = (0..samples)
            .map(|i| match &self.angle {
                Some(filter) => {
                    let angle = horizontal.angle_at(i);
                    angle >= filter.lower - ANGLE_EPSILON
                        && angle <= filter.upper + ANGLE_EPSILON
                }
                None => true,
            })
            .collect();

        for (row_ranges, row_intensities) in ranges
            .chunks_mut(samples)
            .zip(intensities.chunks_mut(samples))
        {
            for (column, keep) in kept.iter().enumerate() {
                if !keep {
                    if let Some(filter) = &self.angle {
                        let value = match filter.policy {
                            AngleFilterPolicy::Zero => 0.0,
                            AngleFilterPolicy::Exclude => f64::NAN,
                        };
                        row_ranges[column] = value;
                        if self.apply_to_intensity {
                            row_intensities[column] = value;
                        }
                        stats.angle_filtered += 1;
                    }
                    continue;
                }

                let Some(filter) = &self.range else { continue };
                let range = row_ranges[column];
                if range.is_nan() || (range >= filter.min && range <= filter.max) {
                    continue;
                }
                match filter.policy {
                    RangeFilterPolicy::Clamp => {
                        row_ranges[column] = range.clamp(filter.min, filter.max);
                        stats.range_clamped += 1;
                    }
                    RangeFilterPolicy::Exclude => {
                        row_ranges[column] = f64::NAN;
                        if self.apply_to_intensity {
                            row_intensities[column] = f64::NAN;
                        }
                        stats.range_excluded += 1;
                    }
                }
            }
        }

        stats
    }
}
