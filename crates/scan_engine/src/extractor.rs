//! Polar range extractor.
//!
//! Maps one segment's linear depth image onto angle bins. Bin `k` of row `j`
//! looks along yaw `h = -hfov/2 + k * res_h` and elevation
//! `v = vertical.angle_min + j * res_v` relative to the optical axis; the
//! pixel hit by that ray gives the planar depth `z`, and the radial range is
//! `z / (cos h * cos v)`.

use contracts::{LidarError, ScanGeometry, SegmentGeometry, SegmentRangeOutput};
use rayon::prelude::*;
use tracing::instrument;

/// Lookup data for one output column
#[derive(Debug, Clone, Copy)]
struct ColumnRay {
    pixel: usize,
    cos_h: f64,
}

/// Lookup data for one output row
#[derive(Debug, Clone, Copy)]
struct RowRay {
    tan_v: f64,
    cos_v: f64,
}

/// Extract per-bin ranges and intensities from a decoded depth array
#[instrument(
    level = "trace",
    name = "extractor_extract",
    skip(depth, segment, geometry),
    fields(segment = segment.index)
)]
pub fn extract(
    depth: &[f64],
    segment: &SegmentGeometry,
    geometry: &ScanGeometry,
) -> Result<SegmentRangeOutput, LidarError> {
    let width = segment.buffer_width;
    let height = segment.buffer_height;
    let expected = width * height;
    if depth.len() != expected {
        return Err(LidarError::malformed_buffer(
            segment.index,
            expected,
            depth.len(),
        ));
    }

    let columns = column_rays(segment);
    let rows = row_rays(segment, geometry);
    let tan_half_vfov = (segment.vertical_span / 2.0).tan();
    let far = geometry.clip.far;
    let range = geometry.range;
    let span = range.max - range.min;

    let (ranges, intensities): (Vec<f64>, Vec<f64>) = (0..expected)
        .into_par_iter()
        .map(|bin| {
            let column = columns[bin % width];
            let row = rows[bin / width];

            let pixel_row = if height == 1 {
                0
            } else {
                let y = row.tan_v / (column.cos_h * tan_half_vfov);
                if !(-1.0..=1.0).contains(&y) {
                    return (f64::NAN, f64::NAN);
                }
                pixel_index(y, height)
            };

            let z = depth[pixel_row * width + column.pixel];
            if z.is_nan() || z >= far {
                return (f64::NAN, f64::NAN);
            }

            let radial = z / (column.cos_h * row.cos_v);
            if !range.contains(radial) {
                return (f64::NAN, f64::NAN);
            }
            (radial, 1.0 - (radial - range.min) / span)
        })
        .unzip();

    Ok(SegmentRangeOutput {
        segment: segment.index,
        width,
        height,
        ranges,
        intensities,
    })
}

fn column_rays(segment: &SegmentGeometry) -> Vec<ColumnRay> {
    let half = segment.total_angular_span / 2.0;
    let tan_half = half.tan();
    (0..segment.buffer_width)
        .map(|k| {
            let h = -half + k as f64 * segment.angular_resolution_h;
            ColumnRay {
                pixel: pixel_index(h.tan() / tan_half, segment.buffer_width),
                cos_h: h.cos(),
            }
        })
        .collect()
}

fn row_rays(segment: &SegmentGeometry, geometry: &ScanGeometry) -> Vec<RowRay> {
    (0..segment.buffer_height)
        .map(|j| {
            let v = if segment.buffer_height == 1 {
                0.0
            } else {
                geometry.vertical.angle_min + j as f64 * segment.angular_resolution_v
            };
            RowRay {
                tan_v: v.tan(),
                cos_v: v.cos(),
            }
        })
        .collect()
}

/// Normalized image coordinate in `[-1, 1]` -> pixel index
#[inline]
fn pixel_index(ndc: f64, size: usize) -> usize {
    let scaled = ((ndc + 1.0) / 2.0 * size as f64).floor();
    (scaled.max(0.0) as usize).min(size - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::plan_geometry;
    use contracts::{CameraConfig, RangeBounds, ScanWindow};
    use std::f64::consts::PI;

    fn planar_geometry() -> ScanGeometry {
        plan_geometry(
            ScanWindow::new(361, -PI, PI),
            ScanWindow::planar(),
            RangeBounds::new(0.1, 30.0),
            CameraConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_center_bin_equals_depth() {
        let geometry = planar_geometry();
        let segment = &geometry.segments[0];
        let depth = vec![4.0; segment.pixel_count()];

        let output = extract(&depth, segment, &geometry).unwrap();
        // 1 degree bins over 120 degrees: bin 60 sits on the optical axis
        let center = output.ranges[60];
        assert!((center - 4.0).abs() < 1e-9, "center = {center}");
    }

    #[test]
    fn test_off_axis_bins_are_reprojected() {
        let geometry = planar_geometry();
        let segment = &geometry.segments[0];
        let depth = vec![4.0; segment.pixel_count()];

        let output = extract(&depth, segment, &geometry).unwrap();
        // flat wall at planar distance 4: range grows as 1 / cos(h)
        for k in [0usize, 20, 100, 119] {
            let h = (-60.0 + k as f64).to_radians();
            let expected = 4.0 / h.cos();
            assert!((output.ranges[k] - expected).abs() < 1e-9);
        }
        // closer returns are brighter
        assert!(output.intensities[60] > output.intensities[0]);
        assert!(output.intensities.iter().all(|i| (0.0..=1.0).contains(i)));
    }

    #[test]
    fn test_no_hit_is_nan() {
        let geometry = planar_geometry();
        let segment = &geometry.segments[1];
        let depth = vec![geometry.clip.far; segment.pixel_count()];

        let output = extract(&depth, segment, &geometry).unwrap();
        assert!(output.ranges.iter().all(|r| r.is_nan()));
        assert!(output.intensities.iter().all(|i| i.is_nan()));
    }

    #[test]
    fn test_out_of_range_returns_are_nan() {
        let geometry = planar_geometry();
        let segment = &geometry.segments[0];
        // planar 29.5m wall: edges reproject beyond 30m
        let depth = vec![29.5; segment.pixel_count()];

        let output = extract(&depth, segment, &geometry).unwrap();
        assert!(!output.ranges[60].is_nan());
        assert!(output.ranges[0].is_nan());
    }

    #[test]
    fn test_multi_row_uses_elevation() {
        let geometry = plan_geometry(
            ScanWindow::new(361, -PI, PI),
            ScanWindow::new(5, -10f64.to_radians(), 10f64.to_radians()),
            RangeBounds::new(0.1, 30.0),
            CameraConfig::default(),
        )
        .unwrap();
        let segment = &geometry.segments[0];
        let depth = vec![5.0; segment.pixel_count()];

        let output = extract(&depth, segment, &geometry).unwrap();
        assert_eq!(output.height, segment.buffer_height);
        let width = output.width;
        // row 0 looks 10 degrees down, row 2 is level
        let level = output.ranges[2 * width + 60];
        let down = output.ranges[60];
        assert!((level - 5.0).abs() < 1e-9);
        assert!((down - 5.0 / 10f64.to_radians().cos()).abs() < 1e-9);
    }

    #[test]
    fn test_extract_rejects_wrong_length() {
        let geometry = planar_geometry();
        let segment = &geometry.segments[0];
        let err = extract(&[1.0; 3], segment, &geometry).unwrap_err();
        assert!(matches!(err, LidarError::MalformedBuffer { .. }));
    }

    #[test]
    fn test_extract_is_deterministic() {
        let geometry = planar_geometry();
        let segment = &geometry.segments[2];
        let depth: Vec<f64> = (0..segment.pixel_count())
            .map(|i| 1.0 + (i % 17) as f64)
            .collect();
        let a = extract(&depth, segment, &geometry).unwrap();
        let b = extract(&depth, segment, &geometry).unwrap();
        assert_eq!(
            a.ranges.iter().map(|r| r.to_bits()).collect::<Vec<_>>(),
            b.ranges.iter().map(|r| r.to_bits()).collect::<Vec<_>>()
        );
    }
}
