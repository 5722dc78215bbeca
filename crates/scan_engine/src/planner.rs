//! Scan geometry planner.
//!
//! Splits the full circle into the minimum number of fixed-FOV camera
//! segments and derives each segment's angles, buffer size and the shared
//! clip planes. Pure; every invalid input is a `Configuration` error.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use contracts::{
    CameraConfig, ClipPlanes, LidarConfig, LidarError, RangeBounds, ScanGeometry, ScanWindow,
    SegmentGeometry,
};
use tracing::{debug, instrument};

/// Tolerance for angle comparisons and ceil() of near-integral ratios
pub(crate) const ANGLE_EPSILON: f64 = 1e-9;

/// Near clip never collapses to zero (depth linearization divides by it)
const MIN_NEAR_CLIP: f64 = 1e-3;

/// Plan the geometry for a sensor config
pub fn plan_scan(config: &LidarConfig) -> Result<ScanGeometry, LidarError> {
    plan_geometry(
        config.horizontal,
        config.vertical,
        config.range,
        config.camera,
    )
}

/// Derive segment count, per-segment geometry and clip planes
#[instrument(
    level = "debug",
    name = "planner_plan_geometry",
    skip_all,
    fields(samples_h = horizontal.samples, samples_v = vertical.samples)
)]
pub fn plan_geometry(
    horizontal: ScanWindow,
    vertical: ScanWindow,
    range: RangeBounds,
    camera: CameraConfig,
) -> Result<ScanGeometry, LidarError> {
    let hfov = camera.hfov();
    let vfov = camera.vfov();

    validate_camera(hfov, vfov)?;
    validate_horizontal(&horizontal)?;
    validate_vertical(&vertical, vfov)?;
    validate_range(&range)?;

    let res_h = horizontal.angle_step();
    let (res_v, buffer_height) = if vertical.is_single_sample() {
        (0.0, 1)
    } else {
        let res_v = vertical.angle_step();
        (res_v, ceil_count(vfov / res_v))
    };
    let buffer_width = ceil_count(hfov / res_h);

    if vertical.samples as usize > buffer_height {
        return Err(LidarError::configuration(
            "vertical.samples",
            format!(
                "{} rows do not fit in a {}-row segment buffer",
                vertical.samples, buffer_height
            ),
        ));
    }

    let segment_count = segment_count(hfov);
    let center_offset = if horizontal.angle_min < 0.0 {
        0.0
    } else {
        hfov / 2.0
    };

    let segments = (0..segment_count)
        .map(|index| {
            let center_angle = hfov * index as f64 + center_offset;
            SegmentGeometry {
                index,
                center_angle,
                start_angle: center_angle - hfov / 2.0,
                end_angle: center_angle + hfov / 2.0,
                total_angular_span: hfov,
                vertical_span: vfov,
                buffer_width,
                buffer_height,
                angular_resolution_h: res_h,
                angular_resolution_v: res_v,
            }
        })
        .collect();

    let clip = ClipPlanes {
        near: (range.min * (FRAC_PI_2 - hfov / 2.0).sin()).max(MIN_NEAR_CLIP),
        far: range.max,
    };

    debug!(
        segments = segment_count,
        buffer_width,
        buffer_height,
        near = clip.near,
        far = clip.far,
        "Scan geometry planned"
    );

    Ok(ScanGeometry {
        horizontal,
        vertical,
        range,
        clip,
        hfov,
        vfov,
        segments,
    })
}

/// `ceil(360deg / hfov)`
pub fn segment_count(hfov: f64) -> usize {
    ceil_count(TAU / hfov)
}

/// `ceil` that ignores floating noise just above an integer, at least 1
fn ceil_count(ratio: f64) -> usize {
    let tolerance = ANGLE_EPSILON * ratio.abs().max(1.0);
    ((ratio - tolerance).ceil() as usize).max(1)
}

fn validate_camera(hfov: f64, vfov: f64) -> Result<(), LidarError> {
    if !(hfov.is_finite() && hfov > 0.0 && hfov < PI) {
        return Err(LidarError::configuration(
            "camera.hfov_deg",
            "must be in (0, 180) degrees",
        ));
    }
    if !(vfov.is_finite() && vfov > 0.0 && vfov < PI) {
        return Err(LidarError::configuration(
            "camera.vfov_deg",
            "must be in (0, 180) degrees",
        ));
    }
    Ok(())
}

fn validate_horizontal(window: &ScanWindow) -> Result<(), LidarError> {
    if window.samples < 2 {
        return Err(LidarError::configuration(
            "horizontal.samples",
            format!("must be >= 2, got {}", window.samples),
        ));
    }
    if !(window.angle_min.is_finite() && window.angle_max.is_finite()) {
        return Err(LidarError::configuration(
            "horizontal",
            "angles must be finite",
        ));
    }
    if window.angle_min >= window.angle_max {
        return Err(LidarError::configuration(
            "horizontal",
            format!(
                "angle_min ({}) must be < angle_max ({})",
                window.angle_min, window.angle_max
            ),
        ));
    }
    if window.angle_min < -PI - ANGLE_EPSILON || window.angle_max > TAU + ANGLE_EPSILON {
        return Err(LidarError::configuration(
            "horizontal",
            "angles must lie within [-pi, 2pi]",
        ));
    }
    if window.span() > TAU + ANGLE_EPSILON {
        return Err(LidarError::configuration(
            "horizontal",
            "window must not span more than 2pi",
        ));
    }
    Ok(())
}

fn validate_vertical(window: &ScanWindow, vfov: f64) -> Result<(), LidarError> {
    if window.samples == 0 {
        return Err(LidarError::configuration(
            "vertical.samples",
            "must be >= 1",
        ));
    }
    if !(window.angle_min.is_finite() && window.angle_max.is_finite()) {
        return Err(LidarError::configuration("vertical", "angles must be finite"));
    }
    if window.is_single_sample() {
        // A one-row buffer only sees the optical plane
        if window.angle_min.abs() > ANGLE_EPSILON || window.angle_max.abs() > ANGLE_EPSILON {
            return Err(LidarError::configuration(
                "vertical",
                "a single-sample window must sit at elevation 0",
            ));
        }
        return Ok(());
    }
    if window.angle_min >= window.angle_max {
        return Err(LidarError::configuration(
            "vertical",
            format!(
                "angle_min ({}) must be < angle_max ({})",
                window.angle_min, window.angle_max
            ),
        ));
    }
    let half = vfov / 2.0;
    if window.angle_min <= -half || window.angle_max >= half {
        return Err(LidarError::configuration(
            "vertical",
            format!("window must lie strictly inside +/-{half:.4} rad"),
        ));
    }
    Ok(())
}

fn validate_range(range: &RangeBounds) -> Result<(), LidarError> {
    if !(range.min.is_finite() && range.max.is_finite()) {
        return Err(LidarError::configuration("range", "bounds must be finite"));
    }
    if range.min < 0.0 {
        return Err(LidarError::configuration(
            "range.min",
            format!("must be >= 0, got {}", range.min),
        ));
    }
    if range.min >= range.max {
        return Err(LidarError::configuration(
            "range",
            format!("min ({}) must be < max ({})", range.min, range.max),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera(hfov_deg: f64) -> CameraConfig {
        CameraConfig {
            hfov_deg,
            vfov_deg: 50.0,
        }
    }

    fn full_circle(samples: u32) -> ScanWindow {
        ScanWindow::new(samples, -PI, PI)
    }

    fn range() -> RangeBounds {
        RangeBounds::new(0.1, 30.0)
    }

    fn wrap(angle: f64) -> f64 {
        angle.rem_euclid(TAU)
    }

    #[test]
    fn test_segment_count_for_default_camera() {
        let geometry =
            plan_geometry(full_circle(361), ScanWindow::planar(), range(), camera(120.0)).unwrap();
        assert_eq!(geometry.segment_count(), 3);
        assert_eq!(segment_count(200f64.to_radians()), 2);
        assert_eq!(segment_count(100f64.to_radians()), 4);
    }

    #[test]
    fn test_symmetric_window_centers_start_at_zero() {
        let geometry =
            plan_geometry(full_circle(361), ScanWindow::planar(), range(), camera(120.0)).unwrap();
        let centers: Vec<f64> = geometry
            .segments
            .iter()
            .map(|s| s.center_angle.to_degrees())
            .collect();
        assert!((centers[0] - 0.0).abs() < 1e-9);
        assert!((centers[1] - 120.0).abs() < 1e-9);
        assert!((centers[2] - 240.0).abs() < 1e-9);
    }

    #[test]
    fn test_forward_window_centers_offset_by_half_fov() {
        let window = ScanWindow::new(91, 0.0, 90f64.to_radians());
        let geometry = plan_geometry(window, ScanWindow::planar(), range(), camera(120.0)).unwrap();
        let first = &geometry.segments[0];
        assert!((first.center_angle.to_degrees() - 60.0).abs() < 1e-9);
        assert!(first.start_angle.abs() < 1e-12);
    }

    #[test]
    fn test_buffer_dimensions() {
        let vertical = ScanWindow::new(16, -15f64.to_radians(), 15f64.to_radians());
        let geometry = plan_geometry(full_circle(361), vertical, range(), camera(120.0)).unwrap();
        let segment = &geometry.segments[0];
        // 1 degree horizontal, 2 degree vertical
        assert_eq!(segment.buffer_width, 120);
        assert_eq!(segment.buffer_height, 25);
        assert_eq!(segment.buffer_len(), 120 * 25 * 4);

        let planar =
            plan_geometry(full_circle(361), ScanWindow::planar(), range(), camera(120.0)).unwrap();
        assert_eq!(planar.segments[0].buffer_height, 1);
        assert_eq!(planar.segments[0].angular_resolution_v, 0.0);
    }

    #[test]
    fn test_clip_planes() {
        let geometry =
            plan_geometry(full_circle(361), ScanWindow::planar(), range(), camera(120.0)).unwrap();
        // sin(90 - 60) = 0.5
        assert!((geometry.clip.near - 0.05).abs() < 1e-12);
        assert_eq!(geometry.clip.far, 30.0);

        let zero_min = RangeBounds::new(0.0, 10.0);
        let geometry =
            plan_geometry(full_circle(361), ScanWindow::planar(), zero_min, camera(120.0))
                .unwrap();
        assert!(geometry.clip.near > 0.0);
    }

    #[test]
    fn test_segments_cover_window_without_gap() {
        for (samples, min, max, hfov) in [
            (360u32, -PI, PI, 120.0),
            (720, -PI, PI, 90.0),
            (181, -PI / 2.0, PI / 2.0, 120.0),
            (100, 0.0, 300f64.to_radians(), 100.0),
            (360, 0.0, TAU, 170.0),
        ] {
            let window = ScanWindow::new(samples, min, max);
            let geometry = plan_geometry(window, ScanWindow::planar(), range(), camera(hfov))
                .unwrap();
            assert!(geometry.segment_count() >= (360.0 / hfov).ceil() as usize);

            for i in 0..samples as usize {
                let angle = wrap(window.angle_at(i));
                let covered = geometry.segments.iter().any(|s| {
                    let offset = wrap(angle - s.start_angle);
                    offset <= s.total_angular_span + 1e-9 || offset >= TAU - 1e-9
                });
                assert!(covered, "angle {} not covered", angle.to_degrees());
            }
        }
    }

    #[test]
    fn test_rejects_invalid_windows() {
        let planar = ScanWindow::planar();
        let cases = [
            ScanWindow::new(0, -1.0, 1.0),
            ScanWindow::new(1, -1.0, 1.0),
            ScanWindow::new(10, 1.0, -1.0),
            ScanWindow::new(10, 1.0, 1.0),
            ScanWindow::new(10, -4.0, 1.0),
            ScanWindow::new(10, -PI, 2.0 * TAU),
            ScanWindow::new(10, f64::NAN, 1.0),
        ];
        for window in cases {
            let err = plan_geometry(window, planar, range(), camera(120.0)).unwrap_err();
            assert!(err.is_fatal(), "{window:?} accepted");
        }
    }

    #[test]
    fn test_rejects_invalid_vertical_and_range() {
        let h = full_circle(360);
        assert!(plan_geometry(h, ScanWindow::new(1, 0.1, 0.1), range(), camera(120.0)).is_err());
        assert!(plan_geometry(h, ScanWindow::new(4, 0.2, -0.2), range(), camera(120.0)).is_err());
        // outside the 50 degree vertical FOV
        assert!(plan_geometry(h, ScanWindow::new(4, -0.6, 0.6), range(), camera(120.0)).is_err());
        assert!(plan_geometry(h, ScanWindow::planar(), RangeBounds::new(5.0, 1.0), camera(120.0))
            .is_err());
        assert!(plan_geometry(h, ScanWindow::planar(), RangeBounds::new(-1.0, 1.0), camera(120.0))
            .is_err());
        assert!(plan_geometry(h, ScanWindow::planar(), range(), camera(180.0)).is_err());
        assert!(plan_geometry(h, ScanWindow::planar(), range(), camera(0.0)).is_err());
    }
}
