//! Config validation
//!
//! Rules:
//! - update rate positive and finite
//! - scan windows well-formed (horizontal span <= 2pi, vertical inside the camera VFOV)
//! - range bounds ordered and non-negative
//! - camera FOVs strictly between 0 and 180 degrees
//! - filter bounds ordered, noise parameters sane
//! - mount quaternion non-zero
//! - sink names present and unique

use std::collections::HashSet;
use std::f64::consts::{PI, TAU};

use contracts::{LidarConfig, LidarError, NoiseConfig, ScanWindow};

const ANGLE_TOLERANCE: f64 = 1e-9;

/// Validate a parsed config
///
/// Returns the first error found.
pub fn validate(config: &LidarConfig) -> Result<(), LidarError> {
    validate_update_rate(config)?;
    validate_camera(config)?;
    validate_horizontal(&config.horizontal)?;
    validate_vertical(&config.vertical, config.camera.vfov())?;
    validate_range(config)?;
    validate_filter(config)?;
    validate_noise(&config.noise)?;
    validate_mount(config)?;
    validate_sinks(config)?;
    Ok(())
}

fn validate_update_rate(config: &LidarConfig) -> Result<(), LidarError> {
    if config.capture_period().is_none() {
        return Err(LidarError::configuration(
            "update_rate_hz",
            format!("must be > 0 and finite, got {}", config.update_rate_hz),
        ));
    }
    Ok(())
}

fn validate_camera(config: &LidarConfig) -> Result<(), LidarError> {
    for (field, value) in [
        ("camera.hfov_deg", config.camera.hfov_deg),
        ("camera.vfov_deg", config.camera.vfov_deg),
    ] {
        if !(value > 0.0 && value < 180.0) {
            return Err(LidarError::configuration(
                field,
                format!("must be in (0, 180), got {value}"),
            ));
        }
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
    if !window.angle_min.is_finite() || !window.angle_max.is_finite() {
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
    if window.angle_min < -PI - ANGLE_TOLERANCE {
        return Err(LidarError::configuration(
            "horizontal.angle_min",
            format!("must be >= -pi, got {}", window.angle_min),
        ));
    }
    if window.angle_max > TAU + ANGLE_TOLERANCE {
        return Err(LidarError::configuration(
            "horizontal.angle_max",
            format!("must be <= 2pi, got {}", window.angle_max),
        ));
    }
    if window.span() > TAU + ANGLE_TOLERANCE {
        return Err(LidarError::configuration(
            "horizontal",
            format!("span {} exceeds a full revolution", window.span()),
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
    if window.samples == 1 {
        if window.angle_min.abs() > ANGLE_TOLERANCE || window.angle_max.abs() > ANGLE_TOLERANCE {
            return Err(LidarError::configuration(
                "vertical",
                "a single-sample vertical window must be at elevation 0",
            ));
        }
        return Ok(());
    }
    if !(window.angle_min < window.angle_max) {
        return Err(LidarError::configuration(
            "vertical",
            format!(
                "angle_min ({}) must be < angle_max ({})",
                window.angle_min, window.angle_max
            ),
        ));
    }
    let half = vfov * 0.5;
    if window.angle_min <= -half || window.angle_max >= half {
        return Err(LidarError::configuration(
            "vertical",
            format!(
                "window [{}, {}] must lie strictly inside the camera VFOV (+/-{half})",
                window.angle_min, window.angle_max
            ),
        ));
    }
    Ok(())
}

fn validate_range(config: &LidarConfig) -> Result<(), LidarError> {
    let range = config.range;
    if !range.min.is_finite() || !range.max.is_finite() {
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

fn validate_filter(config: &LidarConfig) -> Result<(), LidarError> {
    if let Some(angle) = &config.filter.angle {
        if !(angle.lower < angle.upper) {
            return Err(LidarError::configuration(
                "filter.angle",
                format!("lower ({}) must be < upper ({})", angle.lower, angle.upper),
            ));
        }
    }
    if let Some(range) = &config.filter.range {
        if !(range.min >= 0.0 && range.min < range.max) {
            return Err(LidarError::configuration(
                "filter.range",
                format!("expected 0 <= min < max, got [{}, {}]", range.min, range.max),
            ));
        }
    }
    Ok(())
}

fn validate_noise(noise: &NoiseConfig) -> Result<(), LidarError> {
    if let NoiseConfig::Gaussian { mean, stddev, .. } = *noise {
        if !mean.is_finite() {
            return Err(LidarError::configuration(
                "noise.mean",
                format!("must be finite, got {mean}"),
            ));
        }
        if !(stddev >= 0.0 && stddev.is_finite()) {
            return Err(LidarError::configuration(
                "noise.stddev",
                format!("must be >= 0, got {stddev}"),
            ));
        }
    }
    Ok(())
}

fn validate_mount(config: &LidarConfig) -> Result<(), LidarError> {
    let q = config.mount.orientation;
    let norm_sq: f64 = q.iter().map(|c| c * c).sum();
    if !norm_sq.is_finite() || norm_sq < 1e-12 {
        return Err(LidarError::configuration(
            "mount.orientation",
            "quaternion must be non-zero and finite",
        ));
    }
    if config.mount.position.iter().any(|c| !c.is_finite()) {
        return Err(LidarError::configuration(
            "mount.position",
            "must be finite",
        ));
    }
    Ok(())
}

fn validate_sinks(config: &LidarConfig) -> Result<(), LidarError> {
    let mut seen = HashSet::new();
    for (i, sink) in config.sinks.iter().enumerate() {
        if sink.name.trim().is_empty() {
            return Err(LidarError::configuration(
                format!("sinks[{i}].name"),
                "sink name must not be empty",
            ));
        }
        if !seen.insert(sink.name.as_str()) {
            return Err(LidarError::configuration(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }
        if sink.queue_capacity == 0 {
            return Err(LidarError::configuration(
                format!("sinks[{}].queue_capacity", sink.name),
                "must be >= 1",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{AngleFilterConfig, RangeBounds, SinkConfig, SinkType};
    use std::collections::HashMap;

    fn make_config() -> LidarConfig {
        LidarConfig::new(
            ScanWindow::new(360, -PI, PI),
            ScanWindow::planar(),
            RangeBounds::new(0.1, 30.0),
        )
    }

    fn make_sink(name: &str) -> SinkConfig {
        SinkConfig {
            name: name.to_string(),
            sink_type: SinkType::Log,
            queue_capacity: 4,
            params: HashMap::new(),
        }
    }

    fn field_of(err: LidarError) -> String {
        match err {
            LidarError::Configuration { field, .. } => field,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&make_config()).is_ok());
    }

    #[test]
    fn test_zero_update_rate() {
        let mut config = make_config();
        config.update_rate_hz = 0.0;
        assert_eq!(field_of(validate(&config).unwrap_err()), "update_rate_hz");
    }

    #[test]
    fn test_horizontal_rules() {
        let mut config = make_config();
        config.horizontal = ScanWindow::new(1, 0.0, 0.0);
        assert_eq!(field_of(validate(&config).unwrap_err()), "horizontal.samples");

        config.horizontal = ScanWindow::new(10, 1.0, -1.0);
        assert_eq!(field_of(validate(&config).unwrap_err()), "horizontal");

        config.horizontal = ScanWindow::new(10, -4.0, 0.0);
        assert_eq!(field_of(validate(&config).unwrap_err()), "horizontal.angle_min");

        config.horizontal = ScanWindow::new(10, -PI, PI + 0.5);
        assert_eq!(field_of(validate(&config).unwrap_err()), "horizontal");

        // Forward-only windows up to 2pi are allowed
        config.horizontal = ScanWindow::new(10, 0.0, TAU);
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_vertical_rules() {
        let mut config = make_config();
        config.vertical = ScanWindow::new(1, 0.1, 0.1);
        assert_eq!(field_of(validate(&config).unwrap_err()), "vertical");

        // vfov 50 deg -> half ~0.436 rad
        config.vertical = ScanWindow::new(16, -0.5, 0.2);
        assert_eq!(field_of(validate(&config).unwrap_err()), "vertical");

        config.vertical = ScanWindow::new(16, -0.3, 0.3);
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_range_rules() {
        let mut config = make_config();
        config.range = RangeBounds::new(5.0, 1.0);
        assert_eq!(field_of(validate(&config).unwrap_err()), "range");

        config.range = RangeBounds::new(-1.0, 1.0);
        assert_eq!(field_of(validate(&config).unwrap_err()), "range.min");
    }

    #[test]
    fn test_camera_rules() {
        let mut config = make_config();
        config.camera.hfov_deg = 180.0;
        assert_eq!(field_of(validate(&config).unwrap_err()), "camera.hfov_deg");
    }

    #[test]
    fn test_filter_rules() {
        let mut config = make_config();
        config.filter.angle = Some(AngleFilterConfig {
            lower: 1.0,
            upper: -1.0,
            policy: Default::default(),
        });
        assert_eq!(field_of(validate(&config).unwrap_err()), "filter.angle");
    }

    #[test]
    fn test_noise_rules() {
        let mut config = make_config();
        config.noise = NoiseConfig::Gaussian {
            mean: 0.0,
            stddev: -0.1,
            seed: 0,
        };
        assert_eq!(field_of(validate(&config).unwrap_err()), "noise.stddev");
    }

    #[test]
    fn test_zero_quaternion() {
        let mut config = make_config();
        config.mount.orientation = [0.0; 4];
        assert_eq!(field_of(validate(&config).unwrap_err()), "mount.orientation");
    }

    #[test]
    fn test_duplicate_sink() {
        let mut config = make_config();
        config.sinks = vec![make_sink("a"), make_sink("a")];
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("duplicate"));

        config.sinks = vec![make_sink("")];
        assert_eq!(field_of(validate(&config).unwrap_err()), "sinks[0].name");
    }
}
