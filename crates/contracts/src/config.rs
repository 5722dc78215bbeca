//! Sensor configuration
//!
//! Serde model of the lidar config file (TOML primary, JSON accepted).
//! Structural validation lives in `config_loader`; geometry is re-checked
//! by the planner.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::{Pose, RangeBounds, ScanWindow};

/// Default per-segment camera horizontal FOV (degrees)
pub const DEFAULT_CAMERA_HFOV_DEG: f64 = 120.0;
/// Default per-segment camera vertical FOV (degrees)
pub const DEFAULT_CAMERA_VFOV_DEG: f64 = 50.0;

/// Lidar sensor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LidarConfig {
    /// Sensor name, used as the scan frame id
    #[serde(default = "default_name")]
    pub name: String,

    /// Scan cycles per second
    #[serde(default = "default_update_rate_hz")]
    pub update_rate_hz: f64,

    /// Horizontal scan window
    pub horizontal: ScanWindow,

    /// Vertical scan window (single sample = 2D scan)
    #[serde(default)]
    pub vertical: ScanWindow,

    /// Valid range envelope
    pub range: RangeBounds,

    /// Per-segment camera parameters
    #[serde(default)]
    pub camera: CameraConfig,

    /// Sensor pose relative to its parent link
    #[serde(default)]
    pub mount: Pose,

    /// Optional angle/range filters
    #[serde(default)]
    pub filter: FilterConfig,

    /// Noise transform applied after filtering
    #[serde(default)]
    pub noise: NoiseConfig,

    /// Output sinks
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

fn default_name() -> String {
    "lidar".to_string()
}

fn default_update_rate_hz() -> f64 {
    10.0
}

impl LidarConfig {
    /// Minimal config with defaults for everything but the windows
    pub fn new(horizontal: ScanWindow, vertical: ScanWindow, range: RangeBounds) -> Self {
        Self {
            name: default_name(),
            update_rate_hz: default_update_rate_hz(),
            horizontal,
            vertical,
            range,
            camera: CameraConfig::default(),
            mount: Pose::identity(),
            filter: FilterConfig::default(),
            noise: NoiseConfig::default(),
            sinks: Vec::new(),
        }
    }

    /// Cycle period, `None` when the update rate is not a positive finite number
    pub fn capture_period(&self) -> Option<Duration> {
        if self.update_rate_hz.is_finite() && self.update_rate_hz > 0.0 {
            Duration::try_from_secs_f64(1.0 / self.update_rate_hz).ok()
        } else {
            None
        }
    }
}

/// Per-segment depth camera
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    #[serde(default = "default_hfov_deg")]
    pub hfov_deg: f64,
    #[serde(default = "default_vfov_deg")]
    pub vfov_deg: f64,
}

fn default_hfov_deg() -> f64 {
    DEFAULT_CAMERA_HFOV_DEG
}

fn default_vfov_deg() -> f64 {
    DEFAULT_CAMERA_VFOV_DEG
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            hfov_deg: DEFAULT_CAMERA_HFOV_DEG,
            vfov_deg: DEFAULT_CAMERA_VFOV_DEG,
        }
    }
}

impl CameraConfig {
    pub fn hfov(&self) -> f64 {
        self.hfov_deg.to_radians()
    }

    pub fn vfov(&self) -> f64 {
        self.vfov_deg.to_radians()
    }
}

/// Filter stage configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub angle: Option<AngleFilterConfig>,
    #[serde(default)]
    pub range: Option<RangeFilterConfig>,
    /// Apply the filters to intensities as well
    #[serde(default)]
    pub apply_to_intensity: bool,
}

/// Keep only bins with `lower <= angle <= upper`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AngleFilterConfig {
    pub lower: f64,
    pub upper: f64,
    #[serde(default)]
    pub policy: AngleFilterPolicy,
}

/// What happens to bins outside the angle filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AngleFilterPolicy {
    /// Set to `0.0`
    #[default]
    Zero,
    /// Set to `NaN`
    Exclude,
}

/// Keep only returns with `min <= range <= max`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeFilterConfig {
    pub min: f64,
    pub max: f64,
    #[serde(default)]
    pub policy: RangeFilterPolicy,
}

/// What happens to returns outside the range filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeFilterPolicy {
    /// Clamp into `[min, max]`
    Clamp,
    /// Set to `NaN`
    #[default]
    Exclude,
}

/// Noise transform
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NoiseConfig {
    /// Identity transform
    #[default]
    None,
    /// Additive gaussian noise, clamped to the range envelope
    Gaussian {
        #[serde(default)]
        mean: f64,
        stddev: f64,
        /// 0 = seed from OS entropy
        #[serde(default)]
        seed: u64,
    },
}

/// Sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink name
    pub name: String,

    /// Sink type
    pub sink_type: SinkType,

    /// Queue capacity
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Type-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_queue_capacity() -> usize {
    16
}

/// Sink type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// Tracing summary per scan
    Log,
    /// One JSON document per scan
    File,
}
