//! Scan window and published scan snapshot.
//!
//! Angles are radians, counter-clockwise positive. Scan arrays are stored
//! row-major: `index = row * horizontal.samples + column`, columns ascending
//! in angle.

use serde::{Deserialize, Serialize};

/// Angular sampling envelope for one axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanWindow {
    /// Number of samples along the axis
    pub samples: u32,
    /// First sample angle (radians)
    pub angle_min: f64,
    /// Last sample angle (radians)
    pub angle_max: f64,
}

impl ScanWindow {
    pub fn new(samples: u32, angle_min: f64, angle_max: f64) -> Self {
        Self {
            samples,
            angle_min,
            angle_max,
        }
    }

    /// Single sample at zero elevation, used for 2D scans
    pub fn planar() -> Self {
        Self::new(1, 0.0, 0.0)
    }

    /// `(angle_max - angle_min) / max(samples - 1, 1)`
    pub fn angle_step(&self) -> f64 {
        let intervals = self.samples.saturating_sub(1).max(1);
        (self.angle_max - self.angle_min) / f64::from(intervals)
    }

    /// Angular extent covered by the window
    pub fn span(&self) -> f64 {
        self.angle_max - self.angle_min
    }

    /// Angle of sample `index`
    pub fn angle_at(&self, index: usize) -> f64 {
        self.angle_min + index as f64 * self.angle_step()
    }

    pub fn is_single_sample(&self) -> bool {
        self.samples == 1
    }
}

impl Default for ScanWindow {
    fn default() -> Self {
        Self::planar()
    }
}

/// Valid range envelope (meters)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeBounds {
    pub min: f64,
    pub max: f64,
}

impl RangeBounds {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

/// Rigid pose: position (meters) + orientation quaternion `[x, y, z, w]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: [f64; 3],
    pub orientation: [f64; 4],
}

impl Pose {
    pub fn identity() -> Self {
        Self {
            position: [0.0; 3],
            orientation: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

/// Outcome of the cycle that produced a snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    /// No cycle has completed yet
    #[default]
    Pending,
    /// Every segment contributed
    Complete,
    /// Deadline missed or segments dropped; missing bins are `NaN`
    Degraded,
}

/// Published range scan
///
/// Consumers receive it as `Arc<Scan>` and must treat it as read-only.
/// `NaN` marks bins with no data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scan {
    /// Sensor name
    pub frame_id: String,
    /// Cycle counter, starts at 1 for the first published cycle
    pub cycle: u64,
    /// Capture timestamp (simulation seconds)
    pub timestamp: f64,
    /// Sensor pose in the world frame
    pub pose: Pose,
    pub horizontal: ScanWindow,
    pub vertical: ScanWindow,
    pub range: RangeBounds,
    pub ranges: Vec<f64>,
    pub intensities: Vec<f64>,
    pub status: CycleStatus,
}

impl Scan {
    /// Allocate a scan with every bin set to `NaN`
    pub fn empty(
        frame_id: impl Into<String>,
        horizontal: ScanWindow,
        vertical: ScanWindow,
        range: RangeBounds,
    ) -> Self {
        let len = horizontal.samples as usize * vertical.samples.max(1) as usize;
        Self {
            frame_id: frame_id.into(),
            cycle: 0,
            timestamp: 0.0,
            pose: Pose::identity(),
            horizontal,
            vertical,
            range,
            ranges: vec![f64::NAN; len],
            intensities: vec![f64::NAN; len],
            status: CycleStatus::Pending,
        }
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Ranges of one vertical row
    pub fn row(&self, row: usize) -> &[f64] {
        let width = self.horizontal.samples as usize;
        &self.ranges[row * width..(row + 1) * width]
    }

    /// Number of bins holding a return
    pub fn valid_returns(&self) -> usize {
        self.ranges.iter().filter(|r| !r.is_nan()).count()
    }

    /// Reset every bin to `NaN` without reallocating
    pub fn clear(&mut self) {
        self.ranges.fill(f64::NAN);
        self.intensities.fill(f64::NAN);
    }

    /// Overwrite this scan with `other`, reusing allocations when sizes match
    pub fn copy_from(&mut self, other: &Scan) {
        if self.ranges.len() == other.ranges.len() {
            self.ranges.copy_from_slice(&other.ranges);
            self.intensities.copy_from_slice(&other.intensities);
        } else {
            self.ranges.clone_from(&other.ranges);
            self.intensities.clone_from(&other.intensities);
        }
        self.frame_id.clone_from(&other.frame_id);
        self.cycle = other.cycle;
        self.timestamp = other.timestamp;
        self.pose = other.pose;
        self.horizontal = other.horizontal;
        self.vertical = other.vertical;
        self.range = other.range;
        self.status = other.status;
    }
}
