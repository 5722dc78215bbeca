//! Per-segment camera geometry and the buffers flowing through one cycle.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{RangeBounds, ScanWindow};

/// Bytes per encoded depth pixel (RGBA)
pub const DEPTH_PIXEL_BYTES: usize = 4;

/// Geometry of one fixed-FOV camera segment
///
/// Derived once from the scan window and camera field of view. Angles are
/// raw (not normalized into `[-pi, pi)`); the stitcher handles wraparound.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentGeometry {
    /// Segment index, also the readback slot index
    pub index: usize,
    /// Yaw of the optical axis (radians)
    pub center_angle: f64,
    /// `center_angle - hfov / 2`
    pub start_angle: f64,
    /// `center_angle + hfov / 2`
    pub end_angle: f64,
    /// Horizontal field of view covered by the segment
    pub total_angular_span: f64,
    /// Vertical field of view of the camera
    pub vertical_span: f64,
    pub buffer_width: usize,
    pub buffer_height: usize,
    /// Horizontal angle between adjacent output bins
    pub angular_resolution_h: f64,
    /// Vertical angle between adjacent output rows (0 for a single row)
    pub angular_resolution_v: f64,
}

impl SegmentGeometry {
    pub fn pixel_count(&self) -> usize {
        self.buffer_width * self.buffer_height
    }

    /// Expected readback size in bytes
    pub fn buffer_len(&self) -> usize {
        self.pixel_count() * DEPTH_PIXEL_BYTES
    }
}

/// Camera near/far clip distances (meters)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClipPlanes {
    pub near: f64,
    pub far: f64,
}

/// Full plan for a sensor: every segment plus the shared parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanGeometry {
    pub horizontal: ScanWindow,
    pub vertical: ScanWindow,
    pub range: RangeBounds,
    pub clip: ClipPlanes,
    /// Per-segment camera horizontal FOV (radians)
    pub hfov: f64,
    /// Per-segment camera vertical FOV (radians)
    pub vfov: f64,
    pub segments: Vec<SegmentGeometry>,
}

impl ScanGeometry {
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Length of the stitched scan arrays
    pub fn scan_len(&self) -> usize {
        self.horizontal.samples as usize * self.vertical.samples.max(1) as usize
    }
}

/// Raw encoded readback for one segment
#[derive(Debug, Clone)]
pub struct DepthBuffer {
    pub segment: usize,
    pub width: usize,
    pub height: usize,
    /// `width * height` RGBA pixels, row 0 is the lowest elevation
    pub data: Bytes,
}

impl DepthBuffer {
    pub fn expected_len(&self) -> usize {
        self.width * self.height * DEPTH_PIXEL_BYTES
    }
}

/// Per-bin ranges and intensities for one segment
///
/// Row-major, `width * height` entries, bins ascending in angle.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentRangeOutput {
    pub segment: usize,
    pub width: usize,
    pub height: usize,
    pub ranges: Vec<f64>,
    pub intensities: Vec<f64>,
}

impl SegmentRangeOutput {
    /// Output with every bin set to `NaN`
    pub fn empty(segment: usize, width: usize, height: usize) -> Self {
        Self {
            segment,
            width,
            height,
            ranges: vec![f64::NAN; width * height],
            intensities: vec![f64::NAN; width * height],
        }
    }

    pub fn row_ranges(&self, row: usize) -> &[f64] {
        &self.ranges[row * self.width..(row + 1) * self.width]
    }

    pub fn row_intensities(&self, row: usize) -> &[f64] {
        &self.intensities[row * self.width..(row + 1) * self.width]
    }
}
