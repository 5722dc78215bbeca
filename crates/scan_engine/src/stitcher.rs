//! Scan stitcher.
//!
//! Merges every segment's bins into the scan arrays. A segment is first
//! placed in the scan window's coordinate frame (shifted by -2pi when the
//! window starts below zero and the segment crosses +pi), then classified
//! as leading edge, interior or trailing edge. Copies of the same segment
//! translated by +/-2pi are placed as well when they overlap the window, so
//! a full-circle scan picks up both sides of the seam.
//!
//! Rows are stored ascending in angle: the leading-edge copy lands at the
//! start of the destination row, the trailing-edge copy at its end.

use std::f64::consts::{PI, TAU};

use contracts::{LidarError, ScanGeometry, SegmentGeometry, SegmentRangeOutput};
use metrics::counter;
use tracing::{debug, instrument, warn};

use crate::planner::ANGLE_EPSILON;

/// Counters for one stitch pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StitchReport {
    pub segments_merged: usize,
    pub rows_copied: usize,
    /// Rows skipped because a copy length or offset came out negative
    pub rows_skipped: usize,
    pub inconsistencies: usize,
}

/// Overlap of one segment placement with the scan window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlap {
    /// Segment starts at or before the window start
    LeadingEdge,
    /// Segment lies strictly inside the window
    Interior,
    /// Segment reaches the window end
    TrailingEdge,
}

/// Row copy derived from a classified placement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowCopy {
    pub overlap: Overlap,
    pub src_offset: isize,
    pub dst_offset: isize,
    pub len: isize,
}

impl RowCopy {
    fn is_writable(&self) -> bool {
        self.src_offset >= 0 && self.dst_offset >= 0 && self.len > 0
    }
}

/// Segment span in the window's frame, `[data_start, data_end)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub data_start: f64,
    pub data_end: f64,
}

/// Primary placement plus any +/-2pi copies overlapping the window
pub fn placements(segment: &SegmentGeometry, geometry: &ScanGeometry) -> Vec<Placement> {
    let window = &geometry.horizontal;
    let mut primary = Placement {
        data_start: segment.start_angle,
        data_end: segment.end_angle,
    };
    if window.angle_min < 0.0 && primary.data_end > PI + ANGLE_EPSILON {
        primary.data_start -= TAU;
        primary.data_end -= TAU;
    }

    let mut out = vec![primary];
    for shift in [TAU, -TAU] {
        let shifted = Placement {
            data_start: primary.data_start + shift,
            data_end: primary.data_end + shift,
        };
        let overlaps = shifted.data_start <= window.angle_max + ANGLE_EPSILON
            && shifted.data_end > window.angle_min + ANGLE_EPSILON;
        if overlaps {
            out.push(shifted);
        }
    }
    out
}

/// Classify a placement and compute its row copy
///
/// Returns `None` when the placement fits none of the three cases.
pub fn classify(
    placement: Placement,
    geometry: &ScanGeometry,
    segment_width: usize,
) -> Option<RowCopy> {
    let window = &geometry.horizontal;
    let global_start = window.angle_min;
    let global_end = window.angle_max;
    let resolution = window.angle_step();
    let samples = window.samples as isize;
    let width = segment_width as isize;
    let Placement {
        data_start,
        data_end,
    } = placement;

    let bins = |angle: f64| (angle / resolution).round() as isize;

    if data_start <= global_start + ANGLE_EPSILON {
        let src_offset = bins(global_start - data_start);
        Some(RowCopy {
            overlap: Overlap::LeadingEdge,
            src_offset,
            dst_offset: 0,
            len: (width - src_offset).min(samples),
        })
    } else if data_start > global_start && data_end < global_end {
        let dst_offset = bins(data_start - global_start);
        Some(RowCopy {
            overlap: Overlap::Interior,
            src_offset: 0,
            dst_offset,
            len: width.min(samples - dst_offset),
        })
    } else if data_end >= global_end {
        let reach = bins(global_end - data_start) + 1;
        Some(RowCopy {
            overlap: Overlap::TrailingEdge,
            src_offset: 0,
            dst_offset: samples - reach,
            len: reach.min(width),
        })
    } else {
        None
    }
}

/// Merge segment outputs into `ranges`/`intensities`
///
/// Both arrays are reset to `NaN` first, so the result depends only on the
/// inputs. Segments are applied in the order given; where placements abut or
/// overlap the later one wins.
#[instrument(
    level = "debug",
    name = "stitcher_stitch",
    skip_all,
    fields(segments = geometry.segment_count())
)]
pub fn stitch<'a>(
    geometry: &ScanGeometry,
    outputs: impl IntoIterator<Item = &'a SegmentRangeOutput>,
    ranges: &mut [f64],
    intensities: &mut [f64],
) -> StitchReport {
    let mut report = StitchReport::default();
    ranges.fill(f64::NAN);
    intensities.fill(f64::NAN);

    let samples = geometry.horizontal.samples as usize;
    let rows = geometry.vertical.samples.max(1) as usize;
    if ranges.len() != samples * rows || intensities.len() != samples * rows {
        warn!(
            expected = samples * rows,
            ranges = ranges.len(),
            intensities = intensities.len(),
            "Scan buffers do not match geometry, nothing stitched"
        );
        return report;
    }

    for output in outputs {
        let Some(segment) = geometry.segments.get(output.segment) else {
            warn!(segment = output.segment, "Output for unknown segment skipped");
            report.inconsistencies += 1;
            continue;
        };

        for placement in placements(segment, geometry) {
            let copy = classify(placement, geometry, output.width);
            for row in 0..rows {
                match copy {
                    Some(copy) if row < output.height => {
                        if !copy.is_writable() {
                            debug!(
                                segment = segment.index,
                                row,
                                src_offset = copy.src_offset,
                                dst_offset = copy.dst_offset,
                                len = copy.len,
                                overlap = ?copy.overlap,
                                "Negative or empty copy, row skipped"
                            );
                            report.rows_skipped += 1;
                            continue;
                        }
                        copy_row(output, row, copy, samples, ranges, intensities);
                        report.rows_copied += 1;
                    }
                    _ => {
                        let err = LidarError::GeometryInconsistency {
                            segment: segment.index,
                            row,
                            data_start: placement.data_start,
                            data_end: placement.data_end,
                        };
                        warn!(error = %err, "Row skipped");
                        report.inconsistencies += 1;
                    }
                }
            }
        }
        report.segments_merged += 1;
    }

    if report.rows_skipped > 0 {
        counter!("lidar_rows_skipped_total").increment(report.rows_skipped as u64);
    }
    if report.inconsistencies > 0 {
        counter!("lidar_geometry_inconsistencies_total").increment(report.inconsistencies as u64);
    }

    report
}

fn copy_row(
    output: &SegmentRangeOutput,
    row: usize,
    copy: RowCopy,
    samples: usize,
    ranges: &mut [f64],
    intensities: &mut [f64],
) {
    let src = copy.src_offset as usize;
    let dst = copy.dst_offset as usize;
    // never read past the segment row or write past the scan row
    let len = (copy.len as usize)
        .min(output.width.saturating_sub(src))
        .min(samples.saturating_sub(dst));
    if len == 0 {
        return;
    }

    let dst_row = row * samples;
    ranges[dst_row + dst..dst_row + dst + len]
        .copy_from_slice(&output.row_ranges(row)[src..src + len]);
    intensities[dst_row + dst..dst_row + dst + len]
        .copy_from_slice(&output.row_intensities(row)[src..src + len]);
}
