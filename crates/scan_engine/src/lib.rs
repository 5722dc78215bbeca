//! # Scan Engine
//!
//! Depth-camera-to-range-scan pipeline.
//!
//! Responsibilities:
//! - Plan fixed-FOV camera segments covering the scan window
//! - Decode encoded depth readbacks into linear depth
//! - Extract per-angle ranges from each segment
//! - Stitch segments into one ordered scan, across the +/-pi seam
//! - Apply angle/range filters and noise
//!
//! ## Example
//!
//! ```ignore
//! use scan_engine::ScanEngine;
//!
//! let mut engine = ScanEngine::new(&config)?;
//!
//! // One output per completed readback
//! let output = engine.process_readback(&buffer)?;
//!
//! // Once every segment is in
//! let report = engine.assemble(&outputs);
//! ```

pub mod decoder;
pub mod extractor;
pub mod filter;
pub mod noise;
pub mod planner;
pub mod stitcher;

mod engine;

pub use engine::{AssemblyReport, ScanEngine};
pub use filter::{FilterStats, ScanFilter};
pub use noise::{noise_from_config, GaussianNoise, NoNoise, NoiseModel};
pub use planner::{plan_geometry, plan_scan, segment_count};
pub use stitcher::{stitch, StitchReport};

// Re-export contracts types
pub use contracts::{DepthBuffer, ScanGeometry, SegmentGeometry, SegmentRangeOutput};
