//! # Contracts
//!
//! Frozen interface contracts, defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Angle Model
//! - Radians, counter-clockwise positive, zero along the sensor's forward axis
//! - Segment angles are kept unwrapped; only the stitcher folds them into the scan window
//!
//! ## Time Model
//! - Simulation timestamp (seconds, f64) supplied by the `DepthSource`

mod config;
mod error;
mod report;
mod scan;
mod segment;
mod sink;
mod source;

pub use config::*;
pub use error::*;
pub use report::CycleReport;
pub use scan::*;
pub use segment::*;
pub use sink::*;
pub use source::{
    CaptureRequest, DepthSource, ReadbackCallback, ReadbackCompletion, ReadbackToken,
};
