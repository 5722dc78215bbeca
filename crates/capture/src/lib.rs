//! # Capture
//!
//! Capture / readback controller for the simulated LIDAR.
//!
//! Responsibilities:
//! - Issue per-segment capture requests against a `DepthSource` every cycle
//! - Correlate asynchronous readbacks with their segment and cycle
//! - Hand ready segments to the scan engine and publish `Arc<Scan>` snapshots
//! - Degrade, never block, on late, failed or malformed readbacks
//!
//! ## Example
//!
//! ```ignore
//! use capture::{LidarSensor, MockDepthSource, MockScene};
//!
//! let source = Arc::new(MockDepthSource::with_scene("mock", MockScene::Cylinder { radius: 5.0 }));
//! let mut sensor = LidarSensor::initialize(config, source)?;
//! let mut scans = sensor.subscribe();
//!
//! let report = sensor.run_cycle().await;
//! let scan = scans.borrow_and_update().clone();
//! ```

mod controller;
pub mod mock_renderer;
pub mod pose;
mod publisher;
mod readback;

pub use controller::{CycleState, LidarSensor};
pub use mock_renderer::{MockDepthSource, MockRendererConfig, MockScene};
pub use publisher::ScanPublisher;
pub use readback::ReadbackSlots;
