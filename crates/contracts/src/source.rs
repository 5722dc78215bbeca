//! DepthSource trait - rendering subsystem abstraction
//!
//! The renderer is an external collaborator: it accepts capture requests and
//! later delivers the encoded depth readback through a callback, possibly
//! from another thread and in any order.

use std::sync::Arc;

use crate::{ClipPlanes, DepthBuffer, LidarError, Pose, SegmentGeometry};

/// Correlates an outstanding readback with its segment and cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReadbackToken {
    pub segment: usize,
    pub cycle: u64,
}

/// One capture submission
#[derive(Debug, Clone, Copy)]
pub struct CaptureRequest {
    pub token: ReadbackToken,
    pub geometry: SegmentGeometry,
    pub clip: ClipPlanes,
}

/// Readback result delivered by the renderer
#[derive(Debug)]
pub struct ReadbackCompletion {
    pub token: ReadbackToken,
    pub result: Result<DepthBuffer, LidarError>,
}

/// Readback completion callback
///
/// Uses `Arc` so the renderer can hand it to whatever context finishes the
/// transfer. Invoking it after the sensor is torn down is a no-op.
pub type ReadbackCallback = Arc<dyn Fn(ReadbackCompletion) + Send + Sync>;

/// Rendering subsystem trait
pub trait DepthSource: Send + Sync {
    /// Source name (used for logging)
    fn name(&self) -> &str;

    /// Rotate the camera to the segment's center angle, render, and start an
    /// asynchronous readback. The result must be delivered exactly once
    /// through `callback` unless the request is cancelled.
    fn request_capture(&self, request: CaptureRequest, callback: ReadbackCallback);

    /// Abandon an outstanding request. Sources that cannot cancel may ignore
    /// this; the controller discards stale completions anyway.
    fn cancel(&self, _token: ReadbackToken) {}

    /// Pose of the link the sensor is mounted on
    fn link_pose(&self) -> Pose {
        Pose::identity()
    }

    /// Current simulation time (seconds)
    fn sim_time(&self) -> f64;
}
