//! Mock depth renderer
//!
//! Implements `DepthSource` without a rendering engine. The sensor sits at
//! the origin of a scene made of infinite vertical walls, so the depth of a
//! pixel only depends on its horizontal angle. Each readback is finished on
//! a background thread after a configurable latency, the same way a GPU
//! readback completes off the simulation thread.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use contracts::{
    CaptureRequest, ClipPlanes, DepthBuffer, DepthSource, LidarError, Pose, ReadbackCallback,
    ReadbackCompletion, ReadbackToken, SegmentGeometry, DEPTH_PIXEL_BYTES,
};
use scan_engine::decoder::{device_depth_from_linear, encode_device_depth};
use tracing::{debug, trace};

/// Scene surrounding the sensor
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum MockScene {
    /// Nothing within range
    #[default]
    Empty,
    /// Circular wall centered on the sensor
    Cylinder { radius: f64 },
    /// Axis-aligned square room centered on the sensor
    Square { half_extent: f64 },
}

impl MockScene {
    /// Horizontal distance to the wall along `yaw`
    pub fn distance_at(&self, yaw: f64) -> Option<f64> {
        match *self {
            MockScene::Empty => None,
            MockScene::Cylinder { radius } => Some(radius),
            MockScene::Square { half_extent } => {
                let axis = yaw.cos().abs().max(yaw.sin().abs());
                Some(half_extent / axis)
            }
        }
    }
}

impl fmt::Display for MockScene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MockScene::Empty => write!(f, "empty"),
            MockScene::Cylinder { radius } => write!(f, "cylinder:{radius}"),
            MockScene::Square { half_extent } => write!(f, "square:{half_extent}"),
        }
    }
}

impl FromStr for MockScene {
    type Err = String;

    /// `empty`, `cylinder:<radius>` or `square:<half_extent>`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, arg) = match s.split_once(':') {
            Some((kind, arg)) => (kind, Some(arg)),
            None => (s, None),
        };
        let size = || -> Result<f64, String> {
            let arg = arg.ok_or_else(|| format!("scene '{kind}' needs a size, e.g. {kind}:5"))?;
            let value: f64 = arg
                .parse()
                .map_err(|_| format!("invalid scene size '{arg}'"))?;
            if value.is_finite() && value > 0.0 {
                Ok(value)
            } else {
                Err(format!("scene size must be positive, got {value}"))
            }
        };

        match kind.to_ascii_lowercase().as_str() {
            "empty" => Ok(MockScene::Empty),
            "cylinder" => Ok(MockScene::Cylinder { radius: size()? }),
            "square" => Ok(MockScene::Square {
                half_extent: size()?,
            }),
            other => Err(format!("unknown scene '{other}'")),
        }
    }
}

/// Mock renderer configuration
#[derive(Debug, Clone)]
pub struct MockRendererConfig {
    pub scene: MockScene,
    /// Delay between capture request and readback completion
    pub latency: Duration,
    /// Fail every Nth readback with a readback error
    pub fail_every: Option<u64>,
    /// Truncate every Nth readback buffer by one pixel
    pub truncate_every: Option<u64>,
    /// Never complete every Nth readback
    pub stall_every: Option<u64>,
    /// Pose of the link the sensor is attached to
    pub link_pose: Pose,
}

impl Default for MockRendererConfig {
    fn default() -> Self {
        Self {
            scene: MockScene::Empty,
            latency: Duration::from_millis(2),
            fail_every: None,
            truncate_every: None,
            stall_every: None,
            link_pose: Pose::identity(),
        }
    }
}

/// Fault injected into one readback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fault {
    None,
    Fail,
    Truncate,
    Stall,
}

/// Readback with a live worker thread
#[derive(Debug, Clone, Copy)]
struct InFlight {
    token: ReadbackToken,
    cancelled: bool,
}

/// Mock depth source
pub struct MockDepthSource {
    name: String,
    config: MockRendererConfig,
    requests: AtomicU64,
    /// Keyed by request number; entries are removed by their worker
    in_flight: Arc<Mutex<HashMap<u64, InFlight>>>,
    started: Instant,
}

impl MockDepthSource {
    pub fn new(name: impl Into<String>, config: MockRendererConfig) -> Self {
        Self {
            name: name.into(),
            config,
            requests: AtomicU64::new(0),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            started: Instant::now(),
        }
    }

    pub fn with_scene(name: impl Into<String>, scene: MockScene) -> Self {
        Self::new(
            name,
            MockRendererConfig {
                scene,
                ..Default::default()
            },
        )
    }

    pub fn config(&self) -> &MockRendererConfig {
        &self.config
    }

    /// Capture requests received so far
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Readbacks whose worker has not finished yet
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().map(|map| map.len()).unwrap_or(0)
    }

    fn fault_for(&self, request_number: u64) -> Fault {
        let hits = |every: Option<u64>| every.is_some_and(|n| n > 0 && request_number % n == 0);
        if hits(self.config.stall_every) {
            Fault::Stall
        } else if hits(self.config.fail_every) {
            Fault::Fail
        } else if hits(self.config.truncate_every) {
            Fault::Truncate
        } else {
            Fault::None
        }
    }

    /// Render one segment into an encoded depth buffer
    pub fn render(scene: MockScene, geometry: &SegmentGeometry, clip: ClipPlanes) -> Bytes {
        let width = geometry.buffer_width;
        let tan_half_h = (geometry.total_angular_span * 0.5).tan();

        // Infinite vertical walls: every row of a column has the same depth
        let row: Vec<u8> = (0..width)
            .flat_map(|u| {
                let x_ndc = 2.0 * (u as f64 + 0.5) / width as f64 - 1.0;
                let h = (x_ndc * tan_half_h).atan();
                let device_depth = match scene.distance_at(geometry.center_angle + h) {
                    Some(distance) => device_depth_from_linear(distance * h.cos(), clip),
                    None => 1.0,
                };
                encode_device_depth(device_depth)
            })
            .collect();

        Bytes::from(row.repeat(geometry.buffer_height))
    }
}

impl DepthSource for MockDepthSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn request_capture(&self, request: CaptureRequest, callback: ReadbackCallback) {
        let request_number = self.requests.fetch_add(1, Ordering::Relaxed) + 1;
        let fault = self.fault_for(request_number);
        let token = request.token;

        if fault == Fault::Stall {
            debug!(source = %self.name, segment = token.segment, cycle = token.cycle, "Readback stalled");
            return;
        }

        let scene = self.config.scene;
        let latency = self.config.latency;
        let in_flight = Arc::clone(&self.in_flight);
        if let Ok(mut map) = in_flight.lock() {
            map.insert(
                request_number,
                InFlight {
                    token,
                    cancelled: false,
                },
            );
        }

        thread::spawn(move || {
            thread::sleep(latency);

            let was_cancelled = in_flight
                .lock()
                .ok()
                .and_then(|mut map| map.remove(&request_number))
                .is_some_and(|entry| entry.cancelled);
            if was_cancelled {
                trace!(segment = token.segment, cycle = token.cycle, "Readback cancelled");
                return;
            }

            let result = match fault {
                Fault::Fail => Err(LidarError::readback(token.segment, "injected readback failure")),
                _ => {
                    let mut data = Self::render(scene, &request.geometry, request.clip);
                    if fault == Fault::Truncate {
                        data.truncate(data.len().saturating_sub(DEPTH_PIXEL_BYTES));
                    }
                    Ok(DepthBuffer {
                        segment: token.segment,
                        width: request.geometry.buffer_width,
                        height: request.geometry.buffer_height,
                        data,
                    })
                }
            };

            callback(ReadbackCompletion { token, result });
        });
    }

    /// Only readbacks with a live worker are marked; stalled or already
    /// delivered tokens are a no-op.
    fn cancel(&self, token: ReadbackToken) {
        if let Ok(mut map) = self.in_flight.lock() {
            map.values_mut()
                .filter(|entry| entry.token == token)
                .for_each(|entry| entry.cancelled = true);
        }
    }

    fn link_pose(&self) -> Pose {
        self.config.link_pose
    }

    fn sim_time(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{CameraConfig, RangeBounds, ScanWindow};
    use scan_engine::decoder::decode;
    use scan_engine::plan_geometry;
    use std::sync::mpsc;

    fn make_geometry() -> contracts::ScanGeometry {
        plan_geometry(
            ScanWindow::new(361, -std::f64::consts::PI, std::f64::consts::PI),
            ScanWindow::planar(),
            RangeBounds::new(0.1, 30.0),
            CameraConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_scene_parse() {
        assert_eq!("empty".parse::<MockScene>().unwrap(), MockScene::Empty);
        assert_eq!(
            "cylinder:5".parse::<MockScene>().unwrap(),
            MockScene::Cylinder { radius: 5.0 }
        );
        assert_eq!(
            "Square:2.5".parse::<MockScene>().unwrap(),
            MockScene::Square { half_extent: 2.5 }
        );
        assert!("cylinder".parse::<MockScene>().is_err());
        assert!("cylinder:-1".parse::<MockScene>().is_err());
        assert!("cone:1".parse::<MockScene>().is_err());
    }

    #[test]
    fn test_square_distance() {
        let scene = MockScene::Square { half_extent: 2.0 };
        assert!((scene.distance_at(0.0).unwrap() - 2.0).abs() < 1e-12);
        let diagonal = scene.distance_at(std::f64::consts::FRAC_PI_4).unwrap();
        assert!((diagonal - 2.0 * 2f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_render_cylinder_center_pixel() {
        let geometry = make_geometry();
        let segment = &geometry.segments[0];
        let data = MockDepthSource::render(MockScene::Cylinder { radius: 5.0 }, segment, geometry.clip);
        assert_eq!(data.len(), segment.buffer_len());

        let buffer = DepthBuffer {
            segment: 0,
            width: segment.buffer_width,
            height: segment.buffer_height,
            data,
        };
        let depth = decode(&buffer, geometry.clip, geometry.range).unwrap();
        let center = depth[segment.buffer_width / 2];
        assert!((center - 5.0).abs() < 0.01, "center depth {center}");
    }

    #[test]
    fn test_render_empty_scene_is_far() {
        let geometry = make_geometry();
        let segment = &geometry.segments[1];
        let data = MockDepthSource::render(MockScene::Empty, segment, geometry.clip);
        assert!(data.chunks_exact(4).all(|px| px == [255, 0, 0, 0]));
    }

    #[test]
    fn test_request_delivers_completion() {
        let geometry = make_geometry();
        let source = MockDepthSource::with_scene("mock", MockScene::Cylinder { radius: 3.0 });
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let callback: ReadbackCallback = Arc::new(move |completion: ReadbackCompletion| {
            let _ = tx.lock().unwrap().send(completion);
        });

        let token = ReadbackToken { segment: 2, cycle: 1 };
        source.request_capture(
            CaptureRequest {
                token,
                geometry: geometry.segments[2],
                clip: geometry.clip,
            },
            callback,
        );

        let completion = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(completion.token, token);
        let buffer = completion.result.unwrap();
        assert_eq!(buffer.data.len(), geometry.segments[2].buffer_len());
        assert_eq!(source.request_count(), 1);
    }

    #[test]
    fn test_fault_injection() {
        let geometry = make_geometry();
        let source = MockDepthSource::new(
            "mock",
            MockRendererConfig {
                fail_every: Some(2),
                truncate_every: Some(3),
                latency: Duration::ZERO,
                ..Default::default()
            },
        );
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let callback: ReadbackCallback = Arc::new(move |completion: ReadbackCompletion| {
            let _ = tx.lock().unwrap().send(completion);
        });

        for cycle in 1..=3 {
            source.request_capture(
                CaptureRequest {
                    token: ReadbackToken { segment: 0, cycle },
                    geometry: geometry.segments[0],
                    clip: geometry.clip,
                },
                Arc::clone(&callback),
            );
        }

        let mut completions: Vec<_> = (0..3)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        completions.sort_by_key(|c| c.token.cycle);

        let expected = geometry.segments[0].buffer_len();
        assert_eq!(completions[0].result.as_ref().unwrap().data.len(), expected);
        assert!(matches!(completions[1].result, Err(LidarError::Readback { .. })));
        assert_eq!(
            completions[2].result.as_ref().unwrap().data.len(),
            expected - DEPTH_PIXEL_BYTES
        );
    }

    #[test]
    fn test_cancelled_request_never_completes() {
        let geometry = make_geometry();
        let source = MockDepthSource::new(
            "mock",
            MockRendererConfig {
                latency: Duration::from_millis(50),
                ..Default::default()
            },
        );
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let callback: ReadbackCallback = Arc::new(move |completion: ReadbackCompletion| {
            let _ = tx.lock().unwrap().send(completion);
        });

        let token = ReadbackToken { segment: 0, cycle: 1 };
        source.request_capture(
            CaptureRequest {
                token,
                geometry: geometry.segments[0],
                clip: geometry.clip,
            },
            callback,
        );
        source.cancel(token);

        assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
    }

    #[test]
    fn test_cancel_stalled_request_leaves_nothing_tracked() {
        let geometry = make_geometry();
        let source = MockDepthSource::new(
            "mock",
            MockRendererConfig {
                stall_every: Some(1),
                ..Default::default()
            },
        );
        let callback: ReadbackCallback = Arc::new(|_: ReadbackCompletion| {
            panic!("stalled readback completed");
        });

        for cycle in 1..=100 {
            let token = ReadbackToken { segment: 0, cycle };
            source.request_capture(
                CaptureRequest {
                    token,
                    geometry: geometry.segments[0],
                    clip: geometry.clip,
                },
                Arc::clone(&callback),
            );
            source.cancel(token);
        }

        assert_eq!(source.request_count(), 100);
        assert_eq!(source.in_flight(), 0);
    }

    #[test]
    fn test_cancel_after_completion_is_noop() {
        let geometry = make_geometry();
        let source = MockDepthSource::new(
            "mock",
            MockRendererConfig {
                latency: Duration::ZERO,
                ..Default::default()
            },
        );
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let callback: ReadbackCallback = Arc::new(move |completion: ReadbackCompletion| {
            let _ = tx.lock().unwrap().send(completion);
        });

        let token = ReadbackToken { segment: 1, cycle: 1 };
        let request = CaptureRequest {
            token,
            geometry: geometry.segments[1],
            clip: geometry.clip,
        };
        source.request_capture(request, Arc::clone(&callback));
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        source.cancel(token);
        assert_eq!(source.in_flight(), 0);

        // a resubmit under the same token is not affected by the stale cancel
        source.request_capture(request, callback);
        let completion = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(completion.token, token);
        assert_eq!(source.in_flight(), 0);
    }
}
