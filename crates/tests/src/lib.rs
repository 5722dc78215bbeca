//! # Integration Tests
//!
//! Cross-crate and end-to-end tests.
//!
//! Covers:
//! - Config file -> sensor -> dispatcher -> sink
//! - Scan geometry against the mock renderer's known scenes
//! - Fault handling across a multi-cycle run

#[cfg(test)]
mod contract_tests {
    use contracts::{LidarConfig, RangeBounds, ScanWindow};

    #[test]
    fn test_default_config_plans_three_segments() {
        let config = LidarConfig::new(
            ScanWindow::new(360, -std::f64::consts::PI, std::f64::consts::PI),
            ScanWindow::planar(),
            RangeBounds::new(0.1, 10.0),
        );
        let geometry = scan_engine::plan_scan(&config).unwrap();
        assert_eq!(geometry.segment_count(), 3);
        assert_eq!(geometry.scan_len(), 360);
    }

    #[test]
    fn test_shipped_config_is_valid() {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../lidar.toml");
        let config = config_loader::ConfigLoader::load_from_path(&path).unwrap();
        assert_eq!(config.name, "front_lidar");
        assert_eq!(config.sinks.len(), 1);

        let geometry = scan_engine::plan_scan(&config).unwrap();
        assert_eq!(geometry.scan_len(), 720);
    }

    #[test]
    fn test_config_roundtrip_keeps_geometry() {
        let mut config = LidarConfig::new(
            ScanWindow::new(540, -2.0, 2.0),
            ScanWindow::new(4, -0.1, 0.1),
            RangeBounds::new(0.3, 50.0),
        );
        config.camera.hfov_deg = 90.0;

        let toml = config_loader::ConfigLoader::to_toml(&config).unwrap();
        let parsed =
            config_loader::ConfigLoader::load_from_str(&toml, config_loader::ConfigFormat::Toml)
                .unwrap();

        let before = scan_engine::plan_scan(&config).unwrap();
        let after = scan_engine::plan_scan(&parsed).unwrap();
        assert_eq!(before, after);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::f64::consts::{FRAC_PI_4, PI};
    use std::sync::Arc;
    use std::time::Duration;

    use capture::{LidarSensor, MockDepthSource, MockRendererConfig, MockScene};
    use contracts::{CycleStatus, LidarConfig, NoiseConfig, RangeBounds, ScanWindow};
    use dispatcher::create_dispatcher;
    use tokio::sync::watch;

    fn make_config() -> LidarConfig {
        let mut config = LidarConfig::new(
            ScanWindow::new(361, -PI, PI),
            ScanWindow::planar(),
            RangeBounds::new(0.1, 30.0),
        );
        config.update_rate_hz = 20.0;
        config
    }

    fn make_sensor(config: LidarConfig, scene: MockScene) -> LidarSensor {
        let renderer = MockRendererConfig {
            scene,
            latency: Duration::from_millis(1),
            ..Default::default()
        };
        let source = Arc::new(MockDepthSource::new("mock", renderer));
        LidarSensor::initialize(config, source).unwrap()
    }

    /// Bin index of `angle` in a 361-sample full-circle window
    fn bin_at(angle: f64) -> usize {
        ((angle + PI) / (PI / 180.0)).round() as usize
    }

    /// End-to-end test: TOML config -> LidarSensor -> Dispatcher -> FileSink
    #[tokio::test]
    async fn test_e2e_config_to_file_sink() {
        let dir = tempfile::tempdir().unwrap();
        let toml = format!(
            r#"
name = "roof"
update_rate_hz = 20.0

[horizontal]
samples = 720
angle_min = -3.14159
angle_max = 3.14159

[range]
min = 0.2
max = 40.0

[[sinks]]
name = "disk"
sink_type = "file"

[sinks.params]
base_path = "{}"
"#,
            dir.path().display().to_string().replace('\\', "/")
        );
        let config =
            config_loader::ConfigLoader::load_from_str(&toml, config_loader::ConfigFormat::Toml)
                .unwrap();

        let mut sensor = make_sensor(config.clone(), MockScene::Cylinder { radius: 6.0 });
        let dispatcher = create_dispatcher(config.sinks.clone(), sensor.subscribe()).unwrap();
        let dispatcher_handle = dispatcher.spawn();

        let (_stop_tx, stop_rx) = watch::channel(false);
        let metrics = tokio::time::timeout(Duration::from_secs(5), sensor.run(stop_rx, Some(3)))
            .await
            .expect("capture loop timed out");
        assert_eq!(metrics.total_cycles, 3);
        assert_eq!(metrics.degraded_cycles, 0);

        // Dropping the publisher ends the dispatcher
        sensor.shutdown();
        let sink_metrics = tokio::time::timeout(Duration::from_secs(2), dispatcher_handle)
            .await
            .expect("dispatcher timed out")
            .unwrap();
        assert_eq!(sink_metrics.len(), 1);
        assert_eq!(sink_metrics[0].1.failed, 0);
        assert_eq!(sink_metrics[0].1.last_cycle, 3);

        let content = std::fs::read_to_string(dir.path().join("scans/3.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["frame_id"], "roof");
        assert_eq!(value["cycle"], 3);
        assert_eq!(value["status"], "complete");

        let ranges = value["ranges"].as_array().unwrap();
        assert_eq!(ranges.len(), 720);
        for range in ranges {
            let range = range.as_f64().unwrap();
            assert!((range - 6.0).abs() < 0.1, "range {range}");
        }
    }

    #[tokio::test]
    async fn test_square_room_ranges() {
        let mut sensor = make_sensor(make_config(), MockScene::Square { half_extent: 3.0 });
        let report = sensor.run_cycle().await;
        assert_eq!(report.status, CycleStatus::Complete);

        let scan = sensor.latest();
        // wall straight ahead and behind
        assert!((scan.ranges[bin_at(0.0)] - 3.0).abs() < 0.05);
        assert!((scan.ranges[0] - 3.0).abs() < 0.05);
        // room corner
        let corner = scan.ranges[bin_at(FRAC_PI_4)];
        assert!((corner - 3.0 * 2f64.sqrt()).abs() < 0.1, "corner {corner}");
    }

    #[tokio::test]
    async fn test_multi_row_scan_follows_elevation() {
        let mut config = make_config();
        config.vertical = ScanWindow::new(5, -0.2, 0.2);
        let mut sensor = make_sensor(config, MockScene::Cylinder { radius: 4.0 });

        let report = sensor.run_cycle().await;
        assert_eq!(report.status, CycleStatus::Complete);
        assert_eq!(report.valid_returns, 361 * 5);

        let scan = sensor.latest();
        for row in 0..5 {
            let elevation = -0.2 + 0.1 * row as f64;
            let expected = 4.0 / elevation.cos();
            let range = scan.row(row)[bin_at(0.0)];
            assert!(
                (range - expected).abs() < 0.05,
                "row {row}: {range} vs {expected}"
            );
        }
    }

    #[tokio::test]
    async fn test_seeded_noise_is_reproducible() {
        let mut config = make_config();
        config.noise = NoiseConfig::Gaussian {
            mean: 0.0,
            stddev: 0.05,
            seed: 42,
        };

        let mut first = make_sensor(config.clone(), MockScene::Cylinder { radius: 5.0 });
        let mut second = make_sensor(config, MockScene::Cylinder { radius: 5.0 });
        let mut clean = make_sensor(make_config(), MockScene::Cylinder { radius: 5.0 });
        first.run_cycle().await;
        second.run_cycle().await;
        clean.run_cycle().await;

        let (a, b, c) = (first.latest(), second.latest(), clean.latest());
        assert_eq!(a.ranges, b.ranges);
        assert_ne!(a.ranges, c.ranges);
        // noisy returns stay within the envelope
        assert!(a.ranges.iter().all(|r| (0.1..=30.0).contains(r)));
    }

    #[tokio::test]
    async fn test_injected_failures_degrade_cycles() {
        // 3 segments per cycle, every 4th request fails: cycles 2, 3 and 4 lose a segment
        let renderer = MockRendererConfig {
            scene: MockScene::Cylinder { radius: 5.0 },
            latency: Duration::from_millis(1),
            fail_every: Some(4),
            ..Default::default()
        };
        let source = Arc::new(MockDepthSource::new("flaky", renderer));
        let mut sensor = LidarSensor::initialize(make_config(), source).unwrap();
        let mut snapshots = sensor.subscribe();

        let (_stop_tx, stop_rx) = watch::channel(false);
        let metrics = tokio::time::timeout(Duration::from_secs(5), sensor.run(stop_rx, Some(4)))
            .await
            .expect("capture loop timed out");

        assert_eq!(metrics.total_cycles, 4);
        assert_eq!(metrics.degraded_cycles, 3);
        assert_eq!(metrics.readback_errors, 3);

        let scan = snapshots.borrow_and_update().clone();
        assert_eq!(scan.cycle, 4);
        assert_eq!(scan.status, CycleStatus::Degraded);
        // one segment missing, the others still contributed
        assert!(scan.valid_returns() > 0);
        assert!(scan.valid_returns() < scan.len());
        assert_eq!(sensor.shutdown(), 0);
    }

    #[tokio::test]
    async fn test_slow_consumer_keeps_latest_snapshot() {
        let mut sensor = make_sensor(make_config(), MockScene::Cylinder { radius: 2.0 });
        let held = sensor.latest();
        assert_eq!(held.status, CycleStatus::Pending);

        sensor.run_cycle().await;
        let first = sensor.latest();
        sensor.run_cycle().await;
        let second = sensor.latest();

        // earlier snapshots are untouched by later cycles
        assert_eq!(held.cycle, 0);
        assert!(held.ranges.iter().all(|r| r.is_nan()));
        assert_eq!(first.cycle, 1);
        assert_eq!(second.cycle, 2);
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_cycle_summary_reports_degraded_rate() {
        let mut aggregator = observability::CycleMetricsAggregator::new();
        let mut sensor = make_sensor(make_config(), MockScene::Empty);
        for _ in 0..2 {
            let report = sensor.run_cycle().await;
            aggregator.update(&report);
        }

        let summary = aggregator.summary();
        assert_eq!(summary.total_cycles, 2);
        assert_eq!(summary.degraded_cycles, 0);
        assert!(summary.to_string().contains("Total cycles: 2"));
    }
}
