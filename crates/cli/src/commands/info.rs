//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{LidarConfig, NoiseConfig, ScanGeometry};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct SensorInfo {
    name: String,
    update_rate_hz: f64,
    horizontal: WindowInfo,
    vertical: WindowInfo,
    range: [f64; 2],
    clip: [f64; 2],
    camera_fov_deg: [f64; 2],
    noise: String,
    segment_count: usize,
    scan_len: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    segments: Vec<SegmentInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct WindowInfo {
    samples: u32,
    angle_min_deg: f64,
    angle_max_deg: f64,
}

#[derive(Serialize)]
struct SegmentInfo {
    index: usize,
    center_deg: f64,
    start_deg: f64,
    end_deg: f64,
    buffer_width: usize,
    buffer_height: usize,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    queue_capacity: usize,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let lidar = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    let geometry = scan_engine::plan_scan(&lidar).context("Failed to plan scan geometry")?;

    if args.json {
        let info = build_sensor_info(&lidar, &geometry, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_sensor_info(&lidar, &geometry, args);
    }

    Ok(())
}

fn noise_description(noise: &NoiseConfig) -> String {
    match noise {
        NoiseConfig::None => "none".to_string(),
        NoiseConfig::Gaussian { mean, stddev, seed } => {
            format!("gaussian(mean={mean}, stddev={stddev}, seed={seed})")
        }
    }
}

fn build_sensor_info(lidar: &LidarConfig, geometry: &ScanGeometry, args: &InfoArgs) -> SensorInfo {
    let window = |w: contracts::ScanWindow| WindowInfo {
        samples: w.samples,
        angle_min_deg: w.angle_min.to_degrees(),
        angle_max_deg: w.angle_max.to_degrees(),
    };

    let segments = if args.segments {
        geometry
            .segments
            .iter()
            .map(|s| SegmentInfo {
                index: s.index,
                center_deg: s.center_angle.to_degrees(),
                start_deg: s.start_angle.to_degrees(),
                end_deg: s.end_angle.to_degrees(),
                buffer_width: s.buffer_width,
                buffer_height: s.buffer_height,
            })
            .collect()
    } else {
        Vec::new()
    };

    let sinks = if args.sinks {
        lidar
            .sinks
            .iter()
            .map(|s| SinkInfo {
                name: s.name.clone(),
                sink_type: format!("{:?}", s.sink_type),
                queue_capacity: s.queue_capacity,
            })
            .collect()
    } else {
        Vec::new()
    };

    SensorInfo {
        name: lidar.name.clone(),
        update_rate_hz: lidar.update_rate_hz,
        horizontal: window(geometry.horizontal),
        vertical: window(geometry.vertical),
        range: [geometry.range.min, geometry.range.max],
        clip: [geometry.clip.near, geometry.clip.far],
        camera_fov_deg: [lidar.camera.hfov_deg, lidar.camera.vfov_deg],
        noise: noise_description(&lidar.noise),
        segment_count: geometry.segment_count(),
        scan_len: geometry.scan_len(),
        segments,
        sinks,
    }
}

fn print_sensor_info(lidar: &LidarConfig, geometry: &ScanGeometry, args: &InfoArgs) {
    println!("=== LIDAR Sensor: {} ===\n", lidar.name);

    println!("Scan");
    println!("   ├─ Update rate: {} Hz", lidar.update_rate_hz);
    println!(
        "   ├─ Horizontal: {} samples [{:.2}°, {:.2}°]",
        geometry.horizontal.samples,
        geometry.horizontal.angle_min.to_degrees(),
        geometry.horizontal.angle_max.to_degrees()
    );
    println!(
        "   ├─ Vertical: {} samples [{:.2}°, {:.2}°]",
        geometry.vertical.samples,
        geometry.vertical.angle_min.to_degrees(),
        geometry.vertical.angle_max.to_degrees()
    );
    println!(
        "   ├─ Range: {} - {} m",
        geometry.range.min, geometry.range.max
    );
    println!("   └─ Noise: {}", noise_description(&lidar.noise));

    println!("\nCamera");
    println!(
        "   ├─ FOV: {}° x {}°",
        lidar.camera.hfov_deg, lidar.camera.vfov_deg
    );
    println!(
        "   ├─ Clip planes: near {:.4} m, far {} m",
        geometry.clip.near, geometry.clip.far
    );
    println!("   └─ Segments: {}", geometry.segment_count());

    if args.segments {
        for (i, segment) in geometry.segments.iter().enumerate() {
            let prefix = if i + 1 == geometry.segments.len() {
                "└─"
            } else {
                "├─"
            };
            println!(
                "      {} #{}: center {:.1}° [{:.1}°, {:.1}°], {} x {} px",
                prefix,
                segment.index,
                segment.center_angle.to_degrees(),
                segment.start_angle.to_degrees(),
                segment.end_angle.to_degrees(),
                segment.buffer_width,
                segment.buffer_height
            );
        }
    }

    if args.sinks && !lidar.sinks.is_empty() {
        println!("\nSinks ({})", lidar.sinks.len());
        for (i, sink) in lidar.sinks.iter().enumerate() {
            let prefix = if i + 1 == lidar.sinks.len() {
                "└─"
            } else {
                "├─"
            };
            println!(
                "   {} {} ({:?}, queue {})",
                prefix, sink.name, sink.sink_type, sink.queue_capacity
            );
        }
    }

    println!();
}
