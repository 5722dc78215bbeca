//! `run` command implementation.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use capture::MockRendererConfig;
use contracts::{LidarConfig, SinkConfig, SinkType};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::cli::RunArgs;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Sink name used for `--output`
const OUTPUT_SINK_NAME: &str = "cli-output";

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let mut lidar = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    apply_overrides(&mut lidar, args)?;

    info!(
        name = %lidar.name,
        rate_hz = lidar.update_rate_hz,
        samples_h = lidar.horizontal.samples,
        samples_v = lidar.vertical.samples,
        sinks = lidar.sinks.len(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&lidar, args);
        return Ok(());
    }

    let pipeline_config = PipelineConfig {
        lidar,
        renderer: MockRendererConfig {
            scene: args.scene,
            latency: Duration::from_millis(args.latency_ms),
            ..Default::default()
        },
        max_cycles: (args.max_cycles != 0).then_some(args.max_cycles),
        timeout: (args.timeout != 0).then(|| Duration::from_secs(args.timeout)),
        metrics_port: (args.metrics_port != 0).then_some(args.metrics_port),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let signal_task = tokio::spawn(async move {
        shutdown_signal().await;
        warn!("Received shutdown signal, stopping capture loop...");
        let _ = shutdown_tx.send(true);
    });

    info!("Starting pipeline...");
    let result = Pipeline::new(pipeline_config).run(shutdown_rx).await;
    signal_task.abort();

    let stats = result.context("Pipeline execution failed")?;
    info!(
        cycles = stats.cycles,
        degraded = stats.cycle_metrics.degraded_cycles,
        duration_secs = stats.duration.as_secs_f64(),
        scans_per_sec = format!("{:.2}", stats.scans_per_sec()),
        "Pipeline completed"
    );
    stats.print_summary();

    info!("lidar-sim finished");
    Ok(())
}

/// Apply CLI overrides and re-validate the result
fn apply_overrides(lidar: &mut LidarConfig, args: &RunArgs) -> Result<()> {
    if let Some(rate) = args.rate {
        info!(rate_hz = rate, "Overriding update rate from CLI");
        lidar.update_rate_hz = rate;
    }

    if let Some(ref output) = args.output {
        info!(path = %output.display(), "Adding JSON file sink from CLI");
        lidar.sinks.push(SinkConfig {
            name: OUTPUT_SINK_NAME.to_string(),
            sink_type: SinkType::File,
            queue_capacity: 16,
            params: HashMap::from([(
                "base_path".to_string(),
                output.to_string_lossy().into_owned(),
            )]),
        });
    }

    config_loader::ConfigLoader::validate(lidar).context("Invalid configuration after CLI overrides")?;
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
///
/// A handler that fails to install is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(lidar: &LidarConfig, args: &RunArgs) {
    println!("\n=== Configuration Summary ===\n");
    println!("Sensor: {}", lidar.name);
    println!("  Update rate: {} Hz", lidar.update_rate_hz);
    println!(
        "  Horizontal: {} samples [{:.1}°, {:.1}°]",
        lidar.horizontal.samples,
        lidar.horizontal.angle_min.to_degrees(),
        lidar.horizontal.angle_max.to_degrees()
    );
    println!(
        "  Vertical: {} samples [{:.1}°, {:.1}°]",
        lidar.vertical.samples,
        lidar.vertical.angle_min.to_degrees(),
        lidar.vertical.angle_max.to_degrees()
    );
    println!("  Range: {} - {} m", lidar.range.min, lidar.range.max);
    println!(
        "  Camera FOV: {}° x {}°",
        lidar.camera.hfov_deg, lidar.camera.vfov_deg
    );

    if let Ok(geometry) = scan_engine::plan_scan(lidar) {
        println!(
            "  Segments: {} ({} x {} px each)",
            geometry.segment_count(),
            geometry.segments[0].buffer_width,
            geometry.segments[0].buffer_height
        );
    }

    println!("\nRenderer:");
    println!("  Scene: {}", args.scene);
    println!("  Latency: {} ms", args.latency_ms);

    if !lidar.sinks.is_empty() {
        println!("\nSinks ({}):", lidar.sinks.len());
        for sink in &lidar.sinks {
            println!("  - {} ({:?})", sink.name, sink.sink_type);
        }
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use contracts::{RangeBounds, ScanWindow};

    fn make_args(extra: &[&str]) -> RunArgs {
        let mut argv = vec!["lidar-sim", "run"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Run(args) => args,
            other => panic!("unexpected command: {other:?}"),
        }
    }

    fn make_lidar() -> LidarConfig {
        LidarConfig::new(
            ScanWindow::new(360, -std::f64::consts::PI, std::f64::consts::PI),
            ScanWindow::planar(),
            RangeBounds::new(0.2, 40.0),
        )
    }

    #[test]
    fn test_overrides_rate_and_output() {
        let mut lidar = make_lidar();
        let args = make_args(&["--rate", "20", "--output", "/tmp/scans"]);
        apply_overrides(&mut lidar, &args).unwrap();

        assert_eq!(lidar.update_rate_hz, 20.0);
        assert_eq!(lidar.sinks.len(), 1);
        assert_eq!(lidar.sinks[0].sink_type, SinkType::File);
        assert_eq!(lidar.sinks[0].params["base_path"], "/tmp/scans");
    }

    #[test]
    fn test_invalid_rate_override_rejected() {
        let mut lidar = make_lidar();
        let args = make_args(&["--rate", "0"]);
        assert!(apply_overrides(&mut lidar, &args).is_err());
    }

    #[tokio::test]
    async fn test_missing_config_fails() {
        let args = make_args(&["--config", "/nonexistent/lidar.toml"]);
        assert!(run_pipeline(&args).await.is_err());
    }
}
