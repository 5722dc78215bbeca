//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::LidarConfig;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    name: String,
    update_rate_hz: f64,
    segments: usize,
    scan_len: usize,
    horizontal_samples: u32,
    vertical_samples: u32,
    sink_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    // Loading validates; planning catches anything the validator lets through
    let planned = config_loader::ConfigLoader::load_from_path(&args.config).and_then(|lidar| {
        let geometry = scan_engine::plan_scan(&lidar)?;
        Ok((lidar, geometry))
    });

    match planned {
        Ok((lidar, geometry)) => {
            let warnings = collect_warnings(&lidar);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    name: lidar.name.clone(),
                    update_rate_hz: lidar.update_rate_hz,
                    segments: geometry.segment_count(),
                    scan_len: geometry.scan_len(),
                    horizontal_samples: lidar.horizontal.samples,
                    vertical_samples: lidar.vertical.samples,
                    sink_count: lidar.sinks.len(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(lidar: &LidarConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if lidar.sinks.is_empty() {
        warnings.push("No sinks configured - scans will not be delivered anywhere".to_string());
    }

    if let Some(range) = lidar.filter.range {
        if range.min < lidar.range.min || range.max > lidar.range.max {
            warnings.push(format!(
                "filter.range [{}, {}] extends beyond the sensor range [{}, {}]",
                range.min, range.max, lidar.range.min, lidar.range.max
            ));
        }
    }

    if let Some(angle) = lidar.filter.angle {
        let window = lidar.horizontal;
        if angle.upper < window.angle_min || angle.lower > window.angle_max {
            warnings.push(
                "filter.angle does not overlap the horizontal window - every bin is filtered"
                    .to_string(),
            );
        }
    }

    if lidar.filter.apply_to_intensity && lidar.filter.angle.is_none() && lidar.filter.range.is_none()
    {
        warnings.push("filter.apply_to_intensity is set but no filter is configured".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Sensor: {}", summary.name);
            println!("  Update rate: {} Hz", summary.update_rate_hz);
            println!("  Segments: {}", summary.segments);
            println!(
                "  Samples: {} x {} ({} bins)",
                summary.horizontal_samples, summary.vertical_samples, summary.scan_len
            );
            println!("  Sinks: {}", summary.sink_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
