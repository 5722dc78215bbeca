//! CLI argument definitions using clap.

use std::path::PathBuf;

use capture::MockScene;
use clap::{Parser, Subcommand, ValueEnum};

/// lidar-sim - depth-camera LIDAR simulator
#[derive(Parser, Debug)]
#[command(
    name = "lidar-sim",
    author,
    version,
    about = "Simulated LIDAR built from stitched depth-camera segments",
    long_about = "Simulates a scanning LIDAR by rendering fixed-FOV depth-camera segments,\n\
                  decoding their depth readbacks and stitching them into one range scan.\n\n\
                  The `run` command drives the sensor against a built-in mock renderer."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "LIDAR_SIM_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "LIDAR_SIM_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the capture loop against the mock renderer
    Run(RunArgs),

    /// Validate a configuration file without running
    Validate(ValidateArgs),

    /// Show the configuration and its planned segment geometry
    Info(InfoArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "lidar.toml", env = "LIDAR_SIM_CONFIG")]
    pub config: PathBuf,

    /// Mock scene: empty, cylinder:<radius> or square:<half_extent>
    #[arg(long, default_value = "cylinder:5", env = "LIDAR_SIM_SCENE")]
    pub scene: MockScene,

    /// Mock readback latency in milliseconds
    #[arg(long, default_value = "2")]
    pub latency_ms: u64,

    /// Override the configured update rate (Hz)
    #[arg(long)]
    pub rate: Option<f64>,

    /// Maximum number of cycles to run (0 = unlimited)
    #[arg(long, default_value = "0", env = "LIDAR_SIM_MAX_CYCLES")]
    pub max_cycles: u64,

    /// Run timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "LIDAR_SIM_TIMEOUT")]
    pub timeout: u64,

    /// Also write every scan as JSON under this directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Prometheus metrics port (0 = disabled)
    #[arg(long, default_value = "0", env = "LIDAR_SIM_METRICS_PORT")]
    pub metrics_port: u16,
}

#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "lidar.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "lidar.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show per-segment geometry
    #[arg(long)]
    pub segments: bool,

    /// Show sink configuration
    #[arg(long)]
    pub sinks: bool,
}

#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}
