//! # Config Loader
//!
//! Loads and validates the lidar configuration.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Validate scan windows, range, camera, filter, noise and sinks
//! - Produce a `LidarConfig` ready for `LidarSensor::initialize`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::load_from_path(Path::new("lidar.toml")).unwrap();
//! println!("Sensor: {}", config.name);
//! ```

mod parser;
mod validator;

pub use contracts::LidarConfig;
pub use parser::ConfigFormat;

use contracts::LidarError;
use std::path::Path;
use tracing::debug;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from a file, format inferred from the extension (.toml / .json)
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<LidarConfig, LidarError> {
        let format = Self::detect_format(path)?;
        let content = std::fs::read_to_string(path)?;
        let config = Self::load_from_str(&content, format)?;
        debug!(path = %path.display(), sensor = %config.name, "Config loaded");
        Ok(config)
    }

    /// Parse and validate
    pub fn load_from_str(content: &str, format: ConfigFormat) -> Result<LidarConfig, LidarError> {
        let config = parser::parse(content, format)?;
        validator::validate(&config)?;
        Ok(config)
    }

    /// Validate an already-built config
    pub fn validate(config: &LidarConfig) -> Result<(), LidarError> {
        validator::validate(config)
    }

    pub fn to_toml(config: &LidarConfig) -> Result<String, LidarError> {
        toml::to_string_pretty(config)
            .map_err(|e| LidarError::config_parse(format!("TOML serialize error: {e}")))
    }

    pub fn to_json(config: &LidarConfig) -> Result<String, LidarError> {
        serde_json::to_string_pretty(config)
            .map_err(|e| LidarError::config_parse(format!("JSON serialize error: {e}")))
    }

    fn detect_format(path: &Path) -> Result<ConfigFormat, LidarError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            LidarError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext)
            .ok_or_else(|| LidarError::config_parse(format!("unsupported config format: .{ext}")))
    }
}
