//! Layered error definitions
//!
//! Categorized by stage: config / readback / decode / stitch / sink.
//! Only configuration errors are fatal; everything raised inside a scan
//! cycle is logged and degrades that cycle.

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum LidarError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Invalid scan window, geometry or stage parameters
    #[error("configuration error at '{field}': {message}")]
    Configuration { field: String, message: String },

    // ===== Cycle Errors =====
    /// Readback buffer length does not match `width * height * 4`
    #[error("malformed depth buffer for segment {segment}: expected {expected} bytes, got {actual}")]
    MalformedBuffer {
        segment: usize,
        expected: usize,
        actual: usize,
    },

    /// Stitcher could not classify a segment row against the scan window
    #[error(
        "geometry inconsistency for segment {segment} row {row}: span [{data_start}, {data_end})"
    )]
    GeometryInconsistency {
        segment: usize,
        row: usize,
        data_start: f64,
        data_end: f64,
    },

    /// Rendering side reported a failed readback
    #[error("readback failed for segment {segment}: {message}")]
    Readback { segment: usize, message: String },

    // ===== Sink Errors =====
    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl LidarError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration error
    pub fn configuration(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create malformed buffer error
    pub fn malformed_buffer(segment: usize, expected: usize, actual: usize) -> Self {
        Self::MalformedBuffer {
            segment,
            expected,
            actual,
        }
    }

    /// Create readback error
    pub fn readback(segment: usize, message: impl Into<String>) -> Self {
        Self::Readback {
            segment,
            message: message.into(),
        }
    }

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Whether the error must abort setup (as opposed to degrading one cycle)
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ConfigParse { .. } | Self::Configuration { .. })
    }
}
