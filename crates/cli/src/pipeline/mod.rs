//! Capture pipeline: mock renderer -> sensor -> dispatcher.

mod orchestrator;
mod stats;

pub use orchestrator::{Pipeline, PipelineConfig};
pub use stats::PipelineStats;
