//! Generation pipeline: per-unit state machine and worker pool.

pub mod orchestrator;
pub mod state;

pub use orchestrator::{Pipeline, PipelineConfig};
pub use state::{Event, Phase, UnitState};
