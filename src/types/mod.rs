//! Public types for the mcqforge API.

mod outcome;
mod params;
mod request;
mod validation;

pub use outcome::{GenerationOutcome, OutcomeStatus, RunReport, RunStats, UnitReport};
pub use params::{BloomLevel, Difficulty, GenerationParams, Persona, Preset};
pub use request::{GenerationRequest, UnitKind, WorkUnit};
pub use validation::{DefectKind, ValidationResult};
