//! mcqforge - multiple-choice flashcard generation from lecture notes
//!
//! Lecture and concept notes are turned into work units, each of which is
//! run through a content-addressed cache, a throttled and retrying
//! generation client, a structural validator and a bounded refine loop.
//! Accepted question sets are cached and rendered into one markdown
//! document per subject week.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use mcqforge::{
//!     CacheStore, GenerationClient, GenerationParams, LoadController, OllamaClient, Pipeline,
//!     PipelineConfig, Preset, RetryConfig, UnitKind, WorkUnit,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> mcqforge::Result<()> {
//!     let provider = Arc::new(OllamaClient::new()?);
//!     let throttle = Arc::new(LoadController::default());
//!     let client = GenerationClient::new(provider, RetryConfig::default(), throttle);
//!     let cache = Arc::new(CacheStore::open("/tmp/mcqforge-cache")?);
//!     let params = GenerationParams::resolve("llama3:8b", "ECON1101", Preset::Exam, None, None);
//!
//!     let pipeline = Pipeline::new(client, cache, Arc::new(params), PipelineConfig::default());
//!     let units = vec![WorkUnit::new(
//!         0,
//!         "W01 Scarcity.md",
//!         UnitKind::Lecture,
//!         "Scarcity forces choices; the opportunity cost of a choice is the next best alternative.",
//!     )];
//!
//!     let report = pipeline.run(units, CancellationToken::new()).await;
//!     println!("{} succeeded", report.stats.succeeded());
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod cleaner;
pub mod config;
pub mod error;
pub mod notes;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod providers;
pub mod telemetry;
pub mod throttle;
pub mod types;
pub mod validate;

// Re-export main types at crate root
pub use cache::{CacheEntry, CacheKey, CacheStore};
pub use config::Config;
pub use error::{ForgeError, Result};
pub use pipeline::{Pipeline, PipelineConfig};
pub use providers::{GenerateProvider, GenerationClient, OllamaClient, Prompt, RetryConfig};
pub use throttle::{LoadController, ThrottleConfig, ThrottleSnapshot};
pub use validate::validate;

pub use types::{
    BloomLevel, DefectKind, Difficulty, GenerationOutcome, GenerationParams, GenerationRequest,
    OutcomeStatus, Persona, Preset, RunReport, RunStats, UnitKind, UnitReport, ValidationResult,
    WorkUnit,
};
