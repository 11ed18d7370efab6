//! Generation providers and the retrying client built on them.
//!
//! - [`GenerateProvider`] - one request, no retry (trait seam for mocks)
//! - [`OllamaClient`] - HTTP implementation for a local Ollama daemon
//! - [`GenerationClient`] - pacing, retry and load feedback around a provider

pub mod client;
pub mod ollama;
pub mod retry;
pub mod traits;

pub use client::GenerationClient;
pub use ollama::{OllamaClient, SamplingOptions};
pub use retry::RetryConfig;
pub use traits::{GenerateProvider, Prompt};
