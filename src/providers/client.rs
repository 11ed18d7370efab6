//! Retrying, throttled generation client.

use std::sync::Arc;

use super::retry::{RetryConfig, with_retry};
use super::traits::GenerateProvider;
use crate::prompts;
use crate::throttle::LoadController;
use crate::types::{DefectKind, GenerationParams, GenerationRequest};
use crate::Result;

/// The only component that talks to the generation endpoint.
///
/// Wraps a [`GenerateProvider`] with pacing, retry and load feedback. Cheap
/// to clone; clones share the provider and the load controller.
#[derive(Clone)]
pub struct GenerationClient {
    provider: Arc<dyn GenerateProvider>,
    retry: RetryConfig,
    throttle: Arc<LoadController>,
}

impl GenerationClient {
    pub fn new(
        provider: Arc<dyn GenerateProvider>,
        retry: RetryConfig,
        throttle: Arc<LoadController>,
    ) -> Self {
        Self {
            provider,
            retry,
            throttle,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn throttle(&self) -> &Arc<LoadController> {
        &self.throttle
    }

    /// Generate questions for `request`.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let prompt = prompts::generation_prompt(request);
        with_retry(
            &self.retry,
            &self.throttle,
            &prompt.model,
            "generate",
            || self.provider.generate(&prompt),
        )
        .await
    }

    /// Ask for a corrected version of `previous`, which had `defects`.
    pub async fn refine(
        &self,
        params: &GenerationParams,
        previous: &str,
        defects: &[DefectKind],
    ) -> Result<String> {
        let prompt = prompts::refine_prompt(params, previous, defects);
        with_retry(
            &self.retry,
            &self.throttle,
            &prompt.model,
            "refine",
            || self.provider.generate(&prompt),
        )
        .await
    }
}
