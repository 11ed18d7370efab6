//! Ollama HTTP client for local text generation.
//!
//! Speaks the non-streaming `/api/generate` endpoint.
//! See: <https://github.com/ollama/ollama/blob/main/docs/api.md>

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::traits::{GenerateProvider, Prompt};
use crate::{ForgeError, Result};

/// Default base URL for a local Ollama daemon.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

const CONNECTION_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

/// Sampling options sent with every request.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingOptions {
    pub temperature: f32,
    pub top_p: f32,
    /// Maximum tokens to generate (`num_predict`).
    pub max_tokens: u32,
    /// Context window (`num_ctx`).
    pub context_window: u32,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            top_p: 0.9,
            max_tokens: 1500,
            context_window: 8192,
        }
    }
}

/// Client for an Ollama-compatible generation endpoint.
#[derive(Clone)]
pub struct OllamaClient {
    http: Client,
    base_url: String,
    options: SamplingOptions,
}

impl OllamaClient {
    /// Create a client for the local daemon with default options.
    pub fn new() -> Result<Self> {
        Self::with_base_url(
            DEFAULT_BASE_URL,
            SamplingOptions::default(),
            Duration::from_secs(120),
        )
    }

    /// Create a client with a custom base URL (also used for testing with wiremock).
    pub fn with_base_url(
        base_url: impl Into<String>,
        options: SamplingOptions,
        request_timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ForgeError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            options,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check that the daemon answers at all.
    ///
    /// Any HTTP response counts as reachable; only transport failures fail.
    pub async fn check_connection(&self) -> Result<()> {
        self.http
            .get(&self.base_url)
            .timeout(CONNECTION_CHECK_TIMEOUT)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| ForgeError::Connection(format!("{}: {e}", self.base_url)))
    }

    fn check_status(status: reqwest::StatusCode, body: &str, model: &str) -> Result<()> {
        if status.is_success() {
            return Ok(());
        }
        let message = serde_json::from_str::<ErrorBody>(body)
            .map(|b| b.error)
            .unwrap_or_else(|_| body.trim().to_string());

        match status.as_u16() {
            404 => Err(ForgeError::ModelNotFound(model.to_string())),
            code => Err(ForgeError::Api {
                status: code,
                message: if message.is_empty() {
                    format!("Ollama API error: {status}")
                } else {
                    message
                },
            }),
        }
    }
}

#[async_trait]
impl GenerateProvider for OllamaClient {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model: &prompt.model,
            prompt: &prompt.user,
            system: prompt.system.as_deref(),
            stream: false,
            options: RequestOptions {
                temperature: self.options.temperature,
                top_p: self.options.top_p,
                num_predict: self.options.max_tokens,
                num_ctx: self.options.context_window,
            },
        };

        let response = self.http.post(&url).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;
        Self::check_status(status, &text, &prompt.model)?;

        let parsed: GenerateResponse = serde_json::from_str(&text)?;
        Ok(parsed.response)
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    options: RequestOptions,
}

#[derive(Serialize)]
struct RequestOptions {
    temperature: f32,
    top_p: f32,
    num_predict: u32,
    num_ctx: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn not_found_maps_to_model_not_found() {
        let err = OllamaClient::check_status(StatusCode::NOT_FOUND, "", "llama3").unwrap_err();
        assert!(matches!(err, ForgeError::ModelNotFound(ref m) if m == "llama3"));
        assert!(!err.is_transient());
    }

    #[test]
    fn error_body_message_is_extracted() {
        let err = OllamaClient::check_status(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"error":"out of memory"}"#,
            "m",
        )
        .unwrap_err();
        match err {
            ForgeError::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "out of memory");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = OllamaClient::with_base_url(
            "http://localhost:11434/",
            SamplingOptions::default(),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(client.base_url(), "http://localhost:11434");
    }
}
