//! Ollama HTTP client.
//!
//! Talks to a local Ollama server: `POST /api/generate` for non-streaming
//! completions and `GET /api/tags` for the list of provisioned models.

use crate::config::BackendConfig;
use crate::error::{RagError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One completion request, independent of the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest<'a> {
    /// Backend model name.
    pub model: &'a str,
    /// System persona.
    pub system: &'a str,
    /// User prompt.
    pub prompt: &'a str,
    pub temperature: f32,
    /// Advisory thread count.
    pub num_thread: Option<u32>,
}

/// Anything that can complete a prompt.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Generate a full (non-streamed) response.
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String>;
}

/// Request body for `/api/generate`.
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_thread: Option<u32>,
}

/// Response from `/api/generate` with `stream: false`.
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Response from `/api/tags`.
#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

/// Ollama error body.
#[derive(Debug, Deserialize)]
struct ApiError {
    error: String,
}

/// Ollama API client.
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    config: BackendConfig,
}

impl OllamaClient {
    /// Create a new client with the given configuration.
    pub fn new(config: BackendConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| RagError::Http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn endpoint(&self, path: &str) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        format!("{}/api/{}", base, path)
    }

    /// Names of the models provisioned in the backend.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(self.endpoint("tags"))
            .send()
            .await
            .map_err(|e| transport_error("*", e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error("*", e))?;

        if !status.is_success() {
            return Err(RagError::LlmApi(format!(
                "Listing models failed ({}): {}",
                status, body
            )));
        }

        let tags: TagsResponse = serde_json::from_str(&body)?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Fail with a pull hint unless `model` is provisioned.
    pub async fn ensure_model(&self, model: &str) -> Result<()> {
        let available = self.list_models().await?;
        if has_model(&available, model) {
            Ok(())
        } else {
            Err(RagError::model_missing(
                model,
                format!("not among the {} provisioned models", available.len()),
            ))
        }
    }

    /// Check that the server answers.
    pub async fn test_connection(&self) -> Result<usize> {
        self.list_models().await.map(|models| models.len())
    }
}

#[async_trait]
impl Backend for OllamaClient {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String> {
        let body = GenerateRequest {
            model: request.model,
            prompt: request.prompt,
            system: request.system,
            stream: false,
            options: GenerateOptions {
                temperature: request.temperature,
                num_thread: request.num_thread,
            },
        };

        tracing::debug!(
            "Generating with {} ({} prompt bytes)",
            request.model,
            request.prompt.len()
        );

        let response = self
            .client
            .post(self.endpoint("generate"))
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(request.model, e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| transport_error(request.model, e))?;

        if !status.is_success() {
            return Err(status_error(request.model, status, &text));
        }

        let generated: GenerateResponse = serde_json::from_str(&text)?;
        Ok(generated.response)
    }
}

/// Whether `model` is among `available`; `llama2` matches `llama2:latest`.
pub fn has_model(available: &[String], model: &str) -> bool {
    available
        .iter()
        .any(|name| name == model || name.strip_suffix(":latest") == Some(model))
}

fn transport_error(model: &str, err: reqwest::Error) -> RagError {
    if err.is_connect() {
        RagError::unreachable(model, err.to_string())
    } else if err.is_timeout() {
        RagError::Http(format!("Request to model '{}' timed out: {}", model, err))
    } else {
        RagError::Http(err.to_string())
    }
}

fn status_error(model: &str, status: StatusCode, body: &str) -> RagError {
    let message = serde_json::from_str::<ApiError>(body)
        .map(|e| e.error)
        .unwrap_or_else(|_| body.to_string());

    if status == StatusCode::NOT_FOUND || message.contains("not found") {
        RagError::model_missing(model, message)
    } else {
        RagError::LlmApi(format!("Request failed ({}): {}", status, message))
    }
}
