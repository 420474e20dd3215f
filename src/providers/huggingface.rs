//! HuggingFace Inference API client — raw text-completion adapter.
//!
//! Uses HuggingFace's serverless text-generation pipeline. See:
//! <https://huggingface.co/docs/api-inference/index>

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::traits::{CompletionRequest, CompletionResponse, Provider, Usage};
use crate::{GatewayError, Result};

const DEFAULT_BASE_URL: &str = "https://api-inference.huggingface.co";

/// Client for HuggingFace's text-generation inference endpoint.
#[derive(Clone)]
pub struct HuggingFaceProvider {
    api_key: String,
    model: String,
    http: Client,
    base_url: String,
}

impl HuggingFaceProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_base_url(api_key, model, DEFAULT_BASE_URL)
    }

    /// Construct with a custom base URL, for testing against a wiremock server.
    pub fn with_base_url(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("failed to build HTTP client");

        Self {
            api_key: api_key.into(),
            model: model.into(),
            http,
            base_url: base_url.into(),
        }
    }

    fn handle_response_errors(&self, response: &reqwest::Response) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        match status.as_u16() {
            401 => Err(GatewayError::AuthenticationFailed),
            429 => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .map(Duration::from_secs);
                Err(GatewayError::RateLimited { retry_after })
            }
            503 => Err(GatewayError::Provider {
                provider: "huggingface".to_string(),
                message: "model is loading, please retry".to_string(),
            }),
            code => Err(GatewayError::Provider {
                provider: "huggingface".to_string(),
                message: format!("HuggingFace API error: {code}"),
            }),
        }
    }
}

#[derive(Serialize)]
struct GenerationRequest<'a> {
    inputs: &'a str,
    parameters: GenerationParameters,
}

#[derive(Serialize)]
struct GenerationParameters {
    temperature: f32,
    max_new_tokens: u32,
}

#[derive(Deserialize)]
struct GenerationResponseItem {
    generated_text: String,
}

#[async_trait]
impl Provider for HuggingFaceProvider {
    fn provider_name(&self) -> &str {
        "huggingface"
    }

    async fn generate_completion(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let url = format!("{}/models/{}", self.base_url, self.model);

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&GenerationRequest {
                inputs: &request.prompt,
                parameters: GenerationParameters {
                    // HuggingFace rejects temperature == 0.0; treat it as
                    // effectively-greedy via a very small positive value.
                    temperature: request.temperature.max(0.01),
                    max_new_tokens: request.max_tokens,
                },
            })
            .send()
            .await?;

        self.handle_response_errors(&response)?;

        let items: Vec<GenerationResponseItem> = response.json().await?;
        let text = items
            .into_iter()
            .next()
            .map(|item| item.generated_text)
            .ok_or_else(|| GatewayError::Provider {
                provider: "huggingface".to_string(),
                message: "empty response".to_string(),
            })?;

        Ok(CompletionResponse {
            text,
            model_name: self.model.clone(),
            usage: Usage::default(),
        })
    }
}
