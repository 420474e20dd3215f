//! Local Ollama daemon adapter.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::traits::{CompletionRequest, CompletionResponse, Provider, Usage};
use crate::{GatewayError, Result};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

#[derive(Clone)]
pub struct OllamaProvider {
    model: String,
    base_url: String,
    http: Client,
}

impl OllamaProvider {
    pub fn new(model: impl Into<String>) -> Self {
        Self::with_base_url(model, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(model: impl Into<String>, base_url: impl Into<String>) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("failed to build HTTP client");
        Self {
            model: model.into(),
            base_url: base_url.into(),
            http,
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[async_trait]
impl Provider for OllamaProvider {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    async fn generate_completion(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let url = format!("{}/api/generate", self.base_url);

        let response = self
            .http
            .post(&url)
            .json(&GenerateRequest {
                model: &self.model,
                prompt: &request.prompt,
                stream: false,
                options: GenerateOptions {
                    temperature: request.temperature,
                    num_predict: request.max_tokens,
                },
            })
            .send()
            .await
            .map_err(|e| GatewayError::Provider {
                provider: "ollama".to_string(),
                message: format!("local daemon unreachable: {e}"),
            })?;

        if !response.status().is_success() {
            return Err(GatewayError::Provider {
                provider: "ollama".to_string(),
                message: format!("ollama API error: {}", response.status()),
            });
        }

        let body: GenerateResponse = response.json().await?;

        Ok(CompletionResponse {
            text: body.response,
            model_name: self.model.clone(),
            usage: Usage {
                prompt_tokens: body.prompt_eval_count,
                completion_tokens: body.eval_count,
            },
        })
    }

    async fn health_check(&self) -> Result<()> {
        let url = format!("{}/api/tags", self.base_url);
        self.http
            .get(&url)
            .send()
            .await
            .map_err(|e| GatewayError::Provider {
                provider: "ollama".to_string(),
                message: format!("local daemon unreachable: {e}"),
            })?;
        Ok(())
    }
}
