//! OpenAI-compatible chat-completions adapter.
//!
//! Also serves any provider that mirrors OpenAI's `/chat/completions` wire
//! format — Groq and OpenRouter both do, so this adapter is instantiated
//! under different `provider_name()`s via [`OpenAiCompatibleProvider::named`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::traits::{CompletionRequest, CompletionResponse, Provider, Usage};
use crate::{GatewayError, Result};

#[derive(Clone)]
pub struct OpenAiCompatibleProvider {
    name: String,
    api_key: String,
    model: String,
    base_url: String,
    http: Client,
}

impl OpenAiCompatibleProvider {
    /// `base_url` should point at the root, e.g. `https://api.openai.com/v1`.
    pub fn named(
        name: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("failed to build HTTP client");
        Self {
            name: name.into(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into(),
            http,
        }
    }

    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::named("openai", api_key, model, "https://api.openai.com/v1")
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
            code => Err(GatewayError::Provider {
                provider: self.name.clone(),
                message: format!("{} API error: {code}", self.name),
            }),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

#[async_trait]
impl Provider for OpenAiCompatibleProvider {
    fn provider_name(&self) -> &str {
        &self.name
    }

    async fn generate_completion(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&ChatRequest {
                model: &self.model,
                messages: vec![ChatMessage {
                    role: "user",
                    content: &request.prompt,
                }],
                temperature: request.temperature,
                max_tokens: request.max_tokens,
            })
            .send()
            .await?;

        self.handle_response_errors(&response)?;

        let body: ChatResponse = response.json().await?;
        let text = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| GatewayError::Provider {
                provider: self.name.clone(),
                message: "empty response".to_string(),
            })?;

        Ok(CompletionResponse {
            text,
            model_name: self.model.clone(),
            usage: Usage {
                prompt_tokens: body.usage.as_ref().and_then(|u| u.prompt_tokens),
                completion_tokens: body.usage.as_ref().and_then(|u| u.completion_tokens),
            },
        })
    }
}
