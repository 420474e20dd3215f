//! Google Generative Language API adapter (Gemini family).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::traits::{CompletionRequest, CompletionResponse, Provider, Usage};
use crate::{GatewayError, Result};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Clone)]
pub struct GoogleProvider {
    api_key: String,
    model: String,
    base_url: String,
    http: Client,
}

impl GoogleProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_base_url(api_key, model, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("failed to build HTTP client");
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into(),
            http,
        }
    }

    fn handle_response_errors(&self, response: &reqwest::Response) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        match status.as_u16() {
            401 | 403 => Err(GatewayError::AuthenticationFailed),
            429 => Err(GatewayError::RateLimited { retry_after: None }),
            code => Err(GatewayError::Provider {
                provider: "google".to_string(),
                message: format!("google API error: {code}"),
            }),
        }
    }
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata", default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: String,
}

#[derive(Deserialize)]
struct UsageMetadata {
    #[serde(rename = "promptTokenCount")]
    prompt_token_count: Option<u32>,
    #[serde(rename = "candidatesTokenCount")]
    candidates_token_count: Option<u32>,
}

#[async_trait]
impl Provider for GoogleProvider {
    fn provider_name(&self) -> &str {
        "google"
    }

    async fn generate_completion(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let response = self
            .http
            .post(&url)
            .json(&GenerateContentRequest {
                contents: vec![Content {
                    parts: vec![Part {
                        text: &request.prompt,
                    }],
                }],
                generation_config: GenerationConfig {
                    temperature: request.temperature,
                    max_output_tokens: request.max_tokens,
                },
            })
            .send()
            .await?;

        self.handle_response_errors(&response)?;

        let body: GenerateContentResponse = response.json().await?;
        let text = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| GatewayError::Provider {
                provider: "google".to_string(),
                message: "empty response".to_string(),
            })?;

        Ok(CompletionResponse {
            text,
            model_name: self.model.clone(),
            usage: Usage {
                prompt_tokens: body
                    .usage_metadata
                    .as_ref()
                    .and_then(|u| u.prompt_token_count),
                completion_tokens: body
                    .usage_metadata
                    .as_ref()
                    .and_then(|u| u.candidates_token_count),
            },
        })
    }
}
