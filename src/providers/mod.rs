//! Provider adapters.
//!
//! This module contains the [`Provider`] trait every backend implements, the
//! [`ProviderRegistry`] that holds a gateway's configured set, the
//! [`retry::RetryingProvider`] decorator, [`rate_limit::TokenBucket`], and the
//! four concrete backend adapters.

pub mod google;
pub mod huggingface;
pub mod ollama;
pub mod openai;
pub mod rate_limit;
pub mod registry;
pub mod retry;
pub mod traits;

pub use google::GoogleProvider;
pub use huggingface::HuggingFaceProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiCompatibleProvider;
pub use rate_limit::TokenBucket;
pub use registry::ProviderRegistry;
pub use retry::{RetryConfig, RetryingProvider};
pub use traits::{CompletionRequest, CompletionResponse, Provider, Usage};
