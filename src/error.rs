//! Gateway error types

use std::time::Duration;

/// Unified error type for the inference gateway.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum GatewayError {
    /// A provider call failed — network error, non-2xx response, or the
    /// provider's own error payload.
    #[error("provider '{provider}' error: {message}")]
    Provider { provider: String, message: String },

    /// Rate limited by a provider.
    ///
    /// `retry_after` is populated when the response carries a `Retry-After`
    /// header; `None` otherwise.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("authentication failed")]
    AuthenticationFailed,

    /// Sandbox execution failed outright (container/process couldn't run),
    /// as distinct from the executed code itself exiting non-zero.
    #[error("sandbox error: {message}")]
    Sandbox {
        message: String,
        exit_code: Option<i32>,
        stderr: Option<String>,
    },

    #[error("execution timed out after {0}s")]
    Timeout(u64),

    #[error("code extraction error: {0}")]
    CodeExtraction(String),

    #[error("verification error: {0}")]
    Verification(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("no providers configured")]
    NoProvider,

    #[error("all providers failed")]
    AllProvidersFailed,
}

impl GatewayError {
    /// Whether this error is transient and the request may succeed on retry.
    ///
    /// Used by [`crate::providers::retry::with_retry`] to decide whether to
    /// retry a failed provider call. Permanent errors (auth, configuration)
    /// return `false`.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::Timeout(_) => true,
            Self::Provider { message, .. } => {
                let lower = message.to_lowercase();
                lower.contains("timeout")
                    || lower.contains("connection")
                    || lower.contains("reset")
                    || lower.contains("refused")
                    || lower.contains("503")
                    || lower.contains("502")
                    || lower.contains("500")
            }
            Self::AuthenticationFailed
            | Self::Sandbox { .. }
            | Self::CodeExtraction(_)
            | Self::Verification(_)
            | Self::Configuration(_)
            | Self::Json(_)
            | Self::NoProvider
            | Self::AllProvidersFailed => false,
        }
    }

    /// For [`GatewayError::RateLimited`], the duration the provider suggests
    /// waiting before the next attempt.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Json(err.to_string())
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Provider {
                provider: "unknown".to_string(),
                message: format!("timeout: {err}"),
            }
        } else {
            GatewayError::Provider {
                provider: "unknown".to_string(),
                message: err.to_string(),
            }
        }
    }
}

/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
