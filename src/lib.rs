//! Heimdall — an inference verification gateway.
//!
//! Fans a prompt out to several LLM providers in parallel, extracts any
//! code blocks from each response, executes them in an isolated sandbox,
//! heals sandbox failures with a single reflexion pass, and synthesizes a
//! verified answer across the set. No single model is trusted; cross-model
//! execution plus consensus gives a measurable trust signal instead.
//!
//! # Pipeline
//!
//! ```text
//! request -> Orchestrator -> [Provider * N]  (parallel, cache-intercepted)
//!                -> CodeExtractor -> Sandbox (parallel per block)
//!                -> Healer (on failure, at most once per block)
//!                -> Synthesizer -> response
//! ```
//!
//! The modules here compose into a library; [`server`] plus the `gatewayd`
//! binary wire them into a running HTTP service.

pub mod cache;
pub mod error;
pub mod extractor;
pub mod healer;
pub mod orchestrator;
pub mod providers;
pub mod sandbox;
pub mod server;
pub mod synthesizer;
pub mod telemetry;
pub mod types;
pub mod version;

pub use error::{GatewayError, Result};
pub use orchestrator::Orchestrator;
pub use providers::{ProviderRegistry, RetryConfig, RetryingProvider};
pub use sandbox::SandboxExecutor;
