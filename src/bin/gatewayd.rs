//! gatewayd — Heimdall inference verification gateway daemon.
//!
//! Loads configuration, wires up providers/cache/sandbox/orchestrator, and
//! serves the HTTP API described in `server::routes`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{info, warn};

use heimdall_gateway::cache::{CacheConfig, SemanticCache};
use heimdall_gateway::providers::{
    GoogleProvider, HuggingFaceProvider, OllamaProvider, OpenAiCompatibleProvider, ProviderRegistry,
    RetryConfig, RetryingProvider, TokenBucket,
};
use heimdall_gateway::providers::traits::Provider;
use heimdall_gateway::sandbox::{detect, SandboxExecutor};
use heimdall_gateway::server::{build_router, AppState, Config, Secrets};
use heimdall_gateway::{version, Orchestrator};

/// Heimdall inference verification gateway.
#[derive(Parser)]
#[command(name = "gatewayd")]
#[command(version = version::PKG_VERSION)]
#[command(about = "Fan a prompt out to multiple LLM providers, sandbox-execute and verify the results")]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // `RUST_LOG` takes precedence when set; otherwise fall back to the
    // gateway's own `LOG_LEVEL` variable, then "info".
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        tracing_subscriber::EnvFilter::new(level)
    });
    // JSON logs in production, human-readable in development — same switch
    // the gateway's `ENVIRONMENT` variable drives elsewhere in the stack.
    let production = std::env::var("ENVIRONMENT").map(|v| v != "development").unwrap_or(true);
    if production {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let args = Args::parse();

    let config = Config::load(args.config.as_deref())?;
    let secrets = Secrets::load()?;

    let prometheus_handle = PrometheusBuilder::new().install_recorder()?;

    let registry = build_provider_registry(&config, &secrets);
    if registry.is_empty() {
        warn!("no providers configured; every inference request will 503");
    }

    let models: HashMap<String, String> = registry
        .iter()
        .map(|p| (p.provider_name().to_string(), model_name_for(&config, p.provider_name())))
        .collect();
    let providers: Vec<Arc<dyn Provider>> = registry.iter().cloned().collect();

    let rate_limiters = build_rate_limiters(&config, &registry);

    let model_cache_dir = dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("heimdall")
        .join("embeddings");
    let cache = Arc::new(SemanticCache::new(
        CacheConfig {
            max_entries: 10_000,
            ttl: config.cache.ttl(),
            similarity_threshold: config.cache.similarity_threshold,
        },
        model_cache_dir,
    ));

    let sandbox = Arc::new(build_sandbox(&config).await);

    let orchestrator = Arc::new(Orchestrator::new(
        registry,
        rate_limiters,
        cache.clone(),
        Duration::from_secs(config.server.limits.request_timeout_secs),
    ));

    let gateway_api_key = secrets.gateway_api_key();
    if gateway_api_key.is_none() {
        warn!("GATEWAY_API_KEY not set; authenticated routes will reject every request");
    }

    let state = AppState {
        orchestrator,
        sandbox,
        cache,
        providers,
        models,
        gateway_api_key,
        prometheus_handle,
    };

    let app = build_router(state);

    let addr: SocketAddr = config
        .server
        .address
        .parse()
        .map_err(|e| format!("invalid server.address {:?}: {e}", config.server.address))?;

    info!(version = %version::version_string(), %addr, "gatewayd starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let shutdown = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
        info!("shutdown signal received, draining connections");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("gatewayd stopped");
    Ok(())
}

/// Register a provider for every backend that has both a configured section
/// (or the section's absence doesn't matter for Ollama, which has no key)
/// and an available API key. A missing key silently excludes the provider
/// rather than failing startup — partial provider sets are a normal gateway
/// configuration, not an error.
fn build_provider_registry(config: &Config, secrets: &Secrets) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    let retry_config = RetryConfig::new();

    if let Some(key) = secrets.api_key("groq") {
        let model = config.model_for("groq").unwrap_or_else(|| "llama-3.1-70b-versatile".to_string());
        let provider = OpenAiCompatibleProvider::named("groq", key, model, "https://api.groq.com/openai/v1");
        registry.add(Arc::new(RetryingProvider::new(Arc::new(provider), retry_config.clone())));
    }

    if let Some(key) = secrets.api_key("gemini") {
        let model = config.model_for("gemini").unwrap_or_else(|| "gemini-1.5-flash".to_string());
        let provider = GoogleProvider::new(key, model);
        registry.add(Arc::new(RetryingProvider::new(Arc::new(provider), retry_config.clone())));
    }

    if let Some(key) = secrets.api_key("openai") {
        let model = config.model_for("openai").unwrap_or_else(|| "gpt-4o-mini".to_string());
        let provider = OpenAiCompatibleProvider::openai(key, model);
        registry.add(Arc::new(RetryingProvider::new(Arc::new(provider), retry_config.clone())));
    }

    if let Some(key) = secrets.api_key("huggingface") {
        let model = config
            .model_for("huggingface")
            .unwrap_or_else(|| "meta-llama/Llama-3.1-8B-Instruct".to_string());
        let provider = HuggingFaceProvider::new(key, model);
        registry.add(Arc::new(RetryingProvider::new(Arc::new(provider), retry_config.clone())));
    }

    if let Some(ref ollama) = config.providers.ollama {
        let model = config.model_for("ollama").unwrap_or_else(|| "llama3".to_string());
        let provider = OllamaProvider::with_base_url(model, ollama.base_url.clone());
        registry.add(Arc::new(RetryingProvider::new(Arc::new(provider), retry_config)));
    }

    registry
}

fn model_name_for(config: &Config, provider: &str) -> String {
    config.model_for(provider).unwrap_or_else(|| "unknown".to_string())
}

fn build_rate_limiters(config: &Config, registry: &ProviderRegistry) -> HashMap<String, Arc<TokenBucket>> {
    registry
        .names()
        .into_iter()
        .map(|name| {
            let rpm = config.rpm_for(&name);
            (name, Arc::new(TokenBucket::new(rpm, Duration::from_secs(60))))
        })
        .collect()
}

/// Prefer the container backend; fall back to the bare-subprocess backend
/// when no Docker/Podman daemon answers the startup ping.
async fn build_sandbox(config: &Config) -> SandboxExecutor {
    let detection = detect::check_docker().await;
    if detection.status.is_ok() {
        match detect::connect_docker().await {
            Ok(docker) => {
                info!(
                    runtime = detection.runtime.map(|r| r.as_str()).unwrap_or("unknown"),
                    "container runtime detected, using container sandbox backend"
                );
                return SandboxExecutor::container(docker, config.sandbox.cleanup_containers);
            }
            Err(e) => {
                warn!(error = %e, "container runtime detected but connection failed, falling back to subprocess sandbox");
            }
        }
    } else {
        warn!(
            status = detection.status.as_str(),
            hint = detection.platform.install_hint(),
            "no container runtime available, falling back to subprocess sandbox (not a security boundary)"
        );
    }
    SandboxExecutor::subprocess()
}
