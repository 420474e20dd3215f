//! Configuration loading for `gatewayd`.
//!
//! Configuration is loaded from a TOML file with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.heimdall/config.toml` (user)
//! 3. `/etc/heimdall/config.toml` (system)
//!
//! Every setting also has an environment variable fallback so the gateway
//! can run config-file-free in a container. Secrets (API keys, the
//! gateway's own bearer key) are loaded separately with mandatory
//! permission checks when read from a file:
//! 1. `~/.heimdall/secrets.toml` (user, must be 0600)
//! 2. `/etc/heimdall/secrets.toml` (system, must be 0600)

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{GatewayError, Result};

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub cache: CacheTomlConfig,
    #[serde(default)]
    pub sandbox: SandboxTomlConfig,
    #[serde(default)]
    pub rate_limit: RateLimitTomlConfig,
}

/// Server network configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default)]
    pub limits: LimitsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            limits: LimitsConfig::default(),
        }
    }
}

fn default_address() -> String {
    "0.0.0.0:8000".to_string()
}

/// Resource limits on the HTTP surface.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    120
}

/// Per-provider model + rate-limit configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub model: Option<String>,
    /// Requests per minute allowed for this provider.
    pub rpm: Option<f64>,
}

/// Ollama-specific configuration (no API key — it's a local daemon).
#[derive(Debug, Clone, Deserialize)]
pub struct OllamaConfig {
    pub model: Option<String>,
    pub rpm: Option<f64>,
    #[serde(default = "default_ollama_url")]
    pub base_url: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            model: None,
            rpm: None,
            base_url: default_ollama_url(),
        }
    }
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub groq: Option<ProviderConfig>,
    #[serde(default)]
    pub gemini: Option<ProviderConfig>,
    #[serde(default)]
    pub openai: Option<ProviderConfig>,
    #[serde(default)]
    pub huggingface: Option<ProviderConfig>,
    #[serde(default)]
    pub ollama: Option<OllamaConfig>,
}

/// Semantic cache configuration (TOML section `[cache]`).
#[derive(Debug, Clone, Deserialize)]
pub struct CacheTomlConfig {
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheTomlConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

fn default_similarity_threshold() -> f32 {
    0.95
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

impl CacheTomlConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Sandbox resource defaults (TOML section `[sandbox]`), overridable per-request.
#[derive(Debug, Clone, Deserialize)]
pub struct SandboxTomlConfig {
    #[serde(default = "default_sandbox_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_sandbox_memory_limit")]
    pub memory_limit: String,
    #[serde(default = "default_sandbox_cpu_limit")]
    pub cpu_limit: f64,
    #[serde(default = "default_true")]
    pub network_disabled: bool,
    #[serde(default = "default_docker_host")]
    pub docker_host: String,
    #[serde(default = "default_true")]
    pub cleanup_containers: bool,
}

impl Default for SandboxTomlConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_sandbox_timeout(),
            memory_limit: default_sandbox_memory_limit(),
            cpu_limit: default_sandbox_cpu_limit(),
            network_disabled: true,
            docker_host: default_docker_host(),
            cleanup_containers: true,
        }
    }
}

fn default_sandbox_timeout() -> u64 {
    30
}

fn default_sandbox_memory_limit() -> String {
    "256m".to_string()
}

fn default_sandbox_cpu_limit() -> f64 {
    0.5
}

fn default_docker_host() -> String {
    "unix:///var/run/docker.sock".to_string()
}

fn default_true() -> bool {
    true
}

/// Inbound request throttling, independent of per-provider outbound limits.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitTomlConfig {
    #[serde(default = "default_max_requests_per_minute")]
    pub max_requests_per_minute: f64,
}

impl Default for RateLimitTomlConfig {
    fn default() -> Self {
        Self {
            max_requests_per_minute: default_max_requests_per_minute(),
        }
    }
}

fn default_max_requests_per_minute() -> f64 {
    10.0
}

/// Secrets configuration (API keys + the gateway's own bearer key).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub groq: Option<ApiKeySecret>,
    #[serde(default)]
    pub gemini: Option<ApiKeySecret>,
    #[serde(default)]
    pub openai: Option<ApiKeySecret>,
    #[serde(default)]
    pub huggingface: Option<ApiKeySecret>,
    /// Value clients must present in `X-API-Key` to reach authenticated routes.
    #[serde(default)]
    pub gateway_api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeySecret {
    pub api_key: String,
}

/// Provider name → API key environment variable.
const PROVIDER_ENV_VARS: &[(&str, &str)] = &[
    ("groq", "GROQ_API_KEY"),
    ("gemini", "GOOGLE_API_KEY"),
    ("openai", "OPENAI_API_KEY"),
    ("huggingface", "HUGGINGFACE_API_KEY"),
];

/// Provider name → default-model environment variable.
const PROVIDER_MODEL_ENV_VARS: &[(&str, &str)] = &[
    ("groq", "GROQ_MODEL"),
    ("gemini", "GEMINI_MODEL"),
    ("openai", "OPENAI_MODEL"),
    ("huggingface", "HUGGINGFACE_MODEL"),
    ("ollama", "OLLAMA_MODEL"),
];

impl Config {
    /// Resolution order: explicit path, `~/.heimdall/config.toml`,
    /// `/etc/heimdall/config.toml`. Falls back to [`Config::default`] with
    /// environment-variable overrides if no file exists at all.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path) {
            Ok(path) => {
                let content = fs::read_to_string(&path).map_err(|e| {
                    GatewayError::Configuration(format!("failed to read config file {path:?}: {e}"))
                })?;
                let mut config: Config = toml::from_str(&content).map_err(|e| {
                    GatewayError::Configuration(format!("failed to parse config file {path:?}: {e}"))
                })?;
                config.apply_env_overrides();
                Ok(config)
            }
            Err(_) if explicit_path.is_none() => {
                let mut config = Config::default();
                config.apply_env_overrides();
                Ok(config)
            }
            Err(e) => Err(e),
        }
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(GatewayError::Configuration(format!(
                "config file not found: {path:?}"
            )));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".heimdall").join("config.toml");
            if user_config.exists() {
                return Ok(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/heimdall/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }

        Err(GatewayError::Configuration("no config file found".to_string()))
    }

    /// Environment variables take precedence over file-absent defaults, but
    /// never override a value explicitly set in the TOML file.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("MAX_REQUESTS_PER_MINUTE") {
            if let Ok(parsed) = v.parse() {
                self.rate_limit.max_requests_per_minute = parsed;
            }
        }
        if let Ok(v) = std::env::var("REQUEST_TIMEOUT") {
            if let Ok(parsed) = v.parse() {
                self.server.limits.request_timeout_secs = parsed;
            }
        }
        if let Ok(v) = std::env::var("CACHE_SIMILARITY_THRESHOLD") {
            if let Ok(parsed) = v.parse() {
                self.cache.similarity_threshold = parsed;
            }
        }
        if let Ok(v) = std::env::var("CACHE_TTL") {
            if let Ok(parsed) = v.parse() {
                self.cache.ttl_secs = parsed;
            }
        }
        if let Ok(v) = std::env::var("SANDBOX_TIMEOUT") {
            if let Ok(parsed) = v.parse() {
                self.sandbox.timeout_secs = parsed;
            }
        }
        if let Ok(v) = std::env::var("SANDBOX_MEMORY_LIMIT") {
            self.sandbox.memory_limit = v;
        }
        if let Ok(v) = std::env::var("SANDBOX_CPU_LIMIT") {
            if let Ok(parsed) = v.parse() {
                self.sandbox.cpu_limit = parsed;
            }
        }
        if let Ok(v) = std::env::var("SANDBOX_NETWORK_DISABLED") {
            if let Ok(parsed) = v.parse() {
                self.sandbox.network_disabled = parsed;
            }
        }
        if let Ok(v) = std::env::var("DOCKER_HOST") {
            self.sandbox.docker_host = v;
        }
        if let Ok(v) = std::env::var("CLEANUP_CONTAINERS") {
            if let Ok(parsed) = v.parse() {
                self.sandbox.cleanup_containers = parsed;
            }
        }
        // Per-provider model/rpm overrides are resolved lazily by `model_for`
        // and `rpm_for`, which fall back to the `*_MODEL`/`*_RPM` environment
        // variables when the TOML file doesn't set them.
    }

    /// Resolve the model name for `provider`, preferring the TOML value and
    /// falling back to its `*_MODEL` environment variable.
    pub fn model_for(&self, provider: &str) -> Option<String> {
        let from_toml = match provider {
            "groq" => self.providers.groq.as_ref().and_then(|c| c.model.clone()),
            "gemini" => self.providers.gemini.as_ref().and_then(|c| c.model.clone()),
            "openai" => self.providers.openai.as_ref().and_then(|c| c.model.clone()),
            "huggingface" => self
                .providers
                .huggingface
                .as_ref()
                .and_then(|c| c.model.clone()),
            "ollama" => self.providers.ollama.as_ref().and_then(|c| c.model.clone()),
            _ => None,
        };
        from_toml.or_else(|| {
            PROVIDER_MODEL_ENV_VARS
                .iter()
                .find(|(name, _)| *name == provider)
                .and_then(|(_, env_var)| std::env::var(env_var).ok())
        })
    }

    /// Resolve the per-minute rate limit for `provider`, preferring the TOML
    /// value and falling back to its `*_RPM` environment variable, then the
    /// documented default.
    pub fn rpm_for(&self, provider: &str) -> f64 {
        let (from_toml, env_var, default) = match provider {
            "groq" => (self.providers.groq.as_ref().and_then(|c| c.rpm), "GROQ_RPM", 30.0),
            "gemini" => (
                self.providers.gemini.as_ref().and_then(|c| c.rpm),
                "GEMINI_RPM",
                6.0,
            ),
            "openai" => (
                self.providers.openai.as_ref().and_then(|c| c.rpm),
                "OPENAI_RPM",
                60.0,
            ),
            "huggingface" => (
                self.providers.huggingface.as_ref().and_then(|c| c.rpm),
                "HUGGINGFACE_RPM",
                30.0,
            ),
            "ollama" => (
                self.providers.ollama.as_ref().and_then(|c| c.rpm),
                "OLLAMA_RPM",
                60.0,
            ),
            _ => (None, "", 60.0),
        };
        from_toml
            .or_else(|| std::env::var(env_var).ok().and_then(|v| v.parse().ok()))
            .unwrap_or(default)
    }
}

impl Secrets {
    /// Resolution order: `~/.heimdall/secrets.toml`, `/etc/heimdall/secrets.toml`.
    /// Returns empty secrets (providers fall back to env vars) if neither exists.
    pub fn load() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let user_secrets = home.join(".heimdall").join("secrets.toml");
            if user_secrets.exists() {
                Self::check_permissions(&user_secrets)?;
                return Self::load_from_file(&user_secrets);
            }
        }

        let system_secrets = PathBuf::from("/etc/heimdall/secrets.toml");
        if system_secrets.exists() {
            Self::check_permissions(&system_secrets)?;
            return Self::load_from_file(&system_secrets);
        }

        Ok(Secrets::default())
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            GatewayError::Configuration(format!("failed to read secrets file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            GatewayError::Configuration(format!("failed to parse secrets file {path:?}: {e}"))
        })
    }

    #[cfg(unix)]
    fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            GatewayError::Configuration(format!("failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        if mode & 0o077 != 0 {
            return Err(GatewayError::Configuration(format!(
                "secrets file {path:?} has insecure permissions {:o}, must be 0600 or 0400",
                mode & 0o777
            )));
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn check_permissions(_path: &Path) -> Result<()> {
        Ok(())
    }

    /// Get an API key for `provider`, falling back to its environment variable.
    pub fn api_key(&self, provider: &str) -> Option<String> {
        let from_file = match provider {
            "groq" => self.groq.as_ref(),
            "gemini" => self.gemini.as_ref(),
            "openai" => self.openai.as_ref(),
            "huggingface" => self.huggingface.as_ref(),
            _ => None,
        }
        .map(|s| s.api_key.clone());

        from_file.or_else(|| {
            PROVIDER_ENV_VARS
                .iter()
                .find(|(name, _)| *name == provider)
                .and_then(|(_, env_var)| std::env::var(env_var).ok())
        })
    }

    /// The gateway's own bearer key clients must present in `X-API-Key`,
    /// falling back to the `GATEWAY_API_KEY` environment variable.
    pub fn gateway_api_key(&self) -> Option<String> {
        self.gateway_api_key
            .clone()
            .or_else(|| std::env::var("GATEWAY_API_KEY").ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.server.address, "0.0.0.0:8000");
        assert_eq!(config.server.limits.request_timeout_secs, 120);
        assert_eq!(config.cache.similarity_threshold, 0.95);
        assert_eq!(config.cache.ttl_secs, 3600);
        assert_eq!(config.sandbox.timeout_secs, 30);
        assert_eq!(config.sandbox.memory_limit, "256m");
        assert_eq!(config.sandbox.cpu_limit, 0.5);
        assert!(config.sandbox.network_disabled);
        assert_eq!(config.rate_limit.max_requests_per_minute, 10.0);
    }

    #[test]
    fn parse_minimal_config() {
        let toml = r#"
            [server]
            address = "0.0.0.0:9000"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.address, "0.0.0.0:9000");
        assert_eq!(config.server.limits.request_timeout_secs, 120);
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
            [server]
            address = "127.0.0.1:9000"

            [server.limits]
            request_timeout_secs = 60

            [providers.groq]
            model = "llama-3.1-70b-versatile"
            rpm = 30.0

            [providers.ollama]
            model = "llama3"
            base_url = "http://localhost:11434"

            [cache]
            similarity_threshold = 0.9
            ttl_secs = 1800

            [sandbox]
            timeout_secs = 15
            memory_limit = "512m"
            cpu_limit = 1.0
            network_disabled = false

            [rate_limit]
            max_requests_per_minute = 20
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.limits.request_timeout_secs, 60);
        assert_eq!(config.model_for("groq"), Some("llama-3.1-70b-versatile".to_string()));
        assert_eq!(config.rpm_for("groq"), 30.0);
        assert_eq!(
            config.providers.ollama.as_ref().unwrap().base_url,
            "http://localhost:11434"
        );
        assert_eq!(config.cache.similarity_threshold, 0.9);
        assert_eq!(config.sandbox.memory_limit, "512m");
        assert!(!config.sandbox.network_disabled);
        assert_eq!(config.rate_limit.max_requests_per_minute, 20.0);
    }

    #[test]
    fn rpm_defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.rpm_for("groq"), 30.0);
        assert_eq!(config.rpm_for("gemini"), 6.0);
        assert_eq!(config.rpm_for("openai"), 60.0);
        assert_eq!(config.rpm_for("huggingface"), 30.0);
        assert_eq!(config.rpm_for("ollama"), 60.0);
    }

    #[test]
    fn parse_secrets() {
        let toml = r#"
            [groq]
            api_key = "gsk-test-key"

            [openai]
            api_key = "sk-test-key"

            gateway_api_key = "my-gateway-key"
        "#;
        let secrets: Secrets = toml::from_str(toml).unwrap();
        assert_eq!(secrets.groq.as_ref().unwrap().api_key, "gsk-test-key");
        assert_eq!(secrets.openai.as_ref().unwrap().api_key, "sk-test-key");
        assert!(secrets.huggingface.is_none());
        assert_eq!(secrets.gateway_api_key(), Some("my-gateway-key".to_string()));
    }

    #[test]
    fn api_key_from_secrets() {
        let secrets = Secrets {
            groq: Some(ApiKeySecret {
                api_key: "from-file".to_string(),
            }),
            ..Default::default()
        };
        assert_eq!(secrets.api_key("groq"), Some("from-file".to_string()));
        assert_eq!(secrets.api_key("nonexistent"), None);
    }

    #[test]
    fn config_not_found_returns_error() {
        let result = Config::load(Some(Path::new("/nonexistent/config.toml")));
        assert!(result.is_err());
    }
}
