//! Resource-bounded, isolated execution of untrusted code blocks.
//!
//! [`SandboxExecutor`] picks one of two backends at construction time:
//! container-backed (preferred, via `bollard`) when a Docker/Podman daemon
//! answered a ping during startup detection, subprocess-backed (fallback,
//! via `tokio::process`) otherwise. Both backends implement the same
//! `execute_code(block, limits) -> ExecutionResult` shape; callers never
//! branch on which one is active.

pub mod container;
pub mod detect;
pub mod subprocess;

use std::time::Duration;

use bollard::Docker;

use crate::types::{CodeBlock, ExecutionResult};
pub use container::ContainerLimits;

/// Per-request sandbox resource bounds, as carried on
/// [`crate::types::ExecutionConfig`].
#[derive(Debug, Clone)]
pub struct ExecutionLimits {
    pub timeout: Duration,
    pub memory_limit_bytes: i64,
    pub nano_cpus: i64,
    pub network_disabled: bool,
}

impl ExecutionLimits {
    fn as_container_limits(&self, cleanup: bool) -> ContainerLimits {
        ContainerLimits {
            timeout: self.timeout,
            memory_limit_bytes: self.memory_limit_bytes,
            nano_cpus: self.nano_cpus,
            network_disabled: self.network_disabled,
            cleanup,
        }
    }
}

/// Parse a Docker-style memory limit string (`"256m"`, `"1g"`, `"512k"`,
/// or a bare byte count) into bytes. Unrecognised suffixes fall back to the
/// 256MiB default rather than failing the request.
pub fn parse_memory_limit(limit: &str) -> i64 {
    const DEFAULT_BYTES: i64 = 256 * 1024 * 1024;
    let trimmed = limit.trim();
    let (number, multiplier) = match trimmed.chars().last() {
        Some('g') | Some('G') => (&trimmed[..trimmed.len() - 1], 1024 * 1024 * 1024),
        Some('m') | Some('M') => (&trimmed[..trimmed.len() - 1], 1024 * 1024),
        Some('k') | Some('K') => (&trimmed[..trimmed.len() - 1], 1024),
        _ => (trimmed, 1),
    };
    number.parse::<i64>().map(|n| n * multiplier).unwrap_or(DEFAULT_BYTES)
}

/// Convert a fraction of a CPU core (e.g. `0.5`) into Docker's nanocpus unit.
pub fn cpu_fraction_to_nano_cpus(cpu_fraction: f64) -> i64 {
    (cpu_fraction.max(0.0) * 1_000_000_000.0) as i64
}

enum Backend {
    Container { docker: Docker, cleanup: bool },
    Subprocess,
}

/// Executes fenced code blocks, routing to whichever backend startup
/// detection selected.
pub struct SandboxExecutor {
    backend: Backend,
}

impl SandboxExecutor {
    /// Build a container-backed executor over an already-connected Docker client.
    pub fn container(docker: Docker, cleanup: bool) -> Self {
        Self {
            backend: Backend::Container { docker, cleanup },
        }
    }

    /// Build a subprocess-backed executor. Used when no container runtime
    /// answered the startup ping in [`detect::check_docker`].
    pub fn subprocess() -> Self {
        Self {
            backend: Backend::Subprocess,
        }
    }

    pub fn is_container_backed(&self) -> bool {
        matches!(self.backend, Backend::Container { .. })
    }

    /// Run `block` under `limits`, dispatching to the active backend.
    pub async fn execute_code(&self, block: &CodeBlock, limits: &ExecutionLimits) -> ExecutionResult {
        match &self.backend {
            Backend::Container { docker, cleanup } => {
                container::execute_code(docker, block, &limits.as_container_limits(*cleanup)).await
            }
            Backend::Subprocess => subprocess::execute_code(block, limits.timeout).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_memory_limit_suffixes() {
        assert_eq!(parse_memory_limit("256m"), 256 * 1024 * 1024);
        assert_eq!(parse_memory_limit("1g"), 1024 * 1024 * 1024);
        assert_eq!(parse_memory_limit("512k"), 512 * 1024);
        assert_eq!(parse_memory_limit("1024"), 1024);
    }

    #[test]
    fn falls_back_to_default_on_garbage_input() {
        assert_eq!(parse_memory_limit("not-a-size"), 256 * 1024 * 1024);
    }

    #[test]
    fn cpu_fraction_converts_to_nano_cpus() {
        assert_eq!(cpu_fraction_to_nano_cpus(0.5), 500_000_000);
        assert_eq!(cpu_fraction_to_nano_cpus(1.0), 1_000_000_000);
    }

    #[tokio::test]
    async fn subprocess_backend_executes() {
        let executor = SandboxExecutor::subprocess();
        assert!(!executor.is_container_backed());
        let block = CodeBlock {
            language: Some("python".to_string()),
            code: "print(2 + 2)".to_string(),
            line_start: None,
            line_end: None,
        };
        let limits = ExecutionLimits {
            timeout: Duration::from_secs(5),
            memory_limit_bytes: 256 * 1024 * 1024,
            nano_cpus: 500_000_000,
            network_disabled: true,
        };
        let result = executor.execute_code(&block, &limits).await;
        assert!(result.success);
        assert_eq!(result.stdout.trim(), "4");
    }
}
