//! Proactive container runtime detection with platform-specific guidance.
//!
//! Checks whether Docker or Podman is both installed (binary on PATH) and
//! running (daemon responding to ping), so the gateway can decide at
//! startup whether to use the container backend or fall back to the
//! subprocess backend.

use std::fmt;

use bollard::Docker;

/// Which container runtime was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerRuntime {
    Docker,
    Podman,
}

impl ContainerRuntime {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerRuntime::Docker => "docker",
            ContainerRuntime::Podman => "podman",
        }
    }
}

impl fmt::Display for ContainerRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ContainerRuntime::Docker => "Docker",
            ContainerRuntime::Podman => "Podman",
        })
    }
}

/// Container daemon availability status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DockerStatus {
    Available,
    NotInstalled,
    NotRunning,
}

impl DockerStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, DockerStatus::Available)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DockerStatus::Available => "available",
            DockerStatus::NotInstalled => "not installed",
            DockerStatus::NotRunning => "not running",
        }
    }
}

/// Host platform, used only to pick install/start guidance in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOS,
    Linux,
    Windows,
}

impl Platform {
    pub fn current() -> Self {
        match std::env::consts::OS {
            "macos" => Platform::MacOS,
            "windows" => Platform::Windows,
            _ => Platform::Linux,
        }
    }

    pub fn install_hint(&self) -> &'static str {
        match self {
            Platform::MacOS => "Install Docker Desktop or Podman Desktop",
            Platform::Linux => "Install Docker Engine or Podman",
            Platform::Windows => "Install Docker Desktop or Podman Desktop",
        }
    }
}

/// Result of a container runtime detection check.
pub struct DockerDetection {
    pub status: DockerStatus,
    pub platform: Platform,
    pub runtime: Option<ContainerRuntime>,
}

/// Check whether a container runtime is installed and its daemon is reachable.
///
/// 1. Checks if `docker` or `podman` is on PATH.
/// 2. If found, tries to connect and ping the daemon (bollard honours the
///    `DOCKER_HOST` environment variable when present).
pub async fn check_docker() -> DockerDetection {
    let platform = Platform::current();

    let has_docker = binary_exists("docker");
    let has_podman = binary_exists("podman");

    if !has_docker && !has_podman {
        return DockerDetection {
            status: DockerStatus::NotInstalled,
            platform,
            runtime: None,
        };
    }

    let runtime = if has_docker {
        ContainerRuntime::Docker
    } else {
        ContainerRuntime::Podman
    };

    if connect_docker().await.is_ok() {
        return DockerDetection {
            status: DockerStatus::Available,
            platform,
            runtime: Some(runtime),
        };
    }

    DockerDetection {
        status: DockerStatus::NotRunning,
        platform,
        runtime: Some(runtime),
    }
}

/// Connect to the Docker/Podman daemon and ping it.
pub async fn connect_docker() -> Result<Docker, bollard::errors::Error> {
    let docker = Docker::connect_with_local_defaults()?;
    docker.ping().await?;
    Ok(docker)
}

fn binary_exists(name: &str) -> bool {
    #[cfg(unix)]
    {
        std::process::Command::new("which")
            .arg(name)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .is_ok_and(|s| s.success())
    }
    #[cfg(windows)]
    {
        std::process::Command::new("where")
            .arg(name)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .is_ok_and(|s| s.success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_platform_is_one_of_the_known_values() {
        let platform = Platform::current();
        match platform {
            Platform::MacOS | Platform::Linux | Platform::Windows => {}
        }
    }

    #[test]
    fn install_hint_not_empty() {
        for platform in [Platform::MacOS, Platform::Linux, Platform::Windows] {
            assert!(!platform.install_hint().is_empty());
        }
    }

    #[test]
    fn docker_status_as_str() {
        assert_eq!(DockerStatus::Available.as_str(), "available");
        assert_eq!(DockerStatus::NotInstalled.as_str(), "not installed");
        assert_eq!(DockerStatus::NotRunning.as_str(), "not running");
    }

    #[test]
    fn docker_status_is_ok() {
        assert!(DockerStatus::Available.is_ok());
        assert!(!DockerStatus::NotInstalled.is_ok());
        assert!(!DockerStatus::NotRunning.is_ok());
    }

    #[test]
    fn container_runtime_display() {
        assert_eq!(ContainerRuntime::Docker.to_string(), "Docker");
        assert_eq!(ContainerRuntime::Podman.to_string(), "Podman");
    }
}
