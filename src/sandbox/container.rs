//! Docker/Podman-backed sandbox executor.

use std::io::Write;
use std::time::Instant;

use bollard::Docker;
use bollard::container::{Config, LogOutput, LogsOptions, RemoveContainerOptions, WaitContainerOptions};
use bollard::models::{HostConfig, Mount, MountTypeEnum};
use bollard::query_parameters::{BuildImageOptionsBuilder, CreateContainerOptionsBuilder};
use bytes::Bytes;
use futures_util::StreamExt;
use tokio::time::Duration;
use tracing::{info, warn};

use crate::telemetry;
use crate::types::{CodeBlock, ExecutionResult};

/// Resource limits applied to a single container run.
#[derive(Debug, Clone)]
pub struct ContainerLimits {
    pub timeout: Duration,
    pub memory_limit_bytes: i64,
    pub nano_cpus: i64,
    pub network_disabled: bool,
    pub cleanup: bool,
}

fn image_for(language: &str) -> Option<&'static str> {
    match language {
        "python" | "bash" => Some("inference-gateway-python-sandbox"),
        "javascript" => Some("inference-gateway-js-sandbox"),
        _ => None,
    }
}

fn file_extension(language: &str) -> &'static str {
    match language {
        "python" => ".py",
        "javascript" => ".js",
        "bash" => ".sh",
        _ => ".txt",
    }
}

fn command_for(language: &str, path: &str) -> Vec<String> {
    match language {
        "python" => vec!["python3".to_string(), path.to_string()],
        "javascript" => vec!["node".to_string(), path.to_string()],
        "bash" => vec!["sh".to_string(), path.to_string()],
        _ => vec!["cat".to_string(), path.to_string()],
    }
}

/// Execute `block` inside an isolated, resource-bounded container.
///
/// Offloads the blocking temp-file write to [`tokio::task::spawn_blocking`];
/// every bollard call is already async and is awaited directly.
pub async fn execute_code(
    docker: &Docker,
    block: &CodeBlock,
    limits: &ContainerLimits,
) -> ExecutionResult {
    let start = Instant::now();
    let language = block.language.as_deref().unwrap_or("unknown");

    let Some(image) = image_for(language) else {
        return ExecutionResult {
            success: false,
            exit_code: Some(-1),
            stdout: String::new(),
            stderr: format!("Unsupported language: {language}"),
            execution_time_s: start.elapsed().as_secs_f64(),
            error: Some(format!("Language '{language}' is not supported for execution")),
            healed: false,
        };
    };

    let code = block.code.clone();
    let extension = file_extension(language);
    let temp_file = match tokio::task::spawn_blocking(move || write_temp_file(&code, extension))
        .await
    {
        Ok(Ok(path)) => path,
        Ok(Err(e)) => return failed_result(start, format!("failed to write temp file: {e}")),
        Err(e) => return failed_result(start, format!("temp file task panicked: {e}")),
    };

    let result = run_container(docker, image, language, &temp_file, limits).await;

    if let Err(e) = std::fs::remove_file(&temp_file) {
        warn!(error = %e, path = ?temp_file, "failed to remove sandbox temp file");
    }

    let execution_time_s = start.elapsed().as_secs_f64();
    metrics::histogram!(telemetry::SANDBOX_DURATION_SECONDS, "language" => language.to_string())
        .record(execution_time_s);

    match result {
        Ok(mut r) => {
            r.execution_time_s = execution_time_s;
            metrics::counter!(
                telemetry::SANDBOX_EXECUTIONS_TOTAL,
                "language" => language.to_string(),
                "status" => if r.success { "ok" } else { "error" },
            )
            .increment(1);
            r
        }
        Err(e) => {
            metrics::counter!(
                telemetry::SANDBOX_EXECUTIONS_TOTAL,
                "language" => language.to_string(),
                "status" => "error",
            )
            .increment(1);
            ExecutionResult {
                execution_time_s,
                ..failed_result(start, e)
            }
        }
    }
}

fn write_temp_file(code: &str, extension: &str) -> std::io::Result<std::path::PathBuf> {
    let mut path = std::env::temp_dir();
    path.push(format!("gateway-sandbox-{}{extension}", uuid::Uuid::new_v4()));
    let mut file = std::fs::File::create(&path)?;
    file.write_all(code.as_bytes())?;
    Ok(path)
}

fn failed_result(start: Instant, message: impl Into<String>) -> ExecutionResult {
    let message = message.into();
    ExecutionResult {
        success: false,
        exit_code: Some(-1),
        stdout: String::new(),
        stderr: message.clone(),
        execution_time_s: start.elapsed().as_secs_f64(),
        error: Some(message),
        healed: false,
    }
}

async fn run_container(
    docker: &Docker,
    image: &str,
    language: &str,
    code_file: &std::path::Path,
    limits: &ContainerLimits,
) -> Result<ExecutionResult, String> {
    ensure_image(docker, language).await?;

    let workspace_path = "/workspace/code";
    let command = command_for(language, workspace_path);

    let host_config = HostConfig {
        memory: Some(limits.memory_limit_bytes),
        nano_cpus: Some(limits.nano_cpus),
        network_mode: if limits.network_disabled {
            Some("none".to_string())
        } else {
            None
        },
        mounts: Some(vec![Mount {
            target: Some(workspace_path.to_string()),
            source: Some(code_file.to_string_lossy().to_string()),
            typ: Some(MountTypeEnum::BIND),
            read_only: Some(true),
            ..Default::default()
        }]),
        ..Default::default()
    };

    let config = Config {
        image: Some(image.to_string()),
        cmd: Some(command),
        host_config: Some(host_config),
        attach_stdout: Some(true),
        attach_stderr: Some(true),
        ..Default::default()
    };

    let container_name = format!("gateway-sandbox-{}", uuid::Uuid::new_v4());
    let options = CreateContainerOptionsBuilder::new()
        .name(&container_name)
        .build();

    let container = docker
        .create_container(Some(options), config)
        .await
        .map_err(|e| format!("failed to create container: {e}"))?;

    docker
        .start_container::<String>(&container.id, None)
        .await
        .map_err(|e| format!("failed to start container: {e}"))?;

    let wait_result = tokio::time::timeout(
        limits.timeout,
        wait_for_exit(docker, &container.id),
    )
    .await;

    let outcome = match wait_result {
        Ok(Ok(exit_code)) => {
            let (stdout, stderr) = collect_logs(docker, &container.id).await;
            Ok(ExecutionResult {
                success: exit_code == 0,
                exit_code: Some(exit_code as i32),
                stdout,
                stderr: stderr.clone(),
                execution_time_s: 0.0,
                error: if exit_code == 0 { None } else { Some(stderr) },
                healed: false,
            })
        }
        Ok(Err(e)) => Err(format!("container wait failed: {e}")),
        Err(_) => {
            let _ = docker
                .kill_container::<String>(&container.id, None)
                .await;
            Ok(ExecutionResult {
                success: false,
                exit_code: Some(-1),
                stdout: String::new(),
                stderr: format!("execution timed out after {}s", limits.timeout.as_secs()),
                execution_time_s: 0.0,
                error: Some("Execution failed".to_string()),
                healed: false,
            })
        }
    };

    if limits.cleanup {
        let remove_options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        if let Err(e) = docker
            .remove_container(&container.id, Some(remove_options))
            .await
        {
            warn!(error = %e, container_id = %container.id, "failed to remove sandbox container");
        }
    }

    outcome
}

async fn wait_for_exit(docker: &Docker, container_id: &str) -> Result<i64, bollard::errors::Error> {
    let mut stream = docker.wait_container(
        container_id,
        None::<WaitContainerOptions<String>>,
    );
    match stream.next().await {
        Some(Ok(response)) => Ok(response.status_code),
        Some(Err(e)) => Err(e),
        None => Ok(0),
    }
}

async fn collect_logs(docker: &Docker, container_id: &str) -> (String, String) {
    let options = LogsOptions::<String> {
        stdout: true,
        stderr: true,
        ..Default::default()
    };
    let mut stream = docker.logs(container_id, Some(options));

    let mut stdout = String::new();
    let mut stderr = String::new();
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(LogOutput::StdOut { message }) => {
                stdout.push_str(&String::from_utf8_lossy(&message));
            }
            Ok(LogOutput::StdErr { message }) => {
                stderr.push_str(&String::from_utf8_lossy(&message));
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "error reading container logs");
                break;
            }
        }
    }
    (stdout, stderr)
}

/// Ensure the image for `language` exists, building it from the shipped
/// recipe directory under `docker/sandbox/<language>` if it doesn't.
///
/// Called from [`run_container`] before every container creation, so a
/// missing image is built (or fails with a clear message) instead of
/// surfacing as an opaque `create_container` error.
async fn ensure_image(docker: &Docker, language: &str) -> Result<(), String> {
    let Some(image) = image_for(language) else {
        return Err(format!("no image configured for language {language}"));
    };

    if docker.inspect_image(image).await.is_ok() {
        return Ok(());
    }

    let recipe_dir = match language {
        "python" | "bash" => "docker/sandbox/python",
        "javascript" => "docker/sandbox/javascript",
        _ => return Err(format!("no recipe directory for language {language}")),
    };
    let recipe_path = std::path::PathBuf::from(recipe_dir);
    if !recipe_path.exists() {
        return Err(format!("dockerfile directory not found: {recipe_dir}"));
    }

    info!(image, recipe_dir, "sandbox image missing, building from recipe directory");

    let build_context = tokio::task::spawn_blocking(move || build_context_tar(&recipe_path))
        .await
        .map_err(|e| format!("build context archiving task panicked: {e}"))?
        .map_err(|e| format!("failed to archive build context {recipe_dir}: {e}"))?;

    let options = BuildImageOptionsBuilder::new()
        .dockerfile("Dockerfile")
        .t(image)
        .rm(true)
        .build();

    let mut stream = docker.build_image(options, None, Some(Bytes::from(build_context)));
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(info) => {
                if let Some(message) = info.error {
                    return Err(format!("docker build error for {image}: {message}"));
                }
            }
            Err(e) => return Err(format!("failed to build image {image}: {e}")),
        }
    }

    info!(image, "sandbox image built successfully");
    Ok(())
}

/// Tar up `recipe_dir` (a `Dockerfile` plus any supporting files) into an
/// in-memory build context, the shape bollard's `build_image` expects.
fn build_context_tar(recipe_dir: &std::path::Path) -> std::io::Result<Vec<u8>> {
    let mut archive_bytes = Vec::new();
    {
        let mut builder = tar::Builder::new(&mut archive_bytes);
        builder.append_dir_all(".", recipe_dir)?;
        builder.finish()?;
    }
    Ok(archive_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_temp_file_contains_the_code_and_right_extension() {
        let path = write_temp_file("print('hi')", ".py").unwrap();
        assert_eq!(path.extension().unwrap(), "py");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "print('hi')");
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn write_temp_file_lands_under_an_isolated_tempfile_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(format!("gateway-sandbox-{}.sh", uuid::Uuid::new_v4()));
        std::fs::write(&path, "echo hi").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "echo hi");
    }

    #[test]
    fn ensure_image_fails_fast_when_recipe_directory_is_missing() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let result = rt.block_on(async {
            let docker = match Docker::connect_with_local_defaults() {
                Ok(d) => d,
                Err(_) => return Err("no docker daemon available in test env".to_string()),
            };
            ensure_image(&docker, "rust").await
        });
        assert!(result.is_err());
    }
}

