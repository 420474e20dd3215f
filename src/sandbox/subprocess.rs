//! Subprocess-backed sandbox fallback, used when no container runtime is
//! reachable.
//!
//! This backend is explicitly a best-effort fallback, not a security
//! boundary: it enforces no memory or CPU caps, only a wall-clock timeout.
//! Untrusted code runs with the same privileges as the gateway process.

use std::io::Write;
use std::process::Stdio;
use std::time::Instant;

use tokio::process::Command;
use tracing::warn;

use crate::telemetry;
use crate::types::{CodeBlock, ExecutionResult};

fn file_extension(language: &str) -> &'static str {
    match language {
        "python" => ".py",
        "javascript" => ".js",
        "bash" => ".sh",
        _ => ".txt",
    }
}

fn command_for(language: &str, path: &std::path::Path) -> Option<(&'static str, Vec<String>)> {
    let path = path.to_string_lossy().to_string();
    match language {
        "python" => Some(("python3", vec![path])),
        "javascript" => Some(("node", vec![path])),
        "bash" => Some(("sh", vec![path])),
        _ => None,
    }
}

/// Execute `block` as a bare child process, bounded only by `timeout`.
pub async fn execute_code(block: &CodeBlock, timeout: std::time::Duration) -> ExecutionResult {
    let start = Instant::now();
    let language = block.language.as_deref().unwrap_or("unknown");

    let temp_dir = std::env::temp_dir();
    let code = block.code.clone();
    let extension = file_extension(language);
    let temp_file = match tokio::task::spawn_blocking(move || write_temp_file(&code, extension))
        .await
    {
        Ok(Ok(path)) => path,
        Ok(Err(e)) => return failed_result(start, format!("failed to write temp file: {e}")),
        Err(e) => return failed_result(start, format!("temp file task panicked: {e}")),
    };

    let Some((program, args)) = command_for(language, &temp_file) else {
        let _ = std::fs::remove_file(&temp_file);
        let execution_time_s = start.elapsed().as_secs_f64();
        return ExecutionResult {
            success: false,
            exit_code: Some(-1),
            stdout: String::new(),
            stderr: format!("Unsupported language: {language}"),
            execution_time_s,
            error: Some(format!("Language '{language}' is not supported for execution")),
            healed: false,
        };
    };

    let temp_dir_for_cwd = temp_dir.clone();
    let spawned = Command::new(program)
        .args(&args)
        .current_dir(&temp_dir_for_cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let result = match spawned {
        Ok(mut child) => match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => ExecutionResult {
                success: output.status.success(),
                exit_code: output.status.code().or(Some(-1)),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                execution_time_s: 0.0,
                error: if output.status.success() {
                    None
                } else {
                    Some(String::from_utf8_lossy(&output.stderr).into_owned())
                },
                healed: false,
            },
            Ok(Err(e)) => failed_result(start, format!("subprocess wait failed: {e}")),
            Err(_) => ExecutionResult {
                success: false,
                exit_code: Some(-1),
                stdout: String::new(),
                stderr: format!("execution timed out after {}s", timeout.as_secs()),
                execution_time_s: 0.0,
                error: Some("Execution failed".to_string()),
                healed: false,
            },
        },
        Err(e) => failed_result(start, format!("failed to spawn subprocess: {e}")),
    };

    if let Err(e) = std::fs::remove_file(&temp_file) {
        warn!(error = %e, path = ?temp_file, "failed to remove sandbox temp file");
    }

    let execution_time_s = start.elapsed().as_secs_f64();
    metrics::histogram!(telemetry::SANDBOX_DURATION_SECONDS, "language" => language.to_string())
        .record(execution_time_s);
    metrics::counter!(
        telemetry::SANDBOX_EXECUTIONS_TOTAL,
        "language" => language.to_string(),
        "status" => if result.success { "ok" } else { "error" },
    )
    .increment(1);

    ExecutionResult {
        execution_time_s,
        ..result
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
