//! Reflexion loop: on sandbox failure, ask the same provider to repair its
//! own code using the error text, then re-execute the fix.
//!
//! Healing is attempted at most once per failing block. The
//! [`crate::types::ExecutionResult::healed`] flag makes this durable: a
//! second pass over an already-healed report is a no-op, answering the
//! open question of healing idempotence.

use std::sync::Arc;

use tracing::warn;

use crate::extractor;
use crate::providers::traits::{CompletionRequest, Provider};
use crate::sandbox::{ExecutionLimits, SandboxExecutor};
use crate::telemetry;
use crate::types::ModelResponse;

/// Capped token budget for a healing completion — the reply should be just
/// the fixed code, not a full explanation.
const HEALING_MAX_TOKENS: u32 = 1024;
const HEALING_TEMPERATURE: f32 = 0.2;

fn healing_prompt(language: &str, code: &str, stderr: &str) -> String {
    format!(
        "The following {language} code failed when executed:\n\n```{language}\n{code}\n```\n\n\
         It produced this error:\n\n```\n{stderr}\n```\n\n\
         Reply with ONLY the fixed {language} code in a single fenced code block. \
         Do not include any explanation."
    )
}

/// Walk every [`ModelResponse`] in `responses`, healing each execution
/// failure whose provider is still registered. Responses are mutated in
/// place; a response whose provider can't be located, or whose healing
/// attempt panics/errors, is left with its original failure intact.
pub async fn heal_all(
    responses: &mut [ModelResponse],
    providers: &[Arc<dyn Provider>],
    sandbox: &SandboxExecutor,
    limits: &ExecutionLimits,
) {
    for response in responses.iter_mut() {
        let Some(provider) = providers
            .iter()
            .find(|p| p.provider_name() == response.provider)
        else {
            continue;
        };

        heal_response(response, provider.as_ref(), sandbox, limits).await;
    }
}

async fn heal_response(
    response: &mut ModelResponse,
    provider: &dyn Provider,
    sandbox: &SandboxExecutor,
    limits: &ExecutionLimits,
) {
    let failing_indices: Vec<usize> = response
        .execution_results
        .iter()
        .enumerate()
        .filter(|(_, result)| !result.success && !result.stderr.is_empty() && !result.healed)
        .map(|(i, _)| i)
        .collect();

    for i in failing_indices {
        if let Err(e) = heal_one(response, i, provider, sandbox, limits).await {
            warn!(
                provider = provider.provider_name(),
                index = i,
                error = %e,
                "healing attempt failed, leaving original failure intact"
            );
            metrics::counter!(telemetry::HEALING_ATTEMPTS_TOTAL, "status" => "failed").increment(1);
        }
    }
}

async fn heal_one(
    response: &mut ModelResponse,
    index: usize,
    provider: &dyn Provider,
    sandbox: &SandboxExecutor,
    limits: &ExecutionLimits,
) -> crate::Result<()> {
    let block = response.code_blocks[index].clone();
    let language = block.language.clone().unwrap_or_else(|| "unknown".to_string());
    let stderr = response.execution_results[index].stderr.clone();

    let prompt = healing_prompt(&language, &block.code, &stderr);
    let completion = provider
        .generate_completion(&CompletionRequest {
            prompt,
            temperature: HEALING_TEMPERATURE,
            max_tokens: HEALING_MAX_TOKENS,
        })
        .await?;

    let candidates = extractor::filter_executable_blocks(extractor::extract_code_blocks(&completion.text));
    let Some(fixed_block) = candidates.into_iter().next() else {
        return Err(crate::GatewayError::Verification(
            "healing reply contained no executable code block".to_string(),
        ));
    };

    let mut result = sandbox.execute_code(&fixed_block, limits).await;
    result.healed = true;

    metrics::counter!(
        telemetry::HEALING_ATTEMPTS_TOTAL,
        "status" => if result.success { "succeeded" } else { "failed" },
    )
    .increment(1);

    response.code_blocks[index] = fixed_block;
    response.execution_results[index] = result;

    Ok(())
}
