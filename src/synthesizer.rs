//! Scoring, consensus detection, and strategy selection over a completed
//! set of [`ModelResponse`]s.
//!
//! Runs after the sandbox (and healer) pass, never before — it reasons
//! over final `execution_results`, not raw provider text.

use serde_json::json;

use crate::telemetry;
use crate::types::{ModelResponse, SynthesisStrategy, VerificationReport};

const HIGH_CONFIDENCE_THRESHOLD: f64 = 0.8;
const BEST_AVAILABLE_THRESHOLD: f64 = 0.5;
const LATENCY_BONUS_CAP: f64 = 0.2;
const LATENCY_BONUS_DIVISOR: f64 = 100.0;

/// Score a single response.
///
/// - An errored response scores 0.
/// - A response with no executions but non-empty text scores 0.5 (it
///   answered, but nothing was verified).
/// - Otherwise, `successful / total` executions plus a small bonus for low
///   latency, capped at 1.0.
pub fn score_response(response: &ModelResponse) -> f64 {
    if response.error.is_some() {
        return 0.0;
    }

    if response.execution_results.is_empty() {
        return if response.text.is_empty() { 0.0 } else { 0.5 };
    }

    let total = response.execution_results.len() as f64;
    let successful = response.execution_results.iter().filter(|r| r.success).count() as f64;
    let base = successful / total;
    let latency_bonus = (LATENCY_BONUS_CAP - response.latency_s / LATENCY_BONUS_DIVISOR).max(0.0);
    (base + latency_bonus).min(1.0)
}

/// Whether ≥2 successful executions across all responses agree on trimmed
/// stdout. Order-independent by construction (a set of equal strings is
/// equal regardless of collection order).
pub fn check_consensus(responses: &[ModelResponse]) -> bool {
    let mut outputs: Vec<&str> = responses
        .iter()
        .flat_map(|r| r.execution_results.iter())
        .filter(|r| r.success)
        .map(|r| r.stdout.trim())
        .collect();

    if outputs.len() < 2 {
        return false;
    }

    outputs.sort_unstable();
    outputs.windows(2).all(|pair| pair[0] == pair[1])
}

/// Pick the best response (argmax by score, ties broken by input order) and
/// build the accompanying [`VerificationReport`].
pub fn synthesize(responses: &[ModelResponse], verify: bool) -> (Option<ModelResponse>, VerificationReport) {
    if responses.is_empty() {
        let report = VerificationReport {
            verified: false,
            consensus: false,
            successful_executions: 0,
            total_executions: 0,
            synthesis_strategy: SynthesisStrategy::NoResponses,
            details: json!({}),
        };
        return (None, report);
    }

    let scores: Vec<f64> = responses.iter().map(score_response).collect();
    let consensus = verify && check_consensus(responses);

    let successful_executions: usize = responses
        .iter()
        .flat_map(|r| r.execution_results.iter())
        .filter(|r| r.success)
        .count();
    let total_executions: usize = responses.iter().map(|r| r.execution_results.len()).sum();

    // `Iterator::max_by` returns the *last* element on a tie; the spec
    // requires ties broken by input order, so track the first maximum by
    // hand with a strict `>` comparison instead.
    let mut best_index = 0;
    let mut best_score = scores[0];
    for (idx, &score) in scores.iter().enumerate().skip(1) {
        if score > best_score {
            best_index = idx;
            best_score = score;
        }
    }

    let strategy = if consensus {
        SynthesisStrategy::Consensus
    } else if best_score >= HIGH_CONFIDENCE_THRESHOLD {
        SynthesisStrategy::HighConfidence
    } else if best_score >= BEST_AVAILABLE_THRESHOLD {
        SynthesisStrategy::BestAvailable
    } else {
        SynthesisStrategy::Fallback
    };

    metrics::counter!(telemetry::SYNTHESIS_STRATEGY_TOTAL, "strategy" => strategy.as_str()).increment(1);

    let details = json!({
        "scores": responses
            .iter()
            .zip(scores.iter())
            .map(|(r, s)| json!({ "provider": r.provider, "score": s }))
            .collect::<Vec<_>>(),
        "best_score": best_score,
    });

    let report = VerificationReport {
        verified: verify && best_score > 0.0,
        consensus,
        successful_executions,
        total_executions,
        synthesis_strategy: strategy,
        details,
    };

    (Some(responses[best_index].clone()), report)
}
