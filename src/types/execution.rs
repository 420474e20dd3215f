//! Sandbox execution outcome types.

use serde::{Deserialize, Serialize};

/// Result of running one [`CodeBlock`](super::code::CodeBlock) in the sandbox.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionResult {
    pub success: bool,
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    pub execution_time_s: f64,
    pub error: Option<String>,
    /// Set once the healer has replaced the code that produced this result
    /// and re-executed it. Prevents a second healing pass over the same block.
    #[serde(default)]
    pub healed: bool,
}

impl ExecutionResult {
    pub fn verified(&self) -> bool {
        self.success && self.exit_code == Some(0)
    }
}
