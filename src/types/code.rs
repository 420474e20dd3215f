//! Extracted code block types.

use serde::{Deserialize, Serialize};

/// A fenced code block pulled out of a model response by the extractor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CodeBlock {
    /// Normalized language tag (e.g. `"python"`, `"javascript"`, `"bash"`),
    /// or `None` if the fence carried no language hint.
    pub language: Option<String>,
    /// The code inside the fence, unescaped.
    pub code: String,
    /// 1-indexed line the fence opened on, within the source text.
    pub line_start: Option<usize>,
    /// 1-indexed line the fence closed on.
    pub line_end: Option<usize>,
}

impl CodeBlock {
    /// Whether this block's language is one the sandbox knows how to run.
    pub fn is_executable(&self) -> bool {
        matches!(
            self.language.as_deref(),
            Some("python") | Some("javascript") | Some("bash")
        )
    }
}
