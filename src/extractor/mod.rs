//! Extraction of fenced code blocks from LLM-generated text.

use regex::Regex;
use std::sync::LazyLock;

use crate::types::CodeBlock;

static CODE_FENCE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(\w+)?\n(.*?)```").expect("static code fence regex"));

const EXECUTABLE_LANGUAGES: &[&str] = &["python", "javascript", "bash"];

/// Extract every fenced code block from `text`, with normalised language names
/// and 1-based line ranges computed from newline counts up to the match start.
pub fn extract_code_blocks(text: &str) -> Vec<CodeBlock> {
    let mut blocks = Vec::new();

    for capture in CODE_FENCE_PATTERN.captures_iter(text) {
        let whole = capture.get(0).expect("capture group 0 always matches");
        let language = capture
            .get(1)
            .map(|m| m.as_str())
            .unwrap_or("unknown");
        let code = capture
            .get(2)
            .map(|m| m.as_str().trim())
            .unwrap_or("")
            .to_string();

        let language = normalize_language(language);
        let line_start = text[..whole.start()].matches('\n').count() + 1;
        let line_end = line_start + code.matches('\n').count();

        blocks.push(CodeBlock {
            language: Some(language),
            code,
            line_start: Some(line_start),
            line_end: Some(line_end),
        });
    }

    blocks
}

fn normalize_language(language: &str) -> String {
    match language.to_lowercase().trim() {
        "py" => "python".to_string(),
        "js" | "node" => "javascript".to_string(),
        "ts" => "typescript".to_string(),
        "sh" | "shell" => "bash".to_string(),
        "" => "unknown".to_string(),
        other => other.to_string(),
    }
}

/// Keep only blocks in a language the sandbox can execute.
pub fn filter_executable_blocks(blocks: Vec<CodeBlock>) -> Vec<CodeBlock> {
    blocks
        .into_iter()
        .filter(|b| b.is_executable())
        .collect()
}

/// Offline syntax pre-check. Python gets a balanced-delimiter and indentation
/// heuristic (no Python compiler is linked into this crate); every other
/// language only rejects an empty body.
pub fn validate_syntax(block: &CodeBlock) -> Result<(), String> {
    if block.language.as_deref() == Some("python") {
        return validate_python_heuristically(&block.code);
    }

    if block.code.trim().is_empty() {
        return Err("empty code block".to_string());
    }

    Ok(())
}

fn validate_python_heuristically(code: &str) -> Result<(), String> {
    if code.trim().is_empty() {
        return Err("empty code block".to_string());
    }

    let mut depth: i64 = 0;
    for ch in code.chars() {
        match ch {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            _ => {}
        }
        if depth < 0 {
            return Err("unbalanced closing delimiter".to_string());
        }
    }
    if depth != 0 {
        return Err(format!("unbalanced delimiters (depth {depth})"));
    }

    for line in code.lines() {
        let trimmed = line.trim_end();
        if trimmed.trim_start().starts_with("def ")
            || trimmed.trim_start().starts_with("if ")
            || trimmed.trim_start().starts_with("for ")
            || trimmed.trim_start().starts_with("while ")
        {
            if !trimmed.ends_with(':') {
                return Err(format!("expected ':' at end of block header: {trimmed}"));
            }
        }
    }

    Ok(())
}
