//! Prompt construction for the analysis service.
//!
//! Building a prompt is a pure function of the extracted text and the
//! configuration: a fixed instruction block, the output language, and a
//! truncation bound so oversized papers fit the model's input window.

use serde::{Deserialize, Serialize};

/// Instruction template. `{language}` is substituted at build time.
pub const ANALYSIS_PROMPT: &str = r#"You are an expert academic paper analyst. Read the paper text below and produce a structured analysis.

Respond with ONLY a JSON object containing exactly these keys, each with a string value:
- "title": the paper's title
- "exec_summary": a concise executive summary of the whole paper
- "background": the problem context and prior work
- "methods": the approach and experimental setup
- "results": the main findings, with concrete numbers where given
- "discussion": limitations, implications, and open questions
- "quick_ref": a short bullet-style quick reference

Every value must be written in {language}. Do not include any text outside the JSON object.

Paper text:
"#;

fn default_max_chars() -> usize {
    24000
}
fn default_language() -> String {
    "English".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Maximum characters of paper text included in the prompt.
    /// Text beyond this is truncated from the end.
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    /// Natural language the analysis values must be written in.
    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            language: default_language(),
        }
    }
}

pub struct PromptBuilder {
    config: PromptConfig,
}

impl PromptBuilder {
    pub fn new(config: PromptConfig) -> Self {
        Self { config }
    }

    /// Deterministic concatenation of the instruction block and the
    /// (possibly truncated) extracted text.
    pub fn build(&self, text: &str) -> String {
        let instruction = ANALYSIS_PROMPT.replace("{language}", &self.config.language);
        let truncated = truncate_chars(text, self.config.max_chars);
        format!("{}{}", instruction, truncated)
    }
}

/// Truncates to at most `max` bytes at a valid UTF-8 boundary.
fn truncate_chars(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
