//! Maps a raw model response into analysis fields.
//!
//! The response must be a JSON object; anything else is malformed and
//! the attempt is wasted. Individual fields, by contrast, degrade
//! gracefully — a missing or non-string field becomes an empty string,
//! because partial structured output beats discarding a successful
//! model call.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Structured output of the analysis pipeline for one paper.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisFields {
    pub title: String,
    pub exec_summary: String,
    pub background: String,
    pub methods: String,
    pub results: String,
    pub discussion: String,
    pub quick_ref: String,
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Response is not a JSON object: {0}")]
    MalformedResponse(String),
}

/// Parses the raw response into analysis fields.
pub fn parse(raw: &str) -> Result<AnalysisFields, ParseError> {
    let cleaned = strip_code_fence(raw);

    let value: Value = serde_json::from_str(cleaned)
        .map_err(|e| ParseError::MalformedResponse(e.to_string()))?;
    let obj = value
        .as_object()
        .ok_or_else(|| ParseError::MalformedResponse("top-level value is not an object".to_string()))?;

    let field = |key: &str| -> String {
        obj.get(key)
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string()
    };

    Ok(AnalysisFields {
        title: field("title"),
        exec_summary: field("exec_summary"),
        background: field("background"),
        methods: field("methods"),
        results: field("results"),
        discussion: field("discussion"),
        quick_ref: field("quick_ref"),
    })
}

/// Models routinely wrap their JSON in a Markdown code fence despite
/// instructions not to. Strip one outer fence if present.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop an optional language tag on the fence line
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}
