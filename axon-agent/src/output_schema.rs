//! Structured output (spec §4.2, component I): schema-typed response
//! extraction with fenced-code-block parse recovery.

use std::marker::PhantomData;

use schemars::schema::RootSchema;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;

/// Pairs a target type with the JSON Schema generated by introspecting it.
/// Constructed once per agent and reused across every step of a run.
pub struct OutputSchema<T> {
    schema: RootSchema,
    _marker: PhantomData<fn() -> T>,
}

impl<T: JsonSchema + DeserializeOwned> OutputSchema<T> {
    /// Generate the schema for `T` via `schemars` introspection.
    pub fn new() -> Self {
        Self {
            schema: schemars::schema_for!(T),
            _marker: PhantomData,
        }
    }

    /// The generated JSON Schema, as sent to the model unchanged. Schemas
    /// whose effective nesting exceeds a provider's supported depth are
    /// not downgraded here — that is the caller's responsibility.
    pub fn schema(&self) -> &RootSchema {
        &self.schema
    }

    /// Parse `content` into `T`, recovering from a fenced code block if a
    /// direct parse fails (spec §4.2 "Parse recovery"):
    /// 1. Try direct parse.
    /// 2. If wrapped in a ```json or bare ``` fence, strip and retry.
    /// 3. If still failing, report the original content in the error.
    pub fn parse(&self, content: &str) -> Result<T, StructuredOutputError> {
        if let Ok(value) = serde_json::from_str(content) {
            return Ok(value);
        }

        if let Some(stripped) = strip_code_fence(content) {
            if let Ok(value) = serde_json::from_str(&stripped) {
                return Ok(value);
            }
        }

        Err(StructuredOutputError::ParseFailed(content.to_string()))
    }
}

impl<T: JsonSchema + DeserializeOwned> Default for OutputSchema<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Failure to extract a schema-conforming value from model output.
#[derive(Debug, thiserror::Error)]
pub enum StructuredOutputError {
    /// Direct parse and fence-stripped parse both failed.
    #[error("Failed to parse structured output: {0}")]
    ParseFailed(String),
}

/// Strip a ```` ```json ... ``` ```` or bare ```` ``` ... ``` ```` fence
/// wrapping `content`, if present. Returns `None` if `content` is not
/// fenced.
fn strip_code_fence(content: &str) -> Option<String> {
    let trimmed = content.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```JSON"))
        .or_else(|| trimmed.strip_prefix("```"))?;
    let body = without_open.strip_suffix("```")?;
    Some(body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
    struct Answer {
        value: u32,
    }

    #[test]
    fn parses_direct_json() {
        let schema = OutputSchema::<Answer>::new();
        let parsed = schema.parse(r#"{"value": 7}"#).unwrap();
        assert_eq!(parsed, Answer { value: 7 });
    }

    #[test]
    fn recovers_from_json_fence() {
        let schema = OutputSchema::<Answer>::new();
        let fenced = "```json\n{\"value\": 7}\n```";
        let parsed = schema.parse(fenced).unwrap();
        assert_eq!(parsed, Answer { value: 7 });
    }

    #[test]
    fn recovers_from_bare_fence() {
        let schema = OutputSchema::<Answer>::new();
        let fenced = "```\n{\"value\": 9}\n```";
        let parsed = schema.parse(fenced).unwrap();
        assert_eq!(parsed, Answer { value: 9 });
    }

    #[test]
    fn reports_original_content_on_total_failure() {
        let schema = OutputSchema::<Answer>::new();
        let err = schema.parse("not json at all").unwrap_err();
        assert!(matches!(err, StructuredOutputError::ParseFailed(c) if c == "not json at all"));
    }
}
