//! `StepResult` (spec §4.3): the outcome of running a single `Step`.

use std::collections::HashMap;

/// The outcome of running one `Step`. A skip is a success with `None`
/// content and empty `data`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    /// The name of the step that produced this result.
    pub name: String,
    /// Text content produced by the step, if any.
    pub content: Option<String>,
    /// Structured data produced by the step.
    pub data: HashMap<String, String>,
    /// Whether the step succeeded.
    pub success: bool,
    /// The failure message, present only when `success` is `false`.
    pub error: Option<String>,
}

impl StepResult {
    /// Build a successful result.
    pub fn success(name: impl Into<String>, content: Option<String>, data: HashMap<String, String>) -> Self {
        Self {
            name: name.into(),
            content,
            data,
            success: true,
            error: None,
        }
    }

    /// Build a failed result.
    pub fn failure(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: None,
            data: HashMap::new(),
            success: false,
            error: Some(message.into()),
        }
    }

    /// Build a skip: a success with no content and no data.
    pub fn skip(name: impl Into<String>) -> Self {
        Self::success(name, None, HashMap::new())
    }
}
