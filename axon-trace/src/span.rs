//! `Span` / `SpanBuilder` (spec §3, §4.5): a single timed unit of work,
//! nested under a trace or another span.

use std::collections::HashMap;

use axon_types::{DurationMs, SpanId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What kind of work a span represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    /// The top-level agent loop invocation.
    Agent,
    /// A workflow step.
    Workflow,
    /// A single call to a model provider.
    ModelCall,
    /// Execution of a single tool call.
    ToolExecution,
    /// Anything else callers want to mark out.
    Custom,
}

/// Misuse of the span builder's open/closed lifecycle.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpanError {
    /// `end()` or `fail()` called on a span that already has an `end_time`.
    #[error("span '{0}' has already ended")]
    AlreadyEnded(String),
    /// `end()` called while one or more child spans are still open.
    #[error("span '{name}' has {count} child span(s) still open")]
    ChildrenStillOpen {
        /// Name of the span being ended.
        name: String,
        /// Number of children still missing an `end_time`.
        count: usize,
    },
}

/// A closed, immutable span, as delivered to [`crate::TraceListener`]s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    /// Unique, time-ordered identifier.
    pub id: SpanId,
    /// Human-readable span name.
    pub name: String,
    /// What kind of work this span represents.
    pub kind: SpanKind,
    /// When the span was opened.
    pub start_time: DateTime<Utc>,
    /// When the span was closed.
    pub end_time: DateTime<Utc>,
    /// Wall-clock duration, `end_time - start_time`.
    pub duration: DurationMs,
    /// Present if the span was closed via `fail()`, directly or because a
    /// parent span failed.
    pub error: Option<String>,
    /// Free-form string attributes attached during the span's lifetime.
    pub attributes: HashMap<String, String>,
    /// Nested child spans, all closed.
    pub children: Vec<Span>,
}

impl Span {
    /// `true` if the span closed without an error.
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }

    /// Depth-first iterator over this span and every descendant.
    pub fn descendants(&self) -> impl Iterator<Item = &Span> {
        SpanDescendants {
            stack: vec![self],
        }
    }
}

struct SpanDescendants<'a> {
    stack: Vec<&'a Span>,
}

impl<'a> Iterator for SpanDescendants<'a> {
    type Item = &'a Span;

    fn next(&mut self) -> Option<&'a Span> {
        let span = self.stack.pop()?;
        self.stack.extend(span.children.iter());
        Some(span)
    }
}

/// Mutable, open span under construction. Owns its children directly, so
/// the tree is built by borrowing into `children` via [`SpanBuilder::span`]
/// rather than by sharing spans across tasks.
#[derive(Debug)]
pub struct SpanBuilder {
    id: SpanId,
    name: String,
    kind: SpanKind,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    error: Option<String>,
    attributes: HashMap<String, String>,
    children: Vec<SpanBuilder>,
}

impl SpanBuilder {
    pub(crate) fn new(name: impl Into<String>, kind: SpanKind) -> Self {
        Self {
            id: SpanId::new(),
            name: name.into(),
            kind,
            start_time: Utc::now(),
            end_time: None,
            error: None,
            attributes: HashMap::new(),
            children: Vec::new(),
        }
    }

    /// The span's identifier.
    pub fn id(&self) -> SpanId {
        self.id
    }

    /// `true` once `end()` or `fail()` has closed this span.
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// Attach or overwrite a string attribute. Idempotent: setting the same
    /// key twice overwrites the prior value.
    pub fn attribute(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Open a new child span. Fails if this span has already ended.
    pub fn span(&mut self, name: impl Into<String>, kind: SpanKind) -> Result<&mut SpanBuilder, SpanError> {
        if self.end_time.is_some() {
            return Err(SpanError::AlreadyEnded(self.name.clone()));
        }
        self.children.push(SpanBuilder::new(name, kind));
        Ok(self.children.last_mut().expect("just pushed"))
    }

    /// Close the span successfully. Fails if already ended, or if any
    /// child span is still open.
    pub fn end(&mut self) -> Result<Span, SpanError> {
        if self.end_time.is_some() {
            return Err(SpanError::AlreadyEnded(self.name.clone()));
        }
        let open_children = self.children.iter().filter(|c| c.is_open()).count();
        if open_children > 0 {
            return Err(SpanError::ChildrenStillOpen {
                name: self.name.clone(),
                count: open_children,
            });
        }
        self.end_time = Some(Utc::now());
        Ok(self.to_span())
    }

    /// Close the span with an error. Any still-open children are
    /// recursively failed with a message naming this span as the parent
    /// that failed, rather than left dangling open.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<Span, SpanError> {
        if self.end_time.is_some() {
            return Err(SpanError::AlreadyEnded(self.name.clone()));
        }
        let message = message.into();
        let propagated = format!("Parent span '{}' failed: {}", self.name, message);
        for child in self.children.iter_mut().filter(|c| c.is_open()) {
            let _ = child.fail(propagated.clone());
        }
        self.error = Some(message);
        self.end_time = Some(Utc::now());
        Ok(self.to_span())
    }

    pub(crate) fn to_span(&self) -> Span {
        let end_time = self.end_time.unwrap_or_else(Utc::now);
        Span {
            id: self.id,
            name: self.name.clone(),
            kind: self.kind,
            start_time: self.start_time,
            end_time,
            duration: (end_time - self.start_time)
                .to_std()
                .unwrap_or_default()
                .into(),
            error: self.error.clone(),
            attributes: self.attributes.clone(),
            children: self.children.iter().map(SpanBuilder::to_span).collect(),
        }
    }
}
