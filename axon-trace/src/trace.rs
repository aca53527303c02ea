//! `Trace` / `TraceBuilder` (spec §3, §4.5): the root container for a
//! single agent run's span tree, with listener fan-out on completion.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axon_types::{DurationMs, SessionId, TraceId};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};

use crate::span::{Span, SpanBuilder, SpanError, SpanKind};

/// Receives a completed [`Trace`] once its builder closes.
///
/// Implementations must not assume single-threaded delivery: a builder may
/// be completed from any task. A listener that panics is isolated by the
/// dispatcher — every other listener still runs, and the trace's owner
/// never sees the panic.
#[async_trait::async_trait]
pub trait TraceListener: Send + Sync {
    /// Called once, after the trace (and its whole span tree) has closed.
    async fn on_trace(&self, trace: &Trace);
}

/// A closed, immutable trace, as delivered to [`TraceListener`]s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    /// Unique, time-ordered identifier.
    pub id: TraceId,
    /// Human-readable trace name, usually the agent or workflow name.
    pub name: String,
    /// When the trace was opened.
    pub start_time: DateTime<Utc>,
    /// When the trace was closed.
    pub end_time: DateTime<Utc>,
    /// Wall-clock duration, `end_time - start_time`.
    pub duration: DurationMs,
    /// Present if the trace closed via `fail()`.
    pub error: Option<String>,
    /// Top-level spans opened directly on the trace.
    pub spans: Vec<Span>,
    /// Free-form string attributes attached at the trace level.
    pub attributes: HashMap<String, String>,
    /// Sum of `inputTokens` + `outputTokens` over every `MODEL_CALL`
    /// descendant span's attributes, parsed as integers (missing or
    /// unparsable values count as 0).
    pub total_tokens: u64,
    /// Always 0: feedback aggregation has no ingestion path yet.
    pub thumbs_up_count: u64,
    /// Always 0: feedback aggregation has no ingestion path yet.
    pub thumbs_down_count: u64,
    /// The text that kicked off this run, if recorded.
    pub input_text: Option<String>,
    /// The final output text, if recorded.
    pub output_text: Option<String>,
    /// The end user this trace is attributed to, if known.
    pub user_id: Option<String>,
    /// The session this trace belongs to, if known.
    pub session_id: Option<SessionId>,
    /// The model used for the primary call, if known.
    pub model_id: Option<String>,
    /// The prompt template name in play, if known.
    pub prompt_name: Option<String>,
    /// The prompt template version in play, if known.
    pub prompt_version: Option<u32>,
    /// A caller-supplied grouping key (e.g. a conversation thread), if any.
    pub group_id: Option<String>,
    /// Free-form labels attached at close time.
    pub labels: Vec<String>,
}

impl Trace {
    /// `true` if the trace closed without an error.
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

fn sum_model_call_tokens(spans: &[Span]) -> u64 {
    spans
        .iter()
        .flat_map(Span::descendants)
        .filter(|s| s.kind == SpanKind::ModelCall)
        .map(|s| {
            let input = s
                .attributes
                .get("inputTokens")
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(0);
            let output = s
                .attributes
                .get("outputTokens")
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(0);
            input + output
        })
        .sum()
}

/// Mutable, open trace under construction.
pub struct TraceBuilder {
    id: TraceId,
    name: String,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    error: Option<String>,
    attributes: HashMap<String, String>,
    spans: Vec<SpanBuilder>,
    listeners: Vec<Arc<dyn TraceListener>>,
    input_text: Option<String>,
    output_text: Option<String>,
    user_id: Option<String>,
    session_id: Option<SessionId>,
    model_id: Option<String>,
    prompt_name: Option<String>,
    prompt_version: Option<u32>,
    group_id: Option<String>,
    labels: Vec<String>,
}

impl TraceBuilder {
    /// Open a new trace. `listeners` are dispatched, in order, once
    /// `end()`/`fail()` closes it.
    pub fn start(name: impl Into<String>, listeners: Vec<Arc<dyn TraceListener>>) -> Self {
        Self {
            id: TraceId::new(),
            name: name.into(),
            start_time: Utc::now(),
            end_time: None,
            error: None,
            attributes: HashMap::new(),
            spans: Vec::new(),
            listeners,
            input_text: None,
            output_text: None,
            user_id: None,
            session_id: None,
            model_id: None,
            prompt_name: None,
            prompt_version: None,
            group_id: None,
            labels: Vec::new(),
        }
    }

    /// The trace's identifier.
    pub fn id(&self) -> TraceId {
        self.id
    }

    /// Attach or overwrite a trace-level string attribute.
    pub fn attribute(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Open a new top-level span. Fails if the trace has already closed.
    pub fn span(&mut self, name: impl Into<String>, kind: SpanKind) -> Result<&mut SpanBuilder, SpanError> {
        if self.end_time.is_some() {
            return Err(SpanError::AlreadyEnded(self.name.clone()));
        }
        self.spans.push(SpanBuilder::new(name, kind));
        Ok(self.spans.last_mut().expect("just pushed"))
    }

    /// Record the input text that kicked off this run.
    pub fn set_input_text(&mut self, text: impl Into<String>) -> &mut Self {
        self.input_text = Some(text.into());
        self
    }

    /// Record the final output text.
    pub fn set_output_text(&mut self, text: impl Into<String>) -> &mut Self {
        self.output_text = Some(text.into());
        self
    }

    /// Attribute the trace to an end user.
    pub fn set_user_id(&mut self, user_id: impl Into<String>) -> &mut Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Attribute the trace to a session.
    pub fn set_session_id(&mut self, session_id: SessionId) -> &mut Self {
        self.session_id = Some(session_id);
        self
    }

    /// Record the model used for the primary call.
    pub fn set_model_id(&mut self, model_id: impl Into<String>) -> &mut Self {
        self.model_id = Some(model_id.into());
        self
    }

    /// Record the prompt template name and version in play.
    pub fn set_prompt(&mut self, name: impl Into<String>, version: u32) -> &mut Self {
        self.prompt_name = Some(name.into());
        self.prompt_version = Some(version);
        self
    }

    /// Attach a caller-supplied grouping key.
    pub fn set_group_id(&mut self, group_id: impl Into<String>) -> &mut Self {
        self.group_id = Some(group_id.into());
        self
    }

    /// Attach free-form labels.
    pub fn set_labels(&mut self, labels: Vec<String>) -> &mut Self {
        self.labels = labels;
        self
    }

    /// Close the trace successfully, dispatch it to every listener, and
    /// return the closed value. Fails if already closed, or if any
    /// top-level span is still open.
    pub async fn end(&mut self) -> Result<Trace, SpanError> {
        if self.end_time.is_some() {
            return Err(SpanError::AlreadyEnded(self.name.clone()));
        }
        let open_spans = self.spans.iter().filter(|s| s.is_open()).count();
        if open_spans > 0 {
            return Err(SpanError::ChildrenStillOpen {
                name: self.name.clone(),
                count: open_spans,
            });
        }
        self.end_time = Some(Utc::now());
        let trace = self.to_trace();
        dispatch(&self.listeners, &trace).await;
        Ok(trace)
    }

    /// Close the trace with an error, recursively failing any still-open
    /// top-level spans, dispatch it to every listener, and return the
    /// closed value.
    pub async fn fail(&mut self, message: impl Into<String>) -> Result<Trace, SpanError> {
        if self.end_time.is_some() {
            return Err(SpanError::AlreadyEnded(self.name.clone()));
        }
        let message = message.into();
        let propagated = format!("Parent span '{}' failed: {}", self.name, message);
        for span in self.spans.iter_mut().filter(|s| s.is_open()) {
            let _ = span.fail(propagated.clone());
        }
        self.error = Some(message);
        self.end_time = Some(Utc::now());
        let trace = self.to_trace();
        dispatch(&self.listeners, &trace).await;
        Ok(trace)
    }

    fn to_trace(&self) -> Trace {
        let end_time = self.end_time.unwrap_or_else(Utc::now);
        let spans: Vec<Span> = self
            .spans
            .iter()
            .map(SpanBuilder::to_span)
            .collect();
        let total_tokens = sum_model_call_tokens(&spans);
        Trace {
            id: self.id,
            name: self.name.clone(),
            start_time: self.start_time,
            end_time,
            duration: (end_time - self.start_time).to_std().unwrap_or_default().into(),
            error: self.error.clone(),
            spans,
            attributes: self.attributes.clone(),
            total_tokens,
            thumbs_up_count: 0,
            thumbs_down_count: 0,
            input_text: self.input_text.clone(),
            output_text: self.output_text.clone(),
            user_id: self.user_id.clone(),
            session_id: self.session_id,
            model_id: self.model_id.clone(),
            prompt_name: self.prompt_name.clone(),
            prompt_version: self.prompt_version,
            group_id: self.group_id.clone(),
            labels: self.labels.clone(),
        }
    }
}

/// Invoke every listener, in registration order, with the closed trace.
/// A listener that panics is caught and logged; every other listener still
/// runs (spec §8: every listener is invoked exactly once, even if some
/// throw — no short-circuiting on a listener's outcome).
async fn dispatch(listeners: &[Arc<dyn TraceListener>], trace: &Trace) {
    for listener in listeners {
        let result = AssertUnwindSafe(listener.on_trace(trace)).catch_unwind().await;
        if let Err(panic) = result {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            tracing::warn!(trace_id = %trace.id, %message, "trace listener panicked");
        }
    }
}
