#![deny(missing_docs)]
//! Hierarchical tracing core (spec §3, §4.5, component C).
//!
//! [`TraceBuilder`] opens a [`Trace`], which holds a tree of [`Span`]s
//! opened via [`SpanBuilder`]. Closing the trace dispatches it to every
//! registered [`TraceListener`], tolerating listener panics so one bad
//! listener never affects another or the run itself.

mod span;
mod trace;

pub use span::{Span, SpanBuilder, SpanError, SpanKind};
pub use trace::{Trace, TraceBuilder, TraceListener};
