//! `Workflow` (spec §4.3, §4.4): a named sequence of top-level steps run
//! under a single trace.

use std::sync::Arc;

use axon_trace::{SpanKind, TraceBuilder, TraceListener};
use axon_types::SessionContext;

use crate::step::Step;
use crate::step_context::StepContext;
use crate::step_result::StepResult;

/// A named workflow: a sequence of top-level steps run in order under an
/// enclosing trace. The first top-level step to fail stops the run; its
/// result is returned and the trace is closed via `fail()`.
pub struct Workflow {
    name: String,
    steps: Vec<Step>,
    listeners: Vec<Arc<dyn TraceListener>>,
}

impl Workflow {
    /// Build a workflow from its top-level steps.
    pub fn new(name: impl Into<String>, steps: Vec<Step>, listeners: Vec<Arc<dyn TraceListener>>) -> Self {
        Self {
            name: name.into(),
            steps,
            listeners,
        }
    }

    /// Run with bare input text and no session.
    pub async fn run(&self, input: impl Into<String>) -> StepResult {
        self.run_with_session(input, None).await
    }

    /// Run with input text under an existing session.
    pub async fn run_with_session(
        &self,
        input: impl Into<String>,
        session: Option<SessionContext>,
    ) -> StepResult {
        let input = input.into();
        let mut trace = TraceBuilder::start(format!("workflow.{}", self.name), self.listeners.clone());
        trace.set_input_text(input.clone());
        if let Some(session) = &session {
            trace.set_session_id(*session.session_id());
        }

        let mut ctx = StepContext::new(input, session);
        let mut last = StepResult::skip(self.name.clone());

        for step in &self.steps {
            let span_name = format!("step.{}", step.name());
            let span = match trace.span(span_name, SpanKind::Workflow) {
                Ok(span) => span,
                Err(err) => {
                    let _ = trace.fail(err.to_string()).await;
                    return StepResult::failure(self.name.clone(), err.to_string());
                }
            };

            let result = step.run(&ctx).await;
            if result.success {
                let _ = span.end();
            } else {
                let _ = span.fail(result.error.clone().unwrap_or_default());
            }

            let succeeded = result.success;
            ctx = ctx.with_result(result.clone());
            last = result;

            if !succeeded {
                let _ = trace.fail(last.error.clone().unwrap_or_default()).await;
                return last;
            }
        }

        trace.set_output_text(last.content.clone().unwrap_or_default());
        let _ = trace.end().await;
        last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::StepOutput;
    use futures::FutureExt;

    #[tokio::test]
    async fn runs_steps_in_order_and_returns_last_result() {
        let a = Step::function("a", |_ctx| async { StepOutput::text("a-done") }.boxed());
        let b = Step::function("b", |_ctx| async { StepOutput::text("b-done") }.boxed());
        let workflow = Workflow::new("greet", vec![a, b], vec![]);
        let result = workflow.run("go").await;
        assert!(result.success);
        assert_eq!(result.content.as_deref(), Some("b-done"));
    }

    #[tokio::test]
    async fn stops_at_first_failing_top_level_step() {
        let a = Step::function("a", |_ctx| async { StepOutput::text("a-done") }.boxed());
        let fail = Step::function("b", |_ctx| async { panic!("boom") }.boxed());
        let never = Step::function("c", |_ctx| async { StepOutput::text("c-done") }.boxed());
        let workflow = Workflow::new("greet", vec![a, fail, never], vec![]);
        let result = workflow.run("go").await;
        assert!(!result.success);
        assert_eq!(result.name, "b");
    }
}
