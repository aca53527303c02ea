//! `Step` (spec §4.3): the six step combinators a `Workflow` is built from.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axon_types::{AgentResult, Response, SessionContext};
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use thiserror::Error;

use crate::step_context::StepContext;
use crate::step_result::StepResult;

/// The capability `AgentStep` runs. Implemented by `axon-agent`'s `Agent`;
/// kept as a trait here (rather than a concrete dependency) so this crate
/// has no dependency on the agent loop crate.
#[async_trait]
pub trait RunnableAgent: Send + Sync {
    /// Drive a full run to completion.
    async fn run(&self, session: SessionContext) -> AgentResult<Response<()>>;
}

/// Construction-time misuse of a step combinator.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    /// `Loop`'s `max_iterations` was less than 1.
    #[error("loop '{0}' maxIterations must be >= 1")]
    InvalidMaxIterations(String),
}

/// Computation produced by a `FunctionStep`'s closure on success.
#[derive(Debug, Clone, Default)]
pub struct StepOutput {
    /// Text content for the resulting `StepResult`.
    pub content: Option<String>,
    /// Structured data for the resulting `StepResult`.
    pub data: HashMap<String, String>,
}

impl StepOutput {
    /// Build an output with only text content.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            data: HashMap::new(),
        }
    }
}

type InputMapper = Arc<dyn Fn(&StepContext) -> String + Send + Sync>;
type StepFn = Arc<dyn Fn(StepContext) -> BoxFuture<'static, StepOutput> + Send + Sync>;
type Predicate = Arc<dyn Fn(&StepContext) -> bool + Send + Sync>;

async fn catch_panic<Fut, T>(fut: Fut) -> Result<T, String>
where
    Fut: Future<Output = T> + Send,
{
    AssertUnwindSafe(fut).catch_unwind().await.map_err(panic_message)
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

/// A tagged step combinator (spec §4.3).
pub enum Step {
    /// Run an agent over a mapped input.
    Agent(AgentStepDef),
    /// Invoke an arbitrary closure.
    Function(FunctionStepDef),
    /// Run children in order; fail-fast.
    Sequential(SequentialDef),
    /// Run children concurrently over the same context snapshot.
    Parallel(ParallelDef),
    /// Branch on a predicate.
    Condition(ConditionDef),
    /// Repeat a body step while a predicate holds.
    Loop(LoopDef),
    /// Try children in order; return the first success.
    Fallback(FallbackDef),
}

impl Step {
    /// Build an `AgentStep`.
    pub fn agent(
        name: impl Into<String>,
        agent: Arc<dyn RunnableAgent>,
        input_mapper: impl Fn(&StepContext) -> String + Send + Sync + 'static,
    ) -> Self {
        Step::Agent(AgentStepDef {
            name: name.into(),
            agent,
            input_mapper: Arc::new(input_mapper),
        })
    }

    /// Build a `FunctionStep`.
    pub fn function(
        name: impl Into<String>,
        func: impl Fn(StepContext) -> BoxFuture<'static, StepOutput> + Send + Sync + 'static,
    ) -> Self {
        Step::Function(FunctionStepDef {
            name: name.into(),
            func: Arc::new(func),
        })
    }

    /// Build a `Sequential` step.
    pub fn sequential(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Step::Sequential(SequentialDef {
            name: name.into(),
            steps,
        })
    }

    /// Build a `Parallel` step.
    pub fn parallel(name: impl Into<String>, steps: Vec<Step>, timeout: Option<Duration>) -> Self {
        Step::Parallel(ParallelDef {
            name: name.into(),
            steps,
            timeout,
        })
    }

    /// Build a `Condition` step.
    pub fn condition(
        name: impl Into<String>,
        predicate: impl Fn(&StepContext) -> bool + Send + Sync + 'static,
        if_step: Step,
        else_step: Option<Step>,
    ) -> Self {
        Step::Condition(ConditionDef {
            name: name.into(),
            predicate: Arc::new(predicate),
            if_step: Box::new(if_step),
            else_step: else_step.map(Box::new),
        })
    }

    /// Build a `Loop` step. Fails construction if `max_iterations < 1`.
    pub fn loop_step(
        name: impl Into<String>,
        predicate: impl Fn(&StepContext) -> bool + Send + Sync + 'static,
        body: Step,
        max_iterations: u32,
    ) -> Result<Self, WorkflowError> {
        let name = name.into();
        if max_iterations < 1 {
            return Err(WorkflowError::InvalidMaxIterations(name));
        }
        Ok(Step::Loop(LoopDef {
            name,
            predicate: Arc::new(predicate),
            body: Box::new(body),
            max_iterations,
        }))
    }

    /// Build a `Fallback` step.
    pub fn fallback(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Step::Fallback(FallbackDef {
            name: name.into(),
            steps,
        })
    }

    /// This step's name.
    pub fn name(&self) -> &str {
        match self {
            Step::Agent(d) => &d.name,
            Step::Function(d) => &d.name,
            Step::Sequential(d) => &d.name,
            Step::Parallel(d) => &d.name,
            Step::Condition(d) => &d.name,
            Step::Loop(d) => &d.name,
            Step::Fallback(d) => &d.name,
        }
    }

    /// Run this step against `ctx`, returning its result.
    pub fn run<'a>(&'a self, ctx: &'a StepContext) -> BoxFuture<'a, StepResult> {
        Box::pin(async move {
            match self {
                Step::Agent(d) => d.run(ctx).await,
                Step::Function(d) => d.run(ctx).await,
                Step::Sequential(d) => d.run(ctx).await,
                Step::Parallel(d) => d.run(ctx).await,
                Step::Condition(d) => d.run(ctx).await,
                Step::Loop(d) => d.run(ctx).await,
                Step::Fallback(d) => d.run(ctx).await,
            }
        })
    }
}

/// `AgentStep(name, agent, inputMapper)` (spec §4.3).
pub struct AgentStepDef {
    name: String,
    agent: Arc<dyn RunnableAgent>,
    input_mapper: InputMapper,
}

impl AgentStepDef {
    async fn run(&self, ctx: &StepContext) -> StepResult {
        let mapped_input = (self.input_mapper)(ctx);
        let session = match ctx.session() {
            Some(existing) => {
                let mut session = SessionContext::with_session_id(*existing.session_id(), mapped_input)
                    .with_prompt_vars(existing.prompt_vars().clone())
                    .with_metadata(existing.metadata().clone());
                if let Some(user_id) = existing.user_id() {
                    session = session.with_user_id(user_id.to_string());
                }
                session
            }
            None => SessionContext::new(mapped_input),
        };

        match self.agent.run(session).await {
            Ok(response) => StepResult::success(self.name.clone(), response.content, HashMap::new()),
            Err(err) => StepResult::failure(self.name.clone(), err.to_string()),
        }
    }
}

/// `FunctionStep(name, fn)` (spec §4.3).
pub struct FunctionStepDef {
    name: String,
    func: StepFn,
}

impl FunctionStepDef {
    async fn run(&self, ctx: &StepContext) -> StepResult {
        let func = self.func.clone();
        let ctx = ctx.clone();
        match catch_panic(async move { (func)(ctx).await }).await {
            Ok(output) => StepResult::success(self.name.clone(), output.content, output.data),
            Err(message) => StepResult::failure(self.name.clone(), message),
        }
    }
}

/// `Sequential(name, steps)` (spec §4.3).
pub struct SequentialDef {
    name: String,
    steps: Vec<Step>,
}

impl SequentialDef {
    async fn run(&self, ctx: &StepContext) -> StepResult {
        let mut current = ctx.clone();
        let mut last = StepResult::skip(self.name.clone());
        for step in &self.steps {
            let result = step.run(&current).await;
            let succeeded = result.success;
            current = current.with_result(result.clone());
            last = result;
            if !succeeded {
                return last;
            }
        }
        last
    }
}

/// `Parallel(name, steps, timeout?)` (spec §4.3).
pub struct ParallelDef {
    name: String,
    steps: Vec<Step>,
    timeout: Option<Duration>,
}

impl ParallelDef {
    async fn run(&self, ctx: &StepContext) -> StepResult {
        let snapshot = ctx.clone();
        let join = async {
            let mut pending: FuturesUnordered<_> = self
                .steps
                .iter()
                .map(|step| {
                    let snapshot = snapshot.clone();
                    async move { step.run(&snapshot).await }
                })
                .collect();

            let mut contents = Vec::new();
            let mut data = HashMap::new();
            while let Some(result) = pending.next().await {
                if !result.success {
                    return Err(result);
                }
                if let Some(content) = &result.content {
                    contents.push(content.clone());
                }
                for (key, value) in result.data {
                    data.insert(key, value);
                }
            }
            Ok((contents, data))
        };

        let outcome = match self.timeout {
            Some(duration) => match tokio::time::timeout(duration, join).await {
                Ok(inner) => inner,
                Err(_elapsed) => {
                    return StepResult::failure(
                        self.name.clone(),
                        format!("Parallel execution timed out after {duration:?}"),
                    );
                }
            },
            None => join.await,
        };

        match outcome {
            Ok((contents, data)) => {
                let content = if contents.is_empty() { None } else { Some(contents.join("\n")) };
                StepResult::success(self.name.clone(), content, data)
            }
            Err(failing) => failing,
        }
    }
}

/// `Condition(name, predicate, ifStep, elseStep?)` (spec §4.3).
pub struct ConditionDef {
    name: String,
    predicate: Predicate,
    if_step: Box<Step>,
    else_step: Option<Box<Step>>,
}

impl ConditionDef {
    async fn run(&self, ctx: &StepContext) -> StepResult {
        let predicate = self.predicate.clone();
        let ctx_for_predicate = ctx.clone();
        let evaluated = std::panic::catch_unwind(AssertUnwindSafe(|| (predicate)(&ctx_for_predicate)));
        let condition = match evaluated {
            Ok(value) => value,
            Err(panic) => return StepResult::failure(self.name.clone(), panic_message(panic)),
        };

        if condition {
            self.if_step.run(ctx).await
        } else if let Some(else_step) = &self.else_step {
            else_step.run(ctx).await
        } else {
            StepResult::skip(self.name.clone())
        }
    }
}

/// `Loop(name, predicate, body, maxIterations)` (spec §4.3).
pub struct LoopDef {
    name: String,
    predicate: Predicate,
    body: Box<Step>,
    max_iterations: u32,
}

impl LoopDef {
    async fn run(&self, ctx: &StepContext) -> StepResult {
        let mut current = ctx.clone();
        let mut count = 0u32;
        let mut last: Option<StepResult> = None;

        loop {
            let evaluated = std::panic::catch_unwind(AssertUnwindSafe(|| (self.predicate)(&current)));
            let should_continue = match evaluated {
                Ok(value) => value,
                Err(panic) => return StepResult::failure(self.name.clone(), panic_message(panic)),
            };
            if !should_continue || count >= self.max_iterations {
                break;
            }

            let result = self.body.run(&current).await;
            count += 1;
            let succeeded = result.success;
            current = current.with_result(result.clone());
            last = Some(result);
            if !succeeded {
                break;
            }
        }

        last.unwrap_or_else(|| StepResult::skip(self.name.clone()))
    }
}

/// `Fallback(name, steps)` (spec §4.3).
pub struct FallbackDef {
    name: String,
    steps: Vec<Step>,
}

impl FallbackDef {
    async fn run(&self, ctx: &StepContext) -> StepResult {
        let mut failures = Vec::new();
        for step in &self.steps {
            let result = step.run(ctx).await;
            if result.success {
                return result;
            }
            failures.push(format!(
                "{}: {}",
                result.name,
                result.error.clone().unwrap_or_default()
            ));
        }
        StepResult::failure(
            self.name.clone(),
            format!("All fallback steps failed [{}]", failures.join("; ")),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axon_types::AgentError;

    struct StubAgent {
        response: AgentResult<Response<()>>,
    }

    #[async_trait]
    impl RunnableAgent for StubAgent {
        async fn run(&self, _session: SessionContext) -> AgentResult<Response<()>> {
            match &self.response {
                Ok(r) => Ok(r.clone()),
                Err(e) => Err(AgentError::step_failed(e.to_string())),
            }
        }
    }

    #[tokio::test]
    async fn agent_step_converts_response_content_to_success() {
        let agent = Arc::new(StubAgent {
            response: Ok(Response::text("hi there")),
        });
        let step = Step::agent("greet", agent, |ctx| ctx.input().to_string());
        let ctx = StepContext::new("hello", None);
        let result = step.run(&ctx).await;
        assert!(result.success);
        assert_eq!(result.content.as_deref(), Some("hi there"));
    }

    #[tokio::test]
    async fn function_step_panic_becomes_failure() {
        let step = Step::function("boom", |_ctx| {
            async { panic!("kaboom") }.boxed()
        });
        let ctx = StepContext::new("go", None);
        let result = step.run(&ctx).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("kaboom"));
    }

    #[tokio::test]
    async fn sequential_fails_fast() {
        let ok = Step::function("a", |_ctx| async { StepOutput::text("a-done") }.boxed());
        let fail = Step::function("b", |_ctx| async { panic!("b failed") }.boxed());
        let never = Step::function("c", |_ctx| async { StepOutput::text("c-done") }.boxed());
        let step = Step::sequential("seq", vec![ok, fail, never]);
        let ctx = StepContext::new("go", None);
        let result = step.run(&ctx).await;
        assert!(!result.success);
        assert_eq!(result.name, "b");
    }

    #[tokio::test]
    async fn parallel_merges_content_and_data() {
        let a = Step::function("a", |_ctx| {
            async {
                let mut data = HashMap::new();
                data.insert("k".to_string(), "from-a".to_string());
                StepOutput { content: Some("a".to_string()), data }
            }
            .boxed()
        });
        let b = Step::function("b", |_ctx| async { StepOutput::text("b") }.boxed());
        let step = Step::parallel("par", vec![a, b], None);
        let ctx = StepContext::new("go", None);
        let result = step.run(&ctx).await;
        assert!(result.success);
        assert!(result.content.unwrap().contains("a"));
        assert_eq!(result.data.get("k").unwrap(), "from-a");
    }

    #[tokio::test]
    async fn parallel_returns_first_observed_failure() {
        let ok = Step::function("a", |_ctx| async { StepOutput::text("a") }.boxed());
        let fail = Step::function("b", |_ctx| async { panic!("nope") }.boxed());
        let step = Step::parallel("par", vec![ok, fail], None);
        let ctx = StepContext::new("go", None);
        let result = step.run(&ctx).await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn parallel_timeout_cancels_and_fails() {
        let slow = Step::function("slow", |_ctx| {
            async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                StepOutput::text("too late")
            }
            .boxed()
        });
        let step = Step::parallel("par", vec![slow], Some(Duration::from_millis(10)));
        let ctx = StepContext::new("go", None);
        let result = step.run(&ctx).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn condition_runs_if_branch_when_true() {
        let if_step = Step::function("yes", |_ctx| async { StepOutput::text("yes") }.boxed());
        let step = Step::condition("cond", |_ctx| true, if_step, None);
        let ctx = StepContext::new("go", None);
        let result = step.run(&ctx).await;
        assert_eq!(result.content.as_deref(), Some("yes"));
    }

    #[tokio::test]
    async fn condition_false_without_else_is_a_skip() {
        let if_step = Step::function("yes", |_ctx| async { StepOutput::text("yes") }.boxed());
        let step = Step::condition("cond", |_ctx| false, if_step, None);
        let ctx = StepContext::new("go", None);
        let result = step.run(&ctx).await;
        assert!(result.success);
        assert!(result.content.is_none());
        assert_eq!(result.name, "cond");
    }

    #[tokio::test]
    async fn loop_runs_while_predicate_holds_and_respects_max_iterations() {
        use std::sync::atomic::{AtomicU32, Ordering};
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();
        let body = Step::function("iter", move |_ctx| {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                StepOutput::text("tick")
            }
            .boxed()
        });
        let step = Step::loop_step("loop", |_ctx| true, body, 3).unwrap();
        let ctx = StepContext::new("go", None);
        step.run(&ctx).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn loop_construction_rejects_zero_max_iterations() {
        let body = Step::function("iter", |_ctx| async { StepOutput::text("x") }.boxed());
        let err = Step::loop_step("loop", |_ctx| true, body, 0).unwrap_err();
        assert_eq!(err, WorkflowError::InvalidMaxIterations("loop".to_string()));
    }

    #[tokio::test]
    async fn fallback_returns_first_success() {
        let fail = Step::function("a", |_ctx| async { panic!("a down") }.boxed());
        let ok = Step::function("b", |_ctx| async { StepOutput::text("b up") }.boxed());
        let step = Step::fallback("fb", vec![fail, ok]);
        let ctx = StepContext::new("go", None);
        let result = step.run(&ctx).await;
        assert!(result.success);
        assert_eq!(result.name, "b");
    }

    #[tokio::test]
    async fn fallback_aggregates_errors_when_all_fail() {
        let a = Step::function("a", |_ctx| async { panic!("a down") }.boxed());
        let b = Step::function("b", |_ctx| async { panic!("b down") }.boxed());
        let step = Step::fallback("fb", vec![a, b]);
        let ctx = StepContext::new("go", None);
        let result = step.run(&ctx).await;
        assert!(!result.success);
        let message = result.error.unwrap();
        assert!(message.starts_with("All fallback steps failed ["));
        assert!(message.contains("a: ") && message.contains("b: "));
    }
}
