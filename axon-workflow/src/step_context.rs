//! `StepContext` (spec §4.3): the immutable, threaded state of a workflow
//! run.

use axon_types::SessionContext;

use crate::step_result::StepResult;

/// Immutable context threaded through a workflow run. `with_result`
/// returns a new context with the given result appended; insertion order
/// is preserved so `previous_results` listing is reproducible.
#[derive(Debug, Clone)]
pub struct StepContext {
    input: String,
    previous_results: Vec<(String, StepResult)>,
    last_result: Option<StepResult>,
    session: Option<SessionContext>,
}

impl StepContext {
    /// Build the initial context for a workflow run.
    pub fn new(input: impl Into<String>, session: Option<SessionContext>) -> Self {
        Self {
            input: input.into(),
            previous_results: Vec::new(),
            last_result: None,
            session,
        }
    }

    /// The input text the workflow was run with.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Every result produced so far, in insertion order.
    pub fn previous_results(&self) -> &[(String, StepResult)] {
        &self.previous_results
    }

    /// Look up a prior result by the step name that produced it. At most
    /// one entry ever exists per name.
    pub fn result(&self, name: &str) -> Option<&StepResult> {
        self.previous_results.iter().find(|(n, _)| n == name).map(|(_, r)| r)
    }

    /// The most recently appended result, if any.
    pub fn last_result(&self) -> Option<&StepResult> {
        self.last_result.as_ref()
    }

    /// The session this workflow run is operating under, if any.
    pub fn session(&self) -> Option<&SessionContext> {
        self.session.as_ref()
    }

    /// Return a new context with `result` recorded under its name. An
    /// existing entry for the same name (e.g. a `Loop` body re-running
    /// under a fixed name) is replaced in place rather than duplicated,
    /// since `previous_results` is an ordered map, not a log.
    pub fn with_result(&self, result: StepResult) -> Self {
        let mut previous_results = self.previous_results.clone();
        match previous_results.iter_mut().find(|(n, _)| *n == result.name) {
            Some(entry) => entry.1 = result.clone(),
            None => previous_results.push((result.name.clone(), result.clone())),
        }
        Self {
            input: self.input.clone(),
            previous_results,
            last_result: Some(result),
            session: self.session.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_result_preserves_insertion_order() {
        let ctx = StepContext::new("go", None);
        let ctx = ctx.with_result(StepResult::success("a", Some("1".into()), Default::default()));
        let ctx = ctx.with_result(StepResult::success("b", Some("2".into()), Default::default()));
        let names: Vec<_> = ctx.previous_results().iter().map(|(n, _)| n.clone()).collect();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(ctx.last_result().unwrap().name, "b");
    }

    #[test]
    fn original_context_is_unaffected_by_with_result() {
        let ctx = StepContext::new("go", None);
        let _ = ctx.with_result(StepResult::success("a", None, Default::default()));
        assert!(ctx.previous_results().is_empty());
    }

    #[test]
    fn repeated_name_replaces_the_prior_entry_instead_of_duplicating_it() {
        let ctx = StepContext::new("go", None);
        let ctx = ctx.with_result(StepResult::success("iter", Some("1".into()), Default::default()));
        let ctx = ctx.with_result(StepResult::success("iter", Some("2".into()), Default::default()));
        let ctx = ctx.with_result(StepResult::success("iter", Some("3".into()), Default::default()));
        assert_eq!(ctx.previous_results().len(), 1);
        assert_eq!(ctx.result("iter").unwrap().content.as_deref(), Some("3"));
    }
}
