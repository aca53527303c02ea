//! `AgentState` (spec §3, §4.1): the immutable per-step snapshot of one
//! agent run.

use crate::id::SessionId;
use crate::message::Message;
use crate::response::Response;

/// The state of one agent run at a point in time.
///
/// Immutable per step: [`crate::AgentResult`]-returning step functions
/// consume one `AgentState` and produce a new one; nothing here is
/// mutated in place. Invariants enforced by the constructors:
/// - `error.is_some() ⇒ is_complete == true`
/// - `iterations <= max_iterations` until the terminal failure state
///   (enforced by the caller driving the loop, not by this type itself).
#[derive(Debug, Clone)]
pub struct AgentState<T = ()> {
    messages: Vec<Message>,
    last_response: Option<Response<T>>,
    iterations: u32,
    is_complete: bool,
    error: Option<String>,
    session_id: SessionId,
}

impl<T> AgentState<T> {
    /// Build the seed state for a new run.
    pub fn new(session_id: SessionId, messages: Vec<Message>) -> Self {
        Self {
            messages,
            last_response: None,
            iterations: 0,
            is_complete: false,
            error: None,
            session_id,
        }
    }

    /// Messages accumulated so far.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The most recent model response, if any step has completed.
    pub fn last_response(&self) -> Option<&Response<T>> {
        self.last_response.as_ref()
    }

    /// Number of completed step iterations.
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Whether this run has reached a terminal state (success or error).
    pub fn is_complete(&self) -> bool {
        self.is_complete
    }

    /// The terminal error message, if this run ended in failure.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The session this state belongs to.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Produce a new state with additional messages appended and the
    /// iteration counter advanced, still incomplete.
    pub fn advance(&self, new_messages: Vec<Message>, response: Response<T>) -> Self
    where
        T: Clone,
    {
        let mut messages = self.messages.clone();
        messages.extend(new_messages);
        Self {
            messages,
            last_response: Some(response),
            iterations: self.iterations + 1,
            is_complete: false,
            error: None,
            session_id: self.session_id.clone(),
        }
    }

    /// Produce a new, successfully completed state.
    pub fn complete(&self, new_messages: Vec<Message>, response: Response<T>) -> Self
    where
        T: Clone,
    {
        let mut messages = self.messages.clone();
        messages.extend(new_messages);
        Self {
            messages,
            last_response: Some(response),
            iterations: self.iterations + 1,
            is_complete: true,
            error: None,
            session_id: self.session_id.clone(),
        }
    }

    /// Produce a new terminal-failure state. Per spec §4.1 this is a
    /// **success-shaped terminal** for max-iterations, not a thrown error;
    /// callers decide whether to surface it as `AgentResult::Err`.
    pub fn fail(&self, error: impl Into<String>) -> Self
    where
        T: Clone,
    {
        Self {
            messages: self.messages.clone(),
            last_response: self.last_response.clone(),
            iterations: self.iterations,
            is_complete: true,
            error: Some(error.into()),
            session_id: self.session_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fail_marks_complete() {
        let state: AgentState<()> = AgentState::new(SessionId::new(), Vec::new());
        let failed = state.fail("Max iterations (3) reached");
        assert!(failed.is_complete());
        assert_eq!(failed.error(), Some("Max iterations (3) reached"));
    }

    #[test]
    fn advance_preserves_prior_messages() {
        let state: AgentState<()> =
            AgentState::new(SessionId::new(), vec![Message::user("hi")]);
        let next = state.advance(vec![Message::assistant_text("hello")], Response::text("hello"));
        assert_eq!(next.messages().len(), 2);
        assert_eq!(next.iterations(), 1);
        assert!(!next.is_complete());
    }
}
