//! `SessionContext` (spec §3): the caller-supplied entry point into an
//! agent run.

use std::collections::HashMap;

use crate::id::SessionId;

/// Everything an agent run needs from its caller.
#[derive(Debug, Clone)]
pub struct SessionContext {
    session_id: SessionId,
    user_id: Option<String>,
    user_input: String,
    prompt_vars: HashMap<String, String>,
    metadata: HashMap<String, String>,
}

impl SessionContext {
    /// Build a session context with a freshly generated, time-ordered id.
    pub fn new(user_input: impl Into<String>) -> Self {
        Self {
            session_id: SessionId::new(),
            user_id: None,
            user_input: user_input.into(),
            prompt_vars: HashMap::new(),
            metadata: HashMap::new(),
        }
    }

    /// Build a session context reusing an existing session id (e.g. a
    /// multi-turn conversation continuing a prior run).
    pub fn with_session_id(session_id: SessionId, user_input: impl Into<String>) -> Self {
        Self {
            session_id,
            user_id: None,
            user_input: user_input.into(),
            prompt_vars: HashMap::new(),
            metadata: HashMap::new(),
        }
    }

    /// Attach a user id, returning the modified context.
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Attach prompt template variables, returning the modified context.
    pub fn with_prompt_vars(mut self, prompt_vars: HashMap<String, String>) -> Self {
        self.prompt_vars = prompt_vars;
        self
    }

    /// Attach metadata, returning the modified context.
    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    /// This session's unique, time-ordered identifier.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// The caller's user id, if supplied.
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// The raw user input driving this run.
    pub fn user_input(&self) -> &str {
        &self.user_input
    }

    /// Variables merged into the system prompt template.
    pub fn prompt_vars(&self) -> &HashMap<String, String> {
        &self.prompt_vars
    }

    /// Opaque metadata attached to this session.
    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }
}
