//! Core data model, error taxonomy, and identifiers shared by every other
//! `axon` crate.

mod agent_state;
mod duration;
mod error;
mod id;
mod message;
mod response;
mod session;

pub use agent_state::AgentState;
pub use duration::DurationMs;
pub use error::{AgentError, AgentResult};
pub use id::{AgentId, SessionId, SpanId, TraceId, WorkflowId};
pub use message::{Message, Role, ToolCall};
pub use response::{FinishReason, Response, TokenUsage};
pub use session::SessionContext;
