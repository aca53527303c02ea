#![deny(missing_docs)]
//! # axon — umbrella crate
//!
//! Single import surface for the axon agentic runtime. Re-exports the
//! per-concern crates behind feature flags, plus a `prelude` for the
//! happy path.

pub use axon_types;

#[cfg(feature = "core")]
pub use axon_fault;
#[cfg(feature = "core")]
pub use axon_memory;
#[cfg(feature = "core")]
pub use axon_prompt;
#[cfg(feature = "core")]
pub use axon_tool;
#[cfg(feature = "core")]
pub use axon_trace;
#[cfg(feature = "workflow")]
pub use axon_workflow;
#[cfg(feature = "agent")]
pub use axon_agent;

/// Happy-path imports for composing axon agents.
pub mod prelude {
    pub use axon_types::{
        AgentError, AgentResult, AgentState, Message, Response, SessionContext, SessionId,
        ToolCall,
    };

    #[cfg(feature = "core")]
    pub use axon_fault::{FaultError, FaultTolerance};

    #[cfg(feature = "core")]
    pub use axon_memory::Memory;

    #[cfg(feature = "core")]
    pub use axon_tool::{ToolDyn, ToolRegistry, ToolResult};

    #[cfg(feature = "core")]
    pub use axon_trace::{SpanKind, TraceBuilder, TraceListener};

    #[cfg(feature = "workflow")]
    pub use axon_workflow::{RunnableAgent, Step, Workflow};

    #[cfg(feature = "agent")]
    pub use axon_agent::{Agent, AgentConfig, AgentConfigBuilder, Model, OutputSchema};
}
