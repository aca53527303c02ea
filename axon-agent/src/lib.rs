#![deny(missing_docs)]
//! The agent loop (spec §4.1, §4.2, §4.5, component G/I/K): a model/tool
//! step machine driven to completion, with structured output and span
//! wiring over `axon-workflow`'s `RunnableAgent` contract.

mod agent;
mod config;
mod memory_tools;
mod model;
mod output_schema;

pub use agent::Agent;
pub use config::{AgentConfig, AgentConfigBuilder, AgentConfigError, DEFAULT_SYSTEM_PROMPT};
pub use model::{Model, ModelError, StreamEvent, ToolSchema};
pub use output_schema::{OutputSchema, StructuredOutputError};
