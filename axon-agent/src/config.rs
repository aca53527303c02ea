//! `AgentConfig` (spec §6 "Configuration surface"): recognized
//! construction-time options, independent of the chosen `Model` backend.

use std::sync::Arc;

use axon_fault::FaultTolerance;
use axon_trace::TraceListener;
use thiserror::Error;

/// The default system-prompt template (spec §6).
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are {name}, an AI assistant with persistent memory.\n\
## Core Memory\n\
{core_memory}\n\
## Instructions\n\
- Use memory tools to store important information\n\
- Use archival memory for long-term storage\n\
- Be helpful and accurate";

/// Construction-time misconfiguration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AgentConfigError {
    /// `max_iterations` was zero.
    #[error("maxIterations must be >= 1")]
    InvalidMaxIterations,
}

/// Agent construction options (spec §6).
#[derive(Clone)]
pub struct AgentConfig {
    name: String,
    system_prompt: String,
    max_iterations: u32,
    include_memory_tools: bool,
    trace_listeners: Vec<Arc<dyn TraceListener>>,
    fault_tolerance: FaultTolerance,
    prompt_name: Option<String>,
    prompt_version: Option<u32>,
}

impl AgentConfig {
    /// Start from the documented defaults: name `"Assistant"`, the
    /// default system-prompt template, 10 max iterations, memory tools
    /// included, no trace listeners (tracing off), and a passthrough
    /// fault-tolerance pipeline.
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder::default()
    }

    /// The agent's display name, substituted into `{name}`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The raw system-prompt template, prior to rendering.
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Maximum model-plus-tool iterations per run.
    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Whether memory-bound tools are added to the effective tool set.
    pub fn include_memory_tools(&self) -> bool {
        self.include_memory_tools
    }

    /// Registered trace listeners. Empty means tracing is off.
    pub fn trace_listeners(&self) -> &[Arc<dyn TraceListener>] {
        &self.trace_listeners
    }

    /// The fault-tolerance pipeline wrapping model and tool calls.
    pub fn fault_tolerance(&self) -> &FaultTolerance {
        &self.fault_tolerance
    }

    /// Prompt lineage metadata (name), attached to traces only.
    pub fn prompt_name(&self) -> Option<&str> {
        self.prompt_name.as_deref()
    }

    /// Prompt lineage metadata (version), attached to traces only.
    pub fn prompt_version(&self) -> Option<u32> {
        self.prompt_version
    }
}

/// Builder for [`AgentConfig`].
pub struct AgentConfigBuilder {
    name: String,
    system_prompt: String,
    max_iterations: u32,
    include_memory_tools: bool,
    trace_listeners: Vec<Arc<dyn TraceListener>>,
    fault_tolerance: FaultTolerance,
    prompt_name: Option<String>,
    prompt_version: Option<u32>,
}

impl Default for AgentConfigBuilder {
    fn default() -> Self {
        Self {
            name: "Assistant".to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_iterations: 10,
            include_memory_tools: true,
            trace_listeners: Vec::new(),
            fault_tolerance: FaultTolerance::passthrough(),
            prompt_name: None,
            prompt_version: None,
        }
    }
}

impl AgentConfigBuilder {
    /// Set the agent's display name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Override the system-prompt template.
    pub fn system_prompt(mut self, template: impl Into<String>) -> Self {
        self.system_prompt = template.into();
        self
    }

    /// Set the maximum iterations per run.
    pub fn max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Toggle whether memory-bound tools are exposed to the model.
    pub fn include_memory_tools(mut self, include: bool) -> Self {
        self.include_memory_tools = include;
        self
    }

    /// Register a trace listener.
    pub fn trace_listener(mut self, listener: Arc<dyn TraceListener>) -> Self {
        self.trace_listeners.push(listener);
        self
    }

    /// Set the fault-tolerance pipeline wrapping model and tool calls.
    pub fn fault_tolerance(mut self, fault_tolerance: FaultTolerance) -> Self {
        self.fault_tolerance = fault_tolerance;
        self
    }

    /// Attach prompt lineage metadata.
    pub fn prompt(mut self, name: impl Into<String>, version: u32) -> Self {
        self.prompt_name = Some(name.into());
        self.prompt_version = Some(version);
        self
    }

    /// Validate and build the config. Fails if `max_iterations < 1`.
    pub fn build(self) -> Result<AgentConfig, AgentConfigError> {
        if self.max_iterations < 1 {
            return Err(AgentConfigError::InvalidMaxIterations);
        }
        Ok(AgentConfig {
            name: self.name,
            system_prompt: self.system_prompt,
            max_iterations: self.max_iterations,
            include_memory_tools: self.include_memory_tools,
            trace_listeners: self.trace_listeners,
            fault_tolerance: self.fault_tolerance,
            prompt_name: self.prompt_name,
            prompt_version: self.prompt_version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_surface() {
        let config = AgentConfig::builder().build().unwrap();
        assert_eq!(config.name(), "Assistant");
        assert_eq!(config.max_iterations(), 10);
        assert!(config.include_memory_tools());
        assert!(config.trace_listeners().is_empty());
    }

    #[test]
    fn zero_max_iterations_is_rejected() {
        let err = AgentConfig::builder().max_iterations(0).build().unwrap_err();
        assert_eq!(err, AgentConfigError::InvalidMaxIterations);
    }
}
