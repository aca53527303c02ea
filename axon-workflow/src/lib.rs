#![deny(missing_docs)]
//! Step combinators and workflow orchestration (spec §4.3, §4.4, component H).

mod step;
mod step_context;
mod step_result;
mod workflow;

pub use step::{RunnableAgent, Step, StepOutput, WorkflowError};
pub use step_context::StepContext;
pub use step_result::StepResult;
pub use workflow::Workflow;
