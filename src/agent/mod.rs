//! Agent invocation
//!
//! The agent is an external worker process invoked once per iteration with
//! the task context on stdin. This module provides the `AgentRunner` seam,
//! the subprocess implementation, and completion-marker detection.

pub mod marker;
pub mod runner;

pub use marker::contains_marker;
pub use runner::{AgentResult, AgentRunner, AgentStatus, CommandAgentRunner, TaskContext};
