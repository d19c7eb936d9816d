//! Plan execution - round-based scheduling on a bounded worker pool
//!
//! The scheduler owns one [`ExecutionState`] per call. Each round it computes
//! the steps whose dependencies all have results, dispatches them together,
//! and waits for the whole round before looking again.

mod scheduler;
mod state;

pub use scheduler::{ExecutorConfig, PlanExecutor};
pub use state::{ExecutionReport, ExecutionState, StepResult, StepStatus};

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::tools::ToolError;

/// The capability plan steps run through: call a named tool with arguments
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn invoke(&self, tool_name: &str, arguments: &Map<String, Value>) -> Result<String, ToolError>;
}

/// Failures of the executor itself (step failures are recorded, not raised)
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExecutorError {
    /// Steps remain but none can become ready
    #[error("Scheduler stalled with unreachable steps: {}", .remaining.join(", "))]
    Stalled { remaining: Vec<String> },
}
