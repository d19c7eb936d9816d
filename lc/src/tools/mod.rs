//! Tool system for plan steps
//!
//! Tools provide file access, command execution and HTTP fetches to plan
//! steps. All tools of one run share a `ToolContext`; relative paths resolve
//! against its working directory.

mod context;
mod error;
mod executor;
mod traits;

pub mod builtin;

pub use context::{ToolContext, ToolLimits};
pub use error::ToolError;
pub use executor::ToolExecutor;
pub use traits::{Tool, ToolResult};
