//! LLMCompiler - parallel execution of model-planned tool calls
//!
//! The model emits a plan: a list of tool steps with dependencies plus one
//! final step whose answer template references other steps as `#id`. The
//! plan is validated as a DAG, executed round by round on a bounded worker
//! pool, and the final template is filled in from the step results.
//!
//! # Modules
//!
//! - [`plan`] - plan types, parsing from model text, DAG validation
//! - [`executor`] - round-based scheduler and execution state
//! - [`aggregate`] - `#id` placeholder substitution
//! - [`tools`] - tool trait, registry and built-in tools
//! - [`llm`] - LLM client trait and OpenAI-compatible implementation
//! - [`prompts`] - Handlebars prompt templates
//! - [`compiler`] - the end-to-end agent
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod aggregate;
pub mod cli;
pub mod compiler;
pub mod config;
pub mod executor;
pub mod llm;
pub mod plan;
pub mod prompts;
pub mod tools;

pub use aggregate::{AggregationError, aggregate, aggregate_or_fallback};
pub use compiler::{CompilerError, CompilerOutcome, ExecutionMetadata, LlmCompiler, TaskMode};
pub use config::Config;
pub use executor::{ExecutionReport, ExecutorConfig, PlanExecutor, StepResult, StepStatus, ToolInvoker};
pub use plan::{ParsePolicy, Plan, Step, ValidatedPlan, parse_plan, validate};
pub use tools::{ToolContext, ToolError, ToolExecutor};
