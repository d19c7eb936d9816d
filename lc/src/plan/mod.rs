//! Plans - graph-shaped lists of tool steps emitted by the model
//!
//! Raw model text goes through [`parse_plan`] and then [`validate`]; only a
//! [`ValidatedPlan`] can be handed to the executor.

mod error;
mod parser;
mod types;
mod validator;

pub use error::{ParseError, StepDecodeError, ValidationError};
pub use parser::{ParsePolicy, ParsedPlan, RejectedStep, extract_plan_array, parse_plan};
pub use types::{FINAL_ACTION, Plan, Step, StepKind};
pub use validator::{DependencyGraph, ValidatedPlan, check, validate};
