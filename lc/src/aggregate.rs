//! Result aggregation - turn step results into the synthesis payload
//!
//! With a final step, its answer template has `#<id>` placeholders replaced by
//! step values. Without one, successful tool outputs are concatenated in
//! step-id order.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use thiserror::Error;
use tracing::{debug, warn};

use crate::executor::{ExecutionReport, StepStatus};
use crate::plan::Plan;

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#([A-Za-z0-9_-]+)").expect("placeholder pattern is valid"));

/// Errors from assembling the payload
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AggregationError {
    #[error("Placeholder #{id} references a step with no recorded result")]
    UnresolvedPlaceholder { id: String },

    #[error("Final step '{id}' did not complete: {reason}")]
    FinalStepNotCompleted { id: String, reason: String },
}

/// Build the payload for the synthesis call
pub fn aggregate(plan: &Plan, report: &ExecutionReport) -> Result<String, AggregationError> {
    debug!(steps = plan.len(), results = report.len(), "aggregate: called");
    let Some(final_step) = plan.final_step() else {
        debug!("aggregate: no final step, concatenating");
        return Ok(concatenate(plan, report));
    };

    let final_id = final_step.id.as_str();
    let template = match report.get(final_id) {
        Some(result) if result.status.is_success() => result.value.as_str(),
        Some(result) => {
            return Err(AggregationError::FinalStepNotCompleted {
                id: final_id.to_string(),
                reason: result.value.clone(),
            });
        }
        None => {
            return Err(AggregationError::FinalStepNotCompleted {
                id: final_id.to_string(),
                reason: "no result recorded".to_string(),
            });
        }
    };

    substitute(template, plan, report)
}

/// [`aggregate`], falling back to plain concatenation on error
pub fn aggregate_or_fallback(plan: &Plan, report: &ExecutionReport) -> String {
    aggregate(plan, report).unwrap_or_else(|e| {
        warn!(error = %e, "Aggregation failed, falling back to concatenated results");
        concatenate(plan, report)
    })
}

/// Replace `#<id>` with the recorded value of plan step `<id>`
///
/// Tokens that name no plan step are left as written.
pub fn substitute(template: &str, plan: &Plan, report: &ExecutionReport) -> Result<String, AggregationError> {
    let mut unresolved = None;
    let text = PLACEHOLDER_RE.replace_all(template, |caps: &Captures<'_>| {
        let id = &caps[1];
        if !plan.contains(id) {
            return caps[0].to_string();
        }
        match report.get(id) {
            Some(result) => result.value.clone(),
            None => {
                unresolved.get_or_insert_with(|| id.to_string());
                caps[0].to_string()
            }
        }
    });

    match unresolved {
        Some(id) => {
            debug!(%id, "substitute: unresolved placeholder");
            Err(AggregationError::UnresolvedPlaceholder { id })
        }
        None => Ok(text.into_owned()),
    }
}

/// `"<id>: <value>"` per successful tool step, in step-id order
pub fn concatenate(plan: &Plan, report: &ExecutionReport) -> String {
    report
        .iter()
        .filter(|r| r.status == StepStatus::Succeeded)
        .filter(|r| plan.get(&r.step_id).is_some_and(|s| !s.is_final()))
        .map(|r| format!("{}: {}", r.step_id, r.value))
        .collect::<Vec<_>>()
        .join("\n")
}
