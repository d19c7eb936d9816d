//! Per-execution state and step results

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::time::Duration;

use serde::{Serialize, Serializer};
use tracing::{debug, warn};

use crate::plan::{Plan, Step};

/// Terminal status of a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StepStatus {
    #[serde(rename = "success")]
    Succeeded,
    #[serde(rename = "error")]
    Failed,
    #[serde(rename = "skipped")]
    Skipped,
}

impl StepStatus {
    pub fn is_success(self) -> bool {
        self == StepStatus::Succeeded
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepStatus::Succeeded => "success",
            StepStatus::Failed => "error",
            StepStatus::Skipped => "skipped",
        };
        write!(f, "{}", s)
    }
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

/// Outcome of one step; immutable once recorded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepResult {
    pub step_id: String,
    pub status: StepStatus,
    /// Tool output, error description, or skip reason
    pub value: String,
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
    /// 1-based round the step was recorded in
    pub round: usize,
}

impl StepResult {
    pub fn succeeded(step_id: impl Into<String>, value: impl Into<String>, duration: Duration, round: usize) -> Self {
        Self {
            step_id: step_id.into(),
            status: StepStatus::Succeeded,
            value: value.into(),
            duration,
            round,
        }
    }

    pub fn failed(step_id: impl Into<String>, error: impl Into<String>, duration: Duration, round: usize) -> Self {
        Self {
            step_id: step_id.into(),
            status: StepStatus::Failed,
            value: error.into(),
            duration,
            round,
        }
    }

    /// A step that never ran because these dependencies did not succeed
    pub fn skipped(step_id: impl Into<String>, failed_dependencies: &[&str], round: usize) -> Self {
        Self {
            step_id: step_id.into(),
            status: StepStatus::Skipped,
            value: format!("skipped: dependency failed: {}", failed_dependencies.join(", ")),
            duration: Duration::ZERO,
            round,
        }
    }
}

/// Results recorded so far and the steps currently running
///
/// Owned by a single plan execution; never shared between executions.
#[derive(Debug, Default)]
pub struct ExecutionState {
    completed: HashMap<String, StepResult>,
    in_flight: HashSet<String>,
}

impl ExecutionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_recorded(&self, step_id: &str) -> bool {
        self.completed.contains_key(step_id)
    }

    pub fn result(&self, step_id: &str) -> Option<&StepResult> {
        self.completed.get(step_id)
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    pub fn in_flight(&self) -> &HashSet<String> {
        &self.in_flight
    }

    pub fn mark_in_flight(&mut self, step_id: &str) {
        debug!(%step_id, "ExecutionState::mark_in_flight: called");
        self.in_flight.insert(step_id.to_string());
    }

    /// Record a result; the first result for a step wins
    pub fn record(&mut self, result: StepResult) -> bool {
        debug!(step_id = %result.step_id, status = %result.status, "ExecutionState::record: called");
        self.in_flight.remove(&result.step_id);
        if self.completed.contains_key(&result.step_id) {
            warn!(step_id = %result.step_id, "Ignoring second result for step");
            return false;
        }
        self.completed.insert(result.step_id.clone(), result);
        true
    }

    /// Pending steps whose dependencies all have recorded results
    pub fn ready_steps<'a>(&self, plan: &'a Plan) -> Vec<&'a Step> {
        plan.steps()
            .iter()
            .filter(|s| !self.is_recorded(&s.id) && !self.in_flight.contains(&s.id))
            .filter(|s| s.dependencies.iter().all(|d| self.is_recorded(d)))
            .collect()
    }

    /// Dependencies of `step` that were recorded as anything but success
    pub fn unsuccessful_dependencies<'a>(&self, step: &'a Step) -> Vec<&'a str> {
        step.dependencies
            .iter()
            .filter(|d| self.completed.get(d.as_str()).is_some_and(|r| !r.status.is_success()))
            .map(String::as_str)
            .collect()
    }

    pub fn into_report(self, rounds: usize) -> ExecutionReport {
        ExecutionReport {
            results: self.completed.into_iter().collect(),
            rounds,
        }
    }
}

/// Completed mapping from step id to result, ordered by step id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionReport {
    pub results: BTreeMap<String, StepResult>,
    pub rounds: usize,
}

impl ExecutionReport {
    pub fn get(&self, step_id: &str) -> Option<&StepResult> {
        self.results.get(step_id)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StepResult> {
        self.results.values()
    }

    pub fn count(&self, status: StepStatus) -> usize {
        self.iter().filter(|r| r.status == status).count()
    }

    /// Whether every step succeeded
    pub fn all_succeeded(&self) -> bool {
        self.iter().all(|r| r.status.is_success())
    }
}
