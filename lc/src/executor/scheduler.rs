//! PlanExecutor - dependency rounds dispatched onto a bounded worker pool

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use serde_json::{Map, Value};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::state::{ExecutionReport, ExecutionState, StepResult, StepStatus};
use super::{ExecutorError, ToolInvoker};
use crate::plan::{StepKind, ValidatedPlan};
use crate::tools::ToolError;

/// Executor configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorConfig {
    /// Worker pool width; 0 is treated as 1
    pub max_workers: usize,

    /// Per-step limit on a tool invocation
    pub step_timeout: Option<Duration>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_workers: 10,
            step_timeout: Some(Duration::from_secs(120)),
        }
    }
}

/// Drives a validated plan to completion
pub struct PlanExecutor {
    invoker: Arc<dyn ToolInvoker>,
    config: ExecutorConfig,
}

impl PlanExecutor {
    pub fn new(invoker: Arc<dyn ToolInvoker>, config: ExecutorConfig) -> Self {
        debug!(?config, "PlanExecutor::new: called");
        Self { invoker, config }
    }

    /// Execute every step, producing exactly one result per step
    ///
    /// Ready steps of a round run concurrently; the next round is computed only
    /// after the whole round has been recorded. A step with a failed or skipped
    /// dependency is recorded as skipped without running.
    pub async fn execute(&self, plan: &ValidatedPlan) -> Result<ExecutionReport, ExecutorError> {
        let plan = plan.plan();
        let width = self.config.max_workers.max(1);
        info!(steps = plan.len(), max_workers = width, "Executing plan");

        let semaphore = Arc::new(Semaphore::new(width));
        let mut state = ExecutionState::new();
        let mut round = 0usize;

        while state.completed_count() < plan.len() {
            let ready = state.ready_steps(plan);
            if ready.is_empty() {
                let remaining: Vec<String> = plan
                    .steps()
                    .iter()
                    .filter(|s| !state.is_recorded(&s.id))
                    .map(|s| s.id.clone())
                    .collect();
                error!(?remaining, "Scheduler stalled with unreachable steps");
                return Err(ExecutorError::Stalled { remaining });
            }

            round += 1;
            debug!(round, ready = ?ready.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(), "execute: dispatching round");

            let mut tasks = JoinSet::new();
            let mut task_steps: HashMap<tokio::task::Id, String> = HashMap::new();

            for step in ready {
                let blocked = state.unsuccessful_dependencies(step);
                if !blocked.is_empty() {
                    info!(step_id = %step.id, ?blocked, "Skipping step with failed dependencies");
                    state.record(StepResult::skipped(&step.id, &blocked, round));
                    continue;
                }

                match &step.kind {
                    StepKind::FinalAnswer { answer } => {
                        debug!(step_id = %step.id, "execute: recording final answer template");
                        state.record(StepResult::succeeded(&step.id, answer.clone(), Duration::ZERO, round));
                    }
                    StepKind::ToolCall { tool: None, .. } => {
                        warn!(step_id = %step.id, "Step names no tool");
                        state.record(StepResult::failed(
                            &step.id,
                            format!("No tool specified in step {}", step.id),
                            Duration::ZERO,
                            round,
                        ));
                    }
                    StepKind::ToolCall { tool: Some(tool), args } => {
                        state.mark_in_flight(&step.id);
                        let handle = tasks.spawn(run_step(
                            Arc::clone(&self.invoker),
                            Arc::clone(&semaphore),
                            StepCall {
                                step_id: step.id.clone(),
                                tool: tool.clone(),
                                args: args.clone(),
                            },
                            self.config.step_timeout,
                            round,
                        ));
                        task_steps.insert(handle.id(), step.id.clone());
                    }
                }
            }

            // Round barrier: drain everything dispatched this round
            while let Some(joined) = tasks.join_next_with_id().await {
                match joined {
                    Ok((_, result)) => {
                        state.record(result);
                    }
                    Err(e) => {
                        let step_id = task_steps.get(&e.id()).cloned().unwrap_or_default();
                        error!(%step_id, error = %e, "Step task did not complete");
                        state.record(StepResult::failed(
                            step_id,
                            format!("step task did not complete: {}", e),
                            Duration::ZERO,
                            round,
                        ));
                    }
                }
            }
            debug!(round, recorded = state.completed_count(), "execute: round complete");
        }

        let report = state.into_report(round);
        info!(
            rounds = report.rounds,
            succeeded = report.count(StepStatus::Succeeded),
            failed = report.count(StepStatus::Failed),
            skipped = report.count(StepStatus::Skipped),
            "Plan execution complete"
        );
        Ok(report)
    }
}

struct StepCall {
    step_id: String,
    tool: String,
    args: Map<String, Value>,
}

/// One tool invocation on a pool slot; panics and timeouts become errors
async fn run_step(
    invoker: Arc<dyn ToolInvoker>,
    semaphore: Arc<Semaphore>,
    call: StepCall,
    timeout: Option<Duration>,
    round: usize,
) -> StepResult {
    let StepCall { step_id, tool, args } = call;
    let _permit = match semaphore.acquire_owned().await {
        Ok(permit) => permit,
        Err(e) => return StepResult::failed(step_id, format!("worker pool closed: {}", e), Duration::ZERO, round),
    };

    debug!(%step_id, %tool, "run_step: invoking tool");
    let started = Instant::now();
    let invocation = AssertUnwindSafe(invoker.invoke(&tool, &args)).catch_unwind();
    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, invocation).await {
            Ok(caught) => caught,
            Err(_) => Ok(Err(ToolError::Timeout {
                timeout_ms: limit.as_millis() as u64,
            })),
        },
        None => invocation.await,
    };
    let outcome = outcome.unwrap_or_else(|panic| Err(ToolError::Panicked(panic_message(panic.as_ref()))));
    let duration = started.elapsed();

    match outcome {
        Ok(value) => {
            debug!(%step_id, elapsed_ms = duration.as_millis() as u64, "run_step: succeeded");
            StepResult::succeeded(step_id, value, duration, round)
        }
        Err(e) => {
            warn!(%step_id, %tool, error = %e, "Step failed");
            StepResult::failed(step_id, e.to_string(), duration, round)
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
