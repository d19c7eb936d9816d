//! LlmCompiler - plan with the model, run the plan as a DAG, synthesize
//!
//! One call to [`LlmCompiler::run`]:
//! 1. asks the model for a plan,
//! 2. parses and validates it (no tool runs for an invalid plan),
//! 3. executes it round by round,
//! 4. aggregates step results and asks the model for the final answer.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::aggregate::aggregate_or_fallback;
use crate::executor::{ExecutionReport, ExecutorConfig, ExecutorError, PlanExecutor, StepResult, StepStatus};
use crate::llm::{CompletionRequest, LlmClient, LlmError, StopReason, TokenUsage};
use crate::plan::{ParseError, ParsePolicy, Plan, ValidatedPlan, ValidationError, parse_plan, validate};
use crate::prompts::{PromptLoader, ResultLine};
use crate::tools::ToolExecutor;

pub use crate::prompts::TaskMode;

/// Step values longer than this are cut before synthesis
const SYNTHESIS_VALUE_CHARS: usize = 500;

/// Errors that end a compiler run
#[derive(Debug, Error)]
pub enum CompilerError {
    #[error("LLM request failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Malformed plan: {0}")]
    MalformedPlan(ParseError),

    #[error("Invalid plan: {error}")]
    InvalidPlan {
        #[source]
        error: ValidationError,
        plan: Plan,
    },

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error("Prompt error: {0}")]
    Prompt(String),
}

/// The execution-metadata object handed to reflection-style consumers
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionMetadata {
    pub plan: Plan,
    pub execution_results: BTreeMap<String, StepResult>,
    pub plan_valid: bool,
    pub rounds: usize,
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    /// Tokens spent on planning and synthesis
    pub token_usage: TokenUsage,
}

/// Answer plus how it was produced
#[derive(Debug, Clone, Serialize)]
pub struct CompilerOutcome {
    pub answer: String,
    pub metadata: ExecutionMetadata,
}

/// Fresh time-ordered run id
pub fn new_run_id() -> String {
    Uuid::now_v7().to_string()
}

/// The LLMCompiler agent
pub struct LlmCompiler {
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolExecutor>,
    prompts: PromptLoader,
    executor_config: ExecutorConfig,
    parse_policy: ParsePolicy,
    max_tokens: u32,
}

impl LlmCompiler {
    pub fn new(llm: Arc<dyn LlmClient>, tools: Arc<ToolExecutor>) -> Self {
        debug!(tools = ?tools.tool_names(), "LlmCompiler::new: called");
        Self {
            llm,
            tools,
            prompts: PromptLoader::embedded_only(),
            executor_config: ExecutorConfig::default(),
            parse_policy: ParsePolicy::Strict,
            max_tokens: 4096,
        }
    }

    pub fn with_prompts(mut self, prompts: PromptLoader) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_executor_config(mut self, config: ExecutorConfig) -> Self {
        self.executor_config = config;
        self
    }

    pub fn with_parse_policy(mut self, policy: ParsePolicy) -> Self {
        self.parse_policy = policy;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Answer a question by planning and executing tool calls
    pub async fn run(&self, question: &str, mode: TaskMode) -> Result<CompilerOutcome, CompilerError> {
        let run_id = self.tools.context().run_id.clone();
        let started_at = Utc::now();
        info!(%run_id, %mode, "Planning");

        let system_prompt = self
            .prompts
            .compiler_prompt(mode, &self.tools.specs())
            .map_err(|e| CompilerError::Prompt(e.to_string()))?;
        let response = self
            .llm
            .complete(CompletionRequest::single(system_prompt.clone(), question, self.max_tokens))
            .await?;
        let raw = response.text_or_empty().to_string();
        let mut usage = response.usage;
        debug!(
            response_len = raw.len(),
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "LlmCompiler::run: planner responded"
        );
        if response.stop_reason != StopReason::EndTurn {
            warn!(stop_reason = ?response.stop_reason, "Planner output was cut short");
        }

        let parsed = match parse_plan(&raw, self.parse_policy) {
            Ok(parsed) => parsed,
            Err(ParseError::NoPlanFound) => {
                info!("No plan in model output, using it as the answer");
                return Ok(CompilerOutcome {
                    answer: raw,
                    metadata: ExecutionMetadata {
                        plan: Plan::default(),
                        execution_results: BTreeMap::new(),
                        plan_valid: false,
                        rounds: 0,
                        run_id,
                        started_at,
                        token_usage: usage,
                    },
                });
            }
            Err(e) => {
                warn!(error = %e, "Planner output could not be decoded");
                return Err(CompilerError::MalformedPlan(e));
            }
        };
        for rejected in &parsed.rejected {
            warn!(index = rejected.index, reason = %rejected.reason, "Plan step dropped");
        }

        let plan = match validate(parsed.plan.clone()) {
            Ok(plan) => plan,
            Err(error) => {
                warn!(kind = error.kind(), reason = %error, "Plan failed validation");
                return Err(CompilerError::InvalidPlan {
                    error,
                    plan: parsed.plan,
                });
            }
        };

        info!(%run_id, steps = plan.len(), "Executing plan");
        let executor = PlanExecutor::new(self.tools.clone(), self.executor_config.clone());
        let report = executor.execute(&plan).await?;

        let payload = aggregate_or_fallback(&plan, &report);
        let answer = self
            .synthesize(question, &system_prompt, &plan, &report, payload, &mut usage)
            .await;

        Ok(CompilerOutcome {
            answer,
            metadata: ExecutionMetadata {
                plan: plan.into_inner(),
                execution_results: report.results,
                plan_valid: true,
                rounds: report.rounds,
                run_id,
                started_at,
                token_usage: usage,
            },
        })
    }

    /// Ask the model to fold tool results into the final answer
    ///
    /// Runs under the planner's system prompt. Without any executed tool step
    /// the payload is the answer. A failed synthesis call degrades to the
    /// payload followed by the results.
    async fn synthesize(
        &self,
        question: &str,
        system_prompt: &str,
        plan: &ValidatedPlan,
        report: &ExecutionReport,
        payload: String,
        usage: &mut TokenUsage,
    ) -> String {
        let lines = result_lines(plan, report);
        if lines.is_empty() {
            debug!("LlmCompiler::synthesize: no tool step ran, payload is the answer");
            return payload;
        }

        info!(results = lines.len(), "Synthesizing final answer");
        let fallback = || {
            let listing: Vec<String> = lines.iter().map(|l| format!("{}: {}", l.id, l.value)).collect();
            format!("{}\n\nTool Results:\n{}", payload, listing.join("\n"))
        };

        let prompt = match self.prompts.synthesis_prompt(question, &lines, &payload) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "Failed to render synthesis prompt");
                return fallback();
            }
        };

        let request = CompletionRequest::single(system_prompt, prompt, self.max_tokens);
        let response = self.llm.complete(request).await.inspect(|r| *usage += r.usage);
        match response {
            Ok(response) if !response.text_or_empty().trim().is_empty() => {
                if response.stop_reason != StopReason::EndTurn {
                    warn!(stop_reason = ?response.stop_reason, "Synthesis output was cut short");
                }
                response.text_or_empty().to_string()
            }
            Ok(_) => {
                warn!("Synthesis returned no text");
                fallback()
            }
            Err(e) => {
                warn!(error = %e, "Failed to synthesize final answer");
                fallback()
            }
        }
    }
}

/// Results of tool steps that actually ran, values truncated
fn result_lines(plan: &Plan, report: &ExecutionReport) -> Vec<ResultLine> {
    plan.tool_steps()
        .filter_map(|step| report.get(&step.id))
        .filter(|r| r.status != StepStatus::Skipped)
        .map(|r| ResultLine {
            id: r.step_id.clone(),
            status: r.status.to_string(),
            value: truncate_chars(&r.value, SYNTHESIS_VALUE_CHARS),
        })
        .collect()
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::CompletionResponse;
    use crate::llm::client::mock::MockLlmClient;
    use crate::tools::ToolContext;
    use std::fs;
    use tempfile::tempdir;

    const PLAN: &str = r#"Here is the plan:
```json
[
    {"id": "r1", "tool": "read_file", "args": {"path_str": "a.txt"}, "dependencies": []},
    {"id": "r2", "tool": "read_file", "args": {"path_str": "b.txt"}, "dependencies": []},
    {"id": "final", "action": "final", "answer": "Compare #r1 and #r2", "dependencies": ["r1", "r2"]}
]
```"#;

    fn setup() -> (tempfile::TempDir, Arc<ToolExecutor>) {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.txt"), "alpha").unwrap();
        fs::write(temp.path().join("b.txt"), "beta").unwrap();
        let tools = Arc::new(ToolExecutor::standard(ToolContext::new(temp.path().to_path_buf(), "run-1")));
        (temp, tools)
    }

    #[tokio::test]
    async fn test_full_run_synthesizes() {
        let (_temp, tools) = setup();
        let llm = Arc::new(MockLlmClient::new(vec![
            CompletionResponse::text(PLAN),
            CompletionResponse::text("alpha and beta differ"),
        ]));
        let compiler = LlmCompiler::new(llm.clone(), tools);

        let outcome = compiler.run("How do a.txt and b.txt differ?", TaskMode::Ask).await.unwrap();

        assert_eq!(outcome.answer, "alpha and beta differ");
        assert!(outcome.metadata.plan_valid);
        assert_eq!(outcome.metadata.rounds, 2);
        assert_eq!(outcome.metadata.run_id, "run-1");
        assert_eq!(outcome.metadata.execution_results["r1"].value, "alpha");

        let requests = llm.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].system_prompt.contains("read_file"));
        assert_eq!(requests[1].system_prompt, requests[0].system_prompt);
        let synthesis = &requests[1].messages[0].content;
        assert!(synthesis.contains("Initial Answer: Compare alpha and beta"));
        assert!(synthesis.contains("r2 [success]: beta"));
    }

    #[tokio::test]
    async fn test_token_usage_sums_both_calls() {
        let (_temp, tools) = setup();
        let planned = CompletionResponse {
            usage: TokenUsage {
                input_tokens: 100,
                output_tokens: 40,
            },
            ..CompletionResponse::text(PLAN)
        };
        let synthesized = CompletionResponse {
            stop_reason: StopReason::MaxTokens,
            usage: TokenUsage {
                input_tokens: 200,
                output_tokens: 7,
            },
            ..CompletionResponse::text("alpha and be")
        };
        let llm = Arc::new(MockLlmClient::new(vec![planned, synthesized]));
        let compiler = LlmCompiler::new(llm, tools);

        let outcome = compiler.run("diff?", TaskMode::Ask).await.unwrap();

        assert_eq!(outcome.answer, "alpha and be");
        assert_eq!(
            outcome.metadata.token_usage,
            TokenUsage {
                input_tokens: 300,
                output_tokens: 47,
            }
        );
    }

    #[tokio::test]
    async fn test_no_plan_returns_raw_text() {
        let (_temp, tools) = setup();
        let llm = Arc::new(MockLlmClient::new(vec![CompletionResponse::text("Just 42.")]));
        let compiler = LlmCompiler::new(llm.clone(), tools);

        let outcome = compiler.run("What is 6*7?", TaskMode::Ask).await.unwrap();

        assert_eq!(outcome.answer, "Just 42.");
        assert!(!outcome.metadata.plan_valid);
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_plan_runs_no_tools() {
        let temp = tempdir().unwrap();
        let tools = Arc::new(ToolExecutor::standard(ToolContext::new(temp.path().to_path_buf(), "run")));
        let plan = r#"[
            {"id": "w", "tool": "write_file", "args": {"path_str": "out.txt", "content": "x"}, "dependencies": []},
            {"id": "a", "tool": "echo", "args": {"text": "a"}, "dependencies": ["missing_id"]}
        ]"#;
        let llm = Arc::new(MockLlmClient::new(vec![CompletionResponse::text(plan)]));
        let compiler = LlmCompiler::new(llm, tools);

        match compiler.run("go", TaskMode::Ask).await {
            Err(CompilerError::InvalidPlan { error, plan }) => {
                assert_eq!(error.kind(), "missing_dependency");
                assert_eq!(plan.len(), 2);
            }
            other => panic!("expected InvalidPlan, got {:?}", other),
        }
        assert!(!temp.path().join("out.txt").exists());
    }

    #[tokio::test]
    async fn test_synthesis_failure_falls_back() {
        let (_temp, tools) = setup();
        let llm = Arc::new(MockLlmClient::scripted(vec![
            Ok(CompletionResponse::text(PLAN)),
            Err("synthesis down".to_string()),
        ]));
        let compiler = LlmCompiler::new(llm, tools);

        let outcome = compiler.run("diff?", TaskMode::Ask).await.unwrap();
        assert!(outcome.answer.starts_with("Compare alpha and beta"));
        assert!(outcome.answer.contains("Tool Results:\nr1: alpha\nr2: beta"));
    }

    #[tokio::test]
    async fn test_final_only_plan_skips_synthesis() {
        let (_temp, tools) = setup();
        let plan = r#"[{"id": "final", "action": "final", "answer": "Nothing to run", "dependencies": []}]"#;
        let llm = Arc::new(MockLlmClient::new(vec![CompletionResponse::text(plan)]));
        let compiler = LlmCompiler::new(llm.clone(), tools);

        let outcome = compiler.run("hi", TaskMode::Ask).await.unwrap();
        assert_eq!(outcome.answer, "Nothing to run");
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_planner_error_propagates() {
        let (_temp, tools) = setup();
        let llm = Arc::new(MockLlmClient::new(vec![]));
        let compiler = LlmCompiler::new(llm, tools);

        assert!(matches!(
            compiler.run("hi", TaskMode::Ask).await,
            Err(CompilerError::Llm(_))
        ));
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }

    #[test]
    fn test_run_id_is_uuid_v7() {
        let id = Uuid::parse_str(&new_run_id()).unwrap();
        assert_eq!(id.get_version_num(), 7);
    }
}
