//! lc - LLMCompiler command-line entry point

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info};

use llmcompiler::aggregate::aggregate_or_fallback;
use llmcompiler::cli::{Cli, Command, read_plan_source};
use llmcompiler::compiler::{CompilerError, LlmCompiler, TaskMode, new_run_id};
use llmcompiler::config::Config;
use llmcompiler::executor::{ExecutionReport, PlanExecutor, StepStatus};
use llmcompiler::llm::create_client;
use llmcompiler::plan::{ParsePolicy, ValidatedPlan, parse_plan, validate};
use llmcompiler::prompts::PromptLoader;
use llmcompiler::tools::ToolExecutor;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Can't log here yet; logging isn't initialized
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("llmcompiler")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > INFO
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("llmcompiler.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(model = %config.llm.model, "LLMCompiler loaded config");

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Run {
            mode,
            metadata,
            question,
        } => {
            debug!(%mode, metadata, "main: matched Run command");
            cmd_run(&config, mode, metadata, &question.join(" ")).await
        }
        Command::Exec {
            plan_file,
            partial,
            json,
        } => {
            debug!(?plan_file, partial, json, "main: matched Exec command");
            cmd_exec(&config, &plan_file, partial, json).await
        }
        Command::Validate { plan_file, partial } => {
            debug!(?plan_file, partial, "main: matched Validate command");
            cmd_validate(&config, &plan_file, partial)
        }
        Command::Tools => {
            debug!("main: matched Tools command");
            cmd_tools(&config)
        }
    }
}

fn parse_policy(config: &Config, partial: bool) -> ParsePolicy {
    if partial {
        ParsePolicy::Partial
    } else {
        config.executor.parse_policy()
    }
}

/// Parse and validate a plan file, reporting dropped steps
fn load_plan(config: &Config, plan_file: &Path, partial: bool) -> Result<ValidatedPlan> {
    let text = read_plan_source(plan_file)?;
    let parsed = parse_plan(&text, parse_policy(config, partial)).context("Failed to parse plan")?;
    for rejected in &parsed.rejected {
        eprintln!(
            "{} step {} dropped: {}",
            "warning:".yellow().bold(),
            rejected.index,
            rejected.reason
        );
    }
    validate(parsed.plan).context("Plan validation failed")
}

/// Run the full agent on a question
async fn cmd_run(config: &Config, mode: TaskMode, show_metadata: bool, question: &str) -> Result<()> {
    debug!(%mode, "cmd_run: called");
    config.validate()?;

    let run_id = new_run_id();
    let ctx = config.tools.context(&run_id)?;
    let prompts = PromptLoader::new(&ctx.workdir);
    let tools = Arc::new(ToolExecutor::standard(ctx));
    let llm = create_client(&config.llm).context("Failed to create LLM client")?;

    let compiler = LlmCompiler::new(llm, tools)
        .with_prompts(prompts)
        .with_executor_config(config.executor.executor_config())
        .with_parse_policy(config.executor.parse_policy())
        .with_max_tokens(config.llm.max_tokens);

    let outcome = match compiler.run(question, mode).await {
        Ok(outcome) => outcome,
        Err(CompilerError::InvalidPlan { error, plan }) => {
            eprintln!("{} {}", "Invalid plan:".red().bold(), error);
            eprintln!("{}", serde_json::to_string_pretty(&plan)?);
            return Err(error).context("The model produced an invalid plan");
        }
        Err(e) => return Err(e).context("Compiler run failed"),
    };

    println!("{}", outcome.answer);
    if show_metadata {
        println!();
        println!("{}", serde_json::to_string_pretty(&outcome.metadata)?);
    }
    Ok(())
}

/// Execute a plan file without the model
async fn cmd_exec(config: &Config, plan_file: &Path, partial: bool, json: bool) -> Result<()> {
    debug!(?plan_file, "cmd_exec: called");
    let plan = load_plan(config, plan_file, partial)?;

    let run_id = new_run_id();
    let tools = Arc::new(ToolExecutor::standard(config.tools.context(&run_id)?));
    let executor = PlanExecutor::new(tools, config.executor.executor_config());
    let report = executor.execute(&plan).await.context("Plan execution failed")?;
    let payload = aggregate_or_fallback(&plan, &report);

    if json {
        let output = serde_json::json!({
            "run_id": run_id,
            "rounds": report.rounds,
            "results": report.results,
            "answer": payload,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_report(&report);
        println!();
        println!("{}", payload);
    }
    Ok(())
}

fn print_report(report: &ExecutionReport) {
    println!("{} ({} rounds)", "Step results".bold(), report.rounds);
    for result in report.iter() {
        let status = match result.status {
            StepStatus::Succeeded => result.status.to_string().green(),
            StepStatus::Failed => result.status.to_string().red(),
            StepStatus::Skipped => result.status.to_string().yellow(),
        };
        let first_line = result.value.lines().next().unwrap_or("");
        println!(
            "  {:<12} {:<8} round {} {:>6}ms  {}",
            result.step_id.cyan(),
            status,
            result.round,
            result.duration.as_millis(),
            first_line
        );
    }
}

/// Validate a plan file without running it
fn cmd_validate(config: &Config, plan_file: &Path, partial: bool) -> Result<()> {
    debug!(?plan_file, "cmd_validate: called");
    let plan = load_plan(config, plan_file, partial)?;

    println!("{} Plan is valid ({} steps)", "✓".green().bold(), plan.len());
    for step in plan.steps() {
        let deps: Vec<&str> = step.dependencies.iter().map(String::as_str).collect();
        let deps = if deps.is_empty() {
            "-".to_string()
        } else {
            deps.join(", ")
        };
        println!("  {:<12} {:<12} after: {}", step.id.cyan(), step.label(), deps);
    }
    Ok(())
}

/// List available tools
fn cmd_tools(config: &Config) -> Result<()> {
    debug!("cmd_tools: called");
    let tools = ToolExecutor::standard(config.tools.context(&new_run_id())?);
    println!("{}", "Available tools:".bold());
    for name in tools.tool_names() {
        println!("  {:<12} {}", name.green(), tools.description(&name).unwrap_or(""));
    }
    Ok(())
}
