//! CLI command definitions and subcommands

use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use eyre::{Context, Result};
use tracing::debug;

use crate::compiler::TaskMode;

/// LLMCompiler - plan tool calls with a model, run them as a DAG
#[derive(Parser)]
#[command(
    name = "lc",
    about = "Plan tool calls with an LLM and execute them in parallel",
    version = env!("CARGO_PKG_VERSION"),
    after_help = after_help(),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Answer a question: plan with the model, execute, synthesize
    Run {
        /// Kind of task
        #[arg(short, long, value_enum, default_value_t = TaskMode::Ask)]
        mode: TaskMode,

        /// Also print the execution metadata as JSON
        #[arg(long)]
        metadata: bool,

        /// The question
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },

    /// Execute a plan from a file (or `-` for stdin) without the model
    Exec {
        /// Plan file containing a JSON array of steps
        plan_file: PathBuf,

        /// Drop malformed steps instead of rejecting the plan
        #[arg(long)]
        partial: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parse and validate a plan without running it
    Validate {
        /// Plan file containing a JSON array of steps
        plan_file: PathBuf,

        /// Drop malformed steps instead of rejecting the plan
        #[arg(long)]
        partial: bool,
    },

    /// List available tools
    Tools,
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("llmcompiler")
        .join("logs")
        .join("llmcompiler.log")
}

fn after_help() -> String {
    format!("Logs are written to: {}", get_log_path().display())
}

/// Read plan text from a file, or stdin when the path is `-`
pub fn read_plan_source(path: &Path) -> Result<String> {
    debug!(?path, "read_plan_source: called");
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read plan from stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read plan file {}", path.display()))
}
