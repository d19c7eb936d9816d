//! Prompt templates
//!
//! Templates are `.pmt` files rendered with Handlebars. A file in
//! `<workdir>/.llmcompiler/prompts/{name}.pmt` overrides the embedded copy.

use std::fmt;
use std::path::{Path, PathBuf};

use eyre::{Result, eyre};
use handlebars::Handlebars;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Planner system prompt
pub const COMPILER: &str = include_str!("../../prompts/compiler.pmt");

/// Synthesis prompt
pub const SYNTHESIS: &str = include_str!("../../prompts/synthesis.pmt");

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    match name {
        "compiler" => Some(COMPILER),
        "synthesis" => Some(SYNTHESIS),
        _ => None,
    }
}

/// Kind of task, selecting the assistant role in the planner prompt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TaskMode {
    #[default]
    Ask,
    Explain,
    Debug,
    Fix,
    Generate,
}

impl TaskMode {
    pub fn role_prompt(self) -> &'static str {
        match self {
            TaskMode::Ask => {
                "You are a concise, reliable command-line assistant.\n\
                 - Put code in fenced blocks with the right language.\n\
                 - Keep explanations short and focus on the key steps.\n\
                 - State assumptions when unsure; never invent paths or files."
            }
            TaskMode::Explain => {
                "You explain code and concepts in short bullet points.\n\
                 - Give two to four key points, then the important caveats.\n\
                 - Quote lines or snippets from the input instead of guessing.\n\
                 - If information is missing, say what else you need."
            }
            TaskMode::Debug => {
                "You are a debugging assistant: locate the problem before proposing a patch.\n\
                 - List the likely bug sites, then give the corrected code.\n\
                 - Say what extra context you need if it is missing.\n\
                 - Prefer the smallest change that fixes the issue."
            }
            TaskMode::Fix => {
                "You are a code repair assistant: locate the problem before proposing a patch.\n\
                 - List the likely bug sites, then give the corrected code.\n\
                 - Say what extra context you need if it is missing.\n\
                 - Prefer minimal edits and keep the existing style."
            }
            TaskMode::Generate => {
                "You generate code, favoring minimal examples that run as-is.\n\
                 - Give complete functions or scripts in code blocks.\n\
                 - Briefly explain design trade-offs and complexity.\n\
                 - List external dependencies explicitly."
            }
        }
    }
}

impl fmt::Display for TaskMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskMode::Ask => "ask",
            TaskMode::Explain => "explain",
            TaskMode::Debug => "debug",
            TaskMode::Fix => "fix",
            TaskMode::Generate => "generate",
        };
        write!(f, "{}", s)
    }
}

/// Variables for the planner prompt
#[derive(Debug, Serialize)]
pub struct CompilerContext<'a> {
    pub role: &'a str,
    pub tools: &'a str,
}

/// One step's outcome as shown to the synthesis call
#[derive(Debug, Clone, Serialize)]
pub struct ResultLine {
    pub id: String,
    pub status: String,
    pub value: String,
}

/// Variables for the synthesis prompt
#[derive(Debug, Serialize)]
pub struct SynthesisContext<'a> {
    pub question: &'a str,
    pub results: &'a [ResultLine],
    pub payload: &'a str,
}

/// Loads and renders prompt templates
pub struct PromptLoader {
    hbs: Handlebars<'static>,
    /// User override directory (e.g., `.llmcompiler/prompts/`)
    user_dir: Option<PathBuf>,
}

impl PromptLoader {
    pub fn new(workdir: impl AsRef<Path>) -> Self {
        let user_dir = workdir.as_ref().join(".llmcompiler/prompts");
        debug!(?user_dir, exists = user_dir.exists(), "PromptLoader::new: called");
        Self {
            hbs: Self::engine(),
            user_dir: user_dir.exists().then_some(user_dir),
        }
    }

    /// A loader that only uses embedded prompts
    pub fn embedded_only() -> Self {
        Self {
            hbs: Self::engine(),
            user_dir: None,
        }
    }

    fn engine() -> Handlebars<'static> {
        let mut hbs = Handlebars::new();
        // Prompts are plain text; HTML escaping would mangle quotes in tool output
        hbs.register_escape_fn(handlebars::no_escape);
        hbs
    }

    fn load_template(&self, name: &str) -> Result<String> {
        if let Some(dir) = &self.user_dir {
            let path = dir.join(format!("{}.pmt", name));
            if path.exists() {
                debug!(?path, "PromptLoader::load_template: found user override");
                return std::fs::read_to_string(&path)
                    .map_err(|e| eyre!("Failed to read user prompt {}: {}", path.display(), e));
            }
        }
        get_embedded(name)
            .map(str::to_string)
            .ok_or_else(|| eyre!("Prompt template not found: {}", name))
    }

    /// Render a template with the given context
    pub fn render<T: Serialize>(&self, template_name: &str, context: &T) -> Result<String> {
        debug!(%template_name, "PromptLoader::render: called");
        let template = self.load_template(template_name)?;
        self.hbs
            .render_template(&template, context)
            .map_err(|e| eyre!("Failed to render template {}: {}", template_name, e))
    }

    pub fn compiler_prompt(&self, mode: TaskMode, tool_specs: &str) -> Result<String> {
        self.render(
            "compiler",
            &CompilerContext {
                role: mode.role_prompt(),
                tools: tool_specs,
            },
        )
    }

    pub fn synthesis_prompt(&self, question: &str, results: &[ResultLine], payload: &str) -> Result<String> {
        self.render(
            "synthesis",
            &SynthesisContext {
                question,
                results,
                payload,
            },
        )
    }
}
