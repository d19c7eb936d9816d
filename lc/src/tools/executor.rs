//! ToolExecutor - the registry plan steps invoke tools through

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::executor::ToolInvoker;

use super::builtin::{EchoTool, HttpGetTool, ReadFileTool, ShellTool, WriteFileTool};
use super::{Tool, ToolContext, ToolError};

/// Name-indexed set of tools sharing one context
pub struct ToolExecutor {
    tools: HashMap<String, Box<dyn Tool>>,
    ctx: ToolContext,
}

impl ToolExecutor {
    /// Create executor with the built-in tools
    pub fn standard(ctx: ToolContext) -> Self {
        debug!(?ctx, "ToolExecutor::standard: called");
        let mut executor = Self::empty(ctx);
        executor.add_tool(Box::new(ReadFileTool));
        executor.add_tool(Box::new(WriteFileTool));
        executor.add_tool(Box::new(ShellTool));
        executor.add_tool(Box::new(EchoTool));
        executor.add_tool(Box::new(HttpGetTool));
        executor
    }

    /// Create an executor with no tools
    pub fn empty(ctx: ToolContext) -> Self {
        Self {
            tools: HashMap::new(),
            ctx,
        }
    }

    /// Add a tool, replacing any tool with the same name
    pub fn add_tool(&mut self, tool: Box<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn context(&self) -> &ToolContext {
        &self.ctx
    }

    /// Check if a tool exists
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Tool names, sorted
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn description(&self, name: &str) -> Option<&str> {
        self.tools.get(name).map(|tool| tool.description())
    }

    /// One line per tool, for embedding in prompts
    ///
    /// ` - read_file: Read a local file with size limit | args: {"path_str": "..."}`
    pub fn specs(&self) -> String {
        self.tool_names()
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| {
                let args: Map<String, Value> = tool.input_schema()["properties"]
                    .as_object()
                    .map(|props| {
                        props
                            .iter()
                            .map(|(k, v)| (k.clone(), v["description"].clone()))
                            .collect()
                    })
                    .unwrap_or_default();
                format!(" - {}: {} | args: {}", tool.name(), tool.description(), Value::Object(args))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Run a tool by name
    pub async fn invoke(&self, name: &str, args: &Map<String, Value>) -> Result<String, ToolError> {
        debug!(%name, run_id = %self.ctx.run_id, "ToolExecutor::invoke: called");
        let tool = self.tools.get(name).ok_or_else(|| {
            warn!(%name, "Unknown tool requested");
            ToolError::UnknownTool {
                name: name.to_string(),
                available: self.tool_names(),
            }
        })?;

        // Reject argument sets that share no key with the schema
        let schema = tool.input_schema();
        if let Some(props) = schema["properties"].as_object()
            && !args.is_empty()
            && !args.keys().any(|k| props.contains_key(k))
        {
            let expected: Vec<&str> = props.keys().map(String::as_str).collect();
            debug!(%name, ?expected, "ToolExecutor::invoke: unknown arguments");
            return Err(ToolError::InvalidArgument(format!(
                "unknown arguments for tool {}; expected some of: {}",
                name,
                expected.join(", ")
            )));
        }

        let result = tool.execute(Value::Object(args.clone()), &self.ctx).await;
        if result.is_error {
            debug!(%name, "ToolExecutor::invoke: tool reported error");
            Err(ToolError::Failed(result.content))
        } else {
            Ok(result.content)
        }
    }
}

#[async_trait]
impl ToolInvoker for ToolExecutor {
    async fn invoke(&self, tool_name: &str, arguments: &Map<String, Value>) -> Result<String, ToolError> {
        ToolExecutor::invoke(self, tool_name, arguments).await
    }
}
