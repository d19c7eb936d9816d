//! Plan and step types
//!
//! Steps reference each other only by id. The wire form is the JSON shape the
//! model is prompted to emit:
//!
//! - tool step: `{"id", "tool", "args", "dependencies"}`
//! - final step: `{"id", "action": "final", "answer", "dependencies"}`

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::error::StepDecodeError;

/// `action` value that marks a final-answer step
pub const FINAL_ACTION: &str = "final";

/// One unit of work in a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawStep", into = "RawStep")]
pub struct Step {
    /// Unique id within the plan
    pub id: String,

    /// What the step does
    pub kind: StepKind,

    /// Ids of steps that must finish before this one runs
    pub dependencies: BTreeSet<String>,
}

/// The two kinds of step a plan can contain
#[derive(Debug, Clone, PartialEq)]
pub enum StepKind {
    /// Invoke a registered tool; a step that names no tool fails when it runs
    ToolCall {
        tool: Option<String>,
        args: Map<String, Value>,
    },

    /// Assemble the answer; `answer` may reference other steps as `#id`
    FinalAnswer { answer: String },
}

impl Step {
    /// Create a tool-call step
    pub fn tool<I, S>(id: impl Into<String>, tool: impl Into<String>, args: Value, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args = match args {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            id: id.into(),
            kind: StepKind::ToolCall {
                tool: Some(tool.into()),
                args,
            },
            dependencies: dependencies.into_iter().map(Into::into).collect(),
        }
    }

    /// Create a final-answer step
    pub fn final_answer<I, S>(id: impl Into<String>, answer: impl Into<String>, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            kind: StepKind::FinalAnswer { answer: answer.into() },
            dependencies: dependencies.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self.kind, StepKind::FinalAnswer { .. })
    }

    pub fn tool_name(&self) -> Option<&str> {
        match &self.kind {
            StepKind::ToolCall { tool, .. } => tool.as_deref(),
            StepKind::FinalAnswer { .. } => None,
        }
    }

    pub fn arguments(&self) -> Option<&Map<String, Value>> {
        match &self.kind {
            StepKind::ToolCall { args, .. } => Some(args),
            StepKind::FinalAnswer { .. } => None,
        }
    }

    pub fn answer_template(&self) -> Option<&str> {
        match &self.kind {
            StepKind::FinalAnswer { answer } => Some(answer),
            StepKind::ToolCall { .. } => None,
        }
    }

    /// Short label for logs: tool name or "final"
    pub fn label(&self) -> &str {
        match &self.kind {
            StepKind::ToolCall { tool: Some(tool), .. } => tool,
            StepKind::ToolCall { tool: None, .. } => "(no tool)",
            StepKind::FinalAnswer { .. } => FINAL_ACTION,
        }
    }
}

/// Loosely-typed step as it appears on the wire
///
/// Every field is optional here so decoding can report exactly which one is
/// wrong. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    action: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    args: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    answer: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    dependencies: Option<Value>,
}

fn id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl TryFrom<RawStep> for Step {
    type Error = StepDecodeError;

    fn try_from(raw: RawStep) -> Result<Self, Self::Error> {
        let id = match &raw.id {
            None | Some(Value::Null) => return Err(StepDecodeError::MissingId),
            Some(value) => id_from_value(value).ok_or(StepDecodeError::InvalidId)?,
        };
        debug!(%id, "Step::try_from: decoding");

        let dependencies = match raw.dependencies {
            None | Some(Value::Null) => BTreeSet::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(id_from_value)
                .collect::<Option<BTreeSet<_>>>()
                .ok_or_else(|| StepDecodeError::InvalidDependencies { id: id.clone() })?,
            Some(_) => return Err(StepDecodeError::InvalidDependencies { id }),
        };

        let is_final = matches!(&raw.action, Some(Value::String(a)) if a == FINAL_ACTION);
        let kind = if is_final {
            match raw.answer {
                Some(Value::String(answer)) => StepKind::FinalAnswer { answer },
                _ => return Err(StepDecodeError::MissingAnswer { id }),
            }
        } else {
            // A missing tool is a step-level failure at run time, not a parse error
            let tool = match raw.tool {
                None | Some(Value::Null) => None,
                Some(Value::String(tool)) => Some(tool.trim().to_string()).filter(|t| !t.is_empty()),
                Some(_) => return Err(StepDecodeError::InvalidTool { id }),
            };
            let args = match raw.args {
                None | Some(Value::Null) => Map::new(),
                Some(Value::Object(map)) => map,
                Some(_) => return Err(StepDecodeError::InvalidArgs { id }),
            };
            StepKind::ToolCall { tool, args }
        };

        Ok(Self { id, kind, dependencies })
    }
}

impl From<Step> for RawStep {
    fn from(step: Step) -> Self {
        let dependencies = Some(Value::Array(step.dependencies.into_iter().map(Value::String).collect()));
        match step.kind {
            StepKind::ToolCall { tool, args } => RawStep {
                id: Some(Value::String(step.id)),
                tool: tool.map(Value::String),
                args: Some(Value::Object(args)),
                dependencies,
                ..Default::default()
            },
            StepKind::FinalAnswer { answer } => RawStep {
                id: Some(Value::String(step.id)),
                action: Some(Value::String(FINAL_ACTION.to_string())),
                answer: Some(Value::String(answer)),
                dependencies,
                ..Default::default()
            },
        }
    }
}

/// Decode one plan element into a step
pub(crate) fn decode_step(value: Value) -> Result<Step, StepDecodeError> {
    if !value.is_object() {
        return Err(StepDecodeError::NotAnObject);
    }
    let raw: RawStep = serde_json::from_value(value).map_err(|_| StepDecodeError::NotAnObject)?;
    Step::try_from(raw)
}

/// An ordered list of steps as authored by the model
///
/// Authoring order is kept for display and deterministic traversal only;
/// execution order comes from the dependency graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Plan {
    steps: Vec<Step>,
}

impl Plan {
    pub fn new(steps: Vec<Step>) -> Self {
        debug!(step_count = steps.len(), "Plan::new: called");
        Self { steps }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// First step with the given id
    pub fn get(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// The final-answer step, if the plan has one
    pub fn final_step(&self) -> Option<&Step> {
        self.steps.iter().find(|s| s.is_final())
    }

    pub fn tool_steps(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter().filter(|s| !s.is_final())
    }

    pub fn into_steps(self) -> Vec<Step> {
        self.steps
    }
}

impl From<Vec<Step>> for Plan {
    fn from(steps: Vec<Step>) -> Self {
        Self::new(steps)
    }
}
