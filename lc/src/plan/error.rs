//! Plan parse and validation error types

use thiserror::Error;

/// Why a single plan element could not be decoded into a step
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepDecodeError {
    #[error("step is not a JSON object")]
    NotAnObject,

    #[error("step has no id")]
    MissingId,

    #[error("step id must be a non-empty string or number")]
    InvalidId,

    #[error("step {id}: 'tool' must be a string")]
    InvalidTool { id: String },

    #[error("step {id}: final step needs a string 'answer' field")]
    MissingAnswer { id: String },

    #[error("step {id}: 'args' must be an object")]
    InvalidArgs { id: String },

    #[error("step {id}: 'dependencies' must be an array of step ids")]
    InvalidDependencies { id: String },
}

/// Errors from extracting a plan out of model text
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("No plan found in model output")]
    NoPlanFound,

    #[error("Plan step {index} rejected: {source}")]
    InvalidStep {
        index: usize,
        #[source]
        source: StepDecodeError,
    },
}

/// Errors from checking that a plan is a well-formed DAG
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Plan contains no steps")]
    EmptyPlan,

    #[error("Duplicate step ids: {}", .ids.join(", "))]
    DuplicateStepId { ids: Vec<String> },

    #[error("Steps [{}] depend on unknown steps [{}]", .step_ids.join(", "), .missing.join(", "))]
    MissingDependency { step_ids: Vec<String>, missing: Vec<String> },

    #[error("Dependency cycle detected: {}", render_cycle(.cycle))]
    CycleDetected { cycle: Vec<String> },

    #[error("Plan has more than one final step: {}", .ids.join(", "))]
    MultipleFinalSteps { ids: Vec<String> },
}

impl ValidationError {
    /// Short machine-friendly name of the failed check
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::EmptyPlan => "empty_plan",
            ValidationError::DuplicateStepId { .. } => "duplicate_step_id",
            ValidationError::MissingDependency { .. } => "missing_dependency",
            ValidationError::CycleDetected { .. } => "cycle_detected",
            ValidationError::MultipleFinalSteps { .. } => "multiple_final_steps",
        }
    }

    /// Human-readable explanation
    pub fn reason(&self) -> String {
        self.to_string()
    }

    /// Ids of the steps that caused the failure
    pub fn offending_step_ids(&self) -> &[String] {
        match self {
            ValidationError::EmptyPlan => &[],
            ValidationError::DuplicateStepId { ids } => ids,
            ValidationError::MissingDependency { step_ids, .. } => step_ids,
            ValidationError::CycleDetected { cycle } => cycle,
            ValidationError::MultipleFinalSteps { ids } => ids,
        }
    }
}

fn render_cycle(cycle: &[String]) -> String {
    match cycle.first() {
        Some(first) => format!("{} -> {}", cycle.join(" -> "), first),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_closes_the_loop() {
        let err = ValidationError::CycleDetected {
            cycle: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(err.to_string(), "Dependency cycle detected: a -> b -> a");
        assert_eq!(err.kind(), "cycle_detected");
    }

    #[test]
    fn test_missing_dependency_offenders() {
        let err = ValidationError::MissingDependency {
            step_ids: vec!["s1".to_string()],
            missing: vec!["missing_id".to_string()],
        };
        assert_eq!(err.offending_step_ids(), &["s1".to_string()]);
        assert!(err.reason().contains("missing_id"));
    }

    #[test]
    fn test_invalid_step_message() {
        let err = ParseError::InvalidStep {
            index: 2,
            source: StepDecodeError::InvalidTool { id: "x".to_string() },
        };
        let msg = err.to_string();
        assert!(msg.contains("step 2"));
        assert!(msg.contains("'tool'"));
    }
}
