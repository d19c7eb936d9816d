//! Plan extraction from free-form model output
//!
//! Models wrap plans in prose and code fences. The parser looks in fenced
//! blocks first, then anywhere in the text, and takes the first JSON value
//! that is a non-empty array of objects.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use super::error::ParseError;
use super::types::{Plan, decode_step};

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[A-Za-z0-9_-]*[ \t]*\r?\n?([\s\S]*?)```").expect("fence pattern is valid"));

/// What to do with plan elements that do not decode into steps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParsePolicy {
    /// Any bad step fails the whole parse
    #[default]
    Strict,
    /// Bad steps are dropped and reported
    Partial,
}

/// A step dropped under [`ParsePolicy::Partial`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedStep {
    pub index: usize,
    pub reason: String,
}

/// Parser output: the plan plus anything that was dropped
#[derive(Debug, Clone, Default)]
pub struct ParsedPlan {
    pub plan: Plan,
    pub rejected: Vec<RejectedStep>,
}

/// Extract and decode a plan from raw model text
pub fn parse_plan(text: &str, policy: ParsePolicy) -> Result<ParsedPlan, ParseError> {
    debug!(text_len = text.len(), ?policy, "parse_plan: called");
    let items = extract_plan_array(text).ok_or_else(|| {
        debug!("parse_plan: no array of objects found");
        ParseError::NoPlanFound
    })?;

    let mut steps = Vec::with_capacity(items.len());
    let mut rejected = Vec::new();
    for (index, item) in items.into_iter().enumerate() {
        match decode_step(item) {
            Ok(step) => steps.push(step),
            Err(source) => match policy {
                ParsePolicy::Strict => {
                    debug!(index, %source, "parse_plan: strict policy, failing");
                    return Err(ParseError::InvalidStep { index, source });
                }
                ParsePolicy::Partial => {
                    warn!(index, reason = %source, "Dropping malformed plan step");
                    rejected.push(RejectedStep {
                        index,
                        reason: source.to_string(),
                    });
                }
            },
        }
    }

    debug!(steps = steps.len(), rejected = rejected.len(), "parse_plan: complete");
    Ok(ParsedPlan {
        plan: Plan::new(steps),
        rejected,
    })
}

/// Find the plan array in the text without decoding its elements
///
/// An empty array is only accepted when it is the whole body of a code fence;
/// elsewhere `[]` is too common in prose to mean "empty plan".
pub fn extract_plan_array(text: &str) -> Option<Vec<Value>> {
    for caps in FENCE_RE.captures_iter(text) {
        let Some(body) = caps.get(1) else { continue };
        let body = body.as_str();
        if let Some(items) = first_object_array(body) {
            debug!("extract_plan_array: found plan in code fence");
            return Some(items);
        }
        if matches!(serde_json::from_str::<Value>(body.trim()), Ok(Value::Array(ref a)) if a.is_empty()) {
            debug!("extract_plan_array: fenced empty array");
            return Some(Vec::new());
        }
    }

    first_object_array(text)
}

/// First non-empty array of objects that parses from any `[` in the text
fn first_object_array(text: &str) -> Option<Vec<Value>> {
    for (start, _) in text.match_indices('[') {
        let mut values = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        if let Some(Ok(Value::Array(items))) = values.next()
            && !items.is_empty()
            && items.iter().all(Value::is_object)
        {
            return Some(items);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::ParseError;

    const BARE: &str = r#"[
        {"id": "r1", "tool": "read_file", "args": {"path_str": "a.txt"}, "dependencies": []},
        {"id": "final", "action": "final", "answer": "Summary of #r1", "dependencies": ["r1"]}
    ]"#;

    #[test]
    fn test_parse_bare_array() {
        let parsed = parse_plan(BARE, ParsePolicy::Strict).unwrap();
        assert_eq!(parsed.plan.len(), 2);
        assert!(parsed.rejected.is_empty());
    }

    #[test]
    fn test_parse_fenced_with_prose() {
        let text = format!(
            "Sure! Here is the plan [as requested]:\n\n```json\n{}\n```\n\nLet me know [if] anything changes.",
            BARE
        );
        let parsed = parse_plan(&text, ParsePolicy::Strict).unwrap();
        assert_eq!(parsed.plan.steps()[0].id, "r1");
    }

    #[test]
    fn test_parse_unfenced_with_prose() {
        let text = format!("I will read the file first. {} That should do it.", BARE);
        let parsed = parse_plan(&text, ParsePolicy::Strict).unwrap();
        assert_eq!(parsed.plan.len(), 2);
    }

    #[test]
    fn test_skips_non_plan_arrays() {
        let text = format!("Options were [1, 2, 3] and [\"a\"], then: {}", BARE);
        let parsed = parse_plan(&text, ParsePolicy::Strict).unwrap();
        assert_eq!(parsed.plan.len(), 2);
    }

    #[test]
    fn test_nested_arrays_inside_steps() {
        let text = r#"[{"id": "s", "tool": "echo", "args": {"text": "[x]"}, "dependencies": []}]"#;
        let parsed = parse_plan(text, ParsePolicy::Strict).unwrap();
        assert_eq!(parsed.plan.len(), 1);
    }

    #[test]
    fn test_no_plan_found() {
        let result = parse_plan("The answer is 42.", ParsePolicy::Strict);
        assert_eq!(result.unwrap_err(), ParseError::NoPlanFound);

        let result = parse_plan("Broken: [{\"id\": \"a\",", ParsePolicy::Strict);
        assert_eq!(result.unwrap_err(), ParseError::NoPlanFound);
    }

    #[test]
    fn test_fenced_empty_array_is_empty_plan() {
        let parsed = parse_plan("```json\n[]\n```", ParsePolicy::Strict).unwrap();
        assert!(parsed.plan.is_empty());
    }

    #[test]
    fn test_strict_rejects_whole_plan() {
        let text = r#"[{"id": "a", "tool": "echo"}, {"id": "b", "tool": ["echo"]}]"#;
        match parse_plan(text, ParsePolicy::Strict) {
            Err(ParseError::InvalidStep { index, .. }) => assert_eq!(index, 1),
            other => panic!("expected InvalidStep, got {:?}", other),
        }
    }

    #[test]
    fn test_partial_drops_bad_steps() {
        let text = r#"[{"id": "a", "tool": "echo"}, {"id": "b", "args": "x"}, {"tool": "echo"}]"#;
        let parsed = parse_plan(text, ParsePolicy::Partial).unwrap();
        assert_eq!(parsed.plan.len(), 1);
        assert_eq!(parsed.rejected.len(), 2);
        assert_eq!(parsed.rejected[0].index, 1);
        assert_eq!(parsed.rejected[1].index, 2);
    }
}
