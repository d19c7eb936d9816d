//! Plan validation - confirm a plan is a well-formed DAG
//!
//! Checks run in a fixed order so the same plan always yields the same error:
//! empty plan, duplicate ids, missing dependencies, cycles, extra final steps.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::ops::Deref;

use tracing::{debug, warn};

use super::error::ValidationError;
use super::types::Plan;

/// A plan that passed validation
///
/// The executor only accepts this type, so an invalid plan can never be
/// scheduled.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPlan(Plan);

impl ValidatedPlan {
    pub fn plan(&self) -> &Plan {
        &self.0
    }

    pub fn into_inner(self) -> Plan {
        self.0
    }
}

impl Deref for ValidatedPlan {
    type Target = Plan;

    fn deref(&self) -> &Plan {
        &self.0
    }
}

/// Adjacency view of a plan: step id -> ids it depends on
#[derive(Debug)]
pub struct DependencyGraph<'a> {
    /// Step ids in authoring order
    order: Vec<&'a str>,
    edges: HashMap<&'a str, &'a BTreeSet<String>>,
}

impl<'a> DependencyGraph<'a> {
    pub fn build(plan: &'a Plan) -> Self {
        debug!(step_count = plan.len(), "DependencyGraph::build: called");
        let mut order = Vec::with_capacity(plan.len());
        let mut edges = HashMap::with_capacity(plan.len());
        for step in plan.steps() {
            if edges.insert(step.id.as_str(), &step.dependencies).is_none() {
                order.push(step.id.as_str());
            }
        }
        Self { order, edges }
    }

    pub fn nodes(&self) -> &[&'a str] {
        &self.order
    }

    pub fn contains(&self, id: &str) -> bool {
        self.edges.contains_key(id)
    }

    pub fn dependencies(&self, id: &str) -> impl Iterator<Item = &'a str> + use<'a> {
        self.edges
            .get(id)
            .copied()
            .into_iter()
            .flat_map(|deps| deps.iter().map(String::as_str))
    }
}

/// Validate a plan, wrapping it on success
pub fn validate(plan: Plan) -> Result<ValidatedPlan, ValidationError> {
    check(&plan)?;
    Ok(ValidatedPlan(plan))
}

/// Run every check without taking ownership
pub fn check(plan: &Plan) -> Result<(), ValidationError> {
    debug!(step_count = plan.len(), "check: called");
    if plan.is_empty() {
        debug!("check: empty plan");
        return Err(ValidationError::EmptyPlan);
    }

    check_duplicates(plan)?;

    let graph = DependencyGraph::build(plan);
    check_references(plan, &graph)?;

    if let Some(cycle) = find_cycle(&graph) {
        warn!(?cycle, "Plan contains a dependency cycle");
        return Err(ValidationError::CycleDetected { cycle });
    }

    let finals: Vec<String> = plan
        .steps()
        .iter()
        .filter(|s| s.is_final())
        .map(|s| s.id.clone())
        .collect();
    if finals.len() > 1 {
        debug!(?finals, "check: multiple final steps");
        return Err(ValidationError::MultipleFinalSteps { ids: finals });
    }

    debug!("check: plan is valid");
    Ok(())
}

fn check_duplicates(plan: &Plan) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    let mut duplicates: Vec<String> = Vec::new();
    for step in plan.steps() {
        if !seen.insert(step.id.as_str()) && !duplicates.contains(&step.id) {
            duplicates.push(step.id.clone());
        }
    }
    if duplicates.is_empty() {
        Ok(())
    } else {
        debug!(?duplicates, "check_duplicates: found duplicates");
        Err(ValidationError::DuplicateStepId { ids: duplicates })
    }
}

fn check_references(plan: &Plan, graph: &DependencyGraph<'_>) -> Result<(), ValidationError> {
    let mut step_ids = Vec::new();
    let mut missing = BTreeSet::new();
    for step in plan.steps() {
        let unknown: Vec<&String> = step.dependencies.iter().filter(|d| !graph.contains(d)).collect();
        if !unknown.is_empty() {
            warn!(step_id = %step.id, ?unknown, "Dependency not found in plan");
            step_ids.push(step.id.clone());
            missing.extend(unknown.into_iter().cloned());
        }
    }
    if step_ids.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::MissingDependency {
            step_ids,
            missing: missing.into_iter().collect(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    Unvisited,
    InProgress,
    Done,
}

/// Three-color DFS; returns the members of the first cycle found
///
/// Walks with an explicit stack of (node, remaining dependencies) frames, so
/// long dependency chains do not grow the call stack.
fn find_cycle(graph: &DependencyGraph<'_>) -> Option<Vec<String>> {
    let mut colors: HashMap<&str, Color> = graph.nodes().iter().map(|n| (*n, Color::Unvisited)).collect();

    for &root in graph.nodes() {
        if colors.get(root) != Some(&Color::Unvisited) {
            continue;
        }
        colors.insert(root, Color::InProgress);
        let mut stack = vec![(root, graph.dependencies(root))];

        while let Some((node, deps)) = stack.last_mut() {
            let node = *node;
            let Some(dep) = deps.next() else {
                colors.insert(node, Color::Done);
                stack.pop();
                continue;
            };
            match colors.get(dep).copied() {
                Some(Color::Unvisited) => {
                    colors.insert(dep, Color::InProgress);
                    stack.push((dep, graph.dependencies(dep)));
                }
                Some(Color::InProgress) => {
                    debug!(%node, %dep, "find_cycle: back edge");
                    let start = stack.iter().position(|(n, _)| *n == dep).unwrap_or(0);
                    return Some(stack[start..].iter().map(|(n, _)| n.to_string()).collect());
                }
                Some(Color::Done) | None => {}
            }
        }
    }
    None
}
