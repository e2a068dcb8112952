//! A single variable, require or extract line of a matcher.

use crate::error::Result;
use crate::registry::{ActionRef, InterestRegistry};
use crate::tree::{NodeId, SyntaxTree};
use crate::walk::{Lookups, TreeExpressionEvaluator, WalkResult, NULL_VALUE};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    /// Computes `@name` for actions declared after it.
    Variable { name: String },
    /// Must produce a value for the matcher to fire.
    Require,
    /// Writes its value into `attribute`.
    Extract { attribute: String, confidence: i64 },
}

/// A start point handed to an action by the analyzer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub key: String,
    pub value: String,
    pub node: NodeId,
}

/// One compiled action plus its per-parse state.
///
/// The compiled evaluator is shared between clones; the received matches
/// and the cached result belong to one clone and are cleared by
/// [`reset`](MatcherAction::reset).
#[derive(Debug, Clone)]
pub struct MatcherAction {
    kind: ActionKind,
    evaluator: Arc<TreeExpressionEvaluator>,
    must_have_matches: bool,
    matches: Vec<Match>,
    outcome: Option<Option<WalkResult>>,
}

impl MatcherAction {
    pub fn new(kind: ActionKind, expression: &str, lookups: &Lookups) -> Result<Self> {
        let mut evaluator = TreeExpressionEvaluator::new(expression, lookups)?;
        if kind == ActionKind::Require {
            evaluator.prune_trailing_steps_that_cannot_fail();
        }

        // Variable users are informed by their matcher while it evaluates,
        // after the point where an empty action short-circuits the matcher.
        let must_have_matches = evaluator.fixed_value().is_none()
            && !evaluator.uses_is_null()
            && evaluator.variable_name().is_none();

        Ok(Self {
            kind,
            evaluator: Arc::new(evaluator),
            must_have_matches,
            matches: Vec::new(),
            outcome: None,
        })
    }

    pub fn kind(&self) -> &ActionKind {
        &self.kind
    }

    pub fn expression(&self) -> &str {
        self.evaluator.expression()
    }

    pub fn evaluator(&self) -> &TreeExpressionEvaluator {
        &self.evaluator
    }

    pub fn is_fixed(&self) -> bool {
        self.evaluator.fixed_value().is_some()
    }

    /// The variable this action reads, if any.
    pub fn variable_dependency(&self) -> Option<&str> {
        self.evaluator.variable_name()
    }

    pub fn must_have_matches(&self) -> bool {
        self.must_have_matches
    }

    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    pub fn calculate_inform_path(&self, action: ActionRef, registry: &mut dyn InterestRegistry) -> usize {
        self.evaluator.calculate_inform_path(action, registry)
    }

    pub fn inform(&mut self, key: &str, value: &str, node: NodeId) {
        self.matches.push(Match {
            key: key.to_string(),
            value: value.to_string(),
            node,
        });
    }

    /// True when this action cannot succeed in the current parse.
    pub fn cannot_be_valid(&self) -> bool {
        self.must_have_matches && self.matches.is_empty()
    }

    /// The result of this action for the current parse; computed once.
    pub fn obtain_result(&mut self, tree: &SyntaxTree) -> Option<&WalkResult> {
        if self.outcome.is_none() {
            let result = self.compute(tree);
            self.outcome = Some(result);
        }
        self.outcome.as_ref().and_then(Option::as_ref)
    }

    fn compute(&self, tree: &SyntaxTree) -> Option<WalkResult> {
        if let Some(fixed) = self.evaluator.fixed_value() {
            return Some(WalkResult {
                node: tree.root(),
                value: fixed.to_string(),
            });
        }

        if self.matches.is_empty() {
            return self.evaluator.uses_is_null().then(|| WalkResult {
                node: tree.root(),
                value: NULL_VALUE.to_string(),
            });
        }

        self.matches
            .iter()
            .find_map(|found| self.evaluator.evaluate(tree, found.node, &found.value))
    }

    pub fn reset(&mut self) {
        self.matches.clear();
        self.outcome = None;
    }

    pub fn walk_list_for_unit_testing(&self) -> String {
        self.evaluator.walk_list().to_string()
    }
}
