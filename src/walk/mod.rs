//! Compiled path expressions.
//!
//! A rule expression is compiled once into a [`TreeExpressionEvaluator`]:
//! either a constant, or a set of hash entries (the statically known prefix
//! of the path, registered with the analyzer) plus a [`WalkList`] holding
//! the remaining steps that run against each matching tree node.
//!
//! - [`expression`] - tokenizer and parser of the expression language
//! - [`step`] - the executable steps
//! - [`lookup`] - lookup tables and sets
//! - [`evaluator`] - compilation, hash paths and evaluation

pub mod evaluator;
pub(crate) mod expression;
pub mod lookup;
pub mod step;

pub use evaluator::TreeExpressionEvaluator;
pub use lookup::{Lookup, LookupSet, Lookups};
pub use step::{Step, WalkResult, NULL_VALUE};

use crate::tree::{NodeId, SyntaxTree};
use std::fmt;

/// An ordered chain of steps; step `i` continues with step `i + 1`.
#[derive(Debug, Clone, Default)]
pub struct WalkList {
    steps: Vec<Step>,
}

impl WalkList {
    pub fn new(steps: Vec<Step>) -> Self {
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

    /// Run the whole list starting at `node` with `value` (`None` means the
    /// text of the node).
    pub fn walk(&self, tree: &SyntaxTree, node: NodeId, value: Option<&str>) -> Option<WalkResult> {
        self.walk_from(0, tree, node, value)
    }

    pub(crate) fn walk_from(
        &self,
        index: usize,
        tree: &SyntaxTree,
        node: NodeId,
        value: Option<&str>,
    ) -> Option<WalkResult> {
        match self.steps.get(index) {
            Some(step) => step.walk(self, index, tree, node, value),
            None => Some(WalkResult {
                node,
                value: value.unwrap_or_else(|| tree.text(node)).to_string(),
            }),
        }
    }

    /// Drop the steps at the end that always succeed.
    ///
    /// Only valid where the produced value is not used (require actions).
    pub fn prune_trailing_steps_that_cannot_fail(&mut self) {
        while self.steps.last().is_some_and(|step| !step.can_fail()) {
            self.steps.pop();
        }
    }
}

impl fmt::Display for WalkList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, step) in self.steps.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{step}")?;
        }
        Ok(())
    }
}
