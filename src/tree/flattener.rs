//! Flattening of a [`SyntaxTree`] into path events.
//!
//! Every node produces one event with its path and text. A path is the
//! parent path plus `.(N)kind`, where `N` counts the earlier siblings of the
//! same counter class, so the path of the first product name is
//! `agent.(1)product.(1)name`.
//!
//! Nodes that split into words also produce "fake child" events such as
//! `agent.(1)product.(1)name[1-2]` for every word range some action asked
//! for via [`Analyzer::required_inform_ranges`].

use super::{CounterClass, NodeId, NodeKind, SyntaxTree};
use crate::registry::Analyzer;
use crate::splitter::{Splitter, WordRange, SPLIT_LIST_BREAK_EVEN, VERSION_SPLITTER, WORD_SPLITTER};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Default)]
struct State {
    path: String,
    child: u32,
    version: u32,
    comment: u32,
}

impl State {
    fn next_ordinal(&mut self, class: CounterClass) -> u32 {
        let counter = match class {
            CounterClass::Child => &mut self.child,
            CounterClass::Version => &mut self.version,
            CounterClass::Comment => &mut self.comment,
        };
        *counter += 1;
        *counter
    }
}

pub struct UserAgentTreeFlattener;

impl UserAgentTreeFlattener {
    /// Emit the events of `tree` in pre-order into `analyzer`.
    pub fn flatten<A: Analyzer + ?Sized>(tree: &SyntaxTree, analyzer: &mut A) {
        let mut states = vec![State::default(); tree.len()];
        let mut stack = vec![tree.root()];

        while let Some(node) = stack.pop() {
            let kind = tree.kind(node);
            let path = match tree.parent(node) {
                None => kind.name().to_string(),
                Some(parent) => {
                    let parent_state = &mut states[parent.index()];
                    let ordinal = parent_state.next_ordinal(kind.counter_class());
                    format!("{}.({}){}", parent_state.path, ordinal, kind.name())
                }
            };

            Self::inform(tree, node, kind, &path, analyzer);
            states[node.index()].path = path;
            stack.extend(tree.children(node).iter().rev().copied());
        }
    }

    fn inform<A: Analyzer + ?Sized>(
        tree: &SyntaxTree,
        node: NodeId,
        kind: NodeKind,
        path: &str,
        analyzer: &mut A,
    ) {
        let value = tree.text(node);
        analyzer.inform(path, value, node);

        if !kind.splits_into_words() {
            return;
        }
        let ranges = analyzer.required_inform_ranges(path);
        if ranges.is_empty() {
            return;
        }

        let splitter: &dyn Splitter = if kind == NodeKind::Version {
            &VERSION_SPLITTER
        } else {
            &WORD_SPLITTER
        };

        if ranges.len() > SPLIT_LIST_BREAK_EVEN {
            let split_list = splitter.create_split_list(value);
            for range in ranges {
                if let Some(words) = splitter.split_range_with_list(value, &split_list, range) {
                    analyzer.inform(&format!("{path}{range}"), words, node);
                }
            }
        } else {
            for range in ranges {
                if let Some(words) = splitter.split_range(value, range) {
                    analyzer.inform(&format!("{path}{range}"), words, node);
                }
            }
        }
    }
}

/// One event produced by the flattener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlattenEvent {
    pub path: String,
    pub value: String,
    pub node: NodeId,
}

/// An [`Analyzer`] that records every event, for debugging and tests.
#[derive(Debug, Clone, Default)]
pub struct FlattenRecorder {
    ranges: HashMap<String, BTreeSet<WordRange>>,
    events: Vec<FlattenEvent>,
}

impl FlattenRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also produce the fake child for `range` of `path`.
    pub fn with_range(mut self, path: &str, range: WordRange) -> Self {
        self.ranges.entry(path.to_lowercase()).or_default().insert(range);
        self
    }

    pub(crate) fn with_ranges(ranges: HashMap<String, BTreeSet<WordRange>>) -> Self {
        Self {
            ranges,
            events: Vec::new(),
        }
    }

    pub fn events(&self) -> &[FlattenEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<FlattenEvent> {
        self.events
    }

    /// `path=value` lines, the way the events are usually eyeballed.
    pub fn lines(&self) -> Vec<String> {
        self.events
            .iter()
            .map(|event| format!("{}=\"{}\"", event.path, event.value))
            .collect()
    }
}

impl Analyzer for FlattenRecorder {
    fn inform(&mut self, path: &str, value: &str, node: NodeId) {
        self.events.push(FlattenEvent {
            path: path.to_string(),
            value: value.to_string(),
            node,
        });
    }

    fn required_inform_ranges(&self, path: &str) -> Vec<WordRange> {
        self.ranges
            .get(&path.to_lowercase())
            .map(|ranges| ranges.iter().copied().collect())
            .unwrap_or_default()
    }

    fn required_prefix_lengths(&self, _tree_name: &str) -> Vec<usize> {
        Vec::new()
    }
}
