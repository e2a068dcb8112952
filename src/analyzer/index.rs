//! Hash index from flattened keys to the actions that want them.

use crate::matcher::Matcher;
use crate::registry::{first_characters_for_prefix_hash, prefix_hash_key, ActionRef, Analyzer, InterestRegistry};
use crate::splitter::WordRange;
use crate::tree::NodeId;
use std::collections::{BTreeSet, HashMap};

/// Filled while matchers register their interests, read-only afterwards.
///
/// All keys are lowercased.
#[derive(Debug, Default, Clone)]
pub(crate) struct InterestIndex {
    actions: HashMap<String, Vec<ActionRef>>,
    ranges: HashMap<String, BTreeSet<WordRange>>,
    prefix_lengths: HashMap<String, BTreeSet<usize>>,
}

impl InterestIndex {
    pub(crate) fn actions_for(&self, key: &str) -> &[ActionRef] {
        self.actions.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn key_count(&self) -> usize {
        self.actions.len()
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    pub(crate) fn ranges(&self) -> &HashMap<String, BTreeSet<WordRange>> {
        &self.ranges
    }
}

impl InterestRegistry for InterestIndex {
    fn inform_me_about(&mut self, action: ActionRef, key: &str) {
        let actions = self.actions.entry(key.to_lowercase()).or_default();
        if !actions.contains(&action) {
            actions.push(action);
        }
    }

    fn looking_for_range(&mut self, tree_name: &str, range: WordRange) {
        self.ranges
            .entry(tree_name.to_lowercase())
            .or_default()
            .insert(range);
    }

    fn register_prefix_length(&mut self, tree_name: &str, length: usize) {
        self.prefix_lengths
            .entry(tree_name.to_lowercase())
            .or_default()
            .insert(length);
    }
}

/// Routes the events of one parse to the matchers.
///
/// Every matcher that received at least one event is recorded in
/// `touched`, so only those need to be analyzed and reset afterwards.
pub(crate) struct Dispatch<'a> {
    pub(crate) index: &'a InterestIndex,
    pub(crate) matchers: &'a mut [Matcher],
    pub(crate) touched: &'a mut BTreeSet<usize>,
}

impl Dispatch<'_> {
    fn inform_key(&mut self, key: &str, value: &str, node: NodeId) {
        let index = self.index;
        for action in index.actions_for(key) {
            if let Some(matcher) = self.matchers.get_mut(action.matcher) {
                matcher.inform(action.action, key, value, node);
                self.touched.insert(action.matcher);
            }
        }
    }
}

impl Analyzer for Dispatch<'_> {
    fn inform(&mut self, path: &str, value: &str, node: NodeId) {
        let path = path.to_lowercase();
        self.inform_key(&path, value, node);
        self.inform_key(&format!("{path}=\"{}\"", value.to_lowercase()), value, node);

        let value_length = value.chars().count();
        for length in self.required_prefix_lengths(&path) {
            if value_length < length {
                break;
            }
            let prefix = first_characters_for_prefix_hash(value, length).to_lowercase();
            self.inform_key(&prefix_hash_key(&path, &prefix), value, node);
        }
    }

    fn required_inform_ranges(&self, path: &str) -> Vec<WordRange> {
        self.index
            .ranges
            .get(path)
            .map(|ranges| ranges.iter().copied().collect())
            .unwrap_or_default()
    }

    fn required_prefix_lengths(&self, tree_name: &str) -> Vec<usize> {
        self.index
            .prefix_lengths
            .get(tree_name)
            .map(|lengths| lengths.iter().copied().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_lowercased_and_deduplicated() {
        let mut index = InterestIndex::default();
        let action = ActionRef::new(0, 1);
        index.inform_me_about(action, "agent.(1)product.(1)name=\"Foo\"");
        index.inform_me_about(action, "agent.(1)product.(1)name=\"FOO\"");
        index.inform_me_about(ActionRef::new(2, 0), "agent.(1)product.(1)name=\"foo\"");

        assert_eq!(index.key_count(), 1);
        assert_eq!(
            index.actions_for("agent.(1)product.(1)name=\"foo\""),
            &[action, ActionRef::new(2, 0)]
        );
        assert!(index.actions_for("agent").is_empty());
    }

    #[test]
    fn test_prefix_registration() {
        let mut index = InterestIndex::default();
        index.inform_me_about_prefix(ActionRef::new(0, 0), "agent.(1)product.(1)name", "Mozilla");
        index.inform_me_about_prefix(ActionRef::new(1, 0), "agent.(1)product.(1)name", "Mo");

        assert_eq!(index.actions_for("agent.(1)product.(1)name{\"moz\"").len(), 1);
        assert_eq!(index.actions_for("agent.(1)product.(1)name{\"mo\"").len(), 1);

        let mut matchers: Vec<Matcher> = Vec::new();
        let mut touched = BTreeSet::new();
        let dispatch = Dispatch {
            index: &index,
            matchers: &mut matchers,
            touched: &mut touched,
        };
        assert_eq!(dispatch.required_prefix_lengths("agent.(1)product.(1)name"), vec![2, 3]);
        assert!(dispatch.required_inform_ranges("agent").is_empty());
    }
}
