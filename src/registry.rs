//! Contracts between the flattener, the matchers and the analyzer.
//!
//! At build time every matcher action tells an [`InterestRegistry`] which
//! flattened keys it wants to hear about. At parse time the flattener feeds
//! every `(path, value)` event into an [`Analyzer`], which looks the derived
//! keys up and forwards the matching events to the registered actions.
//!
//! Three kinds of keys exist for an event on `path` with `value`:
//!
//! - `path` - the node exists
//! - `path="value"` - the node exists with exactly this (lowercased) value
//! - `path{"prefix"` - the value starts with the first few characters

use crate::splitter::WordRange;
use crate::tree::NodeId;
use std::collections::{BTreeMap, BTreeSet};

/// Longest value prefix that is ever used as a hash key.
pub const MAX_PREFIX_HASH_MATCH: usize = 3;

/// The first `max_chars` characters of `input` (all of it when shorter).
///
/// ```rust
/// use useragent_engine::registry::first_characters_for_prefix_hash;
///
/// assert_eq!(first_characters_for_prefix_hash("OneTwoThree", 3), "One");
/// assert_eq!(first_characters_for_prefix_hash("On", 3), "On");
/// ```
pub fn first_characters_for_prefix_hash(input: &str, max_chars: usize) -> &str {
    match input.char_indices().nth(max_chars) {
        Some((offset, _)) => &input[..offset],
        None => input,
    }
}

/// The key registered for a prefix match on `tree_name`.
pub fn prefix_hash_key(tree_name: &str, prefix: &str) -> String {
    format!("{tree_name}{{\"{prefix}\"")
}

/// Identifies one action inside one matcher of an analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionRef {
    pub matcher: usize,
    pub action: usize,
}

impl ActionRef {
    pub fn new(matcher: usize, action: usize) -> Self {
        Self { matcher, action }
    }
}

/// Build-time registration of the keys an action is interested in.
pub trait InterestRegistry {
    /// Forward every event whose key equals `key` to `action`.
    fn inform_me_about(&mut self, action: ActionRef, key: &str);

    /// Ask the flattener to produce the word range `range` of `tree_name`.
    fn looking_for_range(&mut self, tree_name: &str, range: WordRange);

    /// Record that values of `tree_name` must also be hashed by their first
    /// `length` characters.
    fn register_prefix_length(&mut self, tree_name: &str, length: usize);

    /// Forward events on `tree_name` whose value starts with `prefix`.
    ///
    /// Only the first [`MAX_PREFIX_HASH_MATCH`] characters go into the key;
    /// the walk list verifies the rest.
    fn inform_me_about_prefix(&mut self, action: ActionRef, tree_name: &str, prefix: &str) {
        let hashed = first_characters_for_prefix_hash(prefix, MAX_PREFIX_HASH_MATCH);
        self.inform_me_about(action, &prefix_hash_key(tree_name, hashed));
        self.register_prefix_length(tree_name, hashed.chars().count());
    }
}

/// Parse-time receiver of flattened events.
pub trait Analyzer {
    fn inform(&mut self, path: &str, value: &str, node: NodeId);

    /// Word ranges of `path` that some action wants as fake children.
    fn required_inform_ranges(&self, path: &str) -> Vec<WordRange>;

    /// Prefix lengths under which values of `tree_name` must be hashed.
    fn required_prefix_lengths(&self, tree_name: &str) -> Vec<usize>;
}

/// An [`InterestRegistry`] that only records what was registered.
///
/// Used to inspect the hash entries an expression produces.
#[derive(Debug, Default, Clone)]
pub struct CollectingRegistry {
    keys: Vec<String>,
    ranges: BTreeMap<String, BTreeSet<WordRange>>,
    prefix_lengths: BTreeMap<String, BTreeSet<usize>>,
}

impl CollectingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered keys in registration order, as written by the expression.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn ranges(&self, tree_name: &str) -> Vec<WordRange> {
        self.ranges
            .get(tree_name)
            .map(|ranges| ranges.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn prefix_lengths(&self, tree_name: &str) -> Vec<usize> {
        self.prefix_lengths
            .get(tree_name)
            .map(|lengths| lengths.iter().copied().collect())
            .unwrap_or_default()
    }
}

impl InterestRegistry for CollectingRegistry {
    fn inform_me_about(&mut self, _action: ActionRef, key: &str) {
        self.keys.push(key.to_string());
    }

    fn looking_for_range(&mut self, tree_name: &str, range: WordRange) {
        self.ranges
            .entry(tree_name.to_string())
            .or_default()
            .insert(range);
    }

    fn register_prefix_length(&mut self, tree_name: &str, length: usize) {
        self.prefix_lengths
            .entry(tree_name.to_string())
            .or_default()
            .insert(length);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_characters() {
        assert_eq!(first_characters_for_prefix_hash("OneTwoThree", 3), "One");
        assert_eq!(first_characters_for_prefix_hash("One", 3), "One");
        assert_eq!(first_characters_for_prefix_hash("", 3), "");
        assert_eq!(first_characters_for_prefix_hash("héllo", 2), "hé");
    }

    #[test]
    fn test_prefix_registration_truncates() {
        let mut registry = CollectingRegistry::new();
        let action = ActionRef::new(0, 0);
        registry.inform_me_about_prefix(action, "agent.(1)product.(1)name", "OneTwoThree");
        registry.inform_me_about_prefix(action, "agent.(1)product.(1)name", "On");

        assert_eq!(
            registry.keys(),
            &[
                "agent.(1)product.(1)name{\"One\"".to_string(),
                "agent.(1)product.(1)name{\"On\"".to_string(),
            ]
        );
        assert_eq!(
            registry.prefix_lengths("agent.(1)product.(1)name"),
            vec![2, 3]
        );
        assert!(registry.prefix_lengths("agent").is_empty());
    }

    #[test]
    fn test_ranges_are_deduplicated() {
        let mut registry = CollectingRegistry::new();
        registry.looking_for_range("agent.(1)text", WordRange::new(1, 2));
        registry.looking_for_range("agent.(1)text", WordRange::new(1, 2));
        registry.looking_for_range("agent.(1)text", WordRange::single(1));

        assert_eq!(
            registry.ranges("agent.(1)text"),
            vec![WordRange::single(1), WordRange::new(1, 2)]
        );
    }
}
