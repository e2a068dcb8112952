//! Named lookup tables and sets used by walk-list steps.
//!
//! All keys are stored lowercased; callers lowercase the value they look up.
//! A lookup keeps its entries in declaration order because "contains"
//! lookups resolve overlapping keys by that order.

use crate::error::{Result, UserAgentError};
use aho_corasick::AhoCorasick;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};

/// Number of keys from which a contains lookup switches to Aho-Corasick.
pub const CONTAINS_AUTOMATON_THRESHOLD: usize = 20;

/// Byte trie answering "longest key that is a prefix of the input".
#[derive(Debug, Default)]
pub struct PrefixMap {
    root: PrefixNode,
}

#[derive(Debug, Default)]
struct PrefixNode {
    children: HashMap<u8, PrefixNode>,
    value: Option<usize>,
}

impl PrefixMap {
    fn build(name: &str, entries: &[(String, String)]) -> Result<Self> {
        let mut map = PrefixMap::default();
        for (index, (key, _)) in entries.iter().enumerate() {
            if let Some(bad) = key.chars().find(|&c| !c.is_ascii() || c == '\t') {
                return Err(UserAgentError::InvalidLookup {
                    name: name.to_string(),
                    reason: format!("prefix key {key:?} contains unsupported character {bad:?}"),
                });
            }
            let mut node = &mut map.root;
            for byte in key.bytes() {
                node = node.children.entry(byte.to_ascii_lowercase()).or_default();
            }
            node.value.get_or_insert(index);
        }
        Ok(map)
    }

    /// Index of the entry with the longest key that prefixes `input`.
    fn longest_match(&self, input: &str) -> Option<usize> {
        let mut node = &self.root;
        let mut found = node.value;
        for byte in input.bytes() {
            match node.children.get(&byte.to_ascii_lowercase()) {
                Some(child) => node = child,
                None => break,
            }
            if node.value.is_some() {
                found = node.value;
            }
        }
        found
    }
}

#[derive(Debug)]
enum ContainsIndex {
    Linear,
    Automaton(AhoCorasick),
}

#[derive(Debug)]
pub struct Lookup {
    name: String,
    entries: Vec<(String, String)>,
    exact: HashMap<String, usize>,
    prefix: OnceLock<std::result::Result<Arc<PrefixMap>, UserAgentError>>,
    contains: OnceLock<ContainsIndex>,
}

impl Lookup {
    pub fn new<K, V>(name: &str, entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        let entries: Vec<(String, String)> = entries
            .into_iter()
            .map(|(key, value)| (key.as_ref().to_lowercase(), value.into()))
            .collect();
        let mut exact = HashMap::with_capacity(entries.len());
        for (index, (key, _)) in entries.iter().enumerate() {
            exact.entry(key.clone()).or_insert(index);
        }
        Self {
            name: name.to_string(),
            entries,
            exact,
            prefix: OnceLock::new(),
            contains: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    /// Exact match on an already lowercased key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.exact
            .get(key)
            .map(|&index| self.entries[index].1.as_str())
    }

    /// Validate (once) that the keys can be used for prefix matching.
    pub fn ensure_prefix_map(&self) -> Result<()> {
        self.prefix_map().map(|_| ())
    }

    fn prefix_map(&self) -> Result<&Arc<PrefixMap>> {
        self.prefix
            .get_or_init(|| PrefixMap::build(&self.name, &self.entries).map(Arc::new))
            .as_ref()
            .map_err(Clone::clone)
    }

    /// Value of the longest key that is a prefix of `input`.
    pub fn get_longest_prefix(&self, input: &str) -> Option<&str> {
        let index = self.prefix_map().ok()?.longest_match(input)?;
        Some(self.entries[index].1.as_str())
    }

    fn contains_index(&self) -> &ContainsIndex {
        self.contains.get_or_init(|| {
            if self.entries.len() < CONTAINS_AUTOMATON_THRESHOLD {
                return ContainsIndex::Linear;
            }
            match AhoCorasick::new(self.entries.iter().map(|(key, _)| key)) {
                Ok(automaton) => ContainsIndex::Automaton(automaton),
                Err(error) => {
                    log::warn!(
                        "Lookup {} falls back to linear contains matching: {}",
                        self.name,
                        error
                    );
                    ContainsIndex::Linear
                }
            }
        })
    }

    /// Value of the first declared key that occurs anywhere in the
    /// (lowercased) `input`.
    pub fn get_contains(&self, input: &str) -> Option<&str> {
        let index = match self.contains_index() {
            ContainsIndex::Linear => self
                .entries
                .iter()
                .position(|(key, _)| input.contains(key.as_str())),
            ContainsIndex::Automaton(automaton) => automaton
                .find_overlapping_iter(input)
                .map(|found| found.pattern().as_usize())
                .min(),
        }?;
        Some(self.entries[index].1.as_str())
    }
}

/// A named set of lowercased values.
#[derive(Debug, Clone, Default)]
pub struct LookupSet {
    name: String,
    values: HashSet<String>,
}

impl LookupSet {
    pub fn new<V: AsRef<str>>(name: &str, values: impl IntoIterator<Item = V>) -> Self {
        Self {
            name: name.to_string(),
            values: values
                .into_iter()
                .map(|value| value.as_ref().to_lowercase())
                .collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contains(&self, value: &str) -> bool {
        self.values.contains(value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// All lookups and sets known to one analyzer.
#[derive(Debug, Clone, Default)]
pub struct Lookups {
    maps: HashMap<String, Arc<Lookup>>,
    sets: HashMap<String, Arc<LookupSet>>,
}

impl Lookups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_lookup(&mut self, lookup: Lookup) -> Result<()> {
        if self.maps.contains_key(lookup.name()) {
            return Err(UserAgentError::DuplicateLookup(lookup.name().to_string()));
        }
        self.maps.insert(lookup.name().to_string(), Arc::new(lookup));
        Ok(())
    }

    pub fn add_set(&mut self, set: LookupSet) -> Result<()> {
        if self.sets.contains_key(set.name()) {
            return Err(UserAgentError::DuplicateLookup(set.name().to_string()));
        }
        self.sets.insert(set.name().to_string(), Arc::new(set));
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<Lookup>> {
        self.maps
            .get(name)
            .cloned()
            .ok_or_else(|| UserAgentError::MissingLookup(name.to_string()))
    }

    /// A set by name; the keys of a lookup with that name also work as a set.
    pub fn set(&self, name: &str) -> Result<Arc<LookupSet>> {
        if let Some(set) = self.sets.get(name) {
            return Ok(Arc::clone(set));
        }
        match self.maps.get(name) {
            Some(lookup) => Ok(Arc::new(LookupSet::new(name, lookup.keys()))),
            None => Err(UserAgentError::MissingSet(name.to_string())),
        }
    }

    pub fn lookup_count(&self) -> usize {
        self.maps.len()
    }

    pub fn set_count(&self) -> usize {
        self.sets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(entries: &[(&str, &str)]) -> Lookup {
        Lookup::new("Test", entries.iter().copied())
    }

    #[test]
    fn test_exact_lookup_is_case_insensitive() {
        let lookup = lookup(&[("Linux", "Linux OS"), ("Windows NT", "Windows")]);
        assert_eq!(lookup.get("linux"), Some("Linux OS"));
        assert_eq!(lookup.get("windows nt"), Some("Windows"));
        assert_eq!(lookup.get("Linux"), None);
        assert_eq!(lookup.get("mac"), None);
    }

    #[test]
    fn test_longest_prefix() {
        let lookup = lookup(&[("sm-", "Samsung"), ("sm-g9", "Galaxy S"), ("gt-", "Samsung GT")]);
        assert_eq!(lookup.get_longest_prefix("SM-G960F"), Some("Galaxy S"));
        assert_eq!(lookup.get_longest_prefix("sm-a520"), Some("Samsung"));
        assert_eq!(lookup.get_longest_prefix("sm"), None);
        assert_eq!(lookup.get_longest_prefix("xyz"), None);
        assert_eq!(lookup.get_longest_prefix(""), None);
    }

    #[test]
    fn test_prefix_keys_must_be_ascii() {
        let lookup = lookup(&[("ok", "1"), ("bäd", "2")]);
        match lookup.ensure_prefix_map() {
            Err(UserAgentError::InvalidLookup { name, .. }) => assert_eq!(name, "Test"),
            other => panic!("Expected InvalidLookup, got {:?}", other),
        }
        assert_eq!(lookup.get_longest_prefix("ok"), None);

        let tab = Lookup::new("Tab", [("a\tb", "1")]);
        assert!(tab.ensure_prefix_map().is_err());
    }

    #[test]
    fn test_contains_prefers_declaration_order() {
        let lookup = lookup(&[("phone", "Phone"), ("iphone", "iPhone")]);
        assert_eq!(lookup.get_contains("apple iphone 12"), Some("Phone"));
        assert_eq!(lookup.get_contains("tablet"), None);
    }

    #[test]
    fn test_contains_automaton_agrees_with_linear() {
        let mut entries: Vec<(String, String)> = (0..30)
            .map(|i| (format!("key{i:02}"), format!("value{i}")))
            .collect();
        entries.push(("ey1".to_string(), "overlap".to_string()));
        let big = Lookup::new("Big", entries.clone());
        assert!(matches!(big.contains_index(), ContainsIndex::Automaton(_)));

        for input in ["xxkey15yy", "key29", "ey1", "nothing", "key0key1"] {
            let expected = entries
                .iter()
                .find(|(key, _)| input.contains(key.as_str()))
                .map(|(_, value)| value.as_str());
            assert_eq!(big.get_contains(input), expected, "input {input}");
        }
    }

    #[test]
    fn test_sets_and_registry() {
        let mut lookups = Lookups::new();
        lookups
            .add_lookup(Lookup::new("OS", [("Linux", "Linux")]))
            .unwrap();
        lookups
            .add_set(LookupSet::new("Mobile", ["Android", "iOS"]))
            .unwrap();

        assert!(lookups.set("Mobile").unwrap().contains("ios"));
        assert!(lookups.set("OS").unwrap().contains("linux"));
        assert_eq!(
            lookups.set("Nope").unwrap_err(),
            UserAgentError::MissingSet("Nope".to_string())
        );
        assert_eq!(
            lookups.lookup("Nope").unwrap_err(),
            UserAgentError::MissingLookup("Nope".to_string())
        );
        assert_eq!(
            lookups
                .add_lookup(Lookup::new("OS", [("a", "b")]))
                .unwrap_err(),
            UserAgentError::DuplicateLookup("OS".to_string())
        );
    }
}
