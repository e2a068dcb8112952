//! The executable steps of a walk list.
//!
//! Every step receives a tree node and the current value (`None` meaning
//! "the full text of the node") and either fails or continues the rest of
//! the walk list with a possibly different node and value. A step only
//! succeeds when the remainder of the list succeeds too.

use super::lookup::{Lookup, LookupSet};
use super::WalkList;
use crate::normalize;
use crate::splitter::{Splitter, WordRange, VERSION_SPLITTER, WORD_SPLITTER};
use crate::tree::{NodeId, NodeKind, SyntaxTree};
use std::fmt;
use std::sync::Arc;

/// Value produced by `IsNull` when the wrapped path has no value.
pub const NULL_VALUE: &str = "<<<Null Value>>>";

/// Outcome of a successful walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkResult {
    pub node: NodeId,
    pub value: String,
}

#[derive(Debug, Clone)]
pub enum Step {
    // Compare
    IsNull,
    Equals(String),
    NotEquals(String),
    StartsWith(String),
    EndsWith(String),
    Contains(String),
    IsInSet(Arc<LookupSet>),
    IsNotInSet(Arc<LookupSet>),

    // Lookup
    Lookup {
        lookup: Arc<Lookup>,
        default: Option<String>,
    },
    LookupPrefix {
        lookup: Arc<Lookup>,
        default: Option<String>,
    },
    IsInLookupPrefix(Arc<Lookup>),
    LookupContains {
        lookup: Arc<Lookup>,
        default: Option<String>,
    },
    IsInLookupContains(Arc<Lookup>),

    // Value
    WordRange(WordRange),
    CleanVersion,
    Concat {
        prefix: String,
        postfix: String,
    },
    ConcatPrefix(String),
    ConcatPostfix(String),
    NormalizeBrand,
    BackToFull,

    // Walk
    Up,
    Down {
        first: u32,
        last: u32,
        kind: NodeKind,
    },
    Next(u8),
    Prev(u8),
}

/// `_` becomes `.` and `/` becomes a space.
pub fn clean_version(version: &str) -> String {
    version.replace('_', ".").replace('/', " ")
}

impl Step {
    /// Whether this step can ever stop a walk.
    pub fn can_fail(&self) -> bool {
        match self {
            Step::WordRange(range) => range.can_fail(),
            Step::Lookup { default, .. }
            | Step::LookupPrefix { default, .. }
            | Step::LookupContains { default, .. } => default.is_none(),
            Step::CleanVersion
            | Step::Concat { .. }
            | Step::ConcatPrefix(_)
            | Step::ConcatPostfix(_)
            | Step::NormalizeBrand
            | Step::BackToFull => false,
            _ => true,
        }
    }

    pub(crate) fn walk(
        &self,
        list: &WalkList,
        index: usize,
        tree: &SyntaxTree,
        node: NodeId,
        value: Option<&str>,
    ) -> Option<WalkResult> {
        let next = index + 1;
        let actual = value.unwrap_or_else(|| tree.text(node));

        match self {
            Step::IsNull => match list.walk_from(next, tree, node, value) {
                Some(_) => None,
                None => Some(WalkResult {
                    node,
                    value: NULL_VALUE.to_string(),
                }),
            },

            Step::Equals(expected) => {
                (actual.to_lowercase() == *expected).then_some(())?;
                list.walk_from(next, tree, node, value)
            }
            Step::NotEquals(expected) => {
                (actual.to_lowercase() != *expected).then_some(())?;
                list.walk_from(next, tree, node, value)
            }
            Step::StartsWith(prefix) => {
                actual.to_lowercase().starts_with(prefix.as_str()).then_some(())?;
                list.walk_from(next, tree, node, value)
            }
            Step::EndsWith(suffix) => {
                actual.to_lowercase().ends_with(suffix.as_str()).then_some(())?;
                list.walk_from(next, tree, node, value)
            }
            Step::Contains(needle) => {
                actual.to_lowercase().contains(needle.as_str()).then_some(())?;
                list.walk_from(next, tree, node, value)
            }
            Step::IsInSet(set) => {
                set.contains(&actual.to_lowercase()).then_some(())?;
                list.walk_from(next, tree, node, value)
            }
            Step::IsNotInSet(set) => {
                (!set.contains(&actual.to_lowercase())).then_some(())?;
                list.walk_from(next, tree, node, value)
            }

            Step::Lookup { lookup, default } => {
                let key = actual.to_lowercase();
                let found = lookup.get(&key).or(default.as_deref())?;
                list.walk_from(next, tree, node, Some(found))
            }
            Step::LookupPrefix { lookup, default } => {
                let found = lookup
                    .get_longest_prefix(actual)
                    .or(default.as_deref())?;
                list.walk_from(next, tree, node, Some(found))
            }
            Step::IsInLookupPrefix(lookup) => {
                lookup.get_longest_prefix(actual)?;
                list.walk_from(next, tree, node, value)
            }
            Step::LookupContains { lookup, default } => {
                let haystack = actual.to_lowercase();
                let found = lookup.get_contains(&haystack).or(default.as_deref())?;
                list.walk_from(next, tree, node, Some(found))
            }
            Step::IsInLookupContains(lookup) => {
                lookup.get_contains(&actual.to_lowercase())?;
                list.walk_from(next, tree, node, value)
            }

            Step::WordRange(range) => {
                let words = if tree.kind(node) == NodeKind::Version {
                    VERSION_SPLITTER.split_range(actual, *range)
                } else {
                    WORD_SPLITTER.split_range(actual, *range)
                }?;
                list.walk_from(next, tree, node, Some(words))
            }
            Step::CleanVersion => {
                let cleaned = clean_version(actual);
                list.walk_from(next, tree, node, Some(&cleaned))
            }
            Step::Concat { prefix, postfix } => {
                let joined = format!("{prefix}{}{postfix}", actual);
                list.walk_from(next, tree, node, Some(&joined))
            }
            Step::ConcatPrefix(prefix) => {
                let joined = format!("{prefix}{}", actual);
                list.walk_from(next, tree, node, Some(&joined))
            }
            Step::ConcatPostfix(postfix) => {
                let joined = format!("{}{postfix}", actual);
                list.walk_from(next, tree, node, Some(&joined))
            }
            Step::NormalizeBrand => {
                let normalized = normalize::brand(actual);
                list.walk_from(next, tree, node, Some(&normalized))
            }
            Step::BackToFull => list.walk_from(next, tree, node, None),

            Step::Up => {
                let parent = tree.parent(node)?;
                list.walk_from(next, tree, parent, None)
            }
            Step::Down { first, last, kind } => {
                tree.children(node)
                    .iter()
                    .copied()
                    .filter(|&child| {
                        tree.kind(child) == *kind && (*first..=*last).contains(&tree.ordinal(child))
                    })
                    .find_map(|child| list.walk_from(next, tree, child, None))
            }
            Step::Next(count) => {
                let sibling = tree.sibling(node, isize::from(*count))?;
                list.walk_from(next, tree, sibling, None)
            }
            Step::Prev(count) => {
                let sibling = tree.sibling(node, -isize::from(*count))?;
                list.walk_from(next, tree, sibling, None)
            }
        }
    }
}

fn default_label(default: &Option<String>) -> &str {
    default.as_deref().unwrap_or("null")
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::IsNull => write!(f, "IsNull()"),
            Step::Equals(value) => write!(f, "Equals({value})"),
            Step::NotEquals(value) => write!(f, "NotEquals({value})"),
            Step::StartsWith(value) => write!(f, "StartsWith({value})"),
            Step::EndsWith(value) => write!(f, "EndsWith({value})"),
            Step::Contains(value) => write!(f, "Contains({value})"),
            Step::IsInSet(set) => write!(f, "IsInSet(@{})", set.name()),
            Step::IsNotInSet(set) => write!(f, "IsNotInSet(@{})", set.name()),
            Step::Lookup { lookup, default } => write!(
                f,
                "Lookup(@{} ; default={})",
                lookup.name(),
                default_label(default)
            ),
            Step::LookupPrefix { lookup, default } => write!(
                f,
                "LookupPrefix(@{} ; default={})",
                lookup.name(),
                default_label(default)
            ),
            Step::IsInLookupPrefix(lookup) => write!(f, "IsInLookupPrefix(@{})", lookup.name()),
            Step::LookupContains { lookup, default } => write!(
                f,
                "LookupContains(@{} ; default={})",
                lookup.name(),
                default_label(default)
            ),
            Step::IsInLookupContains(lookup) => {
                write!(f, "IsInLookupContains(@{})", lookup.name())
            }
            Step::WordRange(range) => write!(f, "WordRange({})", range.step_label()),
            Step::CleanVersion => write!(f, "CleanVersion()"),
            Step::Concat { prefix, postfix } => write!(f, "Concat({prefix};{postfix})"),
            Step::ConcatPrefix(prefix) => write!(f, "ConcatPrefix({prefix})"),
            Step::ConcatPostfix(postfix) => write!(f, "ConcatPostfix({postfix})"),
            Step::NormalizeBrand => write!(f, "NormalizeBrand()"),
            Step::BackToFull => write!(f, "BackToFull()"),
            Step::Up => write!(f, "Up()"),
            Step::Down { first, last, kind } => write!(f, "Down([{first}:{last}]{kind})"),
            Step::Next(1) => write!(f, "Next()"),
            Step::Next(count) => write!(f, "Next({count})"),
            Step::Prev(1) => write!(f, "Prev()"),
            Step::Prev(count) => write!(f, "Prev({count})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::parser::parse;

    fn run(steps: Vec<Step>, tree: &SyntaxTree, node: NodeId) -> Option<String> {
        WalkList::new(steps)
            .walk(tree, node, None)
            .map(|result| result.value)
    }

    fn first_product_name(tree: &SyntaxTree) -> NodeId {
        let product = tree.children(tree.root())[0];
        tree.children(product)[0]
    }

    #[test]
    fn test_compare_steps_are_case_insensitive() {
        let tree = parse("Mozilla/5.0");
        let name = first_product_name(&tree);
        assert_eq!(
            run(vec![Step::Equals("mozilla".into())], &tree, name),
            Some("Mozilla".to_string())
        );
        assert_eq!(run(vec![Step::Equals("moz".into())], &tree, name), None);
        assert!(run(vec![Step::StartsWith("moz".into())], &tree, name).is_some());
        assert!(run(vec![Step::EndsWith("lla".into())], &tree, name).is_some());
        assert!(run(vec![Step::Contains("zil".into())], &tree, name).is_some());
        assert!(run(vec![Step::NotEquals("mozilla".into())], &tree, name).is_none());
    }

    #[test]
    fn test_is_null_inverts_the_rest() {
        let tree = parse("Mozilla/5.0");
        let name = first_product_name(&tree);
        assert_eq!(
            run(vec![Step::IsNull, Step::Equals("other".into())], &tree, name),
            Some(NULL_VALUE.to_string())
        );
        assert_eq!(
            run(vec![Step::IsNull, Step::Equals("mozilla".into())], &tree, name),
            None
        );
    }

    #[test]
    fn test_navigation() {
        let tree = parse("Foo/1.0/2.0 (a; b)");
        let name = first_product_name(&tree);
        let down_version = |first, last| Step::Down {
            first,
            last,
            kind: NodeKind::Version,
        };

        assert_eq!(
            run(vec![Step::Up, down_version(2, 2)], &tree, name),
            Some("2.0".to_string())
        );
        // First success wins.
        assert_eq!(
            run(vec![Step::Up, down_version(1, 5)], &tree, name),
            Some("1.0".to_string())
        );
        assert_eq!(
            run(
                vec![Step::Up, down_version(1, 5), Step::Equals("2.0".into())],
                &tree,
                name
            ),
            Some("2.0".to_string())
        );
        assert_eq!(run(vec![Step::Up, down_version(3, 5)], &tree, name), None);
        assert_eq!(
            run(vec![Step::Next(1)], &tree, name),
            Some("1.0".to_string())
        );
        assert_eq!(run(vec![Step::Prev(1)], &tree, name), None);
        assert_eq!(run(vec![Step::Up, Step::Up, Step::Up], &tree, name), None);
    }

    #[test]
    fn test_value_transforms() {
        let tree = parse("Some Browser/4_1_2");
        let product = tree.children(tree.root())[0];
        let version = tree.children(product)[1];
        assert_eq!(
            run(vec![Step::CleanVersion], &tree, version),
            Some("4.1.2".to_string())
        );
        assert_eq!(
            run(vec![Step::WordRange(WordRange::new(1, 2))], &tree, version),
            Some("4_1".to_string())
        );
        assert_eq!(
            run(
                vec![
                    Step::WordRange(WordRange::single(1)),
                    Step::Concat {
                        prefix: "<".into(),
                        postfix: ">".into()
                    }
                ],
                &tree,
                version
            ),
            Some("<4>".to_string())
        );

        let name = tree.children(product)[0];
        assert_eq!(
            run(vec![Step::WordRange(WordRange::single(2))], &tree, name),
            Some("Browser".to_string())
        );
        assert_eq!(
            run(
                vec![Step::WordRange(WordRange::single(2)), Step::BackToFull],
                &tree,
                name
            ),
            Some("Some Browser".to_string())
        );
        assert_eq!(
            run(vec![Step::NormalizeBrand], &tree, name),
            Some("Some Browser".to_string())
        );
    }

    #[test]
    fn test_lookup_steps() {
        let tree = parse("Linux Foo");
        let text = tree.children(tree.root())[0];
        let lookup = Arc::new(Lookup::new("OS", [("linux", "Linux OS")]));

        let exact = Step::Lookup {
            lookup: Arc::clone(&lookup),
            default: None,
        };
        assert_eq!(
            run(vec![exact.clone()], &tree, text),
            None,
            "the text node holds more than the key"
        );
        assert_eq!(
            run(vec![Step::WordRange(WordRange::single(1)), exact], &tree, text),
            Some("Linux OS".to_string())
        );

        let with_default = Step::Lookup {
            lookup: Arc::clone(&lookup),
            default: Some("Other".into()),
        };
        assert!(!with_default.can_fail());
        assert_eq!(
            run(vec![with_default], &tree, text),
            Some("Other".to_string())
        );

        let prefix = Step::LookupPrefix {
            lookup: Arc::clone(&lookup),
            default: None,
        };
        assert_eq!(
            run(vec![prefix], &tree, text),
            Some("Linux OS".to_string())
        );

        let contains = Step::LookupContains {
            lookup: Arc::clone(&lookup),
            default: None,
        };
        assert_eq!(
            run(vec![Step::Up, contains], &tree, text),
            Some("Linux OS".to_string())
        );
        // The IsIn variants keep the value they tested.
        assert_eq!(
            run(vec![Step::IsInLookupContains(Arc::clone(&lookup))], &tree, text),
            Some("Linux Foo".to_string())
        );
        assert_eq!(
            run(
                vec![
                    Step::WordRange(WordRange::single(2)),
                    Step::IsInLookupPrefix(lookup)
                ],
                &tree,
                text
            ),
            None
        );
    }

    #[test]
    fn test_rendering() {
        let lookup = Arc::new(Lookup::new("Names", [("a", "b")]));
        let set = Arc::new(LookupSet::new("Brands", ["x"]));
        let rendered: Vec<String> = [
            Step::IsNull,
            Step::Contains("foo".into()),
            Step::Down {
                first: 1,
                last: 5,
                kind: NodeKind::Version,
            },
            Step::Lookup {
                lookup: Arc::clone(&lookup),
                default: None,
            },
            Step::LookupPrefix {
                lookup,
                default: Some("D".into()),
            },
            Step::IsInSet(set),
            Step::Next(1),
            Step::Prev(3),
            Step::Concat {
                prefix: "a".into(),
                postfix: "b".into(),
            },
        ]
        .iter()
        .map(ToString::to_string)
        .collect();
        assert_eq!(
            rendered,
            vec![
                "IsNull()",
                "Contains(foo)",
                "Down([1:5]version)",
                "Lookup(@Names ; default=null)",
                "LookupPrefix(@Names ; default=D)",
                "IsInSet(@Brands)",
                "Next()",
                "Prev(3)",
                "Concat(a;b)",
            ]
        );
    }
}
