//! User-Agent syntax tree.
//!
//! The tree is produced once per parse by [`parser::parse`] and only read
//! afterwards: the flattener walks it to produce path events and walk-list
//! steps navigate it. Nodes live in an arena and are addressed by [`NodeId`].
//!
//! - [`parser`] - tokenization and parsing of the User-Agent grammar
//! - [`hacks`] - ordered string repairs applied before parsing
//! - [`flattener`] - conversion of a tree into `(path, value)` events

pub mod flattener;
pub mod hacks;
pub mod parser;

pub use flattener::{FlattenEvent, FlattenRecorder, UserAgentTreeFlattener};

use std::fmt;

/// Index of a node in its [`SyntaxTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

/// The three independently numbered families of children.
///
/// Versions and comment blocks are counted separately so that adding one
/// never shifts the ordinals of the other children of the same parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterClass {
    Child,
    Version,
    Comment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Agent,
    Product,
    Name,
    Version,
    Comments,
    Entry,
    Text,
    Url,
    Email,
    KeyValue,
    Key,
    Value,
    Uuid,
    Base64,
}

impl NodeKind {
    pub const ALL: [NodeKind; 14] = [
        NodeKind::Agent,
        NodeKind::Product,
        NodeKind::Name,
        NodeKind::Version,
        NodeKind::Comments,
        NodeKind::Entry,
        NodeKind::Text,
        NodeKind::Url,
        NodeKind::Email,
        NodeKind::KeyValue,
        NodeKind::Key,
        NodeKind::Value,
        NodeKind::Uuid,
        NodeKind::Base64,
    ];

    /// The name used for this kind in paths and walk expressions.
    pub fn name(self) -> &'static str {
        match self {
            NodeKind::Agent => "agent",
            NodeKind::Product => "product",
            NodeKind::Name => "name",
            NodeKind::Version => "version",
            NodeKind::Comments => "comments",
            NodeKind::Entry => "entry",
            NodeKind::Text => "text",
            NodeKind::Url => "url",
            NodeKind::Email => "email",
            NodeKind::KeyValue => "keyvalue",
            NodeKind::Key => "key",
            NodeKind::Value => "value",
            NodeKind::Uuid => "uuid",
            NodeKind::Base64 => "base64",
        }
    }

    pub fn from_name(name: &str) -> Option<NodeKind> {
        NodeKind::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn counter_class(self) -> CounterClass {
        match self {
            NodeKind::Version => CounterClass::Version,
            NodeKind::Comments => CounterClass::Comment,
            _ => CounterClass::Child,
        }
    }

    /// Highest ordinal a `(*)` (or a missing range) expands to.
    ///
    /// These bound the number of hash entries a wildcard expression
    /// registers; real User-Agents stay well below them.
    pub fn max_range(self) -> u32 {
        match self {
            NodeKind::Agent | NodeKind::Name | NodeKind::Key => 1,
            NodeKind::Value | NodeKind::Comments | NodeKind::Email | NodeKind::Base64 => 2,
            NodeKind::KeyValue | NodeKind::Url => 3,
            NodeKind::Uuid => 4,
            NodeKind::Version => 5,
            NodeKind::Text => 8,
            NodeKind::Product => 10,
            NodeKind::Entry => 20,
        }
    }

    /// Nodes whose value can be addressed per word (`name[2-3]`).
    pub fn splits_into_words(self) -> bool {
        matches!(
            self,
            NodeKind::Agent
                | NodeKind::Product
                | NodeKind::Name
                | NodeKind::Version
                | NodeKind::Entry
                | NodeKind::Text
                | NodeKind::Key
                | NodeKind::Value
        )
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    start: usize,
    end: usize,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    ordinal: u32,
}

#[derive(Debug, Clone)]
pub struct SyntaxTree {
    text: String,
    nodes: Vec<Node>,
    has_syntax_error: bool,
}

impl SyntaxTree {
    /// A tree holding only the `agent` root spanning the whole text.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let end = text.len();
        Self {
            text,
            nodes: vec![Node {
                kind: NodeKind::Agent,
                start: 0,
                end,
                parent: None,
                children: Vec::new(),
                ordinal: 1,
            }],
            has_syntax_error: false,
        }
    }

    /// Append a child; its ordinal counts the earlier siblings of the same
    /// [`CounterClass`].
    pub fn add_child(&mut self, parent: NodeId, kind: NodeKind, start: usize, end: usize) -> NodeId {
        let class = kind.counter_class();
        let ordinal = self.nodes[parent.0]
            .children
            .iter()
            .filter(|child| self.nodes[child.0].kind.counter_class() == class)
            .count() as u32
            + 1;
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            start,
            end,
            parent: Some(parent),
            children: Vec::new(),
            ordinal,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn set_end(&mut self, node: NodeId, end: usize) {
        self.nodes[node.0].end = end;
    }

    pub fn mark_syntax_error(&mut self) {
        self.has_syntax_error = true;
    }

    pub fn has_syntax_error(&self) -> bool {
        self.has_syntax_error
    }

    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The full input text the tree was parsed from.
    pub fn input(&self) -> &str {
        &self.text
    }

    pub fn kind(&self, node: NodeId) -> NodeKind {
        self.nodes[node.0].kind
    }

    /// Source text covered by the node.
    pub fn text(&self, node: NodeId) -> &str {
        let node = &self.nodes[node.0];
        self.text.get(node.start..node.end).unwrap_or("")
    }

    pub fn span(&self, node: NodeId) -> (usize, usize) {
        let node = &self.nodes[node.0];
        (node.start, node.end)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    /// 1-based position among the siblings of the same counter class.
    pub fn ordinal(&self, node: NodeId) -> u32 {
        self.nodes[node.0].ordinal
    }

    /// The sibling `offset` places away (negative is backwards).
    pub fn sibling(&self, node: NodeId, offset: isize) -> Option<NodeId> {
        let parent = self.parent(node)?;
        let siblings = self.children(parent);
        let position = siblings.iter().position(|&sibling| sibling == node)?;
        let target = position as isize + offset;
        if target < 0 {
            return None;
        }
        siblings.get(target as usize).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_round_trip() {
        for kind in NodeKind::ALL {
            assert_eq!(NodeKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(NodeKind::from_name("nonsense"), None);
        assert_eq!(NodeKind::from_name("Product"), None);
    }

    #[test]
    fn test_ordinals_per_counter_class() {
        let mut tree = SyntaxTree::new("Foo/1.0/2.0 (a) (b)");
        let product = tree.add_child(tree.root(), NodeKind::Product, 0, 19);
        let name = tree.add_child(product, NodeKind::Name, 0, 3);
        let v1 = tree.add_child(product, NodeKind::Version, 4, 7);
        let v2 = tree.add_child(product, NodeKind::Version, 8, 11);
        let c1 = tree.add_child(product, NodeKind::Comments, 12, 15);
        let c2 = tree.add_child(product, NodeKind::Comments, 16, 19);

        assert_eq!(tree.ordinal(name), 1);
        assert_eq!(tree.ordinal(v1), 1);
        assert_eq!(tree.ordinal(v2), 2);
        assert_eq!(tree.ordinal(c1), 1);
        assert_eq!(tree.ordinal(c2), 2);
        assert_eq!(tree.text(v2), "2.0");
        assert_eq!(tree.text(c2), "(b)");
    }

    #[test]
    fn test_navigation() {
        let mut tree = SyntaxTree::new("a b c");
        let root = tree.root();
        let a = tree.add_child(root, NodeKind::Text, 0, 1);
        let b = tree.add_child(root, NodeKind::Text, 2, 3);
        let c = tree.add_child(root, NodeKind::Text, 4, 5);

        assert_eq!(tree.parent(b), Some(root));
        assert_eq!(tree.parent(root), None);
        assert_eq!(tree.sibling(a, 2), Some(c));
        assert_eq!(tree.sibling(c, -1), Some(b));
        assert_eq!(tree.sibling(a, -1), None);
        assert_eq!(tree.sibling(c, 1), None);
        assert_eq!(tree.sibling(root, 1), None);
        assert_eq!(tree.text(root), "a b c");
    }
}
