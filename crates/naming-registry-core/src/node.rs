//! Store nodes
//!
//! Every key in the store is either absent, a leaf holding a value, or a
//! directory holding children. Directories are created implicitly by the
//! store when a child key is written.

use serde::{Deserialize, Serialize};

/// A node returned by the store for a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvNode {
    /// Key as reported by the store (absolute, e.g. `/foo/bar`)
    pub key: String,
    /// Leaf value or directory children
    pub kind: NodeKind,
}

/// Leaf or directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum NodeKind {
    Leaf(String),
    Directory(Vec<KvNode>),
}

impl KvNode {
    pub fn leaf(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind: NodeKind::Leaf(value.into()),
        }
    }

    pub fn directory(key: impl Into<String>, children: Vec<KvNode>) -> Self {
        Self {
            key: key.into(),
            kind: NodeKind::Directory(children),
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Directory(_))
    }

    /// Leaf value, or `None` for a directory.
    pub fn value(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Leaf(value) => Some(value),
            NodeKind::Directory(_) => None,
        }
    }

    /// Leaf entries among the direct children of a directory.
    ///
    /// Returns nothing for a leaf node.
    pub fn child_leaves(&self) -> impl Iterator<Item = (&str, &str)> {
        let children: &[KvNode] = match &self.kind {
            NodeKind::Directory(children) => children,
            NodeKind::Leaf(_) => &[],
        };
        children.iter().filter_map(|child| match &child.kind {
            NodeKind::Leaf(value) => Some((child.key.as_str(), value.as_str())),
            NodeKind::Directory(_) => None,
        })
    }

    /// Leaf entries at any depth below this node, in store order.
    ///
    /// Only descends into children the store actually returned.
    pub fn descendant_leaves(&self) -> impl Iterator<Item = (&str, &str)> {
        let mut stack: Vec<&KvNode> = match &self.kind {
            NodeKind::Directory(children) => children.iter().rev().collect(),
            NodeKind::Leaf(_) => Vec::new(),
        };
        std::iter::from_fn(move || {
            while let Some(node) = stack.pop() {
                match &node.kind {
                    NodeKind::Leaf(value) => return Some((node.key.as_str(), value.as_str())),
                    NodeKind::Directory(children) => stack.extend(children.iter().rev()),
                }
            }
            None
        })
    }
}
