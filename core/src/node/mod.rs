//! UI node tree
//!
//! A snapshot of the foreground window is flattened into an index-based arena.
//! Nodes are immutable once the tree is built; navigation goes through
//! `NodeId` handles and the per-node parent/children links.

mod raw;

pub use raw::RawNode;

use serde::{Deserialize, Serialize};

use crate::serde_defaults::default_true;

/// Handle to a node inside one `NodeTree`.
///
/// Only meaningful for the tree that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Screen bounds in pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

impl Rect {
    pub fn new(left: i64, top: i64, right: i64, bottom: i64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i64 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> i64 {
        self.bottom.saturating_sub(self.top)
    }

    pub fn center(&self) -> (i64, i64) {
        (midpoint(self.left, self.right), midpoint(self.top, self.bottom))
    }
}

fn midpoint(a: i64, b: i64) -> i64 {
    // The mean of two i64 values always fits back into i64
    ((i128::from(a) + i128::from(b)) / 2) as i64
}

/// Attributes a selector can test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeAttrs {
    /// View id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    /// Class name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Content description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(default)]
    pub bounds: Rect,
    #[serde(default)]
    pub clickable: bool,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub focusable: bool,
    #[serde(default)]
    pub checked: bool,
}

impl Default for NodeAttrs {
    fn default() -> Self {
        Self {
            id: None,
            package: None,
            name: None,
            text: None,
            desc: None,
            bounds: Rect::default(),
            clickable: false,
            visible: true,
            enabled: true,
            focusable: false,
            checked: false,
        }
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    attrs: NodeAttrs,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// Position among the parent's children
    index: usize,
    depth: usize,
    /// Levels in the subtree rooted here (a leaf is 1)
    height: usize,
}

// ═══════════════════════════════════════════════════════════════════════════
// Tree
// ═══════════════════════════════════════════════════════════════════════════

/// Arena-backed snapshot of a UI hierarchy. Node 0 is the root.
#[derive(Debug, Clone)]
pub struct NodeTree {
    nodes: Vec<NodeData>,
}

impl NodeTree {
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Levels in the whole tree
    pub fn height(&self) -> usize {
        self.subtree_height(self.root())
    }

    pub fn attrs(&self, id: NodeId) -> &NodeAttrs {
        &self.nodes[id.index()].attrs
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].children
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        self.nodes[id.index()].children.len()
    }

    pub fn index_in_parent(&self, id: NodeId) -> usize {
        self.nodes[id.index()].index
    }

    pub fn depth(&self, id: NodeId) -> usize {
        self.nodes[id.index()].depth
    }

    fn subtree_height(&self, id: NodeId) -> usize {
        self.nodes[id.index()].height
    }

    /// Ancestor `levels` steps up, `None` past the root
    pub fn ancestor(&self, id: NodeId, levels: usize) -> Option<NodeId> {
        let mut current = id;
        for _ in 0..levels {
            current = self.parent(current)?;
        }
        Some(current)
    }

    /// Sibling at `offset` positions from `id` (negative = before)
    pub fn sibling(&self, id: NodeId, offset: i64) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let position = self.index_in_parent(id) as i64 + offset;
        if position < 0 {
            return None;
        }
        self.children(parent).get(position as usize).copied()
    }

    /// Child indices from the root down to `id`. This is the node's identity
    /// across snapshots.
    pub fn path(&self, id: NodeId) -> Vec<usize> {
        let mut path = Vec::with_capacity(self.depth(id));
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            path.push(self.index_in_parent(current));
            current = parent;
        }
        path.reverse();
        path
    }

    pub fn node_at_path(&self, path: &[usize]) -> Option<NodeId> {
        path.iter()
            .try_fold(self.root(), |node, &i| self.children(node).get(i).copied())
    }

    /// Pre-order traversal of the subtree rooted at `from`
    pub fn pre_order(&self, from: NodeId) -> PreOrder<'_> {
        PreOrder {
            tree: self,
            stack: vec![from],
        }
    }
}

pub struct PreOrder<'a> {
    tree: &'a NodeTree,
    stack: Vec<NodeId>,
}

impl Iterator for PreOrder<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.tree.children(id).iter().rev().copied());
        Some(id)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Builder
// ═══════════════════════════════════════════════════════════════════════════

/// Incremental tree construction. Children are appended in order.
#[derive(Debug)]
pub struct NodeTreeBuilder {
    nodes: Vec<NodeData>,
}

impl NodeTreeBuilder {
    pub fn new(root: NodeAttrs) -> Self {
        Self {
            nodes: vec![NodeData {
                attrs: root,
                parent: None,
                children: Vec::new(),
                index: 0,
                depth: 0,
                height: 1,
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn add_child(&mut self, parent: NodeId, attrs: NodeAttrs) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let parent_data = &mut self.nodes[parent.index()];
        let index = parent_data.children.len();
        let depth = parent_data.depth + 1;
        parent_data.children.push(id);
        self.nodes.push(NodeData {
            attrs,
            parent: Some(parent),
            children: Vec::new(),
            index,
            depth,
            height: 1,
        });
        id
    }

    pub fn build(mut self) -> NodeTree {
        // Children always have larger ids than their parent
        for i in (1..self.nodes.len()).rev() {
            let height = self.nodes[i].height;
            if let Some(parent) = self.nodes[i].parent {
                let parent = &mut self.nodes[parent.index()];
                parent.height = parent.height.max(height + 1);
            }
        }
        NodeTree { nodes: self.nodes }
    }
}
