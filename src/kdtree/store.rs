//! Storage for the nodes adopted by a tree.

use std::fmt;

use slab::Slab;

use crate::kdtree::node::{DisplayCoords, Node};
use crate::r#type::CoordNum;

/// Key of a node inside a [`NodeStore`].
pub(crate) type NodeKey = usize;

/// A node adopted by a tree.
///
/// The coordinates and payload belong to the caller; the axis and links are owned by the tree
/// and can only be read.
#[derive(Debug, Clone)]
pub struct TreeNode<T, N: CoordNum = f64> {
    coords: Vec<N>,
    payload: T,

    /// Axis for plane of bisection for this node, determined when added to a tree.
    axis: usize,
    stamp: u64,

    /// `None` for the tree root.
    pub(crate) parent: Option<NodeKey>,
    /// Nodes < coords on this axis.
    pub(crate) left: Option<NodeKey>,
    /// Nodes >= coords on this axis.
    pub(crate) right: Option<NodeKey>,
}

impl<T, N: CoordNum> TreeNode<T, N> {
    /// The point of this node.
    pub fn coords(&self) -> &[N] {
        &self.coords
    }

    /// The caller data attached to this node.
    pub fn payload(&self) -> &T {
        &self.payload
    }

    pub(crate) fn payload_mut(&mut self) -> &mut T {
        &mut self.payload
    }

    /// The discriminating axis of this node.
    pub fn axis(&self) -> usize {
        self.axis
    }

    pub(crate) fn set_axis(&mut self, axis: usize) {
        self.axis = axis;
    }

    pub(crate) fn stamp(&self) -> u64 {
        self.stamp
    }

    /// Returns `true` if this node has no children.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    /// The coordinate of this node on its own discriminating axis.
    #[inline]
    pub(crate) fn split_value(&self) -> N {
        self.coords[self.axis]
    }

    pub(crate) fn into_node(self) -> Node<T, N> {
        Node {
            coords: self.coords,
            payload: self.payload,
        }
    }
}

impl<T, N: CoordNum> fmt::Display for TreeNode<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[ {}: axis = {} ]",
            DisplayCoords(&self.coords),
            self.axis
        )
    }
}

/// A slab of tree nodes.
///
/// Slab keys get reused after a removal, so every adoption is also given a fresh stamp; a
/// [`NodeId`][crate::kdtree::NodeId] only matches while both key and stamp agree.
#[derive(Debug, Clone)]
pub(crate) struct NodeStore<T, N: CoordNum> {
    nodes: Slab<TreeNode<T, N>>,
    next_stamp: u64,
}

impl<T, N: CoordNum> NodeStore<T, N> {
    pub(crate) fn new() -> Self {
        Self::with_capacity(0)
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Slab::with_capacity(capacity),
            next_stamp: 0,
        }
    }

    /// The number of nodes in the store.
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Adopt a free-standing node. It starts out without links.
    pub(crate) fn insert(&mut self, node: Node<T, N>, axis: usize) -> NodeKey {
        let stamp = self.next_stamp;
        self.next_stamp += 1;
        self.nodes.insert(TreeNode {
            coords: node.coords,
            payload: node.payload,
            axis,
            stamp,
            parent: None,
            left: None,
            right: None,
        })
    }

    /// Disown a node. Its links are dropped with it.
    pub(crate) fn remove(&mut self, key: NodeKey) -> TreeNode<T, N> {
        self.nodes.remove(key)
    }

    pub(crate) fn get(&self, key: NodeKey) -> Option<&TreeNode<T, N>> {
        self.nodes.get(key)
    }

    pub(crate) fn get_mut(&mut self, key: NodeKey) -> Option<&mut TreeNode<T, N>> {
        self.nodes.get_mut(key)
    }

    /// Returns `true` if `key` is occupied by the adoption identified by `stamp`.
    pub(crate) fn contains(&self, key: NodeKey, stamp: u64) -> bool {
        self.nodes.get(key).is_some_and(|n| n.stamp == stamp)
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = NodeKey> + '_ {
        self.nodes.iter().map(|(key, _)| key)
    }

    /// Drop every link of a node, leaving it free-standing inside the store.
    pub(crate) fn clear_links(&mut self, key: NodeKey) {
        let node = &mut self.nodes[key];
        node.parent = None;
        node.left = None;
        node.right = None;
    }
}

impl<T, N: CoordNum> std::ops::Index<NodeKey> for NodeStore<T, N> {
    type Output = TreeNode<T, N>;

    fn index(&self, key: NodeKey) -> &Self::Output {
        &self.nodes[key]
    }
}

impl<T, N: CoordNum> std::ops::IndexMut<NodeKey> for NodeStore<T, N> {
    fn index_mut(&mut self, key: NodeKey) -> &mut Self::Output {
        &mut self.nodes[key]
    }
}
