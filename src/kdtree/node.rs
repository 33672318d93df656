use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::r#type::CoordNum;

static NEXT_TREE_ID: AtomicU64 = AtomicU64::new(0);

/// A process-unique identifier of one tree (or one builder).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TreeId(u64);

impl TreeId {
    pub(crate) fn next() -> Self {
        Self(NEXT_TREE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A handle onto a node adopted by a tree.
///
/// Handles are cheap to copy and compare by identity: two handles are equal only if they refer to
/// the same adoption of a node by the same tree. Once a node is removed its handle never becomes
/// valid again, even though the tree may reuse the storage slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    pub(crate) tree: TreeId,
    pub(crate) key: usize,
    pub(crate) stamp: u64,
}

impl NodeId {
    /// The tree that adopted this node.
    pub fn tree(&self) -> TreeId {
        self.tree
    }
}

/// A free-standing node: a point and the caller's payload, not attached to any tree.
///
/// This is what gets handed to [`KdTree::insert`][crate::kdtree::KdTree::insert] and what
/// [`KdTree::remove`][crate::kdtree::KdTree::remove] hands back.
#[derive(Debug, Clone, PartialEq)]
pub struct Node<T, N: CoordNum = f64> {
    /// The point.
    pub coords: Vec<N>,
    /// Opaque caller data.
    pub payload: T,
}

impl<T, N: CoordNum> Node<T, N> {
    /// Create a new node from a set of coordinates and a payload.
    pub fn new(coords: impl Into<Vec<N>>, payload: T) -> Self {
        Self {
            coords: coords.into(),
            payload,
        }
    }

    /// The number of coordinates of this node.
    pub fn dimensions(&self) -> usize {
        self.coords.len()
    }
}

/// Formats a point the way nodes render it: `( 3 6.5 )`.
pub(crate) struct DisplayCoords<'a, N>(pub(crate) &'a [N]);

impl<N: CoordNum> fmt::Display for DisplayCoords<'_, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for c in self.0 {
            write!(f, " {}", c)?;
        }
        f.write_str(" )")
    }
}
