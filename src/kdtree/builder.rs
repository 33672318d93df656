use crate::error::{KdTreeError, Result};
use crate::kdtree::node::{Node, NodeId, TreeId};
use crate::kdtree::sort::sort_by_axis;
use crate::kdtree::store::{NodeKey, NodeStore};
use crate::kdtree::subtree::check_not_nan;
use crate::kdtree::{KdTree, Subtree};
use crate::r#type::CoordNum;

/// A builder to create a balanced [`KdTree`] from a set of points.
///
/// ```
/// use kd_index::kdtree::KdTreeBuilder;
///
/// let mut builder = KdTreeBuilder::<&str>::new();
/// let a = builder.add(vec![3., 6.], "a").unwrap();
/// builder.add(vec![17., 15.], "b").unwrap();
/// builder.add(vec![13., 15.], "c").unwrap();
/// let tree = builder.finish();
///
/// assert_eq!(tree.size(), 3);
/// assert_eq!(tree.find(&[3., 6.]).unwrap(), Some(a));
/// ```
#[derive(Debug)]
pub struct KdTreeBuilder<T, N: CoordNum = f64> {
    id: TreeId,
    store: NodeStore<T, N>,
    dimensions: Option<usize>,
}

impl<T, N: CoordNum> Default for KdTreeBuilder<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, N: CoordNum> KdTreeBuilder<T, N> {
    /// Create a new, empty builder.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create a new builder with room for `capacity` points.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            id: TreeId::next(),
            store: NodeStore::with_capacity(capacity),
            dimensions: None,
        }
    }

    /// Add a point to the index.
    ///
    /// The returned handle stays valid in the tree this builder produces.
    pub fn add(&mut self, coords: impl Into<Vec<N>>, payload: T) -> Result<NodeId> {
        self.add_node(Node::new(coords, payload))
    }

    /// Add a free-standing node to the index.
    ///
    /// All nodes must have the same, non-zero number of coordinates, and none of them may be NaN.
    pub fn add_node(&mut self, node: Node<T, N>) -> Result<NodeId> {
        let found = node.coords.len();
        match self.dimensions {
            _ if found == 0 => return Err(KdTreeError::ZeroDimensions),
            Some(expected) if expected != found => {
                return Err(KdTreeError::DimensionMismatch { expected, found })
            }
            _ => check_not_nan(&node.coords)?,
        }
        self.dimensions = Some(found);

        let key = self.store.insert(node, 0);
        Ok(NodeId {
            tree: self.id,
            key,
            stamp: self.store[key].stamp(),
        })
    }

    /// The number of points added so far.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Returns `true` if no points were added.
    pub fn is_empty(&self) -> bool {
        self.store.len() == 0
    }

    /// Consume this builder, performing the median split and generating a tree ready for queries.
    pub fn finish(self) -> KdTree<T, N> {
        KdTree::from(self.finish_subtree())
    }

    /// Like [`finish`][Self::finish], but without the lock. Use this to build a subtree that
    /// will be grafted into another tree.
    pub fn finish_subtree(mut self) -> Subtree<T, N> {
        let root = self.dimensions.and_then(|dimensions| {
            let mut keys: Vec<NodeKey> = self.store.keys().collect();
            build_recursive(&mut self.store, &mut keys, dimensions, 0, None)
        });
        tracing::debug!(tree = ?self.id, nodes = self.store.len(), "built tree");
        Subtree::from_parts(self.id, self.dimensions, root, self.store)
    }
}

/// Link `keys` into a k-d tree by recursive median split, returning the root key.
///
/// Every key is placed exactly once and all previous links are overwritten, so this is also how
/// an existing tree is rebalanced. Call with `depth = 0, parent = None`.
pub(crate) fn build_recursive<T, N: CoordNum>(
    store: &mut NodeStore<T, N>,
    keys: &mut [NodeKey],
    dimensions: usize,
    depth: usize,
    parent: Option<NodeKey>,
) -> Option<NodeKey> {
    let axis = depth % dimensions;

    let (root, left, right) = match keys.len() {
        0 => return None,
        1 => (keys[0], None, None),
        len => {
            sort_by_axis(store, keys, axis);

            // lower median
            let mut median = len / 2 - 1;
            // equal values on the splitting axis must all go right
            let split = store[keys[median]].coords()[axis];
            while median > 0 && store[keys[median - 1]].coords()[axis] == split {
                median -= 1;
            }

            let (before, rest) = keys.split_at_mut(median);
            let root = rest[0];
            let after = &mut rest[1..];
            let left = build_recursive(store, before, dimensions, depth + 1, Some(root));
            let right = build_recursive(store, after, dimensions, depth + 1, Some(root));
            (root, left, right)
        }
    };

    let node = &mut store[root];
    node.set_axis(axis);
    node.parent = parent;
    node.left = left;
    node.right = right;
    Some(root)
}
