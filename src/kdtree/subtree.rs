use crate::error::{KdTreeError, Result};
use crate::kdtree::builder::build_recursive;
use crate::kdtree::node::{Node, NodeId, TreeId};
use crate::kdtree::store::{NodeKey, NodeStore, TreeNode};
use crate::r#type::CoordNum;

/// A k-d tree without a lock around it.
///
/// This is what [`KdTreeBuilder`][crate::kdtree::KdTreeBuilder] produces, what
/// [`KdTree::graft`][crate::kdtree::KdTree::graft] consumes, and what a
/// [`KdTree`][crate::kdtree::KdTree] guards. A single owner can use it directly: every reader and
/// writer of the locked tree is available here on `&self` / `&mut self`.
///
/// Cloning a subtree deep-copies every node into a new tree with its own identifier. Handles
/// issued by the original are not members of the copy.
#[derive(Debug)]
pub struct Subtree<T, N: CoordNum = f64> {
    pub(crate) id: TreeId,
    /// `None` until the first node is adopted.
    pub(crate) dimensions: Option<usize>,
    pub(crate) root: Option<NodeKey>,
    pub(crate) store: NodeStore<T, N>,
}

impl<T: Clone, N: CoordNum> Clone for Subtree<T, N> {
    fn clone(&self) -> Self {
        Self::from_parts(
            TreeId::next(),
            self.dimensions,
            self.root,
            self.store.clone(),
        )
    }
}

impl<T, N: CoordNum> Default for Subtree<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, N: CoordNum> Subtree<T, N> {
    /// Create an empty tree with a pending dimension.
    pub fn new() -> Self {
        Self::from_parts(TreeId::next(), None, None, NodeStore::new())
    }

    pub(crate) fn from_parts(
        id: TreeId,
        dimensions: Option<usize>,
        root: Option<NodeKey>,
        store: NodeStore<T, N>,
    ) -> Self {
        Self {
            id,
            dimensions,
            root,
            store,
        }
    }

    /// The identifier carried by every handle this tree hands out.
    pub fn id(&self) -> TreeId {
        self.id
    }

    /// The number of coordinates of every point, or `None` while the tree is empty.
    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    /// The number of nodes in the tree.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Returns `true` if the tree has no nodes.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// The current root of the tree.
    pub fn root(&self) -> Option<NodeId> {
        self.root.map(|key| self.node_id(key))
    }

    /// Returns `true` if `id` refers to a current member of this tree.
    pub fn contains(&self, id: NodeId) -> bool {
        self.key_of(id).is_ok()
    }

    /// Access a member node.
    pub fn get(&self, id: NodeId) -> Option<&TreeNode<T, N>> {
        let key = self.key_of(id).ok()?;
        self.store.get(key)
    }

    /// Mutable access to the payload of a member node. Coordinates can't be changed in place.
    pub fn get_payload_mut(&mut self, id: NodeId) -> Option<&mut T> {
        let key = self.key_of(id).ok()?;
        self.store.get_mut(key).map(|n| n.payload_mut())
    }

    /// The parent of a member node, `None` for the root.
    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>> {
        let key = self.key_of(id)?;
        Ok(self.store[key].parent.map(|p| self.node_id(p)))
    }

    /// The left and right children of a member node.
    pub fn children(&self, id: NodeId) -> Result<(Option<NodeId>, Option<NodeId>)> {
        let key = self.key_of(id)?;
        let node = &self.store[key];
        Ok((
            node.left.map(|k| self.node_id(k)),
            node.right.map(|k| self.node_id(k)),
        ))
    }

    /// Adopt a free-standing node as a new leaf.
    ///
    /// The first node of an empty tree becomes the root on axis 0 and fixes the dimension. Every
    /// later node must have the same number of coordinates. NaN coordinates are rejected.
    /// Insertion never rebalances.
    pub fn insert(&mut self, node: Node<T, N>) -> Result<NodeId> {
        self.check_dimensions(node.coords.len())?;
        check_not_nan(&node.coords)?;
        let key = self.store.insert(node, 0);
        self.attach(key);
        Ok(self.node_id(key))
    }

    /// Merge another tree into this one, node by node.
    ///
    /// Every node of `other` is salvaged: its left subtree is re-inserted first, then its right
    /// subtree, then the node itself as a leaf. This is equivalent to inserting the same nodes one
    /// at a time in post-order.
    ///
    /// Returns the handle each node had in `other` paired with its new handle in this tree, in
    /// insertion order. Nothing is modified if the dimensions don't agree.
    pub fn graft(&mut self, mut other: Subtree<T, N>) -> Result<Vec<(NodeId, NodeId)>> {
        let (Some(dimensions), Some(other_root)) = (other.dimensions, other.root) else {
            return Ok(vec![]);
        };
        self.check_dimensions(dimensions)?;

        let order = other.post_order(other_root);
        let mut adopted = Vec::with_capacity(order.len());
        for old_key in order {
            let old_id = other.node_id(old_key);
            let node = other.store.remove(old_key).into_node();
            let key = self.store.insert(node, 0);
            self.attach(key);
            adopted.push((old_id, self.node_id(key)));
        }
        Ok(adopted)
    }

    /// Remove a member node, handing its point and payload back.
    ///
    /// Both children of the removed node are detached and their subtrees re-inserted starting at
    /// the removed node's parent. Removing the root promotes its right child (grafting the left
    /// subtree under it), or its only child. Removing the last node empties the tree and resets
    /// the dimension.
    pub fn remove(&mut self, id: NodeId) -> Result<Node<T, N>> {
        let key = self.key_of(id)?;
        let (parent, left, right) = {
            let target = &self.store[key];
            (target.parent, target.left, target.right)
        };

        match parent {
            Some(parent) => {
                let attached = {
                    let p = &self.store[parent];
                    p.left == Some(key) || p.right == Some(key)
                };
                if !attached {
                    let target = self.store[key].to_string();
                    let parent = self.store[parent].to_string();
                    tracing::error!(%target, %parent, "removal target not attached to its parent");
                    panic!("{target} to be removed not attached to its parent: {parent}");
                }
                // both checks, in case the parent links to it twice
                let p = &mut self.store[parent];
                if p.left == Some(key) {
                    p.left = None;
                }
                if p.right == Some(key) {
                    p.right = None;
                }
                self.store[key].parent = None;

                for child in [left, right].into_iter().flatten() {
                    self.store[child].parent = None;
                    let moved = self.reinsert_subtree(parent, child);
                    tracing::trace!(moved, "re-inserted orphaned subtree");
                }
            }
            None => {
                assert_eq!(
                    self.root,
                    Some(key),
                    "{} has no parent but is not the root",
                    self.store[key]
                );
                match (left, right) {
                    (Some(left), Some(right)) => {
                        self.store[right].parent = None;
                        self.store[left].parent = None;
                        self.root = Some(right);
                        let moved = self.reinsert_subtree(right, left);
                        tracing::trace!(moved, "re-inserted left subtree under promoted root");
                    }
                    (Some(child), None) | (None, Some(child)) => {
                        self.store[child].parent = None;
                        self.root = Some(child);
                    }
                    (None, None) => {
                        self.root = None;
                        self.dimensions = None;
                    }
                }
            }
        }

        Ok(self.store.remove(key).into_node())
    }

    /// Rebuild the whole tree with the median-split builder. Handles stay valid.
    pub fn balance(&mut self) {
        let Some(dimensions) = self.dimensions else {
            return;
        };
        let mut keys: Vec<NodeKey> = self.store.keys().collect();
        self.root = build_recursive(&mut self.store, &mut keys, dimensions, 0, None);
    }

    pub(crate) fn node_id(&self, key: NodeKey) -> NodeId {
        NodeId {
            tree: self.id,
            key,
            stamp: self.store[key].stamp(),
        }
    }

    pub(crate) fn key_of(&self, id: NodeId) -> Result<NodeKey> {
        if id.tree == self.id && self.store.contains(id.key, id.stamp) {
            Ok(id.key)
        } else {
            Err(KdTreeError::NotAMember)
        }
    }

    /// Check that a point with `found` coordinates may join this tree.
    pub(crate) fn check_dimensions(&self, found: usize) -> Result<()> {
        if found == 0 {
            return Err(KdTreeError::ZeroDimensions);
        }
        match self.dimensions {
            Some(expected) if expected != found => {
                Err(KdTreeError::DimensionMismatch { expected, found })
            }
            _ => Ok(()),
        }
    }

    /// Attach a link-free stored node as a leaf, descending from the root.
    fn attach(&mut self, key: NodeKey) {
        match self.root {
            Some(root) => self.attach_below(root, key),
            None => {
                self.dimensions = Some(self.store[key].coords().len());
                self.store[key].set_axis(0);
                self.root = Some(key);
            }
        }
    }

    /// Attach a link-free stored node as a leaf, descending from `start`.
    fn attach_below(&mut self, start: NodeKey, key: NodeKey) {
        let mut current = start;
        loop {
            let (go_left, next) = {
                let node = &self.store[current];
                let axis = node.axis();
                if self.store[key].coords()[axis] < node.split_value() {
                    (true, node.left)
                } else {
                    (false, node.right)
                }
            };
            match next {
                Some(child) => current = child,
                None => {
                    let axis = (self.store[current].axis() + 1) % self.store[key].coords().len();
                    let parent = &mut self.store[current];
                    if go_left {
                        parent.left = Some(key);
                    } else {
                        parent.right = Some(key);
                    }
                    let node = &mut self.store[key];
                    node.set_axis(axis);
                    node.parent = Some(current);
                    return;
                }
            }
        }
    }

    /// Re-insert every node of the detached subtree rooted at `top`, descending from `entry`.
    ///
    /// Children go before their parent, so each node is attached as a leaf. Returns the number of
    /// nodes moved.
    fn reinsert_subtree(&mut self, entry: NodeKey, top: NodeKey) -> usize {
        let order = self.post_order(top);
        for &key in &order {
            self.store.clear_links(key);
            self.attach_below(entry, key);
        }
        order.len()
    }
}

/// Reject points that have a NaN coordinate.
pub(crate) fn check_not_nan<N: CoordNum>(coords: &[N]) -> Result<()> {
    match coords.iter().position(|c| c.is_nan()) {
        Some(axis) => Err(KdTreeError::NanCoordinate { axis }),
        None => Ok(()),
    }
}
