//! Utilities to traverse the KdTree structure.

use tinyvec::TinyVec;

use crate::error::Result;
use crate::kdtree::node::NodeId;
use crate::kdtree::store::{NodeKey, TreeNode};
use crate::kdtree::Subtree;
use crate::r#type::CoordNum;

impl<T, N: CoordNum> Subtree<T, N> {
    /// Left-first depth-first post-order visit of every node.
    ///
    /// Both subtrees of a node are visited before the node itself, left before right.
    pub fn traverse<F>(&self, mut f: F)
    where
        F: FnMut(NodeId, &TreeNode<T, N>),
    {
        if let Some(root) = self.root {
            self.visit_post_order(root, |key| f(self.node_id(key), &self.store[key]));
        }
    }

    /// Every node of the tree, in post-order.
    pub fn node_list(&self) -> Vec<NodeId> {
        let mut nodes = Vec::with_capacity(self.len());
        self.traverse(|id, _| nodes.push(id));
        nodes
    }

    /// The number of nodes on the longest root-to-leaf path. `0` for an empty tree.
    pub fn depth(&self) -> usize {
        self.root.map_or(0, |root| self.depth_below(root))
    }

    /// The number of nodes in the subtree rooted at a member node, itself included.
    pub fn subtree_size(&self, id: NodeId) -> Result<usize> {
        let key = self.key_of(id)?;
        let mut size = 0;
        self.visit_post_order(key, |_| size += 1);
        Ok(size)
    }

    /// Find the root of the tree from an arbitrary member node by following parent links.
    pub fn root_of(&self, id: NodeId) -> Result<NodeId> {
        let mut key = self.key_of(id)?;
        while let Some(parent) = self.store[key].parent {
            key = parent;
        }
        Ok(self.node_id(key))
    }

    /// Keys of the subtree rooted at `top`, in post-order.
    pub(crate) fn post_order(&self, top: NodeKey) -> Vec<NodeKey> {
        let mut keys = vec![];
        self.visit_post_order(top, |key| keys.push(key));
        keys
    }

    pub(crate) fn visit_post_order(&self, top: NodeKey, mut f: impl FnMut(NodeKey)) {
        // (key, children already queued)
        let mut stack: TinyVec<[(NodeKey, bool); 64]> = TinyVec::new();
        stack.push((top, false));

        while let Some((key, expanded)) = stack.pop() {
            if expanded {
                f(key);
                continue;
            }
            stack.push((key, true));
            // Note: pushed in backwards order to what gets popped
            let node = &self.store[key];
            if let Some(right) = node.right {
                stack.push((right, false));
            }
            if let Some(left) = node.left {
                stack.push((left, false));
            }
        }
    }

    fn depth_below(&self, top: NodeKey) -> usize {
        let mut stack: TinyVec<[(NodeKey, usize); 64]> = TinyVec::new();
        stack.push((top, 1));

        let mut deepest = 0;
        while let Some((key, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            let node = &self.store[key];
            for child in [node.left, node.right].into_iter().flatten() {
                stack.push((child, depth + 1));
            }
        }
        deepest
    }
}
