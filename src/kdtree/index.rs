use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

use crate::error::Result;
use crate::kdtree::builder::KdTreeBuilder;
use crate::kdtree::node::{Node, NodeId, TreeId};
use crate::kdtree::search::RangeQuery;
use crate::kdtree::store::TreeNode;
use crate::kdtree::Subtree;
use crate::r#type::CoordNum;

/// A k-d tree that can be shared between threads.
///
/// Every operation goes through a single readers/writer lock. Lookups, range searches and the
/// other readers share it, even while a writer is waiting. [`insert`][Self::insert],
/// [`graft`][Self::graft], [`remove`][Self::remove], [`balance`][Self::balance] and
/// [`payload_mut`][Self::payload_mut] hold it exclusively for their whole duration. Every call
/// completes before returning and no operation spawns background work.
///
/// Usually this will be created from scratch via [`KdTreeBuilder`], or grown from
/// [`KdTree::new`] by insertion.
#[derive(Debug)]
pub struct KdTree<T, N: CoordNum = f64> {
    inner: RwLock<Subtree<T, N>>,
}

impl<T, N: CoordNum> Default for KdTree<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, N: CoordNum> From<Subtree<T, N>> for KdTree<T, N> {
    fn from(subtree: Subtree<T, N>) -> Self {
        Self {
            inner: RwLock::new(subtree),
        }
    }
}

impl<T, N: CoordNum> KdTree<T, N> {
    /// Create an empty tree. Its dimension is fixed by the first node inserted.
    pub fn new() -> Self {
        Self::from(Subtree::new())
    }

    /// Build a balanced tree from a list of nodes.
    pub fn build(nodes: impl IntoIterator<Item = Node<T, N>>) -> Result<Self> {
        let nodes = nodes.into_iter();
        let mut builder = KdTreeBuilder::with_capacity(nodes.size_hint().0);
        for node in nodes {
            builder.add_node(node)?;
        }
        Ok(builder.finish())
    }

    /// Take the tree out of its lock. Handles stay valid.
    pub fn into_subtree(self) -> Subtree<T, N> {
        self.inner.into_inner()
    }

    /// The identifier carried by every handle this tree hands out.
    pub fn id(&self) -> TreeId {
        self.inner.read_recursive().id()
    }

    /// Lock the tree for reading and access all of it at once.
    ///
    /// Everything read through the guard is one consistent snapshot. Writers block until the
    /// guard is dropped; other readers, on this thread too, don't.
    pub fn read(&self) -> RwLockReadGuard<'_, Subtree<T, N>> {
        self.inner.read_recursive()
    }

    /// Lock the tree for writing.
    ///
    /// Don't call any other method of this tree on the same thread while the guard lives.
    pub fn write(&self) -> RwLockWriteGuard<'_, Subtree<T, N>> {
        self.inner.write()
    }

    /// Adopt a free-standing node as a new leaf.
    ///
    /// The first node of an empty tree becomes the root and fixes the dimension. Fails with
    /// [`DimensionMismatch`][crate::KdTreeError::DimensionMismatch] if the node has a different
    /// number of coordinates than the tree.
    #[tracing::instrument(level = "debug", skip_all, fields(tree = ?self.id()))]
    pub fn insert(&self, node: Node<T, N>) -> Result<NodeId> {
        self.inner.write().insert(node)
    }

    /// Merge a whole subtree into this tree, node by node.
    ///
    /// **This consumes `subtree`**: each of its nodes is detached and re-inserted here, children
    /// before parents. Clone it first to keep a copy. Returns each node's old handle paired with
    /// its new one.
    #[tracing::instrument(level = "debug", skip_all, fields(tree = ?self.id(), nodes = subtree.len()))]
    pub fn graft(&self, subtree: Subtree<T, N>) -> Result<Vec<(NodeId, NodeId)>> {
        self.inner.write().graft(subtree)
    }

    /// Remove a member node, handing its point and payload back.
    ///
    /// Fails with [`NotAMember`][crate::KdTreeError::NotAMember] if `id` isn't a current member of
    /// this tree. The descendants of the removed node are re-inserted, so this costs time
    /// proportional to the size of its subtree.
    #[tracing::instrument(level = "debug", skip_all, fields(tree = ?self.id()))]
    pub fn remove(&self, id: NodeId) -> Result<Node<T, N>> {
        self.inner.write().remove(id)
    }

    /// Rebuild the tree from its current nodes with the median-split builder.
    ///
    /// The root may change; handles stay valid.
    #[tracing::instrument(level = "debug", skip_all, fields(tree = ?self.id()))]
    pub fn balance(&self) {
        let mut inner = self.inner.write();
        let before = inner.depth();
        inner.balance();
        tracing::debug!(before, after = inner.depth(), nodes = inner.len(), "rebalanced");
    }

    /// Searches the tree for the node at exactly `coords`.
    pub fn find(&self, coords: &[N]) -> Result<Option<NodeId>> {
        self.inner.read_recursive().find(coords)
    }

    /// Searches the tree for every node satisfying all restrictions of `query`.
    pub fn find_range(&self, query: &RangeQuery<N>) -> Result<Vec<NodeId>> {
        self.inner.read_recursive().find_range(query)
    }

    /// The number of nodes in the tree.
    pub fn size(&self) -> usize {
        self.inner.read_recursive().len()
    }

    /// Returns `true` if the tree has no nodes.
    pub fn is_empty(&self) -> bool {
        self.inner.read_recursive().is_empty()
    }

    /// The number of coordinates of every point, or `None` while the tree is empty.
    pub fn dimensions(&self) -> Option<usize> {
        self.inner.read_recursive().dimensions()
    }

    /// Returns depth of the deepest branch of this tree.
    pub fn depth(&self) -> usize {
        self.inner.read_recursive().depth()
    }

    /// Every node of the tree, in no particular order.
    pub fn node_list(&self) -> Vec<NodeId> {
        self.inner.read_recursive().node_list()
    }

    /// Checks that the tree is a valid k-d tree. Returns an error if there are problems.
    pub fn validate(&self) -> Result<()> {
        self.inner.read_recursive().validate()
    }

    /// Performs a left depth first post-order traversal, running `f` on every node found.
    ///
    /// The tree is locked for reading while `f` runs. `f` may call readers of this tree, but a
    /// writer called from `f` never returns.
    pub fn traverse<F>(&self, f: F)
    where
        F: FnMut(NodeId, &TreeNode<T, N>),
    {
        self.inner.read_recursive().traverse(f)
    }

    /// The current root of the tree.
    pub fn root(&self) -> Option<NodeId> {
        self.inner.read_recursive().root()
    }

    /// Finds the root of the tree from an arbitrary member node.
    pub fn root_of(&self, id: NodeId) -> Result<NodeId> {
        self.inner.read_recursive().root_of(id)
    }

    /// Returns `true` if `id` refers to a current member of this tree.
    pub fn contains(&self, id: NodeId) -> bool {
        self.inner.read_recursive().contains(id)
    }

    /// The parent of a member node, `None` for the root.
    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>> {
        self.inner.read_recursive().parent(id)
    }

    /// The left and right children of a member node.
    pub fn children(&self, id: NodeId) -> Result<(Option<NodeId>, Option<NodeId>)> {
        self.inner.read_recursive().children(id)
    }

    /// The number of nodes below and including a member node.
    pub fn subtree_size(&self, id: NodeId) -> Result<usize> {
        self.inner.read_recursive().subtree_size(id)
    }

    /// Read access to a member node. The tree stays locked for reading while the guard lives, so
    /// writers on this thread must wait until it is dropped.
    pub fn get(&self, id: NodeId) -> Option<MappedRwLockReadGuard<'_, TreeNode<T, N>>> {
        RwLockReadGuard::try_map(self.inner.read_recursive(), |tree| tree.get(id)).ok()
    }

    /// Write access to the payload of a member node. The tree stays locked for writing while the
    /// guard lives.
    pub fn payload_mut(&self, id: NodeId) -> Option<MappedRwLockWriteGuard<'_, T>> {
        RwLockWriteGuard::try_map(self.inner.write(), |tree| tree.get_payload_mut(id)).ok()
    }
}
