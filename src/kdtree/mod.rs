//! A mutable, thread-safe K-D Tree.
//!
//! Nodes live in an arena owned by their tree and are addressed through copyable [`NodeId`]
//! handles. A [`KdTree`] wraps the arena-backed [`Subtree`] in a readers/writer lock; a
//! [`KdTreeBuilder`] produces either of them balanced from a set of points.

#![warn(missing_docs)]

mod builder;
mod index;
mod node;
mod search;
mod sort;
mod store;
mod subtree;
mod traversal;
mod validate;

pub use builder::KdTreeBuilder;
pub use index::KdTree;
pub use node::{Node, NodeId, TreeId};
pub use search::{Range, RangeQuery};
pub use store::TreeNode;
pub use subtree::Subtree;
pub use validate::ValidationError;

#[cfg(test)]
mod test;
