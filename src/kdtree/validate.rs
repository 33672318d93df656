use std::collections::HashSet;

use thiserror::Error;

use crate::error::Result;
use crate::kdtree::store::NodeKey;
use crate::kdtree::Subtree;
use crate::r#type::CoordNum;

/// The first structural problem found by [`Subtree::validate`].
///
/// Nodes are rendered as `[ ( x y ... ): axis = a ]`.
#[allow(missing_docs)]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A node whose point has the wrong number of coordinates.
    #[error("{node} has {found} dimensions in a tree of {expected} dimensions")]
    Dimensions {
        node: String,
        expected: usize,
        found: usize,
    },

    /// A node in the left subtree of `ancestor` that isn't strictly smaller on its axis.
    #[error("{node} is right of {ancestor} on axis {axis}")]
    RightOfAncestor {
        node: String,
        ancestor: String,
        axis: usize,
    },

    /// A node in the right subtree of `ancestor` that is smaller on its axis.
    #[error("{node} is left of {ancestor} on axis {axis}")]
    LeftOfAncestor {
        node: String,
        ancestor: String,
        axis: usize,
    },

    /// A child whose axis isn't its parent's axis + 1 (mod dimensions).
    #[error("child {child} axis isn't parent axis + 1 ({expected})")]
    AxisProgression { child: String, expected: usize },

    /// A child without a parent link.
    #[error("child {child} is missing parent {parent}")]
    MissingParent { child: String, parent: String },

    /// A child whose parent link points at some other node.
    #[error("child {child} has incorrect parent {found}, should be {expected}")]
    WrongParent {
        child: String,
        found: String,
        expected: String,
    },

    /// The root has a parent link.
    #[error("root {root} has a parent")]
    RootHasParent { root: String },

    /// A child link to a slot that holds no node.
    #[error("{node} links to a missing child")]
    DanglingChild { node: String },

    /// A node reachable along more than one path.
    #[error("{node} is reachable more than once")]
    Revisited { node: String },

    /// Nodes held by the tree that can't be reached from the root.
    #[error("{stored} nodes stored but {reachable} reachable from the root")]
    Unreachable { stored: usize, reachable: usize },
}

/// Tightest split constraints inherited from the ancestors of a node, per axis.
#[derive(Clone)]
struct Bounds<N> {
    /// From ancestors whose left subtree holds the node: coordinate must be `<` the value.
    below: Vec<Option<(N, NodeKey)>>,
    /// From ancestors whose right subtree holds the node: coordinate must be `>=` the value.
    at_least: Vec<Option<(N, NodeKey)>>,
}

impl<T, N: CoordNum> Subtree<T, N> {
    /// Checks that the tree is a valid k-d tree:
    /// - All descendants left of a node are < it on the node's axis.
    /// - All descendants right of a node are >= it on the node's axis.
    /// - All child axes are their parent's axis + 1 (mod # dimensions).
    /// - All children have the correct parent, and the root has none.
    /// - Every stored node is reached exactly once from the root.
    ///
    /// Returns an error describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        Ok(self.check()?)
    }

    fn check(&self) -> std::result::Result<(), ValidationError> {
        let Some(root) = self.root else {
            return match self.store.len() {
                0 => Ok(()),
                stored => Err(ValidationError::Unreachable {
                    stored,
                    reachable: 0,
                }),
            };
        };
        let dimensions = self
            .dimensions
            .unwrap_or_else(|| self.store[root].coords().len());
        let describe = |key: NodeKey| {
            self.store
                .get(key)
                .map_or_else(|| "<missing>".to_string(), |n| n.to_string())
        };

        if self.store[root].parent.is_some() {
            return Err(ValidationError::RootHasParent {
                root: describe(root),
            });
        }

        let mut visited = HashSet::with_capacity(self.store.len());
        let mut stack = vec![(
            root,
            Bounds::<N> {
                below: vec![None; dimensions],
                at_least: vec![None; dimensions],
            },
        )];

        while let Some((key, bounds)) = stack.pop() {
            if !visited.insert(key) {
                return Err(ValidationError::Revisited {
                    node: describe(key),
                });
            }
            let node = &self.store[key];
            let coords = node.coords();
            if coords.len() != dimensions {
                return Err(ValidationError::Dimensions {
                    node: describe(key),
                    expected: dimensions,
                    found: coords.len(),
                });
            }

            for axis in 0..dimensions {
                if let Some((split, ancestor)) = bounds.below[axis] {
                    // written this way so that NaN counts as a violation
                    if !(coords[axis] < split) {
                        return Err(ValidationError::RightOfAncestor {
                            node: describe(key),
                            ancestor: describe(ancestor),
                            axis,
                        });
                    }
                }
                if let Some((split, ancestor)) = bounds.at_least[axis] {
                    if coords[axis] < split {
                        return Err(ValidationError::LeftOfAncestor {
                            node: describe(key),
                            ancestor: describe(ancestor),
                            axis,
                        });
                    }
                }
            }

            let axis = node.axis();
            let split = node.split_value();
            let expected_axis = (axis + 1) % dimensions;
            for (child, is_left) in [(node.right, false), (node.left, true)] {
                let Some(child) = child else {
                    continue;
                };
                let Some(child_node) = self.store.get(child) else {
                    return Err(ValidationError::DanglingChild {
                        node: describe(key),
                    });
                };
                if child_node.axis() != expected_axis {
                    return Err(ValidationError::AxisProgression {
                        child: describe(child),
                        expected: expected_axis,
                    });
                }
                match child_node.parent {
                    None => {
                        return Err(ValidationError::MissingParent {
                            child: describe(child),
                            parent: describe(key),
                        })
                    }
                    Some(parent) if parent != key => {
                        return Err(ValidationError::WrongParent {
                            child: describe(child),
                            found: describe(parent),
                            expected: describe(key),
                        })
                    }
                    Some(_) => {}
                }

                let mut child_bounds = bounds.clone();
                if is_left {
                    match child_bounds.below[axis] {
                        Some((tightest, _)) if tightest <= split => {}
                        _ => child_bounds.below[axis] = Some((split, key)),
                    }
                } else {
                    match child_bounds.at_least[axis] {
                        Some((tightest, _)) if tightest >= split => {}
                        _ => child_bounds.at_least[axis] = Some((split, key)),
                    }
                }
                stack.push((child, child_bounds));
            }
        }

        if visited.len() != self.store.len() {
            return Err(ValidationError::Unreachable {
                stored: self.store.len(),
                reachable: visited.len(),
            });
        }
        Ok(())
    }
}
