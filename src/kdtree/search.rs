use std::collections::BTreeMap;

use tinyvec::TinyVec;

use crate::error::{KdTreeError, Result};
use crate::kdtree::node::NodeId;
use crate::kdtree::store::NodeKey;
use crate::kdtree::Subtree;
use crate::r#type::CoordNum;

/// A closed interval `[min, max]` on one axis.
///
/// Infinite bounds express one-sided restrictions. The caller is responsible for `min <= max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range<N: CoordNum = f64> {
    /// Inclusive lower bound.
    pub min: N,
    /// Inclusive upper bound.
    pub max: N,
}

impl<N: CoordNum> Range<N> {
    /// Create a new range from its bounds.
    pub fn new(min: N, max: N) -> Self {
        Self { min, max }
    }

    /// `[min, +inf]`
    pub fn at_least(min: N) -> Self {
        Self::new(min, N::infinity())
    }

    /// `[-inf, max]`
    pub fn at_most(max: N) -> Self {
        Self::new(N::neg_infinity(), max)
    }

    /// `[-inf, +inf]`
    pub fn unbounded() -> Self {
        Self::new(N::neg_infinity(), N::infinity())
    }

    /// Returns `true` if `value` lies within the range.
    #[inline]
    pub fn contains(&self, value: N) -> bool {
        self.min <= value && value <= self.max
    }
}

/// Restrictions for an orthogonal range search, keyed by axis.
///
/// Axes without a restriction are unrestricted. Restrictions are all required, so two ranges
/// that exclude each other produce an empty result.
///
/// ```
/// use kd_index::kdtree::{Range, RangeQuery};
///
/// let query = RangeQuery::new()
///     .with(0, Range::new(2., 9.))
///     .with(1, Range::at_least(5.));
/// assert!(query.matches(&[3., 6.]));
/// assert!(!query.matches(&[9., 1.]));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RangeQuery<N: CoordNum = f64> {
    restrictions: BTreeMap<usize, Range<N>>,
}

impl<N: CoordNum> Default for RangeQuery<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: CoordNum> RangeQuery<N> {
    /// A query without restrictions, matching every node.
    pub fn new() -> Self {
        Self {
            restrictions: BTreeMap::new(),
        }
    }

    /// Restrict `axis` to `range`, replacing any earlier restriction on that axis.
    pub fn with(mut self, axis: usize, range: Range<N>) -> Self {
        self.insert(axis, range);
        self
    }

    /// Restrict `axis` to `range`, returning the restriction it replaces.
    pub fn insert(&mut self, axis: usize, range: Range<N>) -> Option<Range<N>> {
        self.restrictions.insert(axis, range)
    }

    /// The restriction on `axis`, if any.
    pub fn get(&self, axis: usize) -> Option<&Range<N>> {
        self.restrictions.get(&axis)
    }

    /// Iterate over `(axis, range)` pairs in axis order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Range<N>)> {
        self.restrictions.iter().map(|(axis, range)| (*axis, range))
    }

    /// The number of restricted axes.
    pub fn len(&self) -> usize {
        self.restrictions.len()
    }

    /// Returns `true` if no axis is restricted.
    pub fn is_empty(&self) -> bool {
        self.restrictions.is_empty()
    }

    /// Returns `true` if a point satisfies every restriction. Axes beyond the point never match.
    pub fn matches(&self, coords: &[N]) -> bool {
        self.restrictions
            .iter()
            .all(|(axis, range)| coords.get(*axis).is_some_and(|v| range.contains(*v)))
    }

    /// One slot per axis, checked against the tree's dimensions.
    fn per_axis(&self, dimensions: usize) -> Result<Vec<Option<Range<N>>>> {
        let mut per_axis = vec![None; dimensions];
        for (axis, range) in self.iter() {
            if axis >= dimensions {
                return Err(KdTreeError::AxisOutOfRange { axis, dimensions });
            }
            per_axis[axis] = Some(*range);
        }
        Ok(per_axis)
    }
}

impl<N: CoordNum> FromIterator<(usize, Range<N>)> for RangeQuery<N> {
    fn from_iter<I: IntoIterator<Item = (usize, Range<N>)>>(iter: I) -> Self {
        Self {
            restrictions: iter.into_iter().collect(),
        }
    }
}

impl<T, N: CoordNum> Subtree<T, N> {
    /// Search the tree for the node at exactly `coords`.
    ///
    /// Comparison is exact IEEE equality without tolerance. If several nodes share the point, any
    /// one of them may be returned. An empty tree finds nothing.
    pub fn find(&self, coords: &[N]) -> Result<Option<NodeId>> {
        let Some(dimensions) = self.dimensions else {
            return Ok(None);
        };
        if coords.len() != dimensions {
            return Err(KdTreeError::DimensionMismatch {
                expected: dimensions,
                found: coords.len(),
            });
        }

        let mut current = self.root;
        while let Some(key) = current {
            let node = &self.store[key];
            let axis = node.axis();
            if coords[axis] < node.split_value() {
                current = node.left;
            } else {
                if coords[axis] == node.split_value() && coords == node.coords() {
                    return Ok(Some(self.node_id(key)));
                }
                // equal values on the splitting axis live right
                current = node.right;
            }
        }
        Ok(None)
    }

    /// Search the tree for every node satisfying all restrictions of `query`.
    ///
    /// Results come in left-then-self-then-right order of the descent, callers shouldn't rely on
    /// any particular order.
    pub fn find_range(&self, query: &RangeQuery<N>) -> Result<Vec<NodeId>> {
        let (Some(dimensions), Some(root)) = (self.dimensions, self.root) else {
            return Ok(vec![]);
        };
        let per_axis = query.per_axis(dimensions)?;

        let mut result = vec![];

        // Use TinyVec to avoid heap allocations
        let mut stack: TinyVec<[NodeKey; 64]> = TinyVec::new();
        let mut current = Some(root);
        loop {
            // walk down the left spine of whatever may still hold matches
            while let Some(key) = current {
                stack.push(key);
                let node = &self.store[key];
                let split = node.split_value();
                current = if per_axis[node.axis()].map_or(true, |r| r.min < split) {
                    node.left
                } else {
                    None
                };
            }

            let Some(key) = stack.pop() else {
                break;
            };
            let node = &self.store[key];
            let coords = node.coords();
            let included = per_axis
                .iter()
                .zip(coords)
                .all(|(range, v)| range.map_or(true, |r| r.contains(*v)));
            if included {
                result.push(self.node_id(key));
            }

            let split = node.split_value();
            current = if per_axis[node.axis()].map_or(true, |r| r.max >= split) {
                node.right
            } else {
                None
            };
        }

        Ok(result)
    }
}
