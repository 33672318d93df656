use thiserror::Error;

use crate::kdtree::ValidationError;

/// Enum with all errors in this crate.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KdTreeError {
    /// A point does not have as many coordinates as the tree has dimensions.
    #[error("node with {found} dimensions can't be used with a tree of {expected} dimensions")]
    DimensionMismatch { expected: usize, found: usize },

    /// A range restriction names an axis the tree doesn't have.
    #[error("range on axis {axis} exceeds tree dimensions ({dimensions})")]
    AxisOutOfRange { axis: usize, dimensions: usize },

    /// The node handle doesn't refer to a current member of this tree.
    #[error("node not a member of tree")]
    NotAMember,

    /// A point with no coordinates at all.
    #[error("points must have at least one dimension")]
    ZeroDimensions,

    /// A point with a NaN coordinate, which could never be found again.
    #[error("coordinate on axis {axis} is NaN")]
    NanCoordinate { axis: usize },

    /// The structure failed validation.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

pub type Result<T> = std::result::Result<T, KdTreeError>;
