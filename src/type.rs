use std::cmp::Ordering;
use std::fmt::{Debug, Display};

use num_traits::Float;

/// A trait for types that can be used as point coordinates.
///
/// This trait is sealed and cannot be implemented for external types. Comparisons inside the tree
/// are bit-exact IEEE comparisons, so only the two native float widths are supported.
pub trait CoordNum:
    private::Sealed + Float + Debug + Display + Default + Send + Sync + 'static
{
    /// Total order used when sorting nodes along an axis.
    ///
    /// Agrees with `partial_cmp` for every non-NaN value and places NaN after everything else, so
    /// that sorting never observes an inconsistent comparator.
    #[inline]
    fn axis_cmp(&self, other: &Self) -> Ordering {
        match (self.is_nan(), other.is_nan()) {
            (false, false) => self.partial_cmp(other).unwrap_or(Ordering::Equal),
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
        }
    }
}

impl CoordNum for f32 {}

impl CoordNum for f64 {}

// https://rust-lang.github.io/api-guidelines/future-proofing.html#sealed-traits-protect-against-downstream-implementations-c-sealed
mod private {
    pub trait Sealed {}

    impl Sealed for f32 {}
    impl Sealed for f64 {}
}
