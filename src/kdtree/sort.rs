use std::cmp::Ordering;

#[cfg(feature = "rayon")]
use rayon::slice::ParallelSliceMut;

use crate::kdtree::store::{NodeKey, NodeStore};
use crate::r#type::CoordNum;

/// Inputs shorter than this are sorted on the calling thread.
#[cfg(feature = "rayon")]
const PARALLEL_SORT_THRESHOLD: usize = 4096;

/// Sort node keys ascending by their coordinate on `axis`, ties by key.
///
/// Coordinates are copied out next to the keys before sorting; the store itself is never shared
/// across threads.
pub(crate) fn sort_by_axis<T, N: CoordNum>(
    store: &NodeStore<T, N>,
    keys: &mut [NodeKey],
    axis: usize,
) {
    let mut keyed: Vec<(N, NodeKey)> = keys
        .iter()
        .map(|&key| (store[key].coords()[axis], key))
        .collect();

    #[cfg(feature = "rayon")]
    {
        if keyed.len() >= PARALLEL_SORT_THRESHOLD {
            keyed.par_sort_unstable_by(|a, b| by_coord(a, b));
        } else {
            keyed.sort_unstable_by(|a, b| by_coord(a, b));
        }
    }

    #[cfg(not(feature = "rayon"))]
    {
        keyed.sort_unstable_by(|a, b| by_coord(a, b));
    }

    for (slot, (_, key)) in keys.iter_mut().zip(keyed) {
        *slot = key;
    }
}

#[inline]
fn by_coord<N: CoordNum>(a: &(N, NodeKey), b: &(N, NodeKey)) -> Ordering {
    a.0.axis_cmp(&b.0).then(a.1.cmp(&b.1))
}
