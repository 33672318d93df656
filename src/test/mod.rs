use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};


pub(crate) fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Uniform random points in `[0, 1)^dimensions`.
pub(crate) fn random_points(rng: &mut impl Rng, count: usize, dimensions: usize) -> Vec<Vec<f64>> {
    (0..count)
        .map(|_| (0..dimensions).map(|_| rng.gen::<f64>()).collect())
        .collect()
}

/// Route `tracing` output to the test harness. Safe to call from every test.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}
