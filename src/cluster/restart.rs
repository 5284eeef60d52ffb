//! Best-of-m restart selection.
//!
//! Clustering objectives are non-convex, so a single randomized run can land
//! in a poor local optimum. A `Clusterer` is run `m` times from fresh
//! `proto()` instances and the lowest-cost result is kept.
//!
//! Randomness is always passed in (an `Rng`, or a seed for the parallel
//! variant) so results are reproducible.

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;

/// A randomized clustering procedure.
pub trait Clusterer: Sized {
    /// Uninitialized instance with the same configuration and data.
    fn proto(&self) -> Self;

    /// Randomly initialize and iterate to convergence.
    fn run<R: Rng + ?Sized>(self, rng: &mut R) -> Self;

    /// Objective value of the converged state; lower is better.
    fn cost(&self) -> f64;
}

/// Run `m` attempts sequentially and keep the lowest cost.
///
/// `m = 0` is treated as one attempt. Attempts whose cost is not finite (e.g.
/// a singular solution) are skipped with a warning; `None` is returned only if
/// every attempt was skipped.
pub fn restarts<C: Clusterer, R: Rng + ?Sized>(cluster: &C, m: usize, rng: &mut R) -> Option<C> {
    let mut best: Option<C> = None;
    for attempt in 0..m.max(1) {
        let candidate = cluster.proto().run(rng);
        let cost = candidate.cost();
        if !cost.is_finite() {
            log::warn!("restart {attempt}: skipping attempt with non-finite cost {cost}");
            continue;
        }
        if best.as_ref().is_none_or(|b| cost < b.cost()) {
            best = Some(candidate);
        }
    }
    best
}

/// Parallel variant: attempt `i` uses `StdRng::seed_from_u64(seed + i)`.
///
/// The result does not depend on the number of worker threads; ties go to the
/// lowest attempt index.
pub fn par_restarts<C>(cluster: &C, m: usize, seed: u64) -> Option<C>
where
    C: Clusterer + Send + Sync,
{
    let attempts: Vec<(usize, C)> = (0..m.max(1))
        .into_par_iter()
        .filter_map(|attempt| {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(attempt as u64));
            let candidate = cluster.proto().run(&mut rng);
            let cost = candidate.cost();
            if cost.is_finite() {
                Some((attempt, candidate))
            } else {
                log::warn!("restart {attempt}: skipping attempt with non-finite cost {cost}");
                None
            }
        })
        .collect();

    let mut best: Option<(usize, C)> = None;
    for (attempt, candidate) in attempts {
        let replace = match &best {
            None => true,
            Some((idx, b)) => {
                candidate.cost() < b.cost() || (candidate.cost() == b.cost() && attempt < *idx)
            }
        };
        if replace {
            best = Some((attempt, candidate));
        }
    }
    best.map(|(_, c)| c)
}
