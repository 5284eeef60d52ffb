//! Parallel per-voxel dispatch.

use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::ThreadPoolBuilder;
use rayon::prelude::*;

use crate::error::Result;
use crate::grid::Volume;

/// Number of progress messages per run.
const PROGRESS_STEPS: usize = 50;

/// Run `f(index, chunk)` for every voxel of `out` on a pool of `threads` workers.
///
/// Each call owns the output channels of one voxel. Progress is logged at
/// roughly 2% granularity.
pub fn for_each_voxel<F>(out: &mut Volume, threads: usize, f: F) -> Result<()>
where
    F: Fn(usize, &mut [f64]) + Sync,
{
    let pool = ThreadPoolBuilder::new().num_threads(threads).build()?;
    let total = out.grid().size();
    let dim = out.dim();
    if total == 0 || dim == 0 {
        return Ok(());
    }

    let step = (total / PROGRESS_STEPS).max(1);
    let done = AtomicUsize::new(0);
    pool.install(|| {
        out.data_mut()
            .par_chunks_mut(dim)
            .enumerate()
            .for_each(|(idx, chunk)| {
                f(idx, chunk);
                let count = done.fetch_add(1, Ordering::Relaxed) + 1;
                if count % step == 0 {
                    log::info!("{} percent processed", 100 * count / total);
                }
            });
    });
    Ok(())
}
