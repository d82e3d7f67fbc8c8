use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;

use crate::error::RunError;

/// Cooperative cancellation flag shared with the per-cell map.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub fn build_pool(workers: usize) -> Result<rayon::ThreadPool, RunError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| RunError::ThreadPool(e.to_string()))
}

/// Runs `f` for every cell index on a pool of `workers` threads (0 = all cores).
///
/// Output order is cell order regardless of scheduling. Cells not yet started when `cancel`
/// fires are skipped and the whole run reports [`RunError::Cancelled`].
pub fn map_cells<T, F>(
    workers: usize,
    n_cells: usize,
    cancel: &CancelToken,
    f: F,
) -> Result<Vec<T>, RunError>
where
    T: Send,
    F: Fn(usize) -> T + Sync + Send,
{
    let pool = build_pool(workers)?;
    let out: Vec<Option<T>> = pool.install(|| {
        (0..n_cells)
            .into_par_iter()
            .map(|cell| {
                if cancel.is_cancelled() {
                    None
                } else {
                    Some(f(cell))
                }
            })
            .collect()
    });
    if cancel.is_cancelled() {
        return Err(RunError::Cancelled);
    }
    out.into_iter()
        .collect::<Option<Vec<T>>>()
        .ok_or(RunError::Cancelled)
}
