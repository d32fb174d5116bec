use thiserror::Error;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum PoolError {
    #[error("Failed to build worker pool: {0}")]
    Build(String),
}

/// Worker pool that nodes may spread independent per-item work across.
///
/// The graph walk itself is always single-threaded; only the closures handed
/// to [`ProcessPool::map`] run on worker threads.
#[derive(Debug, Default)]
pub struct ProcessPool {
    #[cfg(feature = "parallel")]
    pool: Option<rayon::ThreadPool>,
}

impl ProcessPool {
    pub fn serial() -> Self {
        Self::default()
    }

    /// A pool with `threads` workers. One thread or fewer gives a serial pool.
    pub fn new(threads: usize) -> Result<Self, PoolError> {
        if threads <= 1 {
            return Ok(Self::serial());
        }
        #[cfg(feature = "parallel")]
        {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| PoolError::Build(e.to_string()))?;
            Ok(Self { pool: Some(pool) })
        }
        #[cfg(not(feature = "parallel"))]
        {
            tracing::warn!(threads, "Built without the `parallel` feature; running serially");
            Ok(Self::serial())
        }
    }

    pub fn n_threads(&self) -> usize {
        #[cfg(feature = "parallel")]
        if let Some(pool) = &self.pool {
            return pool.current_num_threads();
        }
        1
    }

    /// Applies `f` to every item, preserving order.
    pub fn map<T, R, F>(&self, items: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        #[cfg(feature = "parallel")]
        if let Some(pool) = &self.pool {
            return pool.install(|| items.par_iter().map(&f).collect());
        }
        items.iter().map(f).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_pool_maps_in_order() {
        let pool = ProcessPool::serial();
        assert_eq!(pool.n_threads(), 1);
        assert_eq!(pool.map(&[1, 2, 3], |x| x * 10), vec![10, 20, 30]);
    }

    #[test]
    fn threaded_pool_preserves_order() {
        let pool = ProcessPool::new(3).unwrap();
        let items: Vec<u64> = (0..100).collect();
        let squares = pool.map(&items, |x| x * x);
        assert_eq!(squares[99], 99 * 99);
        assert!(squares.windows(2).all(|w| w[0] < w[1]));
    }
}
