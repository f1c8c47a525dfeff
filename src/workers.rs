//! Bounded worker pool and cooperative cancellation

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{PatchError, Result};

/// Shared flag checked between file batches
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; files already in flight finish their batch
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Default concurrency: available parallelism, at least one
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Build a pool with at most `concurrency` threads
pub fn worker_pool(concurrency: usize) -> Result<ThreadPool> {
    ThreadPoolBuilder::new()
        .num_threads(concurrency.max(1))
        .thread_name(|i| format!("locpatch-worker-{i}"))
        .build()
        .map_err(|e| PatchError::WorkerPoolFailed {
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_worker_pool_bounded() {
        let pool = worker_pool(2).unwrap();
        assert_eq!(pool.current_num_threads(), 2);
        let pool = worker_pool(0).unwrap();
        assert_eq!(pool.current_num_threads(), 1);
    }

    #[test]
    fn test_default_concurrency_positive() {
        assert!(default_concurrency() >= 1);
    }
}
