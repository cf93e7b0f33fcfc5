//! A bounded pool of reusable [`RecordBatch`]es
//!
//! Batches are handed out as [`PooledBatch`] handles. Dropping a handle returns
//! its batch to the pool (or drops it if the pool is full or already gone), so
//! callers never release anything by hand.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Condvar, Mutex};

use crate::RecordBatch;

type ResetFn = Box<dyn Fn(&mut RecordBatch) + Send + Sync>;
type FactoryFn = Box<dyn Fn() -> RecordBatch + Send + Sync>;

struct PoolShared {
    /// Freelist of idle batches
    idle: Mutex<Vec<RecordBatch>>,
    /// Signalled whenever a batch is returned or discarded
    returned: Condvar,
    /// Batches allocated over the pool's lifetime
    created: AtomicUsize,
    /// Batches currently handed out
    active: AtomicUsize,
    /// Upper bound on `active + idle` (0 = unbounded)
    max_size: usize,
    factory: FactoryFn,
    reset: ResetFn,
}
impl PoolShared {
    fn has_room(&self, idle: usize) -> bool {
        self.max_size == 0 || idle + self.active.load(Ordering::Acquire) < self.max_size
    }

    fn release(&self, batch: RecordBatch) {
        let mut idle = self.idle.lock();
        self.active.fetch_sub(1, Ordering::AcqRel);
        if self.has_room(idle.len()) {
            idle.push(batch);
        }
        drop(idle);
        self.returned.notify_one();
    }
}

/// A thread-safe, bounded pool of [`RecordBatch`]es
///
/// Cloning the pool is cheap and yields another handle to the same freelist.
///
/// # Examples
///
/// ```rust
/// use fqtools::BatchPool;
///
/// let pool = BatchPool::with_batch_capacity(2, 4, 1024, 16);
/// {
///     let mut batch = pool.acquire();
///     batch.push(b"r1", b"", b"ACGT", b"IIII");
///     assert_eq!(pool.active_count(), 1);
/// }
/// // The handle went out of scope and the batch is idle again
/// assert_eq!(pool.active_count(), 0);
/// assert_eq!(pool.idle_count(), 2);
/// ```
#[derive(Clone)]
pub struct BatchPool {
    shared: Arc<PoolShared>,
}
impl BatchPool {
    /// Creates a pool of default batches
    ///
    /// # Parameters
    ///
    /// * `initial_size` - Batches allocated up front
    /// * `max_size` - Upper bound on live plus idle batches (0 = unbounded)
    /// * `reset` - Applied to every batch on acquire
    pub fn new<F>(initial_size: usize, max_size: usize, reset: F) -> Self
    where
        F: Fn(&mut RecordBatch) + Send + Sync + 'static,
    {
        Self::from_parts(
            initial_size,
            max_size,
            Box::new(RecordBatch::default),
            Box::new(reset),
        )
    }

    /// Creates a pool whose batches reserve `capacity_bytes` and `capacity_records` up front
    #[must_use]
    pub fn with_batch_capacity(
        initial_size: usize,
        max_size: usize,
        capacity_bytes: usize,
        capacity_records: usize,
    ) -> Self {
        Self::from_parts(
            initial_size,
            max_size,
            Box::new(move || RecordBatch::with_capacity(capacity_bytes, capacity_records)),
            Box::new(RecordBatch::clear),
        )
    }

    fn from_parts(initial_size: usize, max_size: usize, factory: FactoryFn, reset: ResetFn) -> Self {
        let pool = Self {
            shared: Arc::new(PoolShared {
                idle: Mutex::new(Vec::with_capacity(initial_size)),
                returned: Condvar::new(),
                created: AtomicUsize::new(0),
                active: AtomicUsize::new(0),
                max_size,
                factory,
                reset,
            }),
        };
        pool.reserve(initial_size);
        pool
    }

    /// Hands out a batch, blocking while the pool is at capacity
    ///
    /// An idle batch is reused when available, otherwise a new one is allocated.
    /// The reset function runs in both cases.
    #[must_use]
    pub fn acquire(&self) -> PooledBatch {
        let shared = &self.shared;
        let mut idle = shared.idle.lock();
        let recycled = loop {
            if let Some(batch) = idle.pop() {
                break Some(batch);
            }
            if shared.has_room(0) {
                break None;
            }
            shared.returned.wait(&mut idle);
        };
        shared.active.fetch_add(1, Ordering::AcqRel);
        drop(idle);
        self.wrap(recycled)
    }

    /// Hands out a batch if one is idle or can still be allocated
    #[must_use]
    pub fn try_acquire(&self) -> Option<PooledBatch> {
        let shared = &self.shared;
        let mut idle = shared.idle.lock();
        let recycled = match idle.pop() {
            Some(batch) => Some(batch),
            None if shared.has_room(0) => None,
            None => return None,
        };
        shared.active.fetch_add(1, Ordering::AcqRel);
        drop(idle);
        Some(self.wrap(recycled))
    }

    fn wrap(&self, recycled: Option<RecordBatch>) -> PooledBatch {
        let shared = &self.shared;
        let mut batch = recycled.unwrap_or_else(|| {
            shared.created.fetch_add(1, Ordering::Relaxed);
            log::trace!("Allocating pooled batch");
            (shared.factory)()
        });
        (shared.reset)(&mut batch);
        PooledBatch {
            batch,
            pool: Arc::downgrade(shared),
        }
    }

    /// Allocates up to `n` additional idle batches, never exceeding `max_size`
    pub fn reserve(&self, n: usize) {
        let shared = &self.shared;
        let mut idle = shared.idle.lock();
        for _ in 0..n {
            if !shared.has_room(idle.len()) {
                break;
            }
            idle.push((shared.factory)());
            shared.created.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Drops every idle batch
    pub fn shrink(&self) {
        let mut idle = self.shared.idle.lock();
        idle.clear();
        idle.shrink_to_fit();
    }

    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.shared.idle.lock().len()
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.shared.active.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn total_created(&self) -> usize {
        self.shared.created.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn max_size(&self) -> usize {
        self.shared.max_size
    }
}

/// A batch on loan from a [`BatchPool`]
///
/// Dereferences to [`RecordBatch`]. When dropped, the batch goes back to its pool
/// if the pool still exists and has room; otherwise it is freed.
pub struct PooledBatch {
    batch: RecordBatch,
    pool: Weak<PoolShared>,
}
impl PooledBatch {
    /// Returns the batch to its pool now
    pub fn release(self) {
        drop(self);
    }
}
impl Deref for PooledBatch {
    type Target = RecordBatch;

    fn deref(&self) -> &Self::Target {
        &self.batch
    }
}
impl DerefMut for PooledBatch {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.batch
    }
}
impl Drop for PooledBatch {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.upgrade() {
            pool.release(std::mem::take(&mut self.batch));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};
    use std::collections::HashSet;
    use std::time::Duration;

    #[test]
    fn test_initial_reserve_and_reuse() {
        let pool = BatchPool::with_batch_capacity(2, 4, 256, 8);
        assert_eq!(pool.idle_count(), 2);
        assert_eq!(pool.total_created(), 2);

        let a = pool.acquire();
        let b = pool.acquire();
        let c = pool.acquire();
        assert_eq!(pool.total_created(), 3);
        assert_eq!(pool.active_count(), 3);
        assert_eq!(pool.idle_count(), 0);

        drop((a, b, c));
        assert_eq!(pool.active_count(), 0);
        assert_eq!(pool.idle_count(), 3);

        let _d = pool.acquire();
        assert_eq!(pool.total_created(), 3);
    }

    #[test]
    fn test_reset_applied_on_acquire() {
        let pool = BatchPool::new(1, 1, RecordBatch::clear);
        {
            let mut batch = pool.acquire();
            batch.push(b"stale", b"", b"ACGT", b"IIII");
        }
        let batch = pool.acquire();
        assert!(batch.is_empty());
        assert!(batch.buffer().is_empty());
    }

    #[test]
    fn test_handles_are_distinct() {
        let pool = BatchPool::with_batch_capacity(0, 8, 64, 1);
        let handles: Vec<_> = (0..8).map(|_| pool.acquire()).collect();
        let ptrs: HashSet<_> = handles.iter().map(|h| h.buffer().as_ptr() as usize).collect();
        assert_eq!(ptrs.len(), handles.len());
        assert!(pool.try_acquire().is_none());
    }

    #[test]
    fn test_capacity_invariant_under_random_operations() {
        let max_size = 5;
        let pool = BatchPool::with_batch_capacity(2, max_size, 16, 1);
        let mut rng = SmallRng::seed_from_u64(11);
        let mut live = Vec::new();
        for _ in 0..2_000 {
            match rng.random_range(0..4) {
                0 | 1 => {
                    if let Some(handle) = pool.try_acquire() {
                        live.push(handle);
                    }
                }
                2 if !live.is_empty() => {
                    let idx = rng.random_range(0..live.len());
                    live.swap_remove(idx);
                }
                3 => pool.reserve(rng.random_range(0..3)),
                _ => pool.shrink(),
            }
            assert!(pool.active_count() + pool.idle_count() <= max_size);
            assert_eq!(pool.active_count(), live.len());
        }
    }

    #[test]
    fn test_batch_dropped_after_pool_is_gone() {
        let pool = BatchPool::with_batch_capacity(1, 2, 16, 1);
        let mut handle = pool.acquire();
        drop(pool);
        handle.push(b"r", b"", b"A", b"I");
        handle.release();
    }

    #[test]
    fn test_acquire_blocks_until_release() {
        let pool = BatchPool::with_batch_capacity(1, 1, 16, 1);
        let held = pool.acquire();
        let waiter = {
            let pool = pool.clone();
            std::thread::spawn(move || {
                let batch = pool.acquire();
                batch.is_empty()
            })
        };
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(pool.active_count(), 1);
        drop(held);
        assert!(waiter.join().expect("waiter thread"));
        assert_eq!(pool.total_created(), 1);
    }

    #[test]
    fn test_concurrent_acquire_release() {
        let pool = BatchPool::with_batch_capacity(0, 4, 64, 4);
        std::thread::scope(|scope| {
            for t in 0..8u8 {
                let pool = pool.clone();
                scope.spawn(move || {
                    for i in 0..200 {
                        let mut batch = pool.acquire();
                        assert!(batch.is_empty());
                        batch.push(&[b'a' + t], b"", b"ACGT", b"IIII");
                        if i % 7 == 0 {
                            std::thread::yield_now();
                        }
                    }
                });
            }
        });
        assert_eq!(pool.active_count(), 0);
        assert!(pool.total_created() <= 4);
        assert!(pool.idle_count() <= 4);
    }
}
