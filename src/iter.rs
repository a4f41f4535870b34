//! Streaming iterator over a resolved `[lo, hi)` ordinal range: pulls
//! records through a single growing buffer pulled from the buffer pool,
//! following the pool's `Growing` ramp schedule rather than a constant
//! batch size.

use crate::engine::FileEngine;
use crate::error::EngineError;
use crate::pool::{BufferPool, PoolShape};
use crate::record::Record;

/// Default ramp schedule for a range stream with no caller-supplied shape:
/// a conservative first batch, then settle into a larger steady-state one
/// after a couple of iterations.
const DEFAULT_INIT_SIZE: usize = 64;
const DEFAULT_GROW_AFTER: usize = 4;
const DEFAULT_LARGE_SIZE: usize = 4096;

pub struct RangeStream<'a, T: Record> {
    engine: &'a mut FileEngine<T>,
    pool: BufferPool<T>,
    shape: PoolShape,
    position: usize,
    next_ordinal: u64,
    remaining: u64,
}

impl<'a, T: Record + Default> RangeStream<'a, T> {
    /// A range stream using the default `Growing` ramp schedule.
    pub fn new(engine: &'a mut FileEngine<T>, lo: u64, hi: u64) -> Self {
        Self::with_growing_shape(engine, lo, hi, DEFAULT_INIT_SIZE, DEFAULT_GROW_AFTER, DEFAULT_LARGE_SIZE)
    }

    /// A range stream following `Growing(init_size, grow_after, large_size)`
    /// literally: `init_size` buffers for the first `grow_after` batches,
    /// then `large_size` for every batch after that.
    pub fn with_growing_shape(
        engine: &'a mut FileEngine<T>,
        lo: u64,
        hi: u64,
        init_size: usize,
        grow_after: usize,
        large_size: usize,
    ) -> Self {
        let remaining = hi.saturating_sub(lo);
        Self {
            engine,
            pool: BufferPool::new(),
            shape: PoolShape::Growing { init_size, grow_after, large_size },
            position: 0,
            next_ordinal: lo,
            remaining,
        }
    }

    /// Pulls the next populated batch, or `None` once `remaining` is
    /// exhausted. The returned `Vec` is a snapshot cloned out of the
    /// pool's reused buffer (cheap, since `Record: Copy`) rather than
    /// exposing the pool's interior-mutability lifetime to callers.
    pub fn next_batch(&mut self) -> Result<Option<Vec<T>>, EngineError> {
        if self.remaining == 0 {
            return Ok(None);
        }
        let capacity = self.shape.size_at(self.position).max(1);
        let want = capacity.min(self.remaining as usize);
        self.position += 1;

        let pooled = self.pool.acquire(capacity, want);
        {
            let mut buf = pooled.borrow_mut();
            self.engine.read_range(self.next_ordinal, &mut buf[..want])?;
        }
        self.next_ordinal += want as u64;
        self.remaining -= want as u64;
        let batch = pooled.borrow()[..want].to_vec();
        Ok(Some(batch))
    }
}
