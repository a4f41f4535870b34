//! Uniform (T0 + delta) addressed file: records sit at fixed time steps,
//! so a timestamp maps to an ordinal by pure arithmetic — no index scan,
//! no stored per-record key.

use super::{FileEngine, OpenReport};
use crate::error::EngineError;
use crate::header::subheader;
use crate::record::Record;
use crate::signature::TypeMap;
use std::path::Path;

/// 100ns units per day: `10_000_000 * 60 * 60 * 24`. Only deltas that
/// divide this evenly ever line up with a calendar day boundary, which is
/// why `validate_uniform_shape` checks it rather than just `delta > 0`.
pub const TICKS_PER_DAY: i64 = 10_000_000 * 60 * 60 * 24;

/// File-creation invariant: `0 < delta <= 1 day`, `delta` divides a day
/// evenly, and `T0` sits on a `delta` boundary. Re-checked on every open
/// too, since the subheader's `(T0, delta)` pair is exactly the state this
/// invariant is about — a file written by a future, laxer version of this
/// format could persist a pair that no longer satisfies it.
pub(crate) fn validate_uniform_shape(t0_ticks: i64, delta_ticks: i64) -> Result<(), EngineError> {
    if delta_ticks <= 0 || delta_ticks > TICKS_PER_DAY {
        return Err(EngineError::IndexMisaligned);
    }
    if TICKS_PER_DAY % delta_ticks != 0 {
        return Err(EngineError::IndexMisaligned);
    }
    if t0_ticks % delta_ticks != 0 {
        return Err(EngineError::IndexMisaligned);
    }
    Ok(())
}

#[derive(Debug)]
pub struct UniformFile<T: Record> {
    engine: FileEngine<T>,
    t0_ticks: i64,
    delta_ticks: i64,
}

impl<T: Record> UniformFile<T> {
    pub fn create(path: &Path, t0_ticks: i64, delta_ticks: i64) -> Result<Self, EngineError> {
        validate_uniform_shape(t0_ticks, delta_ticks)?;
        let sub = subheader::write_uniform(delta_ticks, t0_ticks);
        let engine = FileEngine::create(path, "uniform", sub)?;
        Ok(Self { engine, t0_ticks, delta_ticks })
    }

    pub fn open(path: &Path, type_map: &TypeMap) -> Result<(Self, OpenReport), EngineError> {
        let (engine, report) = FileEngine::open(path, type_map)?;
        let (delta_ticks, t0_ticks) = subheader::read_uniform(engine.version(), engine.extra_subheader())?;
        validate_uniform_shape(t0_ticks, delta_ticks)?;
        Ok((Self { engine, t0_ticks, delta_ticks }, report))
    }

    pub fn t0_ticks(&self) -> i64 {
        self.t0_ticks
    }

    pub fn delta_ticks(&self) -> i64 {
        self.delta_ticks
    }

    pub fn count(&self) -> u64 {
        self.engine.count()
    }

    pub fn first_unavailable_timestamp(&self) -> i64 {
        self.t0_ticks + self.engine.count() as i64 * self.delta_ticks
    }

    /// `(t - T0) / delta`, rejecting a timestamp that doesn't land on a
    /// step boundary.
    pub fn index_to_ordinal(&self, t: i64) -> Result<u64, EngineError> {
        let offset = t - self.t0_ticks;
        if offset < 0 || offset % self.delta_ticks != 0 {
            return Err(EngineError::IndexMisaligned);
        }
        Ok((offset / self.delta_ticks) as u64)
    }

    pub fn ordinal_to_index(&self, n: u64) -> i64 {
        self.t0_ticks + n as i64 * self.delta_ticks
    }

    /// Clips `[from_inclusive, to_exclusive)` to `[T0, firstUnavailableTimestamp]`,
    /// rounding each bound up to the next delta boundary. Returns an empty
    /// `(0, 0)` ordinal range when the clipped range is empty, or when its
    /// length would overflow `i32::MAX` (callers must stream via the
    /// buffer pool/iterator in that case instead of reading in one call).
    pub fn adjust_range(&self, from_inclusive: i64, to_exclusive: i64) -> (u64, u64) {
        let round_up = |t: i64| -> i64 {
            let offset = t - self.t0_ticks;
            if offset <= 0 {
                return self.t0_ticks;
            }
            let steps = (offset + self.delta_ticks - 1) / self.delta_ticks;
            self.t0_ticks + steps * self.delta_ticks
        };
        let first_unavailable = self.first_unavailable_timestamp();
        let lo_t = round_up(from_inclusive).max(self.t0_ticks);
        let hi_t = round_up(to_exclusive).min(first_unavailable);
        if hi_t <= lo_t {
            return (0, 0);
        }
        let lo = ((lo_t - self.t0_ticks) / self.delta_ticks) as u64;
        let hi = ((hi_t - self.t0_ticks) / self.delta_ticks) as u64;
        let len = hi - lo;
        if len > i32::MAX as u64 {
            return (0, 0);
        }
        (lo, len)
    }

    pub fn read_by_ordinal(&mut self, first_ordinal: u64, out: &mut [T]) -> Result<(), EngineError> {
        self.engine.read_range(first_ordinal, out)
    }

    /// Append at `first_ordinal`. Uniform files allow overwriting the tail
    /// within `[0, count]` — writing past `count` extends it — but never
    /// writing past `firstUnavailableTimestamp`'s ordinal equivalent
    /// (which is just `count` itself, since the uniform body has no gaps).
    pub fn append(&mut self, first_ordinal: u64, items: &[T]) -> Result<(), EngineError> {
        if first_ordinal > self.engine.count() {
            return Err(EngineError::IndexNonMonotonic);
        }
        self.engine.write_range(first_ordinal, items)
    }

    pub fn truncate(&mut self, new_count: u64) -> Result<(), EngineError> {
        self.engine.truncate(new_count)
    }

    pub fn close(&mut self) -> Result<(), EngineError> {
        self.engine.close()
    }
}
