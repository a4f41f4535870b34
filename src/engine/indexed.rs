//! Indexed file: the record carries its own monotonic index field, found
//! by binary search rather than computed by arithmetic.

use super::{FileEngine, OpenReport};
use crate::error::EngineError;
use crate::record::Record;
use crate::signature::TypeMap;
use std::path::Path;

pub struct IndexedFile<T: Record> {
    engine: FileEngine<T>,
}

impl<T: Record> IndexedFile<T> {
    pub fn create(path: &Path) -> Result<Self, EngineError> {
        let engine = FileEngine::create(path, "indexed", Vec::new())?;
        Ok(Self { engine })
    }

    pub fn open(path: &Path, type_map: &TypeMap) -> Result<(Self, OpenReport), EngineError> {
        let (engine, report) = FileEngine::open(path, type_map)?;
        Ok((Self { engine }, report))
    }

    pub fn count(&self) -> u64 {
        self.engine.count()
    }

    fn index_at(&mut self, ordinal: u64) -> Result<i64, EngineError> {
        // `read_range` moves raw bytes in without ever reading through `T`;
        // `T: Pod` guarantees an all-zero bit pattern is always valid, so
        // `Zeroable::zeroed` is a safe scratch value to overwrite in place.
        let mut one = [T::zeroed(); 1];
        self.engine.read_range(ordinal, &mut one)?;
        Ok(one[0].index_value().expect("indexed record must declare index_value"))
    }

    /// Binary search over `[0, count)` using the record's index field.
    /// Returns the **first** ordinal carrying `target` on a hit; on a
    /// miss, returns the bitwise complement of the insertion ordinal
    /// (`!ordinal`), mirroring the classic binary-search contract so a
    /// caller can tell hit from miss with a single sign check without an
    /// extra return channel.
    pub fn search(&mut self, target: i64) -> Result<i64, EngineError> {
        let mut lo = 0i64;
        let mut hi = self.engine.count() as i64;
        let mut first_hit: Option<i64> = None;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let v = self.index_at(mid as u64)?;
            if v < target {
                lo = mid + 1;
            } else if v > target {
                hi = mid;
            } else {
                first_hit = Some(mid);
                hi = mid; // keep searching left for the first occurrence
            }
        }
        Ok(first_hit.unwrap_or(!lo))
    }

    /// Resolves `[from_index, to_index)` to `[lo, hi)` ordinals via two
    /// searches; a miss on either bound falls back to its insertion point.
    pub fn range_to_ordinals(&mut self, from_index: i64, to_index: i64) -> Result<(u64, u64), EngineError> {
        let lo = resolve_insertion_point(self.search(from_index)?);
        let hi = resolve_insertion_point(self.search(to_index)?);
        Ok((lo, hi.max(lo)))
    }

    pub fn read_by_ordinal(&mut self, first_ordinal: u64, out: &mut [T]) -> Result<(), EngineError> {
        self.engine.read_range(first_ordinal, out)
    }

    /// Append requires `index(first-new) >= index(last-existing)`; equal
    /// runs are permitted and preserve insertion order (no dedup, no
    /// reordering).
    pub fn append(&mut self, items: &[T]) -> Result<(), EngineError> {
        if items.is_empty() {
            return Ok(());
        }
        if self.engine.count() > 0 {
            let last = self.index_at(self.engine.count() - 1)?;
            let first_new = items[0].index_value().expect("indexed record must declare index_value");
            if first_new < last {
                return Err(EngineError::IndexNonMonotonic);
            }
        }
        for window in items.windows(2) {
            let a = window[0].index_value().expect("indexed record must declare index_value");
            let b = window[1].index_value().expect("indexed record must declare index_value");
            if b < a {
                return Err(EngineError::IndexNonMonotonic);
            }
        }
        let count = self.engine.count();
        self.engine.write_range(count, items)
    }

    pub fn truncate(&mut self, new_count: u64) -> Result<(), EngineError> {
        self.engine.truncate(new_count)
    }

    pub fn close(&mut self) -> Result<(), EngineError> {
        self.engine.close()
    }
}

fn resolve_insertion_point(search_result: i64) -> u64 {
    if search_result >= 0 {
        search_result as u64
    } else {
        (!search_result) as u64
    }
}
