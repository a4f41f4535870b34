//! Lazily-allocated, reusable buffer sequences for the streaming iterator.
//!
//! A pool hands out `Vec<T>` buffers sized for one read; a buffer is only
//! ever materialized the first time it's actually needed, and an iterator
//! that drops its handle early lets the buffer be reclaimed rather than
//! pinned for the pool's whole lifetime. That "only alive while someone
//! holds it" behavior is why the slot is a weak reference rather than an
//! `Rc`/`Arc`: a strong handle living inside the slot would keep the
//! buffer alive for as long as the pool itself is.
//!
//! A single pool hands out one logical buffer whose capacity follows a
//! declared schedule across a sequence of positions (position 0, 1, 2, ...
//! up to a target item count):
//! - [`PoolShape::Growing`] — `init_size` for the first `grow_after`
//!   positions, then `large_size` for every position after that.
//! - [`PoolShape::FixedSingle`] — the same `size` at every position.
//! - [`PoolShape::FixedRamp`] — `block_one`, then `block_two`, then
//!   `small_size` repeated `grow_after` times, then `large_size` from then
//!   on.
//!
//! Because [`BufferPool::acquire`] only ever grows the underlying buffer
//! (a live buffer large enough for the request is reused untouched, never
//! shrunk), the capacities actually handed out by a single sequence are
//! non-decreasing regardless of whether the requested schedule itself is —
//! once a buffer at a given capacity exists, no later request smaller than
//! that capacity can install a smaller one.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::Mutex;

type Slot<T> = Mutex<Option<Weak<RefCell<Vec<T>>>>>;

/// A handle to a pooled buffer. Holding this keeps the underlying buffer
/// alive; dropping it lets the pool's weak reference lapse, so the next
/// caller allocates fresh rather than reusing freed memory through a
/// dangling strong reference.
pub struct PooledBuffer<T> {
    inner: Rc<RefCell<Vec<T>>>,
}

impl<T> Clone for PooledBuffer<T> {
    fn clone(&self) -> Self {
        Self { inner: Rc::clone(&self.inner) }
    }
}

impl<T> PooledBuffer<T> {
    pub fn borrow(&self) -> std::cell::Ref<'_, Vec<T>> {
        self.inner.borrow()
    }

    pub fn borrow_mut(&self) -> std::cell::RefMut<'_, Vec<T>> {
        self.inner.borrow_mut()
    }

    pub fn capacity(&self) -> usize {
        self.inner.borrow().capacity()
    }

    /// Whether two handles point at the same underlying allocation —
    /// evidence that a later acquisition reused a buffer a caller kept
    /// alive across two otherwise-independent sequences.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

/// A buffer-size schedule: how large a buffer should be at a given
/// zero-based position in a sequence of up to some target item count.
#[derive(Debug, Clone, Copy)]
pub enum PoolShape {
    /// `init_size` for the first `grow_after` positions, then `large_size`.
    Growing { init_size: usize, grow_after: usize, large_size: usize },
    /// `size` at every position.
    FixedSingle { size: usize },
    /// `block_one`, `block_two`, then `small_size` repeated `grow_after`
    /// times, then `large_size` from then on.
    FixedRamp { block_one: usize, block_two: usize, small_size: usize, grow_after: usize, large_size: usize },
}

impl PoolShape {
    pub(crate) fn size_at(&self, position: usize) -> usize {
        match *self {
            PoolShape::Growing { init_size, grow_after, large_size } => {
                if position < grow_after {
                    init_size
                } else {
                    large_size
                }
            }
            PoolShape::FixedSingle { size } => size,
            PoolShape::FixedRamp { block_one, block_two, small_size, grow_after, large_size } => {
                if position == 0 {
                    block_one
                } else if position == 1 {
                    block_two
                } else if position < 2 + grow_after {
                    small_size
                } else {
                    large_size
                }
            }
        }
    }
}

/// A lazily-populated, single reused buffer behind a weak reference.
pub struct BufferPool<T> {
    slot: Slot<T>,
}

impl<T: Default + Clone> Default for BufferPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Default + Clone> BufferPool<T> {
    pub fn new() -> Self {
        Self { slot: Mutex::new(None) }
    }

    /// A buffer with at least `min_capacity` capacity, resized to exactly
    /// `len` elements. A live buffer already large enough is reused as-is
    /// (even if it's much bigger than `min_capacity` — shrinking would
    /// defeat the amortization this pool exists for); a too-small one is
    /// replaced.
    pub fn acquire(&self, min_capacity: usize, len: usize) -> PooledBuffer<T> {
        let mut guard = self.slot.lock().unwrap();
        if let Some(weak) = guard.as_ref() {
            if let Some(strong) = weak.upgrade() {
                if strong.borrow().capacity() >= min_capacity {
                    strong.borrow_mut().resize(len, T::default());
                    return PooledBuffer { inner: strong };
                }
            }
        }
        let mut fresh = Vec::with_capacity(min_capacity);
        fresh.resize(len, T::default());
        let fresh = Rc::new(RefCell::new(fresh));
        *guard = Some(Rc::downgrade(&fresh));
        PooledBuffer { inner: fresh }
    }

    /// A `Growing`-shaped sequence targeting `total_items` across all
    /// positions: `init_size` buffers for up to `grow_after` positions,
    /// then `large_size` for the rest.
    pub fn growing(&self, total_items: usize, init_size: usize, grow_after: usize, large_size: usize) -> PoolSequence<'_, T> {
        PoolSequence::new(self, PoolShape::Growing { init_size, grow_after, large_size }, total_items)
    }

    /// A `FixedSingle`-shaped sequence: `size` at every position.
    pub fn fixed_single(&self, total_items: usize, size: usize) -> PoolSequence<'_, T> {
        PoolSequence::new(self, PoolShape::FixedSingle { size }, total_items)
    }

    /// A `FixedRamp`-shaped sequence: `block_one`, `block_two`,
    /// `small_size` repeated `grow_after` times, then `large_size`.
    pub fn fixed_ramp(
        &self,
        total_items: usize,
        block_one: usize,
        block_two: usize,
        small_size: usize,
        grow_after: usize,
        large_size: usize,
    ) -> PoolSequence<'_, T> {
        PoolSequence::new(self, PoolShape::FixedRamp { block_one, block_two, small_size, grow_after, large_size }, total_items)
    }
}

/// Walks a [`PoolShape`]'s schedule against a pool, yielding one buffer per
/// position until `total_items` elements have been covered.
pub struct PoolSequence<'a, T> {
    pool: &'a BufferPool<T>,
    shape: PoolShape,
    position: usize,
    remaining: usize,
}

impl<'a, T> PoolSequence<'a, T> {
    fn new(pool: &'a BufferPool<T>, shape: PoolShape, total_items: usize) -> Self {
        Self { pool, shape, position: 0, remaining: total_items }
    }
}

impl<'a, T: Default + Clone> Iterator for PoolSequence<'a, T> {
    type Item = PooledBuffer<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let capacity = self.shape.size_at(self.position).max(1);
        let len = capacity.min(self.remaining);
        self.position += 1;
        self.remaining -= len;
        Some(self.pool.acquire(capacity, len))
    }
}
