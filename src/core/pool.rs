//! Reusable buffer pools.
//!
//! Pipeline stages borrow scratch buffers (string builders, byte lists,
//! output collectors) for the duration of one call instead of allocating
//! fresh ones. A [`Pooled`] guard hands the buffer out and puts it back,
//! cleared, when it drops, so the buffer is returned exactly once on every
//! exit path, including `?` early returns and unwinding.
//!
//! # Threading
//!
//! A [`Pool`] is single-threaded (`!Sync`) and takes no locks. The shared
//! pools used by the pipeline are thread-local, so every Rayon worker gets
//! its own set. Buffers must not outlive their guard.

use std::cell::RefCell;
use std::ops::{Deref, DerefMut};

use super::text_view::TextView;

/// Number of idle buffers a shared pool keeps per thread.
const DEFAULT_RETAINED: usize = 16;

/// Buffers larger than this (in elements) are dropped instead of retained.
const MAX_RETAINED_CAPACITY: usize = 64 * 1024;

/// A buffer that can be cleared and handed to a new borrower.
pub trait Reusable: Default {
    /// Reset to the empty state. Capacity may be kept.
    fn reset(&mut self);

    /// Allocated capacity, used to avoid retaining oversized buffers.
    fn capacity(&self) -> usize;
}

impl Reusable for String {
    fn reset(&mut self) {
        self.clear();
    }

    fn capacity(&self) -> usize {
        String::capacity(self)
    }
}

impl<T> Reusable for Vec<T> {
    fn reset(&mut self) {
        self.clear();
    }

    fn capacity(&self) -> usize {
        Vec::capacity(self)
    }
}

/// Free-list of reusable buffers.
pub struct Pool<T: Reusable> {
    free: RefCell<Vec<T>>,
    max_retained: usize,
}

impl<T: Reusable> Pool<T> {
    /// Create a pool keeping at most `max_retained` idle buffers.
    pub fn new(max_retained: usize) -> Self {
        Self {
            free: RefCell::new(Vec::with_capacity(max_retained)),
            max_retained,
        }
    }

    /// Borrow a cleared buffer, creating one if the free-list is empty.
    pub fn acquire(&self) -> Pooled<'_, T> {
        let item = self.free.borrow_mut().pop().unwrap_or_default();
        Pooled {
            item: Some(item),
            pool: self,
        }
    }

    /// Number of idle buffers ready for reuse.
    pub fn available(&self) -> usize {
        self.free.borrow().len()
    }

    fn release(&self, mut item: T) {
        if item.capacity() > MAX_RETAINED_CAPACITY {
            return;
        }
        item.reset();
        let mut free = self.free.borrow_mut();
        if free.len() < self.max_retained {
            free.push(item);
        }
    }
}

impl<T: Reusable> Default for Pool<T> {
    fn default() -> Self {
        Self::new(DEFAULT_RETAINED)
    }
}

/// Scoped loan of a pooled buffer; returns it to the pool on drop.
pub struct Pooled<'a, T: Reusable> {
    // Only `None` after `detach` or during `drop`.
    item: Option<T>,
    pool: &'a Pool<T>,
}

impl<T: Reusable> Pooled<'_, T> {
    /// Take ownership of the buffer; it is not returned to the pool.
    pub fn detach(mut self) -> T {
        self.item.take().unwrap_or_default()
    }
}

impl<T: Reusable> Deref for Pooled<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match &self.item {
            Some(item) => item,
            None => unreachable!("pooled buffer accessed after release"),
        }
    }
}

impl<T: Reusable> DerefMut for Pooled<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        match &mut self.item {
            Some(item) => item,
            None => unreachable!("pooled buffer accessed after release"),
        }
    }
}

impl<T: Reusable> Drop for Pooled<'_, T> {
    fn drop(&mut self) {
        if let Some(item) = self.item.take() {
            self.pool.release(item);
        }
    }
}

thread_local! {
    static STRINGS: Pool<String> = Pool::default();
    static BYTES: Pool<Vec<u8>> = Pool::default();
    static IDS: Pool<Vec<u32>> = Pool::default();
    static OFFSETS: Pool<Vec<usize>> = Pool::default();
    static VIEWS: Pool<Vec<TextView>> = Pool::default();
    static PIECES: Pool<Vec<String>> = Pool::default();
}

/// Run `f` with a pooled string builder.
pub fn with_string<R>(f: impl FnOnce(&mut String) -> R) -> R {
    STRINGS.with(|pool| f(&mut pool.acquire()))
}

/// Run `f` with a pooled byte list.
pub fn with_bytes<R>(f: impl FnOnce(&mut Vec<u8>) -> R) -> R {
    BYTES.with(|pool| f(&mut pool.acquire()))
}

/// Run `f` with a pooled token-id collector.
pub fn with_ids<R>(f: impl FnOnce(&mut Vec<u32>) -> R) -> R {
    IDS.with(|pool| f(&mut pool.acquire()))
}

/// Run `f` with a pooled offset list.
pub fn with_offsets<R>(f: impl FnOnce(&mut Vec<usize>) -> R) -> R {
    OFFSETS.with(|pool| f(&mut pool.acquire()))
}

/// Run `f` with a pooled text-view collector.
pub fn with_views<R>(f: impl FnOnce(&mut Vec<TextView>) -> R) -> R {
    VIEWS.with(|pool| f(&mut pool.acquire()))
}

/// Run `f` with a pooled collector of owned string pieces.
pub fn with_pieces<R>(f: impl FnOnce(&mut Vec<String>) -> R) -> R {
    PIECES.with(|pool| f(&mut pool.acquire()))
}
