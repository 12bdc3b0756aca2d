//! Shared heap behind a single lock.
//!
//! The heap's invariants span the page table, the free pool and the
//! size-class index at once, so the whole state sits behind one lock and
//! every public operation holds it from start to finish.

use kspin::SpinNoIrq;

use crate::dump::HeapSnapshot;
use crate::heap::PageHeap;
use crate::{AllocResult, HeapAddr};

/// A [`PageHeap`] that can be shared between threads.
pub struct LockedPageHeap<
    const PAGE_SIZE: usize = { crate::DEFAULT_PAGE_SIZE },
    const ARENA_SIZE: usize = { crate::DEFAULT_ARENA_SIZE },
    const MIN_CLASS_SIZE: usize = { crate::DEFAULT_MIN_CLASS_SIZE },
> {
    inner: SpinNoIrq<PageHeap<PAGE_SIZE, ARENA_SIZE, MIN_CLASS_SIZE>>,
}

impl<const PAGE_SIZE: usize, const ARENA_SIZE: usize, const MIN_CLASS_SIZE: usize>
    LockedPageHeap<PAGE_SIZE, ARENA_SIZE, MIN_CLASS_SIZE>
{
    pub fn new() -> Self {
        Self {
            inner: SpinNoIrq::new(PageHeap::new()),
        }
    }

    pub fn allocate(&self, size: usize) -> AllocResult<HeapAddr> {
        self.inner.lock().allocate(size)
    }

    pub fn free(&self, addr: Option<HeapAddr>) {
        self.inner.lock().free(addr)
    }

    pub fn resize(&self, addr: Option<HeapAddr>, size: usize) -> AllocResult<HeapAddr> {
        self.inner.lock().resize(addr, size)
    }

    pub fn read(&self, addr: HeapAddr, offset: usize, buf: &mut [u8]) -> AllocResult<usize> {
        self.inner.lock().read(addr, offset, buf)
    }

    pub fn write(&self, addr: HeapAddr, offset: usize, data: &[u8]) -> AllocResult<usize> {
        self.inner.lock().write(addr, offset, data)
    }

    pub fn dump(&self) -> HeapSnapshot {
        self.inner.lock().dump()
    }

    pub fn validate(&self) -> AllocResult {
        self.inner.lock().validate()
    }

    /// Run `f` with the lock held, for sequences that must not interleave
    /// with other callers.
    pub fn with<R>(
        &self,
        f: impl FnOnce(&mut PageHeap<PAGE_SIZE, ARENA_SIZE, MIN_CLASS_SIZE>) -> R,
    ) -> R {
        f(&mut *self.inner.lock())
    }
}

impl<const PAGE_SIZE: usize, const ARENA_SIZE: usize, const MIN_CLASS_SIZE: usize> Default
    for LockedPageHeap<PAGE_SIZE, ARENA_SIZE, MIN_CLASS_SIZE>
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locked_heap() {
        let heap = LockedPageHeap::<4096, 16384, 16>::new();
        let addr = heap.allocate(64).unwrap();
        assert_eq!(heap.write(addr, 0, b"abc"), Ok(3));

        let mut buf = [0u8; 3];
        assert_eq!(heap.read(addr, 0, &mut buf), Ok(3));
        assert_eq!(&buf, b"abc");

        let moved = heap.resize(Some(addr), 500).unwrap();
        heap.free(Some(moved));
        assert!(heap.with(|inner| inner.is_pristine()));
        assert_eq!(heap.validate(), Ok(()));
        assert_eq!(heap.dump().pages.len(), 4);
    }
}
