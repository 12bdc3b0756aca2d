//! Fixed-capacity page/slab heap
//!
//! This crate implements a self-contained heap manager over one statically
//! sized byte arena, featuring:
//! - Fixed-size pages tracked by an external page table
//! - Per-page power-of-two size-class slabs for small requests
//! - Linked multi-page chains for large requests
//! - In-place and relocating resize
//! - Read-only diagnostic snapshots
//!
//! Handles returned to callers are arena offsets ([`HeapAddr`]), never raw
//! pointers. Payload bytes are reached through [`PageHeap::read`] and
//! [`PageHeap::write`].

#![no_std]

extern crate alloc;

// Logging support - conditionally import log crate
#[cfg(feature = "log")]
extern crate log;

// Stub macros when log is disabled - these become no-ops
#[cfg(not(feature = "log"))]
#[allow(unused_macros)]
macro_rules! error {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
#[allow(unused_macros)]
macro_rules! warn {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
#[allow(unused_macros)]
macro_rules! info {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
#[allow(unused_macros)]
macro_rules! debug {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
#[allow(unused_macros)]
macro_rules! trace {
    ($($arg:tt)*) => {};
}

/// Default page size
pub const DEFAULT_PAGE_SIZE: usize = 0x1000;

/// Default arena size (four pages)
pub const DEFAULT_ARENA_SIZE: usize = 0x4000;

/// Default smallest block stride, flag byte included
pub const DEFAULT_MIN_CLASS_SIZE: usize = 16;

/// Width of the busy/free flag at the start of every slab block.
pub const BLOCK_HEADER_SIZE: usize = 1;

/// The error type used for allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// Invalid `size` (e.g. zero).
    InvalidParam,
    /// No enough pages or blocks to satisfy the request.
    NoMemory,
    /// Address lies outside the arena.
    OutOfRange,
    /// Address does not name a live allocation.
    NotAllocated,
    /// Metadata failed an invariant check.
    Corrupted,
}

/// A [`Result`] type with [`AllocError`] as the error type.
pub type AllocResult<T = ()> = Result<T, AllocError>;

/// Opaque handle to an allocation: the byte offset of its first payload byte
/// from the start of the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HeapAddr(usize);

impl HeapAddr {
    /// Build a handle from a raw arena offset.
    ///
    /// Offsets not issued by the heap are tolerated by every operation, they
    /// are rejected or ignored rather than trusted.
    pub const fn from_offset(offset: usize) -> Self {
        Self(offset)
    }

    /// Byte offset from the arena start.
    pub const fn offset(self) -> usize {
        self.0
    }
}

impl core::fmt::Display for HeapAddr {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

pub mod page;
pub use page::free_pool::FreePagePool;
pub use page::{PageHeader, PageStatus, PageTable};

pub mod slab;
pub use slab::{SizeClass, SizeClassIndex, SlabPage};

pub mod multipage;

pub mod heap;
pub use heap::PageHeap;

pub mod locked;
pub use locked::LockedPageHeap;

pub mod dump;
pub use dump::{BlockSnapshot, HeapSnapshot, PageDetail, PageSnapshot};

#[cfg(feature = "tracking")]
pub mod stats;
#[cfg(feature = "tracking")]
pub use stats::HeapStats;
