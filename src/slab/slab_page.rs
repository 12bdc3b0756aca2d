//! Slab page implementation.
//!
//! A divided page is a run of same-size blocks. Every block begins with a
//! one-byte flag stored in the arena itself (non-zero = free, zero = busy),
//! followed by `stride - 1` payload bytes. There is no other per-block state.

#[cfg(feature = "log")]
use log::trace;

use super::size_class::SizeClass;
use crate::BLOCK_HEADER_SIZE;

const FLAG_FREE: u8 = 1;
const FLAG_BUSY: u8 = 0;

/// View over the bytes of one divided page.
///
/// Block positions are page-relative offsets of the block's flag byte.
pub struct SlabPage<B> {
    bytes: B,
    size_class: SizeClass,
}

impl<B: AsRef<[u8]>> SlabPage<B> {
    pub fn new(bytes: B, size_class: SizeClass) -> Self {
        Self { bytes, size_class }
    }

    pub fn block_count(&self) -> usize {
        self.bytes.as_ref().len() / self.size_class.size()
    }

    /// Page-relative flag offsets of every block, in address order.
    pub fn blocks(&self) -> impl Iterator<Item = usize> {
        let stride = self.size_class.size();
        (0..self.block_count()).map(move |i| i * stride)
    }

    pub fn is_block_free(&self, block: usize) -> bool {
        self.bytes.as_ref()[block] != FLAG_BUSY
    }

    /// First free block in address order.
    pub fn first_free(&self) -> Option<usize> {
        self.blocks().find(|&block| self.is_block_free(block))
    }

    pub fn free_count(&self) -> usize {
        self.blocks().filter(|&block| self.is_block_free(block)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks().all(|block| self.is_block_free(block))
    }

    /// Block owning a payload address, if `offset` is exactly the first
    /// payload byte of a block.
    pub fn block_from_payload(&self, offset: usize) -> Option<usize> {
        let block = offset.checked_sub(BLOCK_HEADER_SIZE)?;
        let stride = self.size_class.size();
        (block % stride == 0 && block / stride < self.block_count()).then_some(block)
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> SlabPage<B> {
    /// Mark every block free.
    pub fn format(&mut self) {
        let stride = self.size_class.size();
        for flag in self.bytes.as_mut().iter_mut().step_by(stride) {
            *flag = FLAG_FREE;
        }
    }

    pub fn mark_busy(&mut self, block: usize) {
        trace!("slab page: block {:#x} busy", block);
        self.bytes.as_mut()[block] = FLAG_BUSY;
    }

    pub fn mark_free(&mut self, block: usize) {
        trace!("slab page: block {:#x} free", block);
        self.bytes.as_mut()[block] = FLAG_FREE;
    }
}
