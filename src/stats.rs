//! Usage statistics
//!
//! Counters derived from the page table and slab flags on demand.

#[cfg(feature = "log")]
use log::info;

use crate::dump::PageDetail;
use crate::heap::PageHeap;

/// Heap usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
    pub total_pages: usize,
    pub free_pages: usize,
    pub divided_pages: usize,
    pub multipage_pages: usize,
    /// Number of multi-page allocations.
    pub chains: usize,
    pub used_blocks: usize,
    pub free_blocks: usize,
}

impl HeapStats {
    pub const fn new() -> Self {
        Self {
            total_pages: 0,
            free_pages: 0,
            divided_pages: 0,
            multipage_pages: 0,
            chains: 0,
            used_blocks: 0,
            free_blocks: 0,
        }
    }

    /// Pages not in the free pool.
    pub fn used_pages(&self) -> usize {
        self.total_pages - self.free_pages
    }

    /// Log the counters at info level.
    #[allow(unused_variables)]
    pub fn report(&self, page_size: usize) {
        info!("========================================");
        info!(
            "Pages: {} total, {} free ({} KB)",
            self.total_pages,
            self.free_pages,
            (self.free_pages * page_size) / 1024
        );
        info!(
            "  Divided: {} pages, {} blocks used, {} blocks free",
            self.divided_pages, self.used_blocks, self.free_blocks
        );
        info!(
            "  Multi-page: {} pages in {} chains",
            self.multipage_pages, self.chains
        );
        info!("========================================");
    }
}

impl<const PAGE_SIZE: usize, const ARENA_SIZE: usize, const MIN_CLASS_SIZE: usize>
    PageHeap<PAGE_SIZE, ARENA_SIZE, MIN_CLASS_SIZE>
{
    /// Gather usage statistics.
    pub fn stats(&self) -> HeapStats {
        let mut stats = HeapStats::new();
        for page in self.dump().pages {
            stats.total_pages += 1;
            match page.detail {
                PageDetail::Free => stats.free_pages += 1,
                PageDetail::Divided { blocks, .. } => {
                    stats.divided_pages += 1;
                    let free = blocks.iter().filter(|b| b.free).count();
                    stats.free_blocks += free;
                    stats.used_blocks += blocks.len() - free;
                }
                PageDetail::MultiPage { head, .. } => {
                    stats.multipage_pages += 1;
                    if head {
                        stats.chains += 1;
                    }
                }
            }
        }
        stats
    }
}
