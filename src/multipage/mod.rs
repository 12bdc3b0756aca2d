//! Multi-page chains
//!
//! A large allocation occupies whole pages linked head to tail through the
//! page table. Every page of a chain carries the chain's total byte length;
//! links are plain page-to-page references with no header offset.

#[cfg(feature = "log")]
use log::{debug, error};

use alloc::vec::Vec;

use crate::page::free_pool::FreePagePool;
use crate::page::{PageHeader, PageStatus, PageTable};
use crate::{AllocError, AllocResult};

/// Iterator over the pages of a chain, head first.
///
/// Stops after visiting as many pages as the table holds, so a corrupted
/// cyclic link cannot loop forever.
pub struct ChainIter<'a, const PAGE_SIZE: usize> {
    table: &'a PageTable<PAGE_SIZE>,
    current: Option<usize>,
    visited: usize,
}

impl<const PAGE_SIZE: usize> Iterator for ChainIter<'_, PAGE_SIZE> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let page = self.current?;
        if self.visited >= self.table.len() {
            error!("chain: potential cycle detected at page {}", page);
            self.current = None;
            return None;
        }
        let header = self.table.get(page)?;
        if header.status != PageStatus::MultiPage {
            self.current = None;
            return None;
        }
        self.visited += 1;
        self.current = header.next.and_then(|next| self.table.page_of(next));
        Some(page)
    }
}

/// Walk the chain starting at `head`.
pub fn walk<const PAGE_SIZE: usize>(
    table: &PageTable<PAGE_SIZE>,
    head: usize,
) -> ChainIter<'_, PAGE_SIZE> {
    ChainIter {
        table,
        current: Some(head),
        visited: 0,
    }
}

/// Number of pages a chain of `total_bytes` spans.
pub const fn pages_in<const PAGE_SIZE: usize>(total_bytes: usize) -> usize {
    total_bytes / PAGE_SIZE
}

/// Link `pages` in order into one chain of `pages.len() * PAGE_SIZE` bytes.
pub fn link<const PAGE_SIZE: usize>(table: &mut PageTable<PAGE_SIZE>, pages: &[usize]) {
    let total_bytes = pages.len() * PAGE_SIZE;
    for (i, &page) in pages.iter().enumerate() {
        let prev = i
            .checked_sub(1)
            .map(|p| PageTable::<PAGE_SIZE>::page_base(pages[p]));
        let next = pages
            .get(i + 1)
            .map(|&n| PageTable::<PAGE_SIZE>::page_base(n));
        table.set(page, PageHeader::multi_page(total_bytes, prev, next));
    }
}

/// Take `count` pages from the pool and link them into a new chain.
///
/// Returns the head page. Nothing is taken if the pool is short.
pub fn create<const PAGE_SIZE: usize>(
    table: &mut PageTable<PAGE_SIZE>,
    pool: &mut FreePagePool,
    count: usize,
) -> AllocResult<usize> {
    if count == 0 {
        return Err(AllocError::InvalidParam);
    }
    let pages = pool.take_front(count).ok_or(AllocError::NoMemory)?;
    link(table, &pages);
    debug!("chain: linked {} pages starting at page {}", count, pages[0]);
    Ok(pages[0])
}

/// Return every page of the chain at `head` to the pool.
///
/// Returns the number of pages released.
pub fn release<const PAGE_SIZE: usize>(
    table: &mut PageTable<PAGE_SIZE>,
    pool: &mut FreePagePool,
    head: usize,
) -> usize {
    let pages: Vec<usize> = walk(table, head).collect();
    for &page in &pages {
        table.reset(page);
        pool.insert_sorted(page);
    }
    debug!("chain: released {} pages from page {}", pages.len(), head);
    pages.len()
}

/// Grow the chain at `head` to `new_count` pages by linking pool pages onto
/// its tail. Nothing changes if the pool is short.
pub fn extend<const PAGE_SIZE: usize>(
    table: &mut PageTable<PAGE_SIZE>,
    pool: &mut FreePagePool,
    head: usize,
    new_count: usize,
) -> AllocResult {
    let mut pages: Vec<usize> = walk(table, head).collect();
    let extra = new_count
        .checked_sub(pages.len())
        .ok_or(AllocError::InvalidParam)?;
    let added = pool.take_front(extra).ok_or(AllocError::NoMemory)?;
    pages.extend(added);
    link(table, &pages);
    debug!("chain: page {} grown by {} pages", head, extra);
    Ok(())
}

/// Shrink the chain at `head` to its first `new_count` pages, releasing the
/// rest to the pool.
pub fn truncate<const PAGE_SIZE: usize>(
    table: &mut PageTable<PAGE_SIZE>,
    pool: &mut FreePagePool,
    head: usize,
    new_count: usize,
) -> AllocResult {
    let pages: Vec<usize> = walk(table, head).collect();
    if new_count == 0 || new_count > pages.len() {
        return Err(AllocError::InvalidParam);
    }
    let (kept, dropped) = pages.split_at(new_count);
    for &page in dropped {
        table.reset(page);
        pool.insert_sorted(page);
    }
    link(table, kept);
    debug!(
        "chain: page {} shrunk by {} pages",
        head,
        dropped.len()
    );
    Ok(())
}
