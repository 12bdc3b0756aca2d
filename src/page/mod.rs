//! Page metadata
//!
//! The page table lives outside the arena payload. One header per page
//! records how the page is currently used.

pub mod free_pool;

use alloc::vec::Vec;

/// How a page is currently used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStatus {
    /// Unassigned, owned by the free-page pool.
    Free,
    /// Split into same-size blocks serving one size class.
    Divided,
    /// Part of a multi-page chain.
    MultiPage,
}

/// Per-page metadata record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    pub status: PageStatus,
    /// Block stride for `Divided`, total chain length in bytes for
    /// `MultiPage`, zero for `Free`.
    pub class_size: usize,
    /// `Divided`: arena offset of the next free block's flag byte, `None`
    /// when the page is full. `MultiPage`: arena offset of the next chain
    /// page, `None` on the last page.
    pub next: Option<usize>,
    /// `MultiPage` only: arena offset of the previous chain page.
    pub prev: Option<usize>,
}

impl PageHeader {
    pub const FREE: Self = Self {
        status: PageStatus::Free,
        class_size: 0,
        next: None,
        prev: None,
    };

    pub const fn divided(class_size: usize, first_block: usize) -> Self {
        Self {
            status: PageStatus::Divided,
            class_size,
            next: Some(first_block),
            prev: None,
        }
    }

    pub const fn multi_page(total_bytes: usize, prev: Option<usize>, next: Option<usize>) -> Self {
        Self {
            status: PageStatus::MultiPage,
            class_size: total_bytes,
            next,
            prev,
        }
    }

    pub fn is_free(&self) -> bool {
        self.status == PageStatus::Free
    }

    /// Whether this page is the entry page of a multi-page chain.
    pub fn is_chain_head(&self) -> bool {
        self.status == PageStatus::MultiPage && self.prev.is_none()
    }
}

/// Page table indexed by page number.
pub struct PageTable<const PAGE_SIZE: usize = { crate::DEFAULT_PAGE_SIZE }> {
    headers: Vec<PageHeader>,
}

impl<const PAGE_SIZE: usize> PageTable<PAGE_SIZE> {
    /// Create a table with `page_count` free pages.
    pub fn new(page_count: usize) -> Self {
        let mut headers = Vec::with_capacity(page_count);
        headers.resize(page_count, PageHeader::FREE);
        Self { headers }
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Page number owning an arena offset.
    pub fn page_of(&self, offset: usize) -> Option<usize> {
        let page = offset / PAGE_SIZE;
        (page < self.headers.len()).then_some(page)
    }

    /// Arena offset of the first byte of `page`.
    pub const fn page_base(page: usize) -> usize {
        page * PAGE_SIZE
    }

    pub fn get(&self, page: usize) -> Option<&PageHeader> {
        self.headers.get(page)
    }

    pub fn get_mut(&mut self, page: usize) -> Option<&mut PageHeader> {
        self.headers.get_mut(page)
    }

    pub fn set(&mut self, page: usize, header: PageHeader) {
        if let Some(slot) = self.headers.get_mut(page) {
            *slot = header;
        }
    }

    /// Reset `page` to the free state.
    pub fn reset(&mut self, page: usize) {
        self.set(page, PageHeader::FREE);
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &PageHeader)> {
        self.headers.iter().enumerate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_table_all_free() {
        let table = PageTable::<4096>::new(4);
        assert_eq!(table.len(), 4);
        assert!(table.iter().all(|(_, h)| *h == PageHeader::FREE));
    }

    #[test]
    fn test_page_of() {
        let table = PageTable::<4096>::new(4);
        assert_eq!(table.page_of(0), Some(0));
        assert_eq!(table.page_of(4095), Some(0));
        assert_eq!(table.page_of(4096), Some(1));
        assert_eq!(table.page_of(16383), Some(3));
        assert_eq!(table.page_of(16384), None);
        assert_eq!(PageTable::<4096>::page_base(3), 0x3000);
    }

    #[test]
    fn test_chain_head() {
        let head = PageHeader::multi_page(8192, None, Some(0x1000));
        let tail = PageHeader::multi_page(8192, Some(0), None);
        assert!(head.is_chain_head());
        assert!(!tail.is_chain_head());
        assert!(!PageHeader::divided(64, 0).is_chain_head());
    }

    #[test]
    fn test_reset() {
        let mut table = PageTable::<4096>::new(2);
        table.set(1, PageHeader::divided(32, 0x1000));
        assert_eq!(table.get(1).unwrap().status, PageStatus::Divided);
        table.reset(1);
        assert!(table.get(1).unwrap().is_free());
        assert!(table.get(2).is_none());
    }
}
