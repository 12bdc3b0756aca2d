//! Diagnostic snapshots
//!
//! A snapshot is a read-only copy of the page table and the block flags at
//! one point in time. Its `Display` output is the human-readable arena report.

use alloc::vec::Vec;
use core::fmt;

use crate::heap::PageHeap;
use crate::page::{PageStatus, PageTable};
use crate::slab::{SizeClass, SlabPage};
use crate::{HeapAddr, BLOCK_HEADER_SIZE};

/// One slab block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSnapshot {
    /// Payload address (flag byte + 1).
    pub addr: HeapAddr,
    pub free: bool,
}

/// Status-specific page details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageDetail {
    Free,
    Divided {
        class_size: usize,
        blocks: Vec<BlockSnapshot>,
    },
    MultiPage {
        block_size: usize,
        next: Option<HeapAddr>,
        head: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSnapshot {
    pub index: usize,
    pub addr: HeapAddr,
    pub status: PageStatus,
    pub detail: PageDetail,
}

impl PageSnapshot {
    /// Free blocks on a divided page, zero otherwise.
    pub fn free_blocks(&self) -> usize {
        match &self.detail {
            PageDetail::Divided { blocks, .. } => blocks.iter().filter(|b| b.free).count(),
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapSnapshot {
    pub page_size: usize,
    pub pages: Vec<PageSnapshot>,
}

impl HeapSnapshot {
    pub fn page(&self, index: usize) -> Option<&PageSnapshot> {
        self.pages.get(index)
    }
}

impl<const PAGE_SIZE: usize, const ARENA_SIZE: usize, const MIN_CLASS_SIZE: usize>
    PageHeap<PAGE_SIZE, ARENA_SIZE, MIN_CLASS_SIZE>
{
    /// Take a snapshot of every page.
    pub fn dump(&self) -> HeapSnapshot {
        let pages = self
            .table()
            .iter()
            .map(|(index, header)| {
                let base = PageTable::<PAGE_SIZE>::page_base(index);
                let detail = match header.status {
                    PageStatus::Free => PageDetail::Free,
                    PageStatus::Divided => PageDetail::Divided {
                        class_size: header.class_size,
                        blocks: self.dump_blocks(base, header.class_size),
                    },
                    PageStatus::MultiPage => PageDetail::MultiPage {
                        block_size: header.class_size,
                        next: header.next.map(HeapAddr::from_offset),
                        head: header.is_chain_head(),
                    },
                };
                PageSnapshot {
                    index,
                    addr: HeapAddr::from_offset(base),
                    status: header.status,
                    detail,
                }
            })
            .collect();

        HeapSnapshot {
            page_size: PAGE_SIZE,
            pages,
        }
    }

    fn dump_blocks(&self, base: usize, class_size: usize) -> Vec<BlockSnapshot> {
        let Some(class) = SizeClass::from_stride::<PAGE_SIZE, MIN_CLASS_SIZE>(class_size) else {
            return Vec::new();
        };
        let slab = SlabPage::new(&self.arena()[base..base + PAGE_SIZE], class);
        slab.blocks()
            .map(|block| BlockSnapshot {
                addr: HeapAddr::from_offset(base + block + BLOCK_HEADER_SIZE),
                free: slab.is_block_free(block),
            })
            .collect()
    }
}

const SEPARATOR: &str = "-----------------------------------";

fn status_label(status: PageStatus) -> &'static str {
    match status {
        PageStatus::Free => "Free",
        PageStatus::Divided => "Divided",
        PageStatus::MultiPage => "MultiPageBlock",
    }
}

impl fmt::Display for HeapSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{SEPARATOR}")?;
        for page in &self.pages {
            writeln!(f, "PAGE {}", page.index)?;
            writeln!(f, "Address: {}", page.addr)?;
            writeln!(f, "Status: {}", status_label(page.status))?;
            writeln!(f, "Page size: {}", self.page_size)?;
            match &page.detail {
                PageDetail::Free => {}
                PageDetail::Divided { class_size, blocks } => {
                    writeln!(f, "Class size: {class_size}")?;
                    for (i, block) in blocks.iter().enumerate() {
                        writeln!(f, "BLOCK {i}")?;
                        writeln!(f, "Address: {}", block.addr)?;
                        writeln!(f, "Free {}", u8::from(block.free))?;
                    }
                }
                PageDetail::MultiPage {
                    block_size, next, ..
                } => {
                    writeln!(f, "Block size: {block_size}")?;
                    match next {
                        Some(next) => writeln!(f, "Next page: {next}")?,
                        None => writeln!(f, "Next page: none")?,
                    }
                }
            }
            writeln!(f, "{SEPARATOR}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    type SmallHeap = PageHeap<4096, 16384, 16>;

    #[test]
    fn test_dump_fresh_heap() {
        let heap = SmallHeap::new();
        let snapshot = heap.dump();
        assert_eq!(snapshot.pages.len(), 4);
        for (i, page) in snapshot.pages.iter().enumerate() {
            assert_eq!(page.index, i);
            assert_eq!(page.addr.offset(), i * 4096);
            assert_eq!(page.detail, PageDetail::Free);
        }
    }

    #[test]
    fn test_dump_divided_and_chain() {
        let mut heap = SmallHeap::new();
        let chain = heap.allocate(5000).unwrap();
        let block = heap.allocate(1000).unwrap();
        let snapshot = heap.dump();

        let head = snapshot.page(0).unwrap();
        assert_eq!(head.addr, chain);
        assert_eq!(
            head.detail,
            PageDetail::MultiPage {
                block_size: 8192,
                next: Some(HeapAddr::from_offset(4096)),
                head: true,
            }
        );
        assert_eq!(
            snapshot.page(1).unwrap().detail,
            PageDetail::MultiPage {
                block_size: 8192,
                next: None,
                head: false,
            }
        );

        let slab = snapshot.page(2).unwrap();
        assert_eq!(slab.status, PageStatus::Divided);
        assert_eq!(slab.free_blocks(), 3);
        match &slab.detail {
            PageDetail::Divided { class_size, blocks } => {
                assert_eq!(*class_size, 1024);
                assert_eq!(blocks[0], BlockSnapshot { addr: block, free: false });
                assert_eq!(blocks[3].addr.offset(), 2 * 4096 + 3 * 1024 + 1);
            }
            other => panic!("unexpected detail {other:?}"),
        }
    }

    #[test]
    fn test_report_text() {
        let mut heap = SmallHeap::new();
        heap.allocate(9000).unwrap();
        heap.allocate(2000).unwrap();
        let report = heap.dump().to_string();

        assert!(report.starts_with(SEPARATOR));
        assert!(report.contains("PAGE 3\nAddress: 0x3000\nStatus: Divided\n"));
        assert!(report.contains("Class size: 2048"));
        assert!(report.contains("BLOCK 0\nAddress: 0x3001\nFree 0"));
        assert!(report.contains("BLOCK 1\nAddress: 0x3801\nFree 1"));
        assert!(report.contains("PAGE 0\nAddress: 0x0000\nStatus: MultiPageBlock\n"));
        assert!(report.contains("Block size: 12288\nNext page: 0x1000"));
        assert!(report.contains("Next page: none"));
        assert_eq!(report.matches("PAGE ").count(), 4);
    }
}
