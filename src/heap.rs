//! Page heap implementation.
//!
//! This module implements the allocator proper: it owns the arena, the page
//! table, the free-page pool and the size-class index, and is the only code
//! that mutates them. Requests up to half a page are served from size-class
//! slabs; larger requests get a multi-page chain.

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;
use core::ops::Range;

#[cfg(feature = "log")]
use log::{debug, error, warn};

use crate::multipage;
use crate::page::free_pool::FreePagePool;
use crate::page::{PageHeader, PageStatus, PageTable};
use crate::slab::{SizeClass, SizeClassIndex, SlabPage};
use crate::{AllocError, AllocResult, HeapAddr, BLOCK_HEADER_SIZE};

/// What a live address resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Owner {
    /// `block` is the arena offset of the block's flag byte.
    Block {
        page: usize,
        class: SizeClass,
        block: usize,
    },
    Chain {
        head: usize,
    },
}

/// Fixed-capacity heap over one `ARENA_SIZE`-byte arena split into
/// `PAGE_SIZE`-byte pages.
///
/// The heap is single-threaded; wrap it in [`crate::LockedPageHeap`] to share it.
pub struct PageHeap<
    const PAGE_SIZE: usize = { crate::DEFAULT_PAGE_SIZE },
    const ARENA_SIZE: usize = { crate::DEFAULT_ARENA_SIZE },
    const MIN_CLASS_SIZE: usize = { crate::DEFAULT_MIN_CLASS_SIZE },
> {
    arena: Box<[u8]>,
    table: PageTable<PAGE_SIZE>,
    pool: FreePagePool,
    index: SizeClassIndex<PAGE_SIZE, MIN_CLASS_SIZE>,
}

impl<const PAGE_SIZE: usize, const ARENA_SIZE: usize, const MIN_CLASS_SIZE: usize>
    PageHeap<PAGE_SIZE, ARENA_SIZE, MIN_CLASS_SIZE>
{
    const VALID_CONFIG: () = {
        assert!(PAGE_SIZE.is_power_of_two(), "page size must be a power of two");
        assert!(
            ARENA_SIZE > 0 && ARENA_SIZE % PAGE_SIZE == 0,
            "arena size must be a non-zero multiple of the page size"
        );
        assert!(
            MIN_CLASS_SIZE.is_power_of_two() && MIN_CLASS_SIZE > BLOCK_HEADER_SIZE,
            "minimum class must be a power of two above the flag byte"
        );
        assert!(
            MIN_CLASS_SIZE <= PAGE_SIZE / 2,
            "minimum class must fit twice in a page"
        );
    };

    /// Number of pages in the arena.
    pub const PAGE_COUNT: usize = ARENA_SIZE / PAGE_SIZE;

    /// Create a heap with every page free and every size-class bucket empty.
    pub fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::VALID_CONFIG;

        Self {
            arena: vec![0u8; ARENA_SIZE].into_boxed_slice(),
            table: PageTable::new(Self::PAGE_COUNT),
            pool: FreePagePool::new(Self::PAGE_COUNT),
            index: SizeClassIndex::new(),
        }
    }

    pub fn total_pages(&self) -> usize {
        Self::PAGE_COUNT
    }

    pub fn free_page_count(&self) -> usize {
        self.pool.len()
    }

    /// Whether the heap is indistinguishable from a freshly created one.
    pub fn is_pristine(&self) -> bool {
        self.pool.len() == Self::PAGE_COUNT
            && self.pool.iter().eq(0..Self::PAGE_COUNT)
            && self.index.is_empty()
            && self.table.iter().all(|(_, header)| *header == PageHeader::FREE)
    }

    pub(crate) fn arena(&self) -> &[u8] {
        &self.arena
    }

    pub(crate) fn table(&self) -> &PageTable<PAGE_SIZE> {
        &self.table
    }

    fn page_range(page: usize) -> Range<usize> {
        let base = PageTable::<PAGE_SIZE>::page_base(page);
        base..base + PAGE_SIZE
    }

    fn slab(&self, page: usize, class: SizeClass) -> SlabPage<&[u8]> {
        SlabPage::new(&self.arena[Self::page_range(page)], class)
    }

    fn slab_mut(&mut self, page: usize, class: SizeClass) -> SlabPage<&mut [u8]> {
        SlabPage::new(&mut self.arena[Self::page_range(page)], class)
    }

    /// Resolve an address to the live allocation it starts.
    fn locate(&self, addr: HeapAddr) -> AllocResult<Owner> {
        let offset = addr.offset();
        if offset >= ARENA_SIZE {
            return Err(AllocError::OutOfRange);
        }
        let page = self.table.page_of(offset).ok_or(AllocError::OutOfRange)?;
        let header = self.table.get(page).ok_or(AllocError::OutOfRange)?;
        let base = PageTable::<PAGE_SIZE>::page_base(page);

        match header.status {
            PageStatus::Free => Err(AllocError::NotAllocated),
            PageStatus::Divided => {
                let class = SizeClass::from_stride::<PAGE_SIZE, MIN_CLASS_SIZE>(header.class_size)
                    .ok_or(AllocError::Corrupted)?;
                let slab = self.slab(page, class);
                let block = slab
                    .block_from_payload(offset - base)
                    .ok_or(AllocError::NotAllocated)?;
                if slab.is_block_free(block) {
                    return Err(AllocError::NotAllocated);
                }
                Ok(Owner::Block {
                    page,
                    class,
                    block: base + block,
                })
            }
            PageStatus::MultiPage => {
                if offset != base || !header.is_chain_head() {
                    return Err(AllocError::NotAllocated);
                }
                Ok(Owner::Chain { head: page })
            }
        }
    }

    /// Allocate `size` bytes.
    ///
    /// Fails with [`AllocError::InvalidParam`] for a zero size and with
    /// [`AllocError::NoMemory`] when neither a slab block nor enough free
    /// pages are available. A failed call changes nothing.
    pub fn allocate(&mut self, size: usize) -> AllocResult<HeapAddr> {
        if size == 0 {
            return Err(AllocError::InvalidParam);
        }
        match SizeClass::for_request::<PAGE_SIZE, MIN_CLASS_SIZE>(size) {
            Some(class) => self.alloc_block(class),
            None => self.alloc_chain(size),
        }
    }

    /// Turn the lowest free page into an empty slab of `class`.
    fn carve_page(&mut self, class: SizeClass) -> AllocResult<usize> {
        let page = self.pool.pop_front().ok_or(AllocError::NoMemory)?;
        let base = PageTable::<PAGE_SIZE>::page_base(page);
        self.slab_mut(page, class).format();
        self.table.set(page, PageHeader::divided(class.size(), base));
        self.index.push_back(class, page);
        debug!(
            "heap: page {} divided into {} blocks of {} bytes",
            page,
            class.blocks_per_page::<PAGE_SIZE>(),
            class.size()
        );
        Ok(page)
    }

    fn alloc_block(&mut self, class: SizeClass) -> AllocResult<HeapAddr> {
        let page = match self.index.front(class) {
            Some(page) => page,
            None => self.carve_page(class)?,
        };
        let base = PageTable::<PAGE_SIZE>::page_base(page);
        let block = self
            .table
            .get(page)
            .and_then(|header| header.next)
            .ok_or(AllocError::Corrupted)?;

        let mut slab = self.slab_mut(page, class);
        slab.mark_busy(block - base);
        let next_free = slab.first_free().map(|free| base + free);

        if let Some(header) = self.table.get_mut(page) {
            header.next = next_free;
        }
        if next_free.is_none() {
            self.index.remove(class, page);
        }
        Ok(HeapAddr::from_offset(block + BLOCK_HEADER_SIZE))
    }

    fn alloc_chain(&mut self, size: usize) -> AllocResult<HeapAddr> {
        let pages_needed = size.div_ceil(PAGE_SIZE);
        let head = multipage::create(&mut self.table, &mut self.pool, pages_needed)?;
        Ok(HeapAddr::from_offset(PageTable::<PAGE_SIZE>::page_base(head)))
    }

    /// Release an allocation.
    ///
    /// `None`, out-of-range addresses and addresses that do not start a live
    /// allocation are ignored.
    pub fn free(&mut self, addr: Option<HeapAddr>) {
        let Some(addr) = addr else {
            return;
        };
        match self.locate(addr) {
            Ok(Owner::Block { page, class, block }) => self.free_block(page, class, block),
            Ok(Owner::Chain { head }) => {
                multipage::release(&mut self.table, &mut self.pool, head);
            }
            Err(_e) => {
                warn!("heap: ignoring free of {}: {:?}", addr, _e);
            }
        }
    }

    fn free_block(&mut self, page: usize, class: SizeClass, block: usize) {
        let base = PageTable::<PAGE_SIZE>::page_base(page);
        let mut slab = self.slab_mut(page, class);
        slab.mark_free(block - base);
        let now_empty = slab.is_empty();

        if now_empty {
            self.index.remove(class, page);
            self.table.reset(page);
            self.pool.insert_sorted(page);
            debug!("heap: page {} returned to the free pool", page);
        } else if !self.index.contains(class, page) {
            // The page was full; its stale cursor becomes the freed block.
            if let Some(header) = self.table.get_mut(page) {
                header.next = Some(block);
            }
            self.index.push_back(class, page);
        }
    }

    /// Resize an allocation to `size` bytes.
    ///
    /// `None` behaves like [`PageHeap::allocate`]. Slab blocks stay in place
    /// when `size` maps to the same class, otherwise they move to a fresh
    /// allocation; if that allocation fails the original address is returned
    /// unchanged. Chains grow or shrink in place and keep their address,
    /// unless `size` drops to half a page or less, in which case the chain is
    /// released and the data moves to a fresh allocation.
    ///
    /// Every relocation preserves payload bytes up to the smaller of the two
    /// capacities.
    pub fn resize(&mut self, addr: Option<HeapAddr>, size: usize) -> AllocResult<HeapAddr> {
        let Some(addr) = addr else {
            return self.allocate(size);
        };
        match self.locate(addr)? {
            Owner::Block { class, .. } => self.resize_block(addr, class, size),
            Owner::Chain { head } => self.resize_chain(addr, head, size),
        }
    }

    fn resize_block(
        &mut self,
        addr: HeapAddr,
        class: SizeClass,
        size: usize,
    ) -> AllocResult<HeapAddr> {
        if SizeClass::for_request::<PAGE_SIZE, MIN_CLASS_SIZE>(size) == Some(class) {
            return Ok(addr);
        }
        let new_addr = match self.allocate(size) {
            Ok(new_addr) => new_addr,
            Err(_e) => {
                debug!("heap: resize of {} to {} rejected: {:?}", addr, size, _e);
                return Ok(addr);
            }
        };

        let keep = class.payload().min(self.usable_size(new_addr)?);
        let mut saved = vec![0u8; keep];
        self.read(addr, 0, &mut saved)?;
        self.write(new_addr, 0, &saved)?;
        self.free(Some(addr));
        Ok(new_addr)
    }

    fn resize_chain(&mut self, addr: HeapAddr, head: usize, size: usize) -> AllocResult<HeapAddr> {
        let total_bytes = self
            .table
            .get(head)
            .map(|header| header.class_size)
            .ok_or(AllocError::Corrupted)?;
        let old_pages = multipage::pages_in::<PAGE_SIZE>(total_bytes);
        let new_pages = size.div_ceil(PAGE_SIZE);

        if new_pages == old_pages {
            return Ok(addr);
        }

        if size <= PAGE_SIZE / 2 {
            // The new block may be carved from a page this chain releases,
            // so the payload goes through a temporary buffer. The new
            // payload is at most one page; `write` clamps to its capacity.
            let mut saved = vec![0u8; total_bytes.min(PAGE_SIZE)];
            self.read(addr, 0, &mut saved)?;
            multipage::release(&mut self.table, &mut self.pool, head);
            let new_addr = self.allocate(size)?;
            self.write(new_addr, 0, &saved)?;
            return Ok(new_addr);
        }

        if new_pages > old_pages {
            multipage::extend(&mut self.table, &mut self.pool, head, new_pages)?;
        } else {
            multipage::truncate(&mut self.table, &mut self.pool, head, new_pages)?;
        }
        Ok(addr)
    }

    /// Arena ranges making up the payload of a live allocation, in order.
    fn payload_ranges(&self, addr: HeapAddr) -> AllocResult<Vec<Range<usize>>> {
        Ok(match self.locate(addr)? {
            Owner::Block { class, block, .. } => {
                vec![block + BLOCK_HEADER_SIZE..block + class.size()]
            }
            Owner::Chain { head } => multipage::walk(&self.table, head)
                .map(Self::page_range)
                .collect(),
        })
    }

    /// Split `len` payload bytes starting at `offset` into
    /// `(arena_start, buf_start, count)` copies.
    fn spans(
        &self,
        addr: HeapAddr,
        offset: usize,
        len: usize,
    ) -> AllocResult<Vec<(usize, usize, usize)>> {
        let mut spans = Vec::new();
        let mut skip = offset;
        let mut done = 0;
        for range in self.payload_ranges(addr)? {
            if done == len {
                break;
            }
            if skip >= range.len() {
                skip -= range.len();
                continue;
            }
            let start = range.start + skip;
            skip = 0;
            let count = (range.end - start).min(len - done);
            spans.push((start, done, count));
            done += count;
        }
        Ok(spans)
    }

    /// Copy payload bytes of the allocation at `addr`, starting `offset`
    /// bytes in, into `buf`. Returns the number of bytes copied, which is
    /// short when the payload ends first.
    pub fn read(&self, addr: HeapAddr, offset: usize, buf: &mut [u8]) -> AllocResult<usize> {
        let mut copied = 0;
        for (start, at, count) in self.spans(addr, offset, buf.len())? {
            buf[at..at + count].copy_from_slice(&self.arena[start..start + count]);
            copied += count;
        }
        Ok(copied)
    }

    /// Copy `data` into the payload of the allocation at `addr`, starting
    /// `offset` bytes in. Returns the number of bytes written, which is
    /// short when the payload ends first.
    pub fn write(&mut self, addr: HeapAddr, offset: usize, data: &[u8]) -> AllocResult<usize> {
        let mut written = 0;
        for (start, at, count) in self.spans(addr, offset, data.len())? {
            self.arena[start..start + count].copy_from_slice(&data[at..at + count]);
            written += count;
        }
        Ok(written)
    }

    /// Payload capacity of the allocation at `addr`.
    pub fn usable_size(&self, addr: HeapAddr) -> AllocResult<usize> {
        match self.locate(addr)? {
            Owner::Block { class, .. } => Ok(class.payload()),
            Owner::Chain { head } => self
                .table
                .get(head)
                .map(|header| header.class_size)
                .ok_or(AllocError::Corrupted),
        }
    }

    /// Check that the page table, the free pool and the size-class index
    /// agree with each other and with the flag bytes in the arena.
    pub fn validate(&self) -> AllocResult {
        let mut chained = vec![false; Self::PAGE_COUNT];

        for (page, header) in self.table.iter() {
            let ok = match header.status {
                PageStatus::Free => {
                    *header == PageHeader::FREE && self.pool.contains(page)
                }
                PageStatus::Divided => self.validate_slab(page, header),
                PageStatus::MultiPage => {
                    !self.pool.contains(page)
                        && (!header.is_chain_head() || self.validate_chain(page, &mut chained))
                }
            };
            if !ok {
                error!("heap: page {} failed validation: {:?}", page, header);
                return Err(AllocError::Corrupted);
            }
        }

        // Every chain page must hang off exactly one head.
        for (page, header) in self.table.iter() {
            if header.status == PageStatus::MultiPage && !chained[page] {
                error!("heap: page {} is not reachable from any chain head", page);
                return Err(AllocError::Corrupted);
            }
        }

        for page in self.pool.iter() {
            if !self.table.get(page).is_some_and(PageHeader::is_free) {
                error!("heap: pooled page {} is in use", page);
                return Err(AllocError::Corrupted);
            }
        }

        for (class, page) in self.index.iter() {
            let indexed = self.table.get(page).is_some_and(|header| {
                header.status == PageStatus::Divided && header.class_size == class.size()
            });
            if !indexed {
                error!("heap: page {} indexed under class {}", page, class.size());
                return Err(AllocError::Corrupted);
            }
        }

        Ok(())
    }

    fn validate_slab(&self, page: usize, header: &PageHeader) -> bool {
        let Some(class) = SizeClass::from_stride::<PAGE_SIZE, MIN_CLASS_SIZE>(header.class_size)
        else {
            return false;
        };
        if self.pool.contains(page) {
            return false;
        }
        let slab = self.slab(page, class);
        let base = PageTable::<PAGE_SIZE>::page_base(page);
        let free = slab.free_count();
        let has_room = free > 0;
        // An all-free slab belongs in the pool, not in the table.
        if free == slab.block_count() || has_room != self.index.contains(class, page) {
            return false;
        }
        match header.next {
            Some(next) => {
                has_room
                    && next >= base
                    && slab.blocks().any(|block| base + block == next)
                    && slab.is_block_free(next - base)
            }
            None => !has_room,
        }
    }

    fn validate_chain(&self, head: usize, chained: &mut [bool]) -> bool {
        let Some(total_bytes) = self.table.get(head).map(|header| header.class_size) else {
            return false;
        };
        if total_bytes == 0 || total_bytes % PAGE_SIZE != 0 {
            return false;
        }
        let mut count = 0;
        let mut last = head;
        for page in multipage::walk(&self.table, head) {
            let same_chain = self
                .table
                .get(page)
                .is_some_and(|header| header.class_size == total_bytes);
            if chained[page] || !same_chain {
                return false;
            }
            chained[page] = true;
            count += 1;
            last = page;
        }
        count == multipage::pages_in::<PAGE_SIZE>(total_bytes)
            && self.table.get(last).is_some_and(|header| header.next.is_none())
    }
}

impl<const PAGE_SIZE: usize, const ARENA_SIZE: usize, const MIN_CLASS_SIZE: usize> Default
    for PageHeap<PAGE_SIZE, ARENA_SIZE, MIN_CLASS_SIZE>
{
    fn default() -> Self {
        Self::new()
    }
}
