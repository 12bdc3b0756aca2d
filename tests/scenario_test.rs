//! Walks the reference allocate/free/resize sequence on a four-page arena
//! and checks the page, bucket and pool state after every step.

#![no_std]

extern crate alloc;
extern crate page_slab_heap;

use alloc::string::ToString;
use page_slab_heap::{HeapAddr, PageDetail, PageHeap, PageStatus};

const PAGE_SIZE: usize = 0x1000;
const ARENA_SIZE: usize = 0x4000;

type Heap = PageHeap<PAGE_SIZE, ARENA_SIZE, 16>;

#[test]
fn test_reference_sequence() {
    let mut heap = Heap::new();

    // 1. A 9000-byte request spans three pages.
    let p1 = heap.allocate(9000).unwrap();
    assert_eq!(p1, HeapAddr::from_offset(0));
    assert_eq!(heap.free_page_count(), 1);
    let snapshot = heap.dump();
    for page in 0..3 {
        assert_eq!(snapshot.page(page).unwrap().status, PageStatus::MultiPage);
    }
    heap.validate().unwrap();

    // 2. 400 bytes round up to the 512-byte class and carve the last page.
    let p2 = heap.allocate(400).unwrap();
    assert_eq!(p2.offset(), 3 * PAGE_SIZE + 1);
    assert_eq!(heap.free_page_count(), 0);
    let slab = heap.dump().pages[3].clone();
    assert_eq!(slab.status, PageStatus::Divided);
    assert_eq!(slab.free_blocks(), 7);

    // 3. The same class reuses the page.
    let p3 = heap.allocate(400).unwrap();
    assert_eq!(p3.offset(), 3 * PAGE_SIZE + 512 + 1);
    assert_eq!(heap.dump().pages[3].free_blocks(), 6);

    // 4. Freeing the first block keeps the page divided and indexed.
    heap.free(Some(p2));
    let slab = heap.dump().pages[3].clone();
    assert_eq!(slab.status, PageStatus::Divided);
    assert_eq!(slab.free_blocks(), 7);
    heap.validate().unwrap();

    // 5. Shrinking the chain to two pages releases its tail in place.
    assert_eq!(heap.resize(Some(p1), 5000), Ok(p1));
    assert_eq!(heap.free_page_count(), 1);
    assert_eq!(heap.dump().pages[2].status, PageStatus::Free);
    match &heap.dump().pages[0].detail {
        PageDetail::MultiPage { block_size, .. } => assert_eq!(*block_size, 2 * PAGE_SIZE),
        other => panic!("unexpected detail {other:?}"),
    }
    heap.validate().unwrap();

    // 6. Moving the last 512-byte block to the 1024-byte class carves the
    //    released page and empties the old slab.
    let p6 = heap.resize(Some(p3), 1000).unwrap();
    assert_eq!(p6.offset(), 2 * PAGE_SIZE + 1);
    let snapshot = heap.dump();
    match &snapshot.pages[2].detail {
        PageDetail::Divided { class_size, .. } => assert_eq!(*class_size, 1024),
        other => panic!("unexpected detail {other:?}"),
    }
    assert_eq!(snapshot.pages[3].status, PageStatus::Free);
    assert_eq!(heap.free_page_count(), 1);
    heap.validate().unwrap();

    let report = snapshot.to_string();
    assert!(report.contains("PAGE 0\nAddress: 0x0000\nStatus: MultiPageBlock"));
    assert!(report.contains("PAGE 2\nAddress: 0x2000\nStatus: Divided"));

    heap.free(Some(p6));
    heap.free(Some(p1));
    assert!(heap.is_pristine());
}

#[test]
fn test_resize_preserves_payload_across_classes() {
    let mut heap = Heap::new();
    let small = heap.allocate(100).unwrap();
    heap.write(small, 0, b"0123456789").unwrap();

    let chain = heap.resize(Some(small), 6000).unwrap();
    assert_eq!(chain.offset() % PAGE_SIZE, 0);
    let mut buf = [0u8; 10];
    heap.read(chain, 0, &mut buf).unwrap();
    assert_eq!(&buf, b"0123456789");

    let back = heap.resize(Some(chain), 5).unwrap();
    let mut buf = [0u8; 5];
    heap.read(back, 0, &mut buf).unwrap();
    assert_eq!(&buf, b"01234");

    heap.free(Some(back));
    assert!(heap.is_pristine());
}

#[test]
fn test_resize_none_allocates() {
    let mut heap = Heap::new();
    let addr = heap.resize(None, 3000).unwrap();
    assert_eq!(heap.usable_size(addr), Ok(PAGE_SIZE));
    assert_eq!(heap.resize(None, 0), Err(page_slab_heap::AllocError::InvalidParam));
}

#[test]
fn test_independent_instances() {
    let mut a = Heap::new();
    let b = Heap::new();
    a.allocate(9000).unwrap();
    assert_eq!(a.free_page_count(), 1);
    assert!(b.is_pristine());
}
