//! Runs the reference allocate/free/resize sequence on a four-page heap and
//! prints the arena report after each stage.
//!
//! ```sh
//! cargo run --example demo
//! ```

use page_slab_heap::{PageHeap, DEFAULT_ARENA_SIZE, DEFAULT_PAGE_SIZE};

type Heap = PageHeap<DEFAULT_PAGE_SIZE, DEFAULT_ARENA_SIZE, 16>;

fn main() -> page_slab_heap::AllocResult {
    let mut heap = Heap::new();

    let x1 = heap.allocate(9000)?;
    let x2 = heap.allocate(400)?;
    let x3 = heap.allocate(400)?;
    println!("after allocate 9000, 400, 400 -> {x1}, {x2}, {x3}");
    print!("{}", heap.dump());

    heap.free(Some(x2));
    println!("after free {x2}");
    print!("{}", heap.dump());

    let x5 = heap.resize(Some(x1), 5000)?;
    let x6 = heap.resize(Some(x3), 1000)?;
    println!("after resize {x1} -> 5000 = {x5}, {x3} -> 1000 = {x6}");
    print!("{}", heap.dump());

    heap.validate()
}
