//! Free-page pool
//!
//! Pages not assigned to any slab or chain, kept sorted ascending by page
//! number so the lowest page is always handed out first and a heap that has
//! released everything looks exactly like a fresh one.

#[cfg(feature = "log")]
use log::warn;

use alloc::vec::Vec;

pub struct FreePagePool {
    pages: Vec<usize>,
}

impl FreePagePool {
    /// Create a pool holding pages `0..page_count`.
    pub fn new(page_count: usize) -> Self {
        Self {
            pages: (0..page_count).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn contains(&self, page: usize) -> bool {
        self.pages.binary_search(&page).is_ok()
    }

    /// Remove and return the lowest free page.
    pub fn pop_front(&mut self) -> Option<usize> {
        if self.pages.is_empty() {
            return None;
        }
        Some(self.pages.remove(0))
    }

    /// Remove the `count` lowest free pages, or nothing at all if the pool
    /// holds fewer.
    pub fn take_front(&mut self, count: usize) -> Option<Vec<usize>> {
        if count > self.pages.len() {
            return None;
        }
        Some(self.pages.drain(..count).collect())
    }

    /// Insert element in sorted order.
    ///
    /// Returns false if the page was already in the pool.
    pub fn insert_sorted(&mut self, page: usize) -> bool {
        match self.pages.binary_search(&page) {
            Ok(_) => {
                warn!("free pool: page {} released twice", page);
                false
            }
            Err(pos) => {
                self.pages.insert(pos, page);
                true
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.pages.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_sorted() {
        let mut pool = FreePagePool::new(0);
        assert!(pool.insert_sorted(5));
        assert!(pool.insert_sorted(3));
        assert!(pool.insert_sorted(7));
        assert!(pool.insert_sorted(1));
        assert!(!pool.insert_sorted(3));

        let items: Vec<_> = pool.iter().collect();
        assert_eq!(items, [1, 3, 5, 7]);
    }

    #[test]
    fn test_pop_front_takes_lowest() {
        let mut pool = FreePagePool::new(3);
        assert_eq!(pool.pop_front(), Some(0));
        pool.insert_sorted(0);
        assert_eq!(pool.pop_front(), Some(0));
        assert_eq!(pool.pop_front(), Some(1));
        assert_eq!(pool.pop_front(), Some(2));
        assert_eq!(pool.pop_front(), None);
    }

    #[test]
    fn test_take_front_all_or_nothing() {
        let mut pool = FreePagePool::new(4);
        assert_eq!(pool.take_front(5), None);
        assert_eq!(pool.len(), 4);
        assert_eq!(pool.take_front(3), Some(alloc::vec![0, 1, 2]));
        assert_eq!(pool.len(), 1);
        assert!(pool.contains(3));
        assert!(!pool.contains(0));
    }
}
