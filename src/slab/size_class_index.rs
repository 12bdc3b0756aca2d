//! Size-class index.
//!
//! One bucket per class, holding the divided pages of that class that still
//! have at least one free block. A full page is absent from its bucket.

use alloc::vec::Vec;

use super::size_class::SizeClass;

pub struct SizeClassIndex<const PAGE_SIZE: usize, const MIN_CLASS_SIZE: usize> {
    buckets: Vec<Vec<usize>>,
}

impl<const PAGE_SIZE: usize, const MIN_CLASS_SIZE: usize> SizeClassIndex<PAGE_SIZE, MIN_CLASS_SIZE> {
    /// Create one empty bucket per eligible class.
    pub fn new() -> Self {
        let count = SizeClass::count::<PAGE_SIZE, MIN_CLASS_SIZE>();
        let mut buckets = Vec::with_capacity(count);
        buckets.resize_with(count, Vec::new);
        Self { buckets }
    }

    fn bucket(&self, class: SizeClass) -> &Vec<usize> {
        &self.buckets[class.to_index::<MIN_CLASS_SIZE>()]
    }

    fn bucket_mut(&mut self, class: SizeClass) -> &mut Vec<usize> {
        &mut self.buckets[class.to_index::<MIN_CLASS_SIZE>()]
    }

    /// First page with a free block in `class`.
    pub fn front(&self, class: SizeClass) -> Option<usize> {
        self.bucket(class).first().copied()
    }

    pub fn push_back(&mut self, class: SizeClass, page: usize) {
        let bucket = self.bucket_mut(class);
        if !bucket.contains(&page) {
            bucket.push(page);
        }
    }

    /// Returns false if the page was not indexed.
    pub fn remove(&mut self, class: SizeClass, page: usize) -> bool {
        let bucket = self.bucket_mut(class);
        match bucket.iter().position(|&p| p == page) {
            Some(pos) => {
                bucket.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, class: SizeClass, page: usize) -> bool {
        self.bucket(class).contains(&page)
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(Vec::is_empty)
    }

    /// All `(class, page)` entries, smallest class first.
    pub fn iter(&self) -> impl Iterator<Item = (SizeClass, usize)> + '_ {
        self.buckets.iter().enumerate().flat_map(|(index, bucket)| {
            SizeClass::from_index::<PAGE_SIZE, MIN_CLASS_SIZE>(index)
                .into_iter()
                .flat_map(move |class| bucket.iter().map(move |&page| (class, page)))
        })
    }
}

impl<const PAGE_SIZE: usize, const MIN_CLASS_SIZE: usize> Default
    for SizeClassIndex<PAGE_SIZE, MIN_CLASS_SIZE>
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(stride: usize) -> SizeClass {
        SizeClass::from_stride::<4096, 16>(stride).unwrap()
    }

    #[test]
    fn test_buckets_start_empty() {
        let index = SizeClassIndex::<4096, 16>::new();
        assert!(index.is_empty());
        assert_eq!(index.front(class(16)), None);
        assert_eq!(index.front(class(2048)), None);
    }

    #[test]
    fn test_push_remove() {
        let mut index = SizeClassIndex::<4096, 16>::new();
        index.push_back(class(512), 3);
        index.push_back(class(512), 1);
        index.push_back(class(512), 3);
        index.push_back(class(64), 2);

        assert_eq!(index.front(class(512)), Some(3));
        assert!(index.contains(class(64), 2));
        assert!(!index.contains(class(512), 2));

        assert!(index.remove(class(512), 3));
        assert!(!index.remove(class(512), 3));
        assert_eq!(index.front(class(512)), Some(1));

        let entries: Vec<_> = index.iter().map(|(c, p)| (c.size(), p)).collect();
        assert_eq!(entries, [(64, 2), (512, 1)]);
    }
}
