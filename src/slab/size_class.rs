//! Power-of-two size classes.

use crate::BLOCK_HEADER_SIZE;

/// Block stride of a slab page, flag byte included.
///
/// Always a power of two between the heap's minimum class and half a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SizeClass(usize);

impl SizeClass {
    /// Select the size class serving a request of `size` payload bytes.
    ///
    /// Returns `None` when the request is zero or belongs to the multi-page
    /// path: either `size > PAGE_SIZE / 2`, or the flag byte pushes the
    /// rounded stride past half a page.
    pub fn for_request<const PAGE_SIZE: usize, const MIN_CLASS_SIZE: usize>(
        size: usize,
    ) -> Option<Self> {
        if size == 0 || size > PAGE_SIZE / 2 {
            return None;
        }
        let stride = (size + BLOCK_HEADER_SIZE)
            .next_power_of_two()
            .max(MIN_CLASS_SIZE);
        (stride <= PAGE_SIZE / 2).then_some(Self(stride))
    }

    /// Wrap a stride already known to be a valid class.
    pub fn from_stride<const PAGE_SIZE: usize, const MIN_CLASS_SIZE: usize>(
        stride: usize,
    ) -> Option<Self> {
        (stride.is_power_of_two() && (MIN_CLASS_SIZE..=PAGE_SIZE / 2).contains(&stride))
            .then_some(Self(stride))
    }

    /// Number of classes between `MIN_CLASS_SIZE` and `PAGE_SIZE / 2`.
    pub const fn count<const PAGE_SIZE: usize, const MIN_CLASS_SIZE: usize>() -> usize {
        ((PAGE_SIZE / 2).trailing_zeros() - MIN_CLASS_SIZE.trailing_zeros()) as usize + 1
    }

    pub fn from_index<const PAGE_SIZE: usize, const MIN_CLASS_SIZE: usize>(
        index: usize,
    ) -> Option<Self> {
        if index >= Self::count::<PAGE_SIZE, MIN_CLASS_SIZE>() {
            return None;
        }
        Some(Self(MIN_CLASS_SIZE << index))
    }

    pub fn to_index<const MIN_CLASS_SIZE: usize>(&self) -> usize {
        (self.0.trailing_zeros() - MIN_CLASS_SIZE.trailing_zeros()) as usize
    }

    pub fn size(&self) -> usize {
        self.0
    }

    /// Payload bytes available in one block.
    pub fn payload(&self) -> usize {
        self.0 - BLOCK_HEADER_SIZE
    }

    /// Blocks in one page of this class.
    pub fn blocks_per_page<const PAGE_SIZE: usize>(&self) -> usize {
        PAGE_SIZE / self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(size: usize) -> Option<usize> {
        SizeClass::for_request::<4096, 16>(size).map(|c| c.size())
    }

    #[test]
    fn test_size_class() {
        assert_eq!(class(0), None);
        assert_eq!(class(1), Some(16));
        assert_eq!(class(15), Some(16));
        assert_eq!(class(16), Some(32));
        assert_eq!(class(400), Some(512));
        assert_eq!(class(511), Some(512));
        assert_eq!(class(512), Some(1024));
        assert_eq!(class(1000), Some(1024));
        assert_eq!(class(2047), Some(2048));
        // 2048 + flag byte would need a whole page.
        assert_eq!(class(2048), None);
        assert_eq!(class(2049), None);
    }

    #[test]
    fn test_index_round_trip() {
        assert_eq!(SizeClass::count::<4096, 16>(), 8);
        for index in 0..8 {
            let c = SizeClass::from_index::<4096, 16>(index).unwrap();
            assert_eq!(c.to_index::<16>(), index);
        }
        assert_eq!(SizeClass::from_index::<4096, 16>(8), None);
        assert_eq!(SizeClass::from_index::<4096, 16>(6).unwrap().size(), 1024);
    }

    #[test]
    fn test_from_stride() {
        assert!(SizeClass::from_stride::<4096, 16>(64).is_some());
        assert!(SizeClass::from_stride::<4096, 16>(8).is_none());
        assert!(SizeClass::from_stride::<4096, 16>(48).is_none());
        assert!(SizeClass::from_stride::<4096, 16>(4096).is_none());
    }

    #[test]
    fn test_blocks_per_page() {
        let c = SizeClass::for_request::<4096, 16>(400).unwrap();
        assert_eq!(c.blocks_per_page::<4096>(), 8);
        assert_eq!(c.payload(), 511);
    }
}
