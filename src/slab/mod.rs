//! Slab allocation support.
//!
//! Size classes, the flag-byte view of a divided page, and the index of
//! divided pages that still have room.

pub mod size_class;
pub mod size_class_index;
pub mod slab_page;

// Re-export public types
pub use size_class::SizeClass;
pub use size_class_index::SizeClassIndex;
pub use slab_page::SlabPage;
