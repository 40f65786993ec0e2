//! Glyph atlas: byte-range allocator over one growable buffer.
//!
//! All glyph bitmaps live in a single contiguous `Vec<u8>` that is mirrored
//! into a GPU buffer. Space is handed out in three tiers:
//!
//! 1. **Best fit** from the free list (tightest hole that holds the request).
//! 2. **Bump allocation** from `offset_ptr` while the buffer has room.
//! 3. **Growth** by `capacity / 2 + 1` (or exactly enough, if larger).
//!
//! Eviction of unused glyphs sits between tiers 2 and 3 and is driven by
//! [`GlyphCache`](crate::GlyphCache), which is the only component that knows
//! which ranges belong to unreferenced glyphs.
//!
//! Freed ranges at the end of the bump region simply retract `offset_ptr`;
//! everything else goes into an offset-ordered free list and is merged with
//! its neighbours on insertion.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::AtlasError;

/// A byte range inside the atlas buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AtlasRange {
    pub offset: usize,
    pub size: usize,
}

impl AtlasRange {
    pub fn end(&self) -> usize {
        self.offset + self.size
    }
}

/// Atlas sizing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AtlasConfig {
    /// Bytes allocated up front.
    pub initial_capacity: usize,
    /// Hard ceiling for growth. `None` grows until the allocator refuses.
    pub max_capacity: Option<usize>,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 64 * 1024,
            max_capacity: None,
        }
    }
}

/// CPU-side glyph atlas allocator.
pub struct AtlasAllocator {
    /// Backing bytes. `data.len()` is the capacity.
    data: Vec<u8>,
    /// Bump pointer. Everything at or past it is unused tail.
    offset_ptr: usize,
    /// Free list keyed by offset, for neighbour lookup when merging.
    free_by_offset: BTreeMap<usize, usize>,
    /// The same free list keyed by (size, offset), for best-fit search.
    free_by_size: BTreeSet<(usize, usize)>,
    max_capacity: Option<usize>,
}

impl AtlasAllocator {
    pub fn new(config: &AtlasConfig) -> Self {
        let initial = match config.max_capacity {
            Some(limit) => config.initial_capacity.min(limit),
            None => config.initial_capacity,
        };
        Self {
            data: vec![0u8; initial],
            offset_ptr: 0,
            free_by_offset: BTreeMap::new(),
            free_by_size: BTreeSet::new(),
            max_capacity: config.max_capacity,
        }
    }

    /// Total bytes in the backing buffer.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Current bump pointer.
    pub fn offset_ptr(&self) -> usize {
        self.offset_ptr
    }

    /// Raw atlas contents, for GPU upload.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Free ranges in ascending offset order.
    pub fn free_ranges(&self) -> impl Iterator<Item = AtlasRange> + '_ {
        self.free_by_offset
            .iter()
            .map(|(&offset, &size)| AtlasRange { offset, size })
    }

    pub fn free_range_count(&self) -> usize {
        self.free_by_offset.len()
    }

    /// Sum of all free-list bytes (excludes the unused tail).
    pub fn free_bytes(&self) -> usize {
        self.free_by_offset.values().sum()
    }

    /// Copy `bytes` into the atlas at `offset`.
    ///
    /// The range must have come from this allocator.
    pub fn write(&mut self, offset: usize, bytes: &[u8]) {
        debug_assert!(offset + bytes.len() <= self.data.len());
        if let Some(dst) = self.data.get_mut(offset..offset + bytes.len()) {
            dst.copy_from_slice(bytes);
        }
    }

    /// Allocate without evicting anything: best fit, bump, then growth.
    pub fn allocate(&mut self, size: usize) -> Result<usize, AtlasError> {
        match self.try_allocate(size) {
            Some(offset) => Ok(offset),
            None => self.allocate_growing(size),
        }
    }

    /// Best-fit search followed by bump allocation. `None` means the
    /// request needs eviction or growth.
    pub fn try_allocate(&mut self, size: usize) -> Option<usize> {
        if size == 0 {
            return Some(0);
        }

        if let Some(offset) = self.take_best_fit(size) {
            return Some(offset);
        }

        if self.offset_ptr + size <= self.capacity() {
            let offset = self.offset_ptr;
            self.offset_ptr += size;
            return Some(offset);
        }

        None
    }

    /// Grow the buffer and bump-allocate from the old end.
    pub fn allocate_growing(&mut self, size: usize) -> Result<usize, AtlasError> {
        if size == 0 {
            return Ok(0);
        }
        if self.offset_ptr + size > self.capacity() {
            self.grow(size)?;
        }
        let offset = self.offset_ptr;
        self.offset_ptr += size;
        Ok(offset)
    }

    /// Return a range to the allocator.
    pub fn free(&mut self, offset: usize, size: usize) {
        if size == 0 {
            return;
        }
        debug_assert!(offset + size <= self.offset_ptr, "freeing past the bump pointer");

        if offset + size == self.offset_ptr {
            // LIFO.
            self.offset_ptr = offset;
            self.absorb_tail();
        } else {
            self.insert_free(offset, size);
        }
    }

    // ---------------------------------------------------------------
    // Internal helpers
    // ---------------------------------------------------------------

    /// Carve `size` bytes off the start of the tightest free range.
    fn take_best_fit(&mut self, size: usize) -> Option<usize> {
        let (range_size, range_offset) = self.free_by_size.range((size, 0)..).next().copied()?;

        self.remove_free(range_offset, range_size);
        if range_size > size {
            self.add_free(range_offset + size, range_size - size);
        }
        Some(range_offset)
    }

    /// Insert a free range, merging with the ranges that touch it.
    fn insert_free(&mut self, offset: usize, size: usize) {
        let mut start = offset;
        let mut len = size;

        let prev = self
            .free_by_offset
            .range(..offset)
            .next_back()
            .map(|(&o, &s)| (o, s));
        if let Some((prev_offset, prev_size)) = prev {
            debug_assert!(prev_offset + prev_size <= offset, "overlapping free ranges");
            if prev_offset + prev_size == offset {
                self.remove_free(prev_offset, prev_size);
                start = prev_offset;
                len += prev_size;
            }
        }

        if let Some(&next_size) = self.free_by_offset.get(&(offset + size)) {
            self.remove_free(offset + size, next_size);
            len += next_size;
        }

        self.add_free(start, len);
    }

    /// After the bump pointer retracts, swallow a free range that now ends at it.
    fn absorb_tail(&mut self) {
        let last = self
            .free_by_offset
            .iter()
            .next_back()
            .map(|(&o, &s)| (o, s));
        if let Some((offset, size)) = last {
            if offset + size == self.offset_ptr {
                self.remove_free(offset, size);
                self.offset_ptr = offset;
            }
        }
    }

    fn add_free(&mut self, offset: usize, size: usize) {
        self.free_by_offset.insert(offset, size);
        self.free_by_size.insert((size, offset));
    }

    fn remove_free(&mut self, offset: usize, size: usize) {
        self.free_by_offset.remove(&offset);
        self.free_by_size.remove(&(size, offset));
    }

    fn grow(&mut self, size: usize) -> Result<(), AtlasError> {
        let capacity = self.capacity();
        let needed = self.offset_ptr + size;
        let mut new_capacity = needed.max(capacity + (capacity >> 1) + 1);

        if let Some(limit) = self.max_capacity {
            if needed > limit {
                return Err(AtlasError::CapacityLimit {
                    requested: needed,
                    limit,
                });
            }
            new_capacity = new_capacity.min(limit);
        }

        self.data
            .try_reserve_exact(new_capacity - capacity)
            .map_err(|_| AtlasError::OutOfMemory {
                requested: new_capacity,
            })?;
        self.data.resize(new_capacity, 0);

        log::debug!("glyph atlas grew from {capacity} to {new_capacity} bytes");
        Ok(())
    }
}

// ===================================================================
// Tests
// ===================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn allocator(capacity: usize) -> AtlasAllocator {
        AtlasAllocator::new(&AtlasConfig {
            initial_capacity: capacity,
            max_capacity: None,
        })
    }

    /// Allocate back-to-back blocks and free every other one, leaving holes
    /// of the given sizes separated by live 1-byte spacers.
    fn with_holes(sizes: &[usize]) -> AtlasAllocator {
        let total: usize = sizes.iter().sum::<usize>() + sizes.len();
        let mut atlas = allocator(total);
        let mut holes = Vec::new();
        for &size in sizes {
            holes.push((atlas.allocate(size).unwrap(), size));
            atlas.allocate(1).unwrap();
        }
        for (offset, size) in holes {
            atlas.free(offset, size);
        }
        atlas
    }

    #[test]
    fn test_allocator_creation() {
        let atlas = allocator(256);
        assert_eq!(atlas.capacity(), 256);
        assert_eq!(atlas.offset_ptr(), 0);
        assert_eq!(atlas.free_range_count(), 0);
        assert_eq!(atlas.data().len(), 256);
    }

    #[test]
    fn test_bump_allocation_is_sequential() {
        let mut atlas = allocator(256);
        assert_eq!(atlas.allocate(10).unwrap(), 0);
        assert_eq!(atlas.allocate(20).unwrap(), 10);
        assert_eq!(atlas.offset_ptr(), 30);
    }

    #[test]
    fn test_best_fit_prefers_tightest_range() {
        let mut atlas = with_holes(&[10, 50, 20]);
        // Holes: [0,10) [11,61) [62,82)
        let offset = atlas.allocate(15).unwrap();
        assert_eq!(offset, 62, "should carve from the 20-byte hole");

        let ranges: Vec<_> = atlas.free_ranges().collect();
        assert!(ranges.contains(&AtlasRange { offset: 77, size: 5 }));
        assert!(ranges.contains(&AtlasRange { offset: 11, size: 50 }));
    }

    #[test]
    fn test_exact_fit_removes_range() {
        let mut atlas = with_holes(&[10, 50]);
        assert_eq!(atlas.allocate(10).unwrap(), 0);
        assert_eq!(atlas.free_range_count(), 1);
    }

    #[test]
    fn test_lifo_free_retracts_bump_pointer() {
        let mut atlas = allocator(256);
        let start = atlas.offset_ptr();
        let a = atlas.allocate(10).unwrap();
        let b = atlas.allocate(20).unwrap();
        atlas.free(b, 20);
        atlas.free(a, 10);
        assert_eq!(atlas.offset_ptr(), start);
        assert_eq!(atlas.free_range_count(), 0);
    }

    #[test]
    fn test_tail_free_absorbs_adjacent_free_range() {
        let mut atlas = allocator(256);
        let a = atlas.allocate(10).unwrap();
        let b = atlas.allocate(20).unwrap();
        atlas.free(a, 10);
        assert_eq!(atlas.free_range_count(), 1);
        atlas.free(b, 20);
        assert_eq!(atlas.offset_ptr(), 0);
        assert_eq!(atlas.free_range_count(), 0);
    }

    #[test]
    fn test_merge_is_order_independent() {
        for order in [[0usize, 1], [1, 0]] {
            let mut atlas = allocator(256);
            let blocks = [
                (atlas.allocate(10).unwrap(), 10),
                (atlas.allocate(30).unwrap(), 30),
            ];
            atlas.allocate(5).unwrap(); // keeps both off the tail

            for &i in &order {
                atlas.free(blocks[i].0, blocks[i].1);
            }
            let ranges: Vec<_> = atlas.free_ranges().collect();
            assert_eq!(ranges, vec![AtlasRange { offset: 0, size: 40 }]);
        }
    }

    #[test]
    fn test_merge_on_both_sides() {
        let mut atlas = allocator(256);
        let a = atlas.allocate(8).unwrap();
        let b = atlas.allocate(8).unwrap();
        let c = atlas.allocate(8).unwrap();
        atlas.allocate(8).unwrap();
        atlas.free(a, 8);
        atlas.free(c, 8);
        assert_eq!(atlas.free_range_count(), 2);
        atlas.free(b, 8);
        let ranges: Vec<_> = atlas.free_ranges().collect();
        assert_eq!(ranges, vec![AtlasRange { offset: 0, size: 24 }]);
    }

    #[test]
    fn test_growth_formula() {
        let mut atlas = allocator(100);
        atlas.allocate(100).unwrap();
        assert_eq!(atlas.try_allocate(1), None);
        let offset = atlas.allocate(1).unwrap();
        assert_eq!(offset, 100);
        assert_eq!(atlas.capacity(), 100 + 50 + 1);
    }

    #[test]
    fn test_growth_to_fit_large_request() {
        let mut atlas = allocator(16);
        let offset = atlas.allocate(1000).unwrap();
        assert_eq!(offset, 0);
        assert_eq!(atlas.capacity(), 1000);
    }

    #[test]
    fn test_capacity_limit_is_reported() {
        let mut atlas = AtlasAllocator::new(&AtlasConfig {
            initial_capacity: 64,
            max_capacity: Some(128),
        });
        atlas.allocate(64).unwrap();
        atlas.allocate(64).unwrap();
        assert_eq!(atlas.capacity(), 128);
        let err = atlas.allocate(1).unwrap_err();
        assert_eq!(
            err,
            AtlasError::CapacityLimit {
                requested: 129,
                limit: 128
            }
        );
        assert_eq!(atlas.offset_ptr(), 128, "failed allocation must not move the pointer");
    }

    #[test]
    fn test_zero_sized_allocation_reserves_nothing() {
        let mut atlas = allocator(16);
        assert_eq!(atlas.allocate(0).unwrap(), 0);
        assert_eq!(atlas.offset_ptr(), 0);
        atlas.free(0, 0);
        assert_eq!(atlas.free_range_count(), 0);
    }

    #[test]
    fn test_write_copies_bytes() {
        let mut atlas = allocator(16);
        let offset = atlas.allocate(4).unwrap();
        atlas.write(offset, &[1, 2, 3, 4]);
        assert_eq!(&atlas.data()[offset..offset + 4], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_no_overlap_and_accounting_under_churn() {
        let mut atlas = allocator(512);
        let mut live: Vec<AtlasRange> = Vec::new();
        let mut seed: u32 = 0x1234_5678;
        let mut next = move || {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            seed >> 8
        };

        for _ in 0..2000 {
            if live.is_empty() || next() % 3 != 0 {
                let size = 1 + (next() % 64) as usize;
                let offset = atlas.allocate(size).unwrap();
                live.push(AtlasRange { offset, size });
            } else {
                let idx = next() as usize % live.len();
                let range = live.swap_remove(idx);
                atlas.free(range.offset, range.size);
            }

            let mut sorted = live.clone();
            sorted.sort();
            for pair in sorted.windows(2) {
                assert!(pair[0].end() <= pair[1].offset, "overlap: {:?}", pair);
            }
            for free in atlas.free_ranges() {
                for used in &live {
                    assert!(free.end() <= used.offset || used.end() <= free.offset);
                }
            }

            let live_bytes: usize = live.iter().map(|r| r.size).sum();
            let tail = atlas.capacity() - atlas.offset_ptr();
            assert_eq!(live_bytes + atlas.free_bytes() + tail, atlas.capacity());
        }
    }
}
