/*!
 * Free Space Index
 * Best-fit lookup over the free blocks of one region
 */

use crate::core::types::{Address, Size};
use std::collections::BTreeSet;

/// Free blocks ordered by (size, address)
///
/// - Best fit: O(log n), first entry at or above the requested size
/// - Ties go to the lowest address, so placement is deterministic
#[derive(Debug, Default)]
pub(super) struct FreeSpaceIndex {
    blocks: BTreeSet<(Size, Address)>,
    total: Size,
}

impl FreeSpaceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, address: Address, size: Size) {
        if self.blocks.insert((size, address)) {
            self.total += size;
        }
    }

    pub fn remove(&mut self, address: Address, size: Size) -> bool {
        let removed = self.blocks.remove(&(size, address));
        if removed {
            self.total -= size;
        }
        removed
    }

    /// Smallest free block that holds `size` bytes
    pub fn best_fit(&self, size: Size) -> Option<(Address, Size)> {
        self.blocks
            .range((size, 0)..)
            .next()
            .map(|&(size, address)| (address, size))
    }

    pub fn largest(&self) -> Size {
        self.blocks.iter().next_back().map_or(0, |&(size, _)| size)
    }

    pub fn contains(&self, address: Address, size: Size) -> bool {
        self.blocks.contains(&(size, address))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[inline]
    pub fn total(&self) -> Size {
        self.total
    }
}
