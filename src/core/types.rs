/*!
 * Core Types
 * Common types used across the allocator
 */

use serde::{Deserialize, Serialize};

/// Address type for memory operations
///
/// Logical addresses mirror the hardware memory map. `0` is never handed out.
pub type Address = usize;

/// Size type for memory operations
pub type Size = usize;

/// Null address, returned across the C boundary for a failed allocation
pub const NULL_ADDRESS: Address = 0;

/// Half-open address range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddressRange {
    pub start: Address,
    pub end: Address,
}

impl AddressRange {
    pub const fn new(start: Address, size: Size) -> Self {
        Self {
            start,
            end: start + size,
        }
    }

    #[inline]
    pub const fn len(&self) -> Size {
        self.end - self.start
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    #[inline]
    pub const fn contains(&self, address: Address) -> bool {
        address >= self.start && address < self.end
    }

    #[inline]
    pub const fn overlaps(&self, other: &AddressRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Round `value` up to a multiple of `granule` (a power of two)
#[inline]
pub const fn align_up(value: Size, granule: Size) -> Size {
    (value + granule - 1) & !(granule - 1)
}

/// [`align_up`] for caller-supplied sizes; `None` when rounding would overflow
#[inline]
pub const fn checked_align_up(value: Size, granule: Size) -> Option<Size> {
    match value.checked_add(granule - 1) {
        Some(padded) => Some(padded & !(granule - 1)),
        None => None,
    }
}

/// Round `value` down to a multiple of `granule` (a power of two)
#[inline]
pub const fn align_down(value: Size, granule: Size) -> Size {
    value & !(granule - 1)
}
