/*!
 * Memory Types
 * Common types for memory management
 */

use crate::core::limits::{PRESSURE_CRITICAL, PRESSURE_HIGH, PRESSURE_MEDIUM};
use crate::core::types::{Address, Size};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Memory operation result
pub type MemoryResult<T> = Result<T, MemoryError>;

/// Memory errors
///
/// Three families: exhaustion (normal under pressure, always recoverable), misuse
/// (programmer error, trapped when `trap_misuse` is set) and reentrancy violations.
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum MemoryError {
    #[error("Zero-size allocation requested")]
    #[diagnostic(code(memory::zero_size))]
    ZeroSizeRequest,

    #[error("Out of memory: requested {requested} bytes, last tried region {tier}")]
    #[diagnostic(
        code(memory::out_of_memory),
        help("Abandon the feature or release cached data. Allocation failure is expected under pressure.")
    )]
    OutOfMemory { requested: Size, tier: RegionTier },

    #[error("Request of {requested} bytes exceeds the largest region capacity of {capacity} bytes")]
    #[diagnostic(code(memory::request_too_large))]
    RequestTooLarge { requested: Size, capacity: Size },

    #[error("Satisfying {requested} bytes would need more than {victims} evictions")]
    #[diagnostic(
        code(memory::excessive_steal),
        help("The stealing loop is bounded to keep allocation latency predictable.")
    )]
    WouldRequireExcessiveSteal { requested: Size, victims: usize },

    #[error("Invalid memory address: 0x{0:x}")]
    #[diagnostic(
        code(memory::invalid_address),
        help("The address is not the start of a live allocation in any region.")
    )]
    InvalidAddress(Address),

    #[error("Double free at 0x{0:x}")]
    #[diagnostic(code(memory::double_free))]
    DoubleFree(Address),

    #[error("Stealable {0} is no longer registered")]
    #[diagnostic(
        code(memory::stale_stealable),
        help("The object was stolen or freed. Reload its data before using it again.")
    )]
    StaleStealable(StealableId),

    #[error("Stealable {id} still has {reasons} reasons to be loaded")]
    #[diagnostic(code(memory::stealable_loaded))]
    StealableStillLoaded { id: StealableId, reasons: u32 },

    #[error("Stealable {0} has no reasons to release")]
    #[diagnostic(code(memory::reason_underflow))]
    ReasonUnderflow(StealableId),

    #[error("Access of {len} bytes at offset {offset} overruns allocation 0x{address:x} of {size} bytes")]
    #[diagnostic(code(memory::out_of_bounds))]
    OutOfBounds {
        address: Address,
        offset: Size,
        len: Size,
        size: Size,
    },

    #[error("Memory corruption detected in region {tier}: {detail}")]
    #[diagnostic(code(memory::corruption))]
    CorruptionDetected { tier: RegionTier, detail: String },

    #[error("Reentrant allocator call: {operation}")]
    #[diagnostic(
        code(memory::reentrancy),
        help("Eviction callbacks must not call the allocator. Use Eviction::defer_dealloc instead.")
    )]
    Reentrancy { operation: &'static str },

    #[error("Stack nearly exhausted at {caller}: {headroom} bytes left")]
    #[diagnostic(code(memory::stack_collision))]
    StackCollision { caller: String, headroom: Size },
}

impl MemoryError {
    /// Recoverable shortage of memory
    pub fn is_exhaustion(&self) -> bool {
        matches!(
            self,
            MemoryError::ZeroSizeRequest
                | MemoryError::OutOfMemory { .. }
                | MemoryError::RequestTooLarge { .. }
                | MemoryError::WouldRequireExcessiveSteal { .. }
        )
    }

    /// Programmer error that invalidates allocator state if ignored
    pub fn is_misuse(&self) -> bool {
        matches!(
            self,
            MemoryError::InvalidAddress(_)
                | MemoryError::DoubleFree(_)
                | MemoryError::ReasonUnderflow(_)
                | MemoryError::OutOfBounds { .. }
                | MemoryError::CorruptionDetected { .. }
                | MemoryError::StackCollision { .. }
        )
    }

    pub fn is_reentrancy(&self) -> bool {
        matches!(self, MemoryError::Reentrancy { .. })
    }
}

/// Region tiers, in the order of the region table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RegionTier {
    /// External SDRAM that backs evictable cache data
    Stealable,
    /// On-chip SRAM heap
    Internal,
    /// External SDRAM general-purpose reservation
    External,
    /// External SDRAM reservation for small objects
    ExternalSmall,
    /// On-chip slack reserved for small objects
    InternalSmall,
}

impl RegionTier {
    pub const COUNT: usize = 5;

    pub const ALL: [RegionTier; Self::COUNT] = [
        RegionTier::Stealable,
        RegionTier::Internal,
        RegionTier::External,
        RegionTier::ExternalSmall,
        RegionTier::InternalSmall,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            RegionTier::Stealable => "stealable",
            RegionTier::Internal => "internal",
            RegionTier::External => "external",
            RegionTier::ExternalSmall => "small external",
            RegionTier::InternalSmall => "small internal",
        }
    }

    /// On-chip tiers are fast but small
    pub const fn is_on_chip(self) -> bool {
        matches!(self, RegionTier::Internal | RegionTier::InternalSmall)
    }
}

impl fmt::Display for RegionTier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Handle to a registered stealable
///
/// Generation-checked: a handle to a stolen or freed object never aliases a newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StealableId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl fmt::Display for StealableId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// Result of allocating stealable memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StealableHandle {
    pub id: StealableId,
    pub address: Address,
}

/// Outcome of an in-place extension
///
/// `address` is the allocation start after the call; it moves left by `left` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Extension {
    pub address: Address,
    pub left: Size,
    pub right: Size,
}

impl Extension {
    pub const fn unchanged(address: Address) -> Self {
        Self {
            address,
            left: 0,
            right: 0,
        }
    }

    #[inline]
    pub const fn total(&self) -> Size {
        self.left + self.right
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Per-region statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionStats {
    pub tier: RegionTier,
    pub base: Address,
    pub size: Size,
    pub used_bytes: Size,
    pub stealable_bytes: Size,
    pub free_bytes: Size,
    pub largest_free_block: Size,
    pub free_blocks: usize,
    pub used_blocks: usize,
    pub stealable_blocks: usize,
    pub allocations: u64,
}

/// Memory statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryStats {
    pub regions: Vec<RegionStats>,
    pub total_memory: usize,
    pub used_memory: usize,
    pub available_memory: usize,
    pub usage_percentage: f64,
    pub registered_stealables: usize,
    pub queued_stealables: usize,
    pub cache: CacheStats,
}

impl MemoryStats {
    pub fn memory_pressure(&self) -> MemoryPressure {
        MemoryPressure::from_ratio(self.usage_percentage / 100.0)
    }

    pub fn region(&self, tier: RegionTier) -> Option<&RegionStats> {
        self.regions.iter().find(|r| r.tier == tier)
    }
}

/// Eviction counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub steals: u64,
    pub refused_thefts: u64,
    pub queue_reassessments: u64,
    pub failed_allocations: u64,
    pub deferred_deallocations: u64,
}

/// Memory pressure levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoryPressure {
    Low,
    Medium,
    High,
    Critical,
}

impl MemoryPressure {
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio >= PRESSURE_CRITICAL {
            MemoryPressure::Critical
        } else if ratio >= PRESSURE_HIGH {
            MemoryPressure::High
        } else if ratio >= PRESSURE_MEDIUM {
            MemoryPressure::Medium
        } else {
            MemoryPressure::Low
        }
    }
}

impl fmt::Display for MemoryPressure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MemoryPressure::Low => write!(f, "LOW"),
            MemoryPressure::Medium => write!(f, "MEDIUM"),
            MemoryPressure::High => write!(f, "HIGH"),
            MemoryPressure::Critical => write!(f, "CRITICAL"),
        }
    }
}
