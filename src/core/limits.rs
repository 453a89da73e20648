/*!
 * System Limits and Constants
 *
 * Centralized location for the memory map, region reservations and allocator tuning.
 * These reflect the fixed hardware partitioning of the workstation and are compile-time
 * constants; hosted builds may still construct a custom `MemoryLayout` for tests and tools.
 */

// =============================================================================
// MEMORY MAP
// =============================================================================

/// First byte of the external SDRAM IC
pub const EXTERNAL_MEMORY_BEGIN: usize = 0x0C00_0000;

/// One past the last byte of external SDRAM (64MB part)
pub const EXTERNAL_MEMORY_END: usize = 0x1000_0000;

/// External memory taken by statically placed data before the stealable heap begins
pub const EXTERNAL_STATIC_RESERVED: usize = 1024 * 1024;

/// First byte of the on-chip SRAM heap
pub const INTERNAL_HEAP_BEGIN: usize = 0x2010_0000;

/// One past the last byte of the on-chip SRAM heap (the program stack starts here)
pub const INTERNAL_HEAP_END: usize = 0x2028_0000;

/// Start of the on-chip slack area left over after fast statically placed data
pub const INTERNAL_SMALL_BEGIN: usize = 0x2002_0000;

// =============================================================================
// REGION RESERVATIONS
// =============================================================================

/// General-purpose external allocator (2MB)
pub const RESERVED_EXTERNAL_ALLOCATOR: usize = 2 * 1024 * 1024;

/// Small-object external allocator (200KB)
pub const RESERVED_EXTERNAL_SMALL_ALLOCATOR: usize = 200 * 1024;

/// Small-object on-chip allocator (200KB)
pub const RESERVED_INTERNAL_SMALL: usize = 200 * 1024;

// =============================================================================
// ROUTING AND PLACEMENT
// =============================================================================

/// Requests smaller than this try the small on-chip region first
pub const INTERNAL_SWITCH_SIZE: usize = 128;

/// Requests smaller than this try the small external region first
pub const EXTERNAL_SWITCH_SIZE: usize = 128;

/// Allocation granule for the large regions
/// Every block start and size is a multiple of this
pub const DEFAULT_GRANULE: usize = 4;

/// Allocation granule for the small-object regions
pub const SMALL_REGION_GRANULE: usize = 16;

/// Leftover at or below this size is handed out with the block instead of split off
pub const DEFAULT_MIN_SPLIT: usize = 8;

/// Split threshold for the small-object regions
pub const SMALL_REGION_MIN_SPLIT: usize = 16;

/// Requests at or below this size are carved from the end of a free block
/// 0 disables end placement
pub const SMALL_REGION_PIVOT: usize = 64;

// =============================================================================
// STEALING BOUNDS
// =============================================================================

/// Max stealables evicted to satisfy one request
/// [PERF] Bounds worst-case latency in the audio render path
pub const MAX_VICTIMS_PER_STEAL: usize = 16;

/// Max queue entries examined as span anchors for one request
pub const MAX_CANDIDATES_PER_STEAL: usize = 256;

/// Queue entries re-asked for their appropriate queue per steal
pub const MAX_QUEUE_REASSESSMENTS: usize = 4;

/// Refused thefts after which a warning is logged once per steal
pub const REFUSED_THEFT_WARNING: usize = 512;

// =============================================================================
// PRESSURE THRESHOLDS
// =============================================================================

/// Usage ratio reported as medium pressure
pub const PRESSURE_MEDIUM: f64 = 0.60;

/// Usage ratio reported as high pressure
pub const PRESSURE_HIGH: f64 = 0.80;

/// Usage ratio reported as critical pressure
pub const PRESSURE_CRITICAL: f64 = 0.95;

/// Stack headroom below which `check_stack` reports a collision (bytes)
pub const STACK_COLLISION_MARGIN: usize = 200;

/// Program stack size reserved above the on-chip heap
pub const PROGRAM_STACK_SIZE: usize = 0x8000;

/// Allocator operations taking longer than this are logged as slow (microseconds)
/// [PERF] One audio buffer at 44.1kHz and 128 frames is about 2900us
pub const SLOW_OPERATION_MICROS: u64 = 1000;
