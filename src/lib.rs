/*!
 * Workstation Memory Library
 * Multi-region allocator with stealable cache eviction for the workstation firmware
 */

pub mod core;
pub mod ffi;
pub mod memory;
pub mod monitoring;

// Re-exports
pub use crate::core::errors::{ConfigError, ConfigResult};
pub use crate::core::types::{Address, Size, NULL_ADDRESS};
pub use memory::{
    install_global, AllocatorConfig, CacheStats, Eviction, Extension, GeneralMemoryAllocator,
    LoadReason, MemoryError, MemoryLayout, MemoryPressure, MemoryResult, MemoryStats,
    RegionConfig, RegionStats, RegionTier, Stealable, StealableHandle, StealableId,
    StealableQueue,
};
pub use monitoring::{init_tracing, span_operation};
