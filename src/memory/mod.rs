/*!
 * Memory Module
 * Regions, stealable cache eviction and the general allocator
 */

pub mod cache;
pub mod config;
pub mod manager;
pub mod region;
pub mod traits;
pub mod types;

// Re-export for convenience
pub use cache::{CacheManager, StealableQueue};
pub use config::{AllocatorConfig, MemoryLayout, RegionConfig};
pub use manager::{install_global, GeneralMemoryAllocator, LoadReason};
pub use region::MemoryRegion;
pub use traits::*;
pub use types::*;
