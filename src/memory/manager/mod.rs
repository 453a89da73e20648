/*!
 * General Memory Allocator
 *
 * Unified allocator over the fixed region table with stealable cache eviction.
 *
 * ## Routing
 *
 * Non-stealable requests try the fast tiers first:
 * - **On-chip** (when allowed): small internal for requests under the switch size, then internal
 * - **External**: small external for requests under the switch size, then external
 * - **Stealable**: last resort, evicting cache data when needed
 *
 * Stealable requests only ever go to the stealable tier.
 *
 * ## Stealing
 *
 * Two phases. Collecting is pure: queues are scanned lowest priority first and the region
 * plans a contiguous span around each candidate. Committing evicts the planned victims,
 * notifies their owners and applies the deallocations they deferred. Both the number of
 * candidates examined and the number of victims are bounded.
 *
 * ## Reentrancy
 *
 * Every public entry point takes the state guard. Other threads wait for it; a nested
 * call from the thread already inside is a bug, not a wait condition. It is reported as
 * `MemoryError::Reentrancy` and trapped when `trap_misuse` is set.
 */

mod access;
mod allocator;
mod lock;
mod resize;
mod stats;
mod steal;
mod stealables;

pub use stealables::LoadReason;

use super::cache::CacheManager;
use super::config::AllocatorConfig;
use super::region::{BlockKind, MemoryRegion};
use super::types::{MemoryError, MemoryResult, RegionTier};
use crate::core::errors::ConfigResult;
use crate::core::types::Address;
use log::info;
use parking_lot::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::OnceLock;

/// Unified multi-region allocator
///
/// Construct one per process and hand it to the subsystems that allocate. Legacy call
/// sites and the C wrappers reach it through [`install_global`] and
/// [`GeneralMemoryAllocator::get`].
pub struct GeneralMemoryAllocator {
    config: AllocatorConfig,
    owner: AtomicUsize,
    state: Mutex<AllocatorState>,
    deepest_stack: AtomicUsize,
}

/// Everything mutated under the guard
pub(crate) struct AllocatorState {
    regions: Vec<MemoryRegion>,
    cache: CacheManager,
}

impl AllocatorState {
    #[inline]
    pub(crate) fn region(&self, tier: RegionTier) -> &MemoryRegion {
        &self.regions[tier.index()]
    }

    #[inline]
    pub(crate) fn region_mut(&mut self, tier: RegionTier) -> &mut MemoryRegion {
        &mut self.regions[tier.index()]
    }

    /// Cross-checks every region against the cache registry
    fn check_invariants(&self) -> MemoryResult<()> {
        for region in &self.regions {
            region.check_invariants()?;
            for block in region.blocks() {
                if let BlockKind::Stealable(id) = block.kind {
                    if !self.cache.contains(id) {
                        return Err(MemoryError::CorruptionDetected {
                            tier: region.tier(),
                            detail: format!(
                                "block 0x{:x} tagged with dead stealable {}",
                                block.address, id
                            ),
                        });
                    }
                }
            }
        }

        for (id, entry) in self.cache.entries() {
            let tagged = self
                .region(entry.tier)
                .block(entry.block)
                .map(|block| block.kind == BlockKind::Stealable(id))
                .unwrap_or(false);
            if !tagged {
                return Err(MemoryError::CorruptionDetected {
                    tier: entry.tier,
                    detail: format!("stealable {} lost its block", id),
                });
            }
            if entry.reasons > 0 && entry.queue().is_some() {
                return Err(MemoryError::CorruptionDetected {
                    tier: entry.tier,
                    detail: format!("loaded stealable {} is queued", id),
                });
            }
        }
        Ok(())
    }
}

impl GeneralMemoryAllocator {
    /// Build an allocator over a validated configuration
    pub fn new(config: AllocatorConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    /// Default bounds over a custom layout
    pub fn with_layout(layout: super::config::MemoryLayout) -> ConfigResult<Self> {
        Self::new(AllocatorConfig::default().with_layout(layout))
    }

    fn build(config: AllocatorConfig) -> Self {
        let regions = config
            .layout
            .regions()
            .map(|region| MemoryRegion::new(*region))
            .collect();
        info!(
            "General memory allocator ready: {} bytes across {} regions",
            config.layout.total_size(),
            RegionTier::COUNT
        );
        Self {
            state: Mutex::new(AllocatorState {
                regions,
                cache: CacheManager::new(),
            }),
            owner: AtomicUsize::new(lock::NO_OWNER),
            deepest_stack: AtomicUsize::new(0),
            config,
        }
    }

    #[inline]
    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    /// Tier whose address range holds `address`
    pub fn region_of(&self, address: Address) -> Option<RegionTier> {
        self.config
            .layout
            .regions()
            .find(|region| region.range().contains(address))
            .map(|region| region.tier)
    }

    /// Like [`region_of`](Self::region_of), but an unknown address is misuse
    pub(super) fn owning_tier(&self, address: Address) -> MemoryResult<RegionTier> {
        self.region_of(address)
            .ok_or_else(|| self.fault(MemoryError::InvalidAddress(address)))
    }

    /// The process-wide allocator, if one was installed
    pub fn get() -> Option<&'static GeneralMemoryAllocator> {
        GLOBAL.get()
    }

    /// The process-wide allocator, installing one with the hardware layout if needed
    pub fn get_or_init() -> &'static GeneralMemoryAllocator {
        GLOBAL.get_or_init(|| Self::build(AllocatorConfig::default()))
    }
}

static GLOBAL: OnceLock<GeneralMemoryAllocator> = OnceLock::new();

/// Install the process-wide allocator
///
/// Returns the allocator back if one is already installed.
pub fn install_global(
    allocator: GeneralMemoryAllocator,
) -> Result<&'static GeneralMemoryAllocator, GeneralMemoryAllocator> {
    GLOBAL.set(allocator)?;
    Ok(GeneralMemoryAllocator::get_or_init())
}
