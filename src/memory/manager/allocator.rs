/*!
 * Allocation Routing
 * Region selection, stealable registration and deallocation
 */

use super::steal::StealOutcome;
use super::{AllocatorState, GeneralMemoryAllocator};
use crate::core::limits::{EXTERNAL_SWITCH_SIZE, INTERNAL_SWITCH_SIZE};
use crate::core::types::{checked_align_up, Address, Size, NULL_ADDRESS};
use crate::memory::region::{BlockId, BlockKind};
use crate::memory::traits::Stealable;
use crate::memory::types::{MemoryError, MemoryResult, RegionTier, StealableHandle, StealableId};
use log::{debug, trace, warn};

/// Direct-allocation tiers for a non-stealable request, fastest first
fn route(size: Size, may_use_on_chip_ram: bool) -> Vec<RegionTier> {
    let mut tiers = Vec::with_capacity(4);
    if may_use_on_chip_ram {
        if size < INTERNAL_SWITCH_SIZE {
            tiers.push(RegionTier::InternalSmall);
        }
        tiers.push(RegionTier::Internal);
    }
    if size < EXTERNAL_SWITCH_SIZE {
        tiers.push(RegionTier::ExternalSmall);
    }
    tiers.push(RegionTier::External);
    tiers
}

impl GeneralMemoryAllocator {
    /// Allocate `size` bytes of non-stealable memory
    ///
    /// Falls back to the stealable tier, evicting cache data other than
    /// `thing_not_to_steal_from`, when the direct tiers are full. Exhaustion is an
    /// ordinary error.
    pub fn alloc(
        &self,
        size: Size,
        may_use_on_chip_ram: bool,
        thing_not_to_steal_from: Option<StealableId>,
    ) -> MemoryResult<Address> {
        let mut state = self.enter("alloc")?;
        let result = self.alloc_locked(&mut state, size, may_use_on_chip_ram, thing_not_to_steal_from);
        self.verify(&state);
        result
    }

    /// Latency-sensitive allocation, on-chip RAM allowed
    pub fn alloc_max_speed(&self, size: Size) -> MemoryResult<Address> {
        self.alloc(size, true, None)
    }

    /// Bulk allocation kept off-chip
    pub fn alloc_low_speed(&self, size: Size) -> MemoryResult<Address> {
        self.alloc(size, false, None)
    }

    /// Allocate evictable memory owned by `owner`
    ///
    /// The owner is registered with no reasons to be loaded and queued where it asks to
    /// be, so it may be stolen as soon as this returns unless the caller claims it.
    pub fn alloc_stealable(
        &self,
        size: Size,
        owner: Box<dyn Stealable>,
        thing_not_to_steal_from: Option<StealableId>,
    ) -> MemoryResult<StealableHandle> {
        let mut state = self.enter("alloc_stealable")?;
        let result = self.alloc_stealable_locked(&mut state, size, owner, thing_not_to_steal_from);
        self.verify(&state);
        result
    }

    /// Free an allocation; freeing the null address does nothing
    ///
    /// A stealable allocation is unregistered and its owner dropped without being told it
    /// was stolen.
    pub fn dealloc(&self, address: Address) -> MemoryResult<()> {
        if address == NULL_ADDRESS {
            return Ok(());
        }
        let mut state = self.enter("dealloc")?;
        let result = self.dealloc_locked(&mut state, address);
        self.verify(&state);
        result
    }

    fn alloc_locked(
        &self,
        state: &mut AllocatorState,
        size: Size,
        may_use_on_chip_ram: bool,
        thing: Option<StealableId>,
    ) -> MemoryResult<Address> {
        if size == 0 {
            return Err(MemoryError::ZeroSizeRequest);
        }
        for tier in route(size, may_use_on_chip_ram) {
            if let Some((address, _)) = state.region_mut(tier).alloc(size) {
                trace!("Allocated {} bytes at 0x{:x} from {} region", size, address, tier);
                return Ok(address);
            }
            debug!("{} region cannot hold {} bytes, falling back", tier, size);
        }
        self.alloc_stealing(state, size, thing)
            .map(|(address, _)| address)
    }

    fn alloc_stealable_locked(
        &self,
        state: &mut AllocatorState,
        size: Size,
        owner: Box<dyn Stealable>,
        thing: Option<StealableId>,
    ) -> MemoryResult<StealableHandle> {
        if size == 0 {
            return Err(MemoryError::ZeroSizeRequest);
        }
        let (address, block) = self.alloc_stealing(state, size, thing)?;
        let id = state.cache.register(owner, block, RegionTier::Stealable);
        if let Err(e) = state.region_mut(RegionTier::Stealable).mark_stealable(block, id) {
            self.abandon_stealable(state, id, block);
            return Err(self.fault(e));
        }
        state.cache.put_in_appropriate_queue(id)?;
        trace!("Stealable {} holds {} bytes at 0x{:x}", id, size, address);
        Ok(StealableHandle { id, address })
    }

    /// Undo a half-finished stealable allocation: drop the owner and free its block
    fn abandon_stealable(&self, state: &mut AllocatorState, id: StealableId, block: BlockId) {
        state.cache.unregister(id);
        if state.region_mut(RegionTier::Stealable).release_block(block).is_none() {
            warn!("Block for abandoned stealable {} was already free", id);
        }
    }

    /// Allocate from the stealable tier, evicting cache data if it is full
    pub(super) fn alloc_stealing(
        &self,
        state: &mut AllocatorState,
        size: Size,
        thing: Option<StealableId>,
    ) -> MemoryResult<(Address, BlockId)> {
        let region = state.region_mut(RegionTier::Stealable);
        if let Some(allocation) = region.alloc(size) {
            return Ok(allocation);
        }

        let capacity = region.capacity();
        if checked_align_up(size, region.granule()).map_or(true, |size| size > capacity) {
            state.cache.stats_mut().failed_allocations += 1;
            warn!(
                "Request of {} bytes exceeds stealable capacity of {} bytes",
                size, capacity
            );
            return Err(MemoryError::RequestTooLarge {
                requested: size,
                capacity,
            });
        }

        match self.steal(state, size, thing) {
            StealOutcome::Reclaimed { address, block } => Ok((address, block)),
            StealOutcome::Exhausted => {
                state.cache.stats_mut().failed_allocations += 1;
                warn!("Out of memory: {} bytes, nothing left to steal", size);
                Err(MemoryError::OutOfMemory {
                    requested: size,
                    tier: RegionTier::Stealable,
                })
            }
            StealOutcome::WouldRequireExcessiveSteal => {
                state.cache.stats_mut().failed_allocations += 1;
                warn!(
                    "Out of memory: {} bytes would need more than {} evictions",
                    size, self.config.max_victims_per_steal
                );
                Err(MemoryError::WouldRequireExcessiveSteal {
                    requested: size,
                    victims: self.config.max_victims_per_steal,
                })
            }
        }
    }

    pub(super) fn dealloc_locked(&self, state: &mut AllocatorState, address: Address) -> MemoryResult<()> {
        let tier = self.owning_tier(address)?;
        if let Some((_, block)) = state.region(tier).block_at(address) {
            if let BlockKind::Stealable(id) = block.kind {
                // Owner goes without on_stolen
                state.cache.unregister(id);
            }
        }
        state
            .region_mut(tier)
            .dealloc(address)
            .map_err(|e| self.fault(e))?;
        Ok(())
    }
}
