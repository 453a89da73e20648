/*!
 * In-Place Resize
 * Grow and shrink live allocations without moving their contents
 */

use super::{AllocatorState, GeneralMemoryAllocator};
use crate::core::types::{Address, Size};
use crate::memory::types::{Extension, MemoryResult, StealableId};
use ahash::AHashSet;
use log::debug;

impl GeneralMemoryAllocator {
    /// Grow an allocation in place by at least `min` and at most `ideal` bytes
    ///
    /// Free neighbours are used first; eligible stealable neighbours are evicted only
    /// while `min` is still out of reach, right side before left. If `min` cannot be met
    /// nothing changes and an empty extension comes back. Growing left moves the start
    /// address: the caller must move its own bytes (see [`copy_within`](Self::copy_within)).
    pub fn extend(
        &self,
        address: Address,
        min: Size,
        ideal: Size,
        thing_not_to_steal_from: Option<StealableId>,
    ) -> MemoryResult<Extension> {
        let mut state = self.enter("extend")?;
        let result = self.extend_locked(&mut state, address, min, ideal, thing_not_to_steal_from);
        self.verify(&state);
        result
    }

    fn extend_locked(
        &self,
        state: &mut AllocatorState,
        address: Address,
        min: Size,
        ideal: Size,
        thing: Option<StealableId>,
    ) -> MemoryResult<Extension> {
        let tier = self.owning_tier(address)?;
        let max_victims = self.config.max_victims_per_steal;

        let mut refused = AHashSet::new();
        let region = state.region(tier);
        let (_, block) = region.live_block(address).map_err(|e| self.fault(e))?;
        let own = block.kind.stealable();
        let plan = region.plan_extension(
            address,
            min,
            ideal,
            |victim| Some(victim) != own && state.cache.is_eligible(victim, thing, &mut refused),
            max_victims,
        )?;
        state.cache.record_refusals(&refused);

        if !plan.satisfies_min() {
            debug!(
                "Extension of 0x{:x} found {} of {} bytes{}",
                address,
                plan.available(),
                plan.min,
                if plan.bounded { " before hitting the victim bound" } else { "" }
            );
            return Ok(Extension::unchanged(address));
        }

        for victim in &plan.victims {
            self.evict(state, *victim);
        }
        state
            .region_mut(tier)
            .commit_extension(address, plan.ideal)
            .map_err(|e| self.fault(e))
    }

    /// Shrink from the right to `new_size`; returns the bytes freed
    pub fn shorten_right(&self, address: Address, new_size: Size) -> MemoryResult<Size> {
        let mut state = self.enter("shorten_right")?;
        let tier = self.owning_tier(address)?;
        let result = state
            .region_mut(tier)
            .shorten_right(address, new_size)
            .map_err(|e| self.fault(e));
        self.verify(&state);
        result
    }

    /// Trim `amount` bytes from the left, moving the first `bytes_to_move` bytes along
    ///
    /// Returns the bytes freed; the allocation now starts that many bytes later.
    pub fn shorten_left(
        &self,
        address: Address,
        amount: Size,
        bytes_to_move: Size,
    ) -> MemoryResult<Size> {
        let mut state = self.enter("shorten_left")?;
        let tier = self.owning_tier(address)?;
        let result = state
            .region_mut(tier)
            .shorten_left(address, amount, bytes_to_move)
            .map_err(|e| self.fault(e));
        self.verify(&state);
        result
    }

    /// Absorb a free right neighbour; never evicts
    pub fn extend_right_as_much_as_easily_possible(&self, address: Address) -> MemoryResult<Size> {
        let mut state = self.enter("extend_right")?;
        let tier = self.owning_tier(address)?;
        let result = state
            .region_mut(tier)
            .extend_right_as_much_as_easily_possible(address)
            .map_err(|e| self.fault(e));
        self.verify(&state);
        result
    }

    /// Live size of an allocation, including granule rounding
    pub fn allocated_size(&self, address: Address) -> MemoryResult<Size> {
        let state = self.enter("allocated_size")?;
        let tier = self.owning_tier(address)?;
        state
            .region(tier)
            .allocated_size(address)
            .map_err(|e| self.fault(e))
    }
}
