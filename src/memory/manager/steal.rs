/*!
 * Stealing Protocol
 *
 * Evicts queued cache data to make room in the stealable tier.
 *
 * 1. Collect: walk the queues lowest priority first and let the region plan a contiguous
 *    span around each eligible candidate. Nothing changes in this phase apart from queue
 *    reassessment, which only moves bookkeeping.
 * 2. Commit: evict the victims of the first workable plan, then retry the allocation.
 * 3. Fallback: evict the globally lowest-priority eligible stealables one at a time,
 *    retrying after each, until the victim bound is reached.
 */

use super::{AllocatorState, GeneralMemoryAllocator};
use crate::core::limits::{MAX_QUEUE_REASSESSMENTS, REFUSED_THEFT_WARNING};
use crate::core::types::{Address, Size};
use crate::memory::region::{BlockId, SpanPlan, SpanSearch};
use crate::memory::traits::Eviction;
use crate::memory::types::{RegionTier, StealableId};
use crate::monitoring::span_operation;
use ahash::AHashSet;
use log::{debug, error, trace, warn};

/// How a steal ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StealOutcome {
    /// The request now fits
    Reclaimed { address: Address, block: BlockId },
    /// No eligible stealable was left
    Exhausted,
    /// Room could only be made by evicting more than the victim bound allows
    WouldRequireExcessiveSteal,
}

impl GeneralMemoryAllocator {
    pub(super) fn steal(
        &self,
        state: &mut AllocatorState,
        size: Size,
        thing: Option<StealableId>,
    ) -> StealOutcome {
        let span = span_operation("steal");
        span.record_size(size);
        let _entered = span.enter();

        let mut refused = AHashSet::new();
        let outcome = match self.collect(state, size, thing, &mut refused) {
            Some(plan) => {
                debug!(
                    "Evicting {} stealables for a {} byte span at 0x{:x}",
                    plan.victims.len(),
                    plan.size,
                    plan.start
                );
                span.record_victims(plan.victims.len());
                for victim in plan.victims {
                    self.evict(state, victim);
                }
                match state.region_mut(RegionTier::Stealable).alloc(size) {
                    Some((address, block)) => StealOutcome::Reclaimed { address, block },
                    None => self.steal_lowest_priority(state, size, thing, &mut refused),
                }
            }
            None => self.steal_lowest_priority(state, size, thing, &mut refused),
        };

        span.record_result(match outcome {
            StealOutcome::Reclaimed { .. } => "reclaimed",
            StealOutcome::Exhausted => "exhausted",
            StealOutcome::WouldRequireExcessiveSteal => "excessive",
        });
        state.cache.record_refusals(&refused);
        if refused.len() >= REFUSED_THEFT_WARNING {
            warn!("{} owners refused eviction during one steal", refused.len());
        }
        outcome
    }

    /// Find the first candidate whose neighbourhood can be turned into a big enough span
    fn collect(
        &self,
        state: &mut AllocatorState,
        size: Size,
        thing: Option<StealableId>,
        refused: &mut AHashSet<StealableId>,
    ) -> Option<SpanPlan> {
        let max_victims = self.config.max_victims_per_steal;
        let mut visited: AHashSet<StealableId> = AHashSet::new();
        let mut reassessments = 0;

        for candidate in state.cache.candidates(self.config.max_candidates_per_steal) {
            if visited.contains(&candidate) {
                continue;
            }
            let Some(entry) = state.cache.get(candidate) else {
                continue;
            };
            let (block, queue) = (entry.block, entry.queue());

            if reassessments < MAX_QUEUE_REASSESSMENTS && queue.is_some_and(|q| !q.is_last()) {
                reassessments += 1;
                if state.cache.reassess(candidate) {
                    continue;
                }
            }
            if !state.cache.is_eligible(candidate, thing, refused) {
                continue;
            }

            let AllocatorState { regions, cache } = &mut *state;
            let region = &regions[RegionTier::Stealable.index()];
            let search = region.plan_span(
                block,
                size,
                |victim| cache.is_eligible(victim, thing, refused),
                max_victims,
            );
            match search {
                SpanSearch::Found(plan) => return Some(plan),
                SpanSearch::VictimBound(victims) => {
                    trace!("Span around {} needs too many victims", candidate);
                    visited.extend(victims);
                }
                SpanSearch::Blocked(victims) => visited.extend(victims),
            }
        }
        None
    }

    fn steal_lowest_priority(
        &self,
        state: &mut AllocatorState,
        size: Size,
        thing: Option<StealableId>,
        refused: &mut AHashSet<StealableId>,
    ) -> StealOutcome {
        let mut stolen = 0;
        loop {
            if let Some((address, block)) = state.region_mut(RegionTier::Stealable).alloc(size) {
                return StealOutcome::Reclaimed { address, block };
            }
            if stolen >= self.config.max_victims_per_steal {
                return StealOutcome::WouldRequireExcessiveSteal;
            }
            let victim = state
                .cache
                .candidates(self.config.max_candidates_per_steal)
                .into_iter()
                .find(|&id| state.cache.is_eligible(id, thing, refused));
            let Some(victim) = victim else {
                return StealOutcome::Exhausted;
            };
            debug!("Fallback eviction of stealable {}", victim);
            if self.evict(state, victim) {
                stolen += 1;
            }
        }
    }

    /// Reclaim one stealable's memory; false if it was already gone
    pub(super) fn evict(&self, state: &mut AllocatorState, victim: StealableId) -> bool {
        let Some(entry) = state.cache.unregister(victim) else {
            trace!("Victim {} already gone", victim);
            return false;
        };
        let region = state.region_mut(entry.tier);
        let Some(block) = region.block(entry.block) else {
            error!("Stealable {} had no live block", victim);
            return false;
        };

        let mut eviction = Eviction::new(victim, block.address, block.size);
        let mut owner = entry.owner;
        owner.on_stolen(&mut eviction);
        drop(owner);
        region.release_block(entry.block);
        state.cache.stats_mut().steals += 1;
        trace!("Stole {} bytes at 0x{:x} from {}", block.size, block.address, victim);

        for address in eviction.into_deferred() {
            state.cache.stats_mut().deferred_deallocations += 1;
            if let Err(e) = self.dealloc_locked(state, address) {
                warn!("Deferred free of 0x{:x} for {} failed: {}", address, victim, e);
            }
        }
        true
    }
}
