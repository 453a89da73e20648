/*!
 * Cache Manager
 *
 * Registry of stealable owners and the priority queues they wait in.
 *
 * ## Reason counting
 *
 * Every registration carries a count of reasons to stay loaded. At zero the entry sits
 * at the back of its appropriate queue and may be evicted; any reason takes it out of
 * its queue, so a loaded entry is never a victim.
 *
 * ## Ordering
 *
 * Queues are FIFO, keyed by a monotonically increasing sequence number. Victim search
 * walks the queues lowest index first.
 */

mod queue;

pub use queue::StealableQueue;

use super::region::BlockId;
use super::traits::Stealable;
use super::types::{CacheStats, MemoryError, MemoryResult, RegionTier, StealableId};
use ahash::AHashSet;
use log::{debug, trace};
use std::collections::BTreeMap;

/// One registered stealable
pub(crate) struct CacheEntry {
    pub owner: Box<dyn Stealable>,
    pub block: BlockId,
    pub tier: RegionTier,
    pub reasons: u32,
    queued: Option<(StealableQueue, u64)>,
}

impl CacheEntry {
    #[inline]
    pub fn queue(&self) -> Option<StealableQueue> {
        self.queued.map(|(queue, _)| queue)
    }
}

impl std::fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEntry")
            .field("block", &self.block)
            .field("tier", &self.tier)
            .field("reasons", &self.reasons)
            .field("queue", &self.queue())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    entry: Option<CacheEntry>,
}

/// Stealable registry plus eviction queues
#[derive(Debug, Default)]
pub struct CacheManager {
    slots: Vec<Slot>,
    vacant: Vec<u32>,
    queues: [BTreeMap<u64, StealableId>; StealableQueue::COUNT],
    next_sequence: u64,
    live: usize,
    stats: CacheStats,
}

impl CacheManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an owner for the block `block`; it starts with no reasons and unqueued
    pub(crate) fn register(
        &mut self,
        owner: Box<dyn Stealable>,
        block: BlockId,
        tier: RegionTier,
    ) -> StealableId {
        let entry = CacheEntry {
            owner,
            block,
            tier,
            reasons: 0,
            queued: None,
        };
        self.live += 1;
        let id = match self.vacant.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.entry = Some(entry);
                StealableId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some(entry),
                });
                StealableId {
                    index,
                    generation: 0,
                }
            }
        };
        trace!("Registered stealable {}", id);
        id
    }

    /// Remove a registration; the id is stale from here on
    pub(crate) fn unregister(&mut self, id: StealableId) -> Option<CacheEntry> {
        self.dequeue(id);
        let slot = self
            .slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)?;
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.vacant.push(id.index);
        self.live -= 1;
        trace!("Unregistered stealable {}", id);
        Some(entry)
    }

    pub(crate) fn get(&self, id: StealableId) -> Option<&CacheEntry> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entry.as_ref())
    }

    fn get_mut(&mut self, id: StealableId) -> Option<&mut CacheEntry> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entry.as_mut())
    }

    pub(crate) fn entry(&self, id: StealableId) -> MemoryResult<&CacheEntry> {
        self.get(id).ok_or(MemoryError::StaleStealable(id))
    }

    #[inline]
    pub fn contains(&self, id: StealableId) -> bool {
        self.get(id).is_some()
    }

    /// Registered stealables
    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Stealables currently waiting in a queue
    pub fn queued_len(&self) -> usize {
        self.queues.iter().map(BTreeMap::len).sum()
    }

    pub fn queue_len(&self, queue: StealableQueue) -> usize {
        self.queues[queue.index()].len()
    }

    /// Queue members in FIFO order
    pub fn queue_members(&self, queue: StealableQueue) -> Vec<StealableId> {
        self.queues[queue.index()].values().copied().collect()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut CacheStats {
        &mut self.stats
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = (StealableId, &CacheEntry)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.entry.as_ref().map(|entry| {
                (
                    StealableId {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    entry,
                )
            })
        })
    }

    /// Move to the back of `queue`, leaving any queue it was in
    fn enqueue(&mut self, id: StealableId, queue: StealableQueue) {
        self.dequeue(id);
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        if let Some(entry) = self.get_mut(id) {
            entry.queued = Some((queue, sequence));
            self.queues[queue.index()].insert(sequence, id);
        }
    }

    fn dequeue(&mut self, id: StealableId) {
        if let Some(entry) = self.get_mut(id) {
            if let Some((queue, sequence)) = entry.queued.take() {
                self.queues[queue.index()].remove(&sequence);
            }
        }
    }

    /// Put an unloaded stealable at the back of `queue`
    pub fn put_in_queue(&mut self, id: StealableId, queue: StealableQueue) -> MemoryResult<()> {
        let entry = self.entry(id)?;
        if entry.reasons > 0 {
            return Err(MemoryError::StealableStillLoaded {
                id,
                reasons: entry.reasons,
            });
        }
        self.enqueue(id, queue);
        Ok(())
    }

    /// Put an unloaded stealable at the back of the queue its owner asks for
    pub fn put_in_appropriate_queue(&mut self, id: StealableId) -> MemoryResult<StealableQueue> {
        let queue = self.entry(id)?.owner.appropriate_queue();
        self.put_in_queue(id, queue)?;
        Ok(queue)
    }

    /// Add a reason to stay loaded; the first one takes the entry out of its queue
    pub fn add_reason(&mut self, id: StealableId) -> MemoryResult<u32> {
        let entry = self.get_mut(id).ok_or(MemoryError::StaleStealable(id))?;
        entry.reasons += 1;
        let reasons = entry.reasons;
        if reasons == 1 {
            self.dequeue(id);
        }
        Ok(reasons)
    }

    /// Drop a reason; the last one sends the entry back to its appropriate queue
    pub fn remove_reason(&mut self, id: StealableId) -> MemoryResult<u32> {
        let entry = self.get_mut(id).ok_or(MemoryError::StaleStealable(id))?;
        if entry.reasons == 0 {
            return Err(MemoryError::ReasonUnderflow(id));
        }
        entry.reasons -= 1;
        let reasons = entry.reasons;
        if reasons == 0 {
            self.put_in_appropriate_queue(id)?;
        }
        Ok(reasons)
    }

    pub fn reasons(&self, id: StealableId) -> MemoryResult<u32> {
        self.entry(id).map(|entry| entry.reasons)
    }

    /// Whether `id` may be evicted to serve a request protecting `thing`
    ///
    /// Owners that refuse are collected in `refused`; the same owner is asked again
    /// whenever a plan passes it, so the caller counts the set once per call.
    pub(crate) fn is_eligible(
        &self,
        id: StealableId,
        thing: Option<StealableId>,
        refused: &mut AHashSet<StealableId>,
    ) -> bool {
        if Some(id) == thing {
            return false;
        }
        let Some(entry) = self.get(id) else {
            return false;
        };
        if entry.reasons > 0 || entry.queued.is_none() {
            return false;
        }
        if !entry.owner.may_be_stolen(thing) {
            refused.insert(id);
            return false;
        }
        true
    }

    /// Add the owners that refused during one steal or extension to the counters
    pub(crate) fn record_refusals(&mut self, refused: &AHashSet<StealableId>) {
        self.stats.refused_thefts += refused.len() as u64;
    }

    /// Queue members in scan order, at most `limit` of them
    pub(crate) fn candidates(&self, limit: usize) -> Vec<StealableId> {
        self.queues
            .iter()
            .flat_map(|queue| queue.values().copied())
            .take(limit)
            .collect()
    }

    /// Ask a queued owner where it belongs now; moves it if that queue is scanned later
    ///
    /// Returns true when the entry was moved.
    pub(crate) fn reassess(&mut self, id: StealableId) -> bool {
        let Some(entry) = self.get(id) else {
            return false;
        };
        let Some((current, _)) = entry.queued else {
            return false;
        };
        if current.is_last() {
            return false;
        }
        let appropriate = entry.owner.appropriate_queue();
        if appropriate <= current {
            return false;
        }
        debug!(
            "Stealable {} moved from {} to {} on reassessment",
            id, current, appropriate
        );
        self.enqueue(id, appropriate);
        self.stats.queue_reassessments += 1;
        true
    }
}
