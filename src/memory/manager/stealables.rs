/*!
 * Stealable Capability Surface
 * Reason counting, queue placement and the loan guard
 */

use super::GeneralMemoryAllocator;
use crate::core::types::Address;
use crate::memory::cache::StealableQueue;
use crate::memory::types::{MemoryError, MemoryResult, StealableId};
use log::debug;

/// A held reason for a stealable to stay loaded
///
/// While any loan is alive the stealable is out of every queue and cannot be evicted.
/// Dropping the last loan puts it back in its appropriate queue.
#[must_use = "dropping the loan immediately releases the reason"]
pub struct LoadReason<'a> {
    allocator: &'a GeneralMemoryAllocator,
    id: StealableId,
    released: bool,
}

impl LoadReason<'_> {
    #[inline]
    pub fn id(&self) -> StealableId {
        self.id
    }

    /// Give the reason back now; returns the reasons left
    pub fn release(mut self) -> MemoryResult<u32> {
        self.released = true;
        self.allocator.remove_reason(self.id)
    }
}

impl Drop for LoadReason<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.allocator.remove_reason(self.id) {
            debug!("Load reason for {} not returned: {}", self.id, e);
        }
    }
}

impl std::fmt::Debug for LoadReason<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadReason").field("id", &self.id).finish()
    }
}

impl GeneralMemoryAllocator {
    /// Take a loan on `id`, keeping it resident until the loan is dropped
    pub fn claim(&self, id: StealableId) -> MemoryResult<LoadReason<'_>> {
        self.add_reason(id)?;
        Ok(LoadReason {
            allocator: self,
            id,
            released: false,
        })
    }

    /// Raw form of [`claim`](Self::claim); pair every call with `remove_reason`
    pub fn add_reason(&self, id: StealableId) -> MemoryResult<u32> {
        let mut state = self.enter("add_reason")?;
        state.cache.add_reason(id)
    }

    pub fn remove_reason(&self, id: StealableId) -> MemoryResult<u32> {
        let mut state = self.enter("remove_reason")?;
        state.cache.remove_reason(id).map_err(|e| self.fault(e))
    }

    /// Move an unloaded stealable to the back of `queue`
    pub fn put_stealable_in_queue(&self, id: StealableId, queue: StealableQueue) -> MemoryResult<()> {
        let mut state = self.enter("put_stealable_in_queue")?;
        state.cache.put_in_queue(id, queue)
    }

    /// Move an unloaded stealable to the back of the queue its owner asks for
    pub fn put_stealable_in_appropriate_queue(&self, id: StealableId) -> MemoryResult<StealableQueue> {
        let mut state = self.enter("put_stealable_in_appropriate_queue")?;
        state.cache.put_in_appropriate_queue(id)
    }

    pub fn reasons_to_be_loaded(&self, id: StealableId) -> MemoryResult<u32> {
        let state = self.enter("reasons_to_be_loaded")?;
        state.cache.reasons(id)
    }

    /// Whether `id` is still registered, i.e. neither stolen nor freed
    pub fn is_resident(&self, id: StealableId) -> bool {
        self.enter("is_resident")
            .map(|state| state.cache.contains(id))
            .unwrap_or(false)
    }

    /// Current start address of a stealable's memory
    pub fn stealable_address(&self, id: StealableId) -> MemoryResult<Address> {
        let state = self.enter("stealable_address")?;
        let entry = state.cache.entry(id)?;
        state
            .region(entry.tier)
            .block(entry.block)
            .map(|block| block.address)
            .ok_or(MemoryError::StaleStealable(id))
    }

    /// Queue a stealable currently waits in, if any
    pub fn stealable_queue(&self, id: StealableId) -> MemoryResult<Option<StealableQueue>> {
        let state = self.enter("stealable_queue")?;
        state.cache.entry(id).map(|entry| entry.queue())
    }
}
