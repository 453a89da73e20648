/*!
 * Memory Traits
 * The capability implemented by owners of evictable cache data
 */

use super::cache::StealableQueue;
use super::types::StealableId;
use crate::core::types::{Address, Size};

/// Owner of memory whose contents can be regenerated or reloaded
///
/// Registered through `GeneralMemoryAllocator::alloc_stealable`. While the owner holds no
/// reasons to be loaded it sits in a queue and may be evicted to satisfy another request;
/// `on_stolen` then runs exactly once and the owner is dropped.
pub trait Stealable: Send {
    /// Queue this data belongs in, consulted whenever the reason count drops to zero
    fn appropriate_queue(&self) -> StealableQueue;

    /// Veto eviction on behalf of the allocation being served
    ///
    /// `thing` is the stealable the requester asked to protect, if any.
    fn may_be_stolen(&self, _thing: Option<StealableId>) -> bool {
        true
    }

    /// Memory is being reclaimed. Must not call back into the allocator; other memory
    /// owned by this object is released through [`Eviction::defer_dealloc`].
    fn on_stolen(&mut self, eviction: &mut Eviction);
}

/// Context handed to [`Stealable::on_stolen`]
#[derive(Debug)]
pub struct Eviction {
    id: StealableId,
    address: Address,
    size: Size,
    deferred: Vec<Address>,
}

impl Eviction {
    pub(crate) fn new(id: StealableId, address: Address, size: Size) -> Self {
        Self {
            id,
            address,
            size,
            deferred: Vec::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> StealableId {
        self.id
    }

    /// Start of the memory being reclaimed
    #[inline]
    pub fn address(&self) -> Address {
        self.address
    }

    #[inline]
    pub fn size(&self) -> Size {
        self.size
    }

    /// Free `address` once the eviction completes
    pub fn defer_dealloc(&mut self, address: Address) {
        self.deferred.push(address);
    }

    pub(crate) fn into_deferred(self) -> Vec<Address> {
        self.deferred
    }
}
