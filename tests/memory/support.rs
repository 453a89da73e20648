/*!
 * Shared fixtures for the memory tests
 */

use parking_lot::Mutex;
use std::sync::Arc;
use workstation_memory::{
    Address, AllocatorConfig, Eviction, GeneralMemoryAllocator, MemoryLayout, Stealable,
    StealableId, StealableQueue,
};

pub const BASE: Address = 0x1000;

/// Stealable region of `stealable` bytes; the direct tiers are too small for most requests
pub fn layout(stealable: usize) -> MemoryLayout {
    MemoryLayout::packed(BASE, [stealable, 64, 64, 32, 32]).unwrap()
}

pub fn allocator(stealable: usize) -> GeneralMemoryAllocator {
    GeneralMemoryAllocator::new(AllocatorConfig::strict(layout(stealable))).unwrap()
}

/// Reports misuse as errors instead of panicking
pub fn lenient(stealable: usize) -> GeneralMemoryAllocator {
    let config = AllocatorConfig::strict(layout(stealable)).with_trap_misuse(false);
    GeneralMemoryAllocator::new(config).unwrap()
}

pub type Log = Arc<Mutex<Vec<&'static str>>>;

pub fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

/// Test owner that records its eviction under `name`
pub struct Tracked {
    pub name: &'static str,
    pub queue: StealableQueue,
    pub log: Log,
    pub refuse: bool,
    pub owned: Vec<Address>,
}

impl Tracked {
    pub fn new(name: &'static str, queue: StealableQueue, log: &Log) -> Self {
        Self {
            name,
            queue,
            log: Arc::clone(log),
            refuse: false,
            owned: Vec::new(),
        }
    }

    pub fn refusing(mut self) -> Self {
        self.refuse = true;
        self
    }

    /// Extra allocations to hand back when evicted
    pub fn owning(mut self, addresses: Vec<Address>) -> Self {
        self.owned = addresses;
        self
    }
}

impl Stealable for Tracked {
    fn appropriate_queue(&self) -> StealableQueue {
        self.queue
    }

    fn may_be_stolen(&self, _thing: Option<StealableId>) -> bool {
        !self.refuse
    }

    fn on_stolen(&mut self, eviction: &mut Eviction) {
        for address in self.owned.drain(..) {
            eviction.defer_dealloc(address);
        }
        self.log.lock().push(self.name);
    }
}
