/*!
 * Block Descriptor Slab
 * Generation-checked arena of block descriptors owned by one region
 */

use crate::core::types::{Address, Size};
use crate::memory::types::StealableId;

/// Handle to a block descriptor
///
/// The generation is bumped whenever a slot is vacated, so a stale handle never resolves
/// to a descriptor that has since been reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId {
    index: u32,
    generation: u32,
}

/// What occupies a block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Free,
    Used,
    /// Evictable cache data, tagged with its owner registration
    Stealable(StealableId),
}

impl BlockKind {
    #[inline]
    pub fn is_free(&self) -> bool {
        matches!(self, BlockKind::Free)
    }

    #[inline]
    pub fn stealable(&self) -> Option<StealableId> {
        match self {
            BlockKind::Stealable(id) => Some(*id),
            _ => None,
        }
    }
}

/// Block descriptor: the boundary tag of one tile of the region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub address: Address,
    pub size: Size,
    pub kind: BlockKind,
}

impl Block {
    #[inline]
    pub fn end(&self) -> Address {
        self.address + self.size
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    block: Option<Block>,
}

#[derive(Debug, Default)]
pub(crate) struct BlockSlab {
    slots: Vec<Slot>,
    vacant: Vec<u32>,
    live: usize,
}

impl BlockSlab {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, block: Block) -> BlockId {
        self.live += 1;
        if let Some(index) = self.vacant.pop() {
            let slot = &mut self.slots[index as usize];
            slot.block = Some(block);
            return BlockId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            block: Some(block),
        });
        BlockId {
            index,
            generation: 0,
        }
    }

    pub fn get(&self, id: BlockId) -> Option<&Block> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.block.as_ref())
    }

    pub fn get_mut(&mut self, id: BlockId) -> Option<&mut Block> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.block.as_mut())
    }

    pub fn remove(&mut self, id: BlockId) -> Option<Block> {
        let slot = self
            .slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)?;
        let block = slot.block.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.vacant.push(id.index);
        self.live -= 1;
        Some(block)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }
}
