/*!
 * Region Allocation
 * Best-fit placement, splitting and coalescing free
 */

use super::{Block, BlockId, BlockKind, MemoryRegion};
use crate::core::types::{align_up, Address, Size};
use crate::memory::types::{MemoryError, MemoryResult, StealableId};
use log::trace;

/// What a free returned to the region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Freed {
    pub address: Address,
    pub size: Size,
    /// Owner registration, when the block held stealable data
    pub stealable: Option<StealableId>,
}

impl MemoryRegion {
    /// Allocate `size` bytes (rounded up to the granule) from the local free space
    ///
    /// Small requests (at or below the pivot) are carved from the end of the chosen free
    /// block, larger ones from its start. A leftover no bigger than `min_split` is handed
    /// out with the block instead of becoming a sliver.
    pub fn alloc(&mut self, size: Size) -> Option<(Address, BlockId)> {
        if size == 0 || size > self.capacity() {
            return None;
        }
        let size = align_up(size, self.granule());
        let (free_address, free_size) = self.free.best_fit(size)?;
        let (free_id, _) = self.block_at(free_address)?;
        self.remove_block(free_id);

        let leftover = free_size - size;
        let (address, size) = if leftover <= self.config.min_split {
            (free_address, free_size)
        } else if self.config.pivot != 0 && size <= self.config.pivot {
            self.insert_block(Block {
                address: free_address,
                size: leftover,
                kind: BlockKind::Free,
            });
            (free_address + leftover, size)
        } else {
            self.insert_block(Block {
                address: free_address + size,
                size: leftover,
                kind: BlockKind::Free,
            });
            (free_address, size)
        };

        let id = self.insert_block(Block {
            address,
            size,
            kind: BlockKind::Used,
        });
        self.allocations += 1;
        trace!(
            "{} region: allocated 0x{:x} ({} bytes)",
            self.tier(),
            address,
            size
        );
        Some((address, id))
    }

    /// Tag a freshly allocated block as stealable data owned by `owner`
    pub fn mark_stealable(&mut self, id: BlockId, owner: StealableId) -> MemoryResult<()> {
        match self.slab.get_mut(id) {
            Some(block) if block.kind == BlockKind::Used => {
                block.kind = BlockKind::Stealable(owner);
                Ok(())
            }
            Some(block) => Err(MemoryError::InvalidAddress(block.address)),
            None => Err(MemoryError::CorruptionDetected {
                tier: self.tier(),
                detail: format!("stale block handle for stealable {}", owner),
            }),
        }
    }

    /// Free the live block starting at `address`; memory is not cleared
    ///
    /// An address inside free space is a double free even when the freed block has since
    /// merged into a neighbour.
    pub fn dealloc(&mut self, address: Address) -> MemoryResult<Freed> {
        if let Some((id, block)) = self.block_at(address) {
            if block.kind.is_free() {
                return Err(MemoryError::DoubleFree(address));
            }
            return Ok(self.free_block(id, block));
        }
        match self.block_covering(address) {
            Some((_, block)) if block.kind.is_free() => Err(MemoryError::DoubleFree(address)),
            _ => Err(MemoryError::InvalidAddress(address)),
        }
    }

    /// Free a block by handle, as done when its stealable owner is evicted
    ///
    /// Returns `None` when the handle is stale or already free.
    pub fn release_block(&mut self, id: BlockId) -> Option<Freed> {
        let block = self.block(id)?;
        if block.kind.is_free() {
            return None;
        }
        Some(self.free_block(id, block))
    }

    fn free_block(&mut self, id: BlockId, block: Block) -> Freed {
        self.remove_block(id);
        self.release_range(block.address, block.size);
        Freed {
            address: block.address,
            size: block.size,
            stealable: block.kind.stealable(),
        }
    }
}
