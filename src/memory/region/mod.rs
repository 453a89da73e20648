/*!
 * Memory Region
 *
 * One contiguous address range carved into blocks that exactly tile it.
 *
 * ## Layout
 *
 * - **Block table**: descriptors live in a generation-checked slab, indexed by start
 *   address through an ordered map (the boundary-tag list)
 * - **Free index**: free blocks ordered by size for best-fit placement
 * - **Backing store**: an owned byte buffer addressed by logical addresses
 *
 * ## Invariants
 *
 * - Blocks are contiguous, non-overlapping and cover `[base, base + size)`
 * - No two neighbouring blocks are both free
 * - The free index holds exactly the free blocks
 *
 * A region knows nothing about the cache manager. Stealable blocks only carry the id of
 * their owner registration; deciding what may be evicted is left to the caller.
 */

mod alloc;
mod free_list;
mod resize;
mod slab;
mod span;

pub use alloc::Freed;
pub use slab::{Block, BlockId, BlockKind};
pub use span::{ExtensionPlan, SpanPlan, SpanSearch};

use super::config::RegionConfig;
use super::types::{MemoryError, MemoryResult, RegionStats, RegionTier};
use crate::core::types::{Address, AddressRange, Size};
use free_list::FreeSpaceIndex;
use log::trace;
use slab::BlockSlab;
use std::collections::BTreeMap;

/// A contiguous, independently managed address range
#[derive(Debug)]
pub struct MemoryRegion {
    config: RegionConfig,
    slab: BlockSlab,
    by_address: BTreeMap<Address, BlockId>,
    free: FreeSpaceIndex,
    backing: Box<[u8]>,
    allocations: u64,
}

impl MemoryRegion {
    /// Create a region holding one free block over its whole range
    pub fn new(config: RegionConfig) -> Self {
        let mut region = Self {
            config,
            slab: BlockSlab::new(),
            by_address: BTreeMap::new(),
            free: FreeSpaceIndex::new(),
            backing: vec![0u8; config.size].into_boxed_slice(),
            allocations: 0,
        };
        region.insert_block(Block {
            address: config.base,
            size: config.size,
            kind: BlockKind::Free,
        });
        region
    }

    #[inline]
    pub fn tier(&self) -> RegionTier {
        self.config.tier
    }

    #[inline]
    pub fn config(&self) -> &RegionConfig {
        &self.config
    }

    #[inline]
    pub fn base(&self) -> Address {
        self.config.base
    }

    #[inline]
    pub fn capacity(&self) -> Size {
        self.config.size
    }

    #[inline]
    pub fn granule(&self) -> Size {
        self.config.granule
    }

    #[inline]
    pub fn range(&self) -> AddressRange {
        self.config.range()
    }

    #[inline]
    pub fn contains(&self, address: Address) -> bool {
        self.range().contains(address)
    }

    pub fn free_bytes(&self) -> Size {
        self.free.total()
    }

    pub fn largest_free_block(&self) -> Size {
        self.free.largest()
    }

    /// Block descriptor for a handle, if the handle is still current
    pub fn block(&self, id: BlockId) -> Option<Block> {
        self.slab.get(id).copied()
    }

    /// Block starting exactly at `address`
    pub fn block_at(&self, address: Address) -> Option<(BlockId, Block)> {
        let id = *self.by_address.get(&address)?;
        self.slab.get(id).map(|block| (id, *block))
    }

    /// Block whose range contains `address`
    pub fn block_covering(&self, address: Address) -> Option<(BlockId, Block)> {
        let (_, id) = self.by_address.range(..=address).next_back()?;
        self.slab
            .get(*id)
            .filter(|block| address < block.address + block.size)
            .map(|block| (*id, *block))
    }

    /// Blocks in address order
    pub fn blocks(&self) -> impl Iterator<Item = Block> + '_ {
        self.by_address
            .values()
            .filter_map(move |id| self.slab.get(*id).copied())
    }

    /// Live (non-free) block starting at `address`
    pub(crate) fn live_block(&self, address: Address) -> MemoryResult<(BlockId, Block)> {
        match self.block_at(address) {
            Some((id, block)) if !block.kind.is_free() => Ok((id, block)),
            _ => Err(MemoryError::InvalidAddress(address)),
        }
    }

    pub(super) fn next_block(&self, block: &Block) -> Option<(BlockId, Block)> {
        self.block_at(block.end())
    }

    pub(super) fn prev_block(&self, block: &Block) -> Option<(BlockId, Block)> {
        let (_, id) = self.by_address.range(..block.address).next_back()?;
        self.slab.get(*id).map(|prev| (*id, *prev))
    }

    fn insert_block(&mut self, block: Block) -> BlockId {
        let id = self.slab.insert(block);
        self.by_address.insert(block.address, id);
        if block.kind.is_free() {
            self.free.insert(block.address, block.size);
        }
        id
    }

    fn remove_block(&mut self, id: BlockId) -> Option<Block> {
        let block = self.slab.remove(id)?;
        self.by_address.remove(&block.address);
        if block.kind.is_free() {
            self.free.remove(block.address, block.size);
        }
        Some(block)
    }

    /// Move a live block's start, keeping its handle
    fn rekey_block(&mut self, id: BlockId, address: Address, size: Size) {
        if let Some(block) = self.slab.get_mut(id) {
            let old = block.address;
            block.address = address;
            block.size = size;
            if old != address {
                self.by_address.remove(&old);
                self.by_address.insert(address, id);
            }
        }
    }

    /// Return `[start, start + size)` to the free space, merging with free neighbours
    ///
    /// The range must not be covered by any block. Returns the merged free block.
    fn release_range(&mut self, start: Address, size: Size) -> Block {
        let end = start + size;
        let mut merged = Block {
            address: start,
            size,
            kind: BlockKind::Free,
        };

        if let Some((_, id)) = self.by_address.range(..start).next_back() {
            let id = *id;
            if let Some(prev) = self.slab.get(id).copied() {
                if prev.kind.is_free() && prev.end() == start {
                    self.remove_block(id);
                    merged.address = prev.address;
                    merged.size += prev.size;
                }
            }
        }

        if let Some((id, next)) = self.block_at(end) {
            if next.kind.is_free() {
                self.remove_block(id);
                merged.size += next.size;
            }
        }

        trace!(
            "{} region: free block 0x{:x} ({} bytes)",
            self.tier(),
            merged.address,
            merged.size
        );
        self.insert_block(merged);
        merged
    }

    /// Full consistency sweep of the block table
    pub fn check_invariants(&self) -> MemoryResult<()> {
        let corrupt = |detail: String| MemoryError::CorruptionDetected {
            tier: self.tier(),
            detail,
        };

        let mut expected = self.base();
        let mut previous_free = false;
        let mut free_blocks = 0usize;
        for (&address, &id) in &self.by_address {
            let block = self
                .slab
                .get(id)
                .ok_or_else(|| corrupt(format!("stale descriptor at 0x{:x}", address)))?;
            if block.address != address {
                return Err(corrupt(format!(
                    "descriptor at 0x{:x} claims 0x{:x}",
                    address, block.address
                )));
            }
            if address != expected {
                return Err(corrupt(format!(
                    "gap or overlap at 0x{:x}, expected 0x{:x}",
                    address, expected
                )));
            }
            if block.size == 0 || block.size % self.granule() != 0 {
                return Err(corrupt(format!(
                    "block 0x{:x} has bad size {}",
                    address, block.size
                )));
            }
            let is_free = block.kind.is_free();
            if is_free {
                if previous_free {
                    return Err(corrupt(format!("uncoalesced free block at 0x{:x}", address)));
                }
                if !self.free.contains(block.address, block.size) {
                    return Err(corrupt(format!("free block 0x{:x} not indexed", address)));
                }
                free_blocks += 1;
            }
            previous_free = is_free;
            expected = block.end();
        }

        if expected != self.range().end {
            return Err(corrupt(format!(
                "blocks end at 0x{:x}, region ends at 0x{:x}",
                expected,
                self.range().end
            )));
        }
        if free_blocks != self.free.len() {
            return Err(corrupt(format!(
                "free index holds {} blocks, table holds {}",
                self.free.len(),
                free_blocks
            )));
        }
        if self.slab.len() != self.by_address.len() {
            return Err(corrupt("leaked block descriptors".to_string()));
        }
        Ok(())
    }

    /// Confirm `[address, address + size)` lies inside one live block
    pub fn verify_not_free(&self, address: Address, size: Size) -> MemoryResult<()> {
        let covering = self
            .by_address
            .range(..=address)
            .next_back()
            .and_then(|(_, id)| self.slab.get(*id));
        match covering {
            Some(block)
                if !block.kind.is_free() && address + size.max(1) <= block.end() =>
            {
                Ok(())
            }
            _ => Err(MemoryError::CorruptionDetected {
                tier: self.tier(),
                detail: format!("0x{:x}+{} is not inside a live block", address, size),
            }),
        }
    }

    pub fn stats(&self) -> RegionStats {
        let mut stats = RegionStats {
            tier: self.tier(),
            base: self.base(),
            size: self.capacity(),
            used_bytes: 0,
            stealable_bytes: 0,
            free_bytes: self.free.total(),
            largest_free_block: self.free.largest(),
            free_blocks: self.free.len(),
            used_blocks: 0,
            stealable_blocks: 0,
            allocations: self.allocations,
        };
        for block in self.blocks() {
            match block.kind {
                BlockKind::Free => {}
                BlockKind::Used => {
                    stats.used_blocks += 1;
                    stats.used_bytes += block.size;
                }
                BlockKind::Stealable(_) => {
                    stats.stealable_blocks += 1;
                    stats.stealable_bytes += block.size;
                }
            }
        }
        stats
    }

    /// Bytes of the live block starting at `address`
    pub fn bytes(&self, address: Address) -> MemoryResult<&[u8]> {
        let (_, block) = self.live_block(address)?;
        let offset = block.address - self.base();
        Ok(&self.backing[offset..offset + block.size])
    }

    pub fn bytes_mut(&mut self, address: Address) -> MemoryResult<&mut [u8]> {
        let (_, block) = self.live_block(address)?;
        let offset = block.address - self.base();
        Ok(&mut self.backing[offset..offset + block.size])
    }

    /// memmove within the region's backing store
    pub(super) fn move_bytes(&mut self, from: Address, to: Address, len: Size) {
        if len == 0 || from == to {
            return;
        }
        let src = from - self.base();
        let dst = to - self.base();
        self.backing.copy_within(src..src + len, dst);
    }
}
