/*!
 * In-Place Resizing
 * Shrinking and growing live blocks without moving them
 */

use super::{Block, BlockKind, MemoryRegion};
use crate::core::types::{align_down, align_up, Address, Size};
use crate::memory::types::{Extension, MemoryError, MemoryResult};
use log::trace;

impl MemoryRegion {
    /// Size of the live block starting at `address`
    pub fn allocated_size(&self, address: Address) -> MemoryResult<Size> {
        self.live_block(address).map(|(_, block)| block.size)
    }

    /// Shrink from the right to `new_size` (rounded up to the granule, at least one)
    ///
    /// Returns the bytes given back, 0 if the block is already that small.
    pub fn shorten_right(&mut self, address: Address, new_size: Size) -> MemoryResult<Size> {
        let (id, block) = self.live_block(address)?;
        if new_size >= block.size {
            return Ok(0);
        }
        let new_size = align_up(new_size.max(1), self.granule());
        if new_size >= block.size {
            return Ok(0);
        }
        let freed = block.size - new_size;
        self.rekey_block(id, address, new_size);
        self.release_range(address + new_size, freed);
        trace!(
            "{} region: shortened 0x{:x} right by {} bytes",
            self.tier(),
            address,
            freed
        );
        Ok(freed)
    }

    /// Give back `amount` bytes (rounded down to the granule) from the left end
    ///
    /// The first `bytes_to_move` bytes are moved to the new start. Returns the bytes
    /// given back; the block now starts that many bytes later. Returns 0 without change
    /// when nothing or everything would be trimmed.
    pub fn shorten_left(
        &mut self,
        address: Address,
        amount: Size,
        bytes_to_move: Size,
    ) -> MemoryResult<Size> {
        let (id, block) = self.live_block(address)?;
        let amount = align_down(amount, self.granule());
        if amount == 0 || amount >= block.size {
            return Ok(0);
        }
        let remaining = block.size - amount;
        if bytes_to_move > remaining {
            return Err(MemoryError::OutOfBounds {
                address,
                offset: amount,
                len: bytes_to_move,
                size: block.size,
            });
        }

        let new_address = address + amount;
        self.move_bytes(address, new_address, bytes_to_move);
        self.rekey_block(id, new_address, remaining);
        self.release_range(address, amount);
        trace!(
            "{} region: shortened 0x{:x} left by {} bytes",
            self.tier(),
            address,
            amount
        );
        Ok(amount)
    }

    /// Absorb the free block to the right, if there is one. Never evicts anything.
    pub fn extend_right_as_much_as_easily_possible(&mut self, address: Address) -> MemoryResult<Size> {
        let (id, block) = self.live_block(address)?;
        match self.next_block(&block) {
            Some((next_id, next)) if next.kind.is_free() => {
                self.remove_block(next_id);
                self.rekey_block(id, address, block.size + next.size);
                Ok(next.size)
            }
            _ => Ok(0),
        }
    }

    /// Grow a live block into the free space now adjacent to it
    ///
    /// Called once the victims of an extension plan have been evicted. Takes up to
    /// `ideal` bytes, right side first, and leaves any surplus free.
    pub fn commit_extension(&mut self, address: Address, ideal: Size) -> MemoryResult<Extension> {
        let (id, block) = self.live_block(address)?;
        let ideal = align_down(ideal, self.granule());

        let right_free = self
            .next_block(&block)
            .filter(|(_, next)| next.kind.is_free());
        let left_free = self
            .prev_block(&block)
            .filter(|(_, prev)| prev.kind.is_free() && prev.end() == block.address);

        let right = right_free.map_or(0, |(_, next)| next.size.min(ideal));
        let left = left_free.map_or(0, |(_, prev)| prev.size.min(ideal - right));

        if let Some((next_id, next)) = right_free.filter(|_| right > 0) {
            self.remove_block(next_id);
            if next.size > right {
                self.insert_block(Block {
                    address: next.address + right,
                    size: next.size - right,
                    kind: BlockKind::Free,
                });
            }
        }
        if let Some((prev_id, prev)) = left_free.filter(|_| left > 0) {
            self.remove_block(prev_id);
            if prev.size > left {
                self.insert_block(Block {
                    address: prev.address,
                    size: prev.size - left,
                    kind: BlockKind::Free,
                });
            }
        }

        let new_address = block.address - left;
        self.rekey_block(id, new_address, block.size + left + right);
        trace!(
            "{} region: extended 0x{:x} by {} left, {} right",
            self.tier(),
            address,
            left,
            right
        );
        Ok(Extension {
            address: new_address,
            left,
            right,
        })
    }
}
