/*!
 * Byte Access
 * Bounds-checked reads and writes of live allocations
 */

use super::GeneralMemoryAllocator;
use crate::core::types::{Address, Size};
use crate::memory::types::{MemoryError, MemoryResult};

fn check_bounds(address: Address, size: Size, offset: Size, len: Size) -> MemoryResult<()> {
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        _ => Err(MemoryError::OutOfBounds {
            address,
            offset,
            len,
            size,
        }),
    }
}

impl GeneralMemoryAllocator {
    /// Copy bytes out of an allocation starting at `offset`
    pub fn read_bytes(&self, address: Address, offset: Size, buf: &mut [u8]) -> MemoryResult<()> {
        self.with_bytes(address, |bytes| {
            check_bounds(address, bytes.len(), offset, buf.len())?;
            buf.copy_from_slice(&bytes[offset..offset + buf.len()]);
            Ok(())
        })?
        .map_err(|e| self.fault(e))
    }

    /// Copy `data` into an allocation starting at `offset`
    pub fn write_bytes(&self, address: Address, offset: Size, data: &[u8]) -> MemoryResult<()> {
        self.with_bytes_mut(address, |bytes| {
            check_bounds(address, bytes.len(), offset, data.len())?;
            bytes[offset..offset + data.len()].copy_from_slice(data);
            Ok(())
        })?
        .map_err(|e| self.fault(e))
    }

    /// Run `f` over the whole allocation; `f` must not call the allocator
    pub fn with_bytes<R>(&self, address: Address, f: impl FnOnce(&[u8]) -> R) -> MemoryResult<R> {
        let state = self.enter("with_bytes")?;
        let tier = self.owning_tier(address)?;
        let bytes = state.region(tier).bytes(address).map_err(|e| self.fault(e))?;
        Ok(f(bytes))
    }

    pub fn with_bytes_mut<R>(
        &self,
        address: Address,
        f: impl FnOnce(&mut [u8]) -> R,
    ) -> MemoryResult<R> {
        let mut state = self.enter("with_bytes_mut")?;
        let tier = self.owning_tier(address)?;
        let bytes = state
            .region_mut(tier)
            .bytes_mut(address)
            .map_err(|e| self.fault(e))?;
        Ok(f(bytes))
    }

    /// memmove inside one allocation, e.g. after growing it to the left
    pub fn copy_within(
        &self,
        address: Address,
        src_offset: Size,
        dst_offset: Size,
        len: Size,
    ) -> MemoryResult<()> {
        self.with_bytes_mut(address, |bytes| {
            check_bounds(address, bytes.len(), src_offset, len)?;
            check_bounds(address, bytes.len(), dst_offset, len)?;
            bytes.copy_within(src_offset..src_offset + len, dst_offset);
            Ok(())
        })?
        .map_err(|e| self.fault(e))
    }
}
