/*!
 * C Entry Points
 *
 * Wrappers for C and assembly callers that predate the allocator object. They go through
 * the installed process-wide allocator and report every failure as the null address.
 */

use crate::core::types::{Address, NULL_ADDRESS};
use crate::memory::GeneralMemoryAllocator;
use log::warn;

/// Allocate `size` bytes of non-stealable memory; 0 on failure
#[no_mangle]
pub extern "C" fn workstation_alloc(size: usize, may_use_on_chip_ram: bool) -> Address {
    let Some(allocator) = GeneralMemoryAllocator::get() else {
        warn!("workstation_alloc called before an allocator was installed");
        return NULL_ADDRESS;
    };
    allocator
        .alloc(size, may_use_on_chip_ram, None)
        .unwrap_or(NULL_ADDRESS)
}

/// Free memory from `workstation_alloc`; freeing 0 does nothing
#[no_mangle]
pub extern "C" fn workstation_dealloc(address: Address) {
    let Some(allocator) = GeneralMemoryAllocator::get() else {
        warn!("workstation_dealloc called before an allocator was installed");
        return;
    };
    if let Err(e) = allocator.dealloc(address) {
        warn!("workstation_dealloc(0x{:x}) failed: {}", address, e);
    }
}
