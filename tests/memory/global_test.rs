/*!
 * Process-Wide Allocator Tests
 * The install-once global and the C entry points built on it
 */

use super::support::layout;
use serial_test::serial;
use workstation_memory::ffi::{workstation_alloc, workstation_dealloc};
use workstation_memory::{install_global, AllocatorConfig, GeneralMemoryAllocator, RegionTier};

fn global() -> &'static GeneralMemoryAllocator {
    let config = AllocatorConfig::strict(layout(4096)).with_trap_misuse(false);
    match install_global(GeneralMemoryAllocator::new(config).unwrap()) {
        Ok(installed) => installed,
        Err(_) => GeneralMemoryAllocator::get().unwrap(),
    }
}

#[test]
#[serial]
fn test_install_is_once_per_process() {
    let first = global();
    let config = AllocatorConfig::strict(layout(1000));
    let rejected = install_global(GeneralMemoryAllocator::new(config).unwrap());
    assert!(rejected.is_err());
    assert!(std::ptr::eq(first, GeneralMemoryAllocator::get().unwrap()));
    assert!(std::ptr::eq(first, GeneralMemoryAllocator::get_or_init()));
}

#[test]
#[serial]
fn test_c_entry_points() {
    let gma = global();
    let before = gma.stats().unwrap().used_memory;

    let address = workstation_alloc(24, true);
    assert_ne!(address, 0);
    assert_eq!(gma.region_of(address), Some(RegionTier::InternalSmall));
    workstation_dealloc(address);
    assert_eq!(gma.stats().unwrap().used_memory, before);

    assert_eq!(workstation_alloc(0, false), 0);
    assert_eq!(workstation_alloc(1 << 20, false), 0);
    // Freeing null or garbage is reported, not fatal
    workstation_dealloc(0);
    workstation_dealloc(0x10);
}
