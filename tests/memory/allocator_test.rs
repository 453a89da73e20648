/*!
 * General Allocator Tests
 * Routing, boundaries and statistics through the public API
 */

use super::support::{allocator, lenient, new_log, Tracked};
use pretty_assertions::assert_eq;
use workstation_memory::{
    AllocatorConfig, GeneralMemoryAllocator, MemoryError, MemoryLayout, MemoryPressure,
    RegionTier, StealableQueue, NULL_ADDRESS,
};

#[test]
fn test_small_requests_stay_in_small_tiers() {
    let gma = allocator(1000);
    let on_chip = gma.alloc_max_speed(24).unwrap();
    assert_eq!(gma.region_of(on_chip), Some(RegionTier::InternalSmall));
    let off_chip = gma.alloc_low_speed(24).unwrap();
    assert_eq!(gma.region_of(off_chip), Some(RegionTier::ExternalSmall));
    // Allocations are rounded to the small-region granule
    assert_eq!(gma.allocated_size(on_chip).unwrap(), 32);
}

#[test]
fn test_full_tiers_fall_through_to_stealable() {
    let gma = allocator(1000);
    let first = gma.alloc_max_speed(64).unwrap();
    assert_eq!(gma.region_of(first), Some(RegionTier::Internal));
    let second = gma.alloc_max_speed(64).unwrap();
    assert_eq!(gma.region_of(second), Some(RegionTier::External));
    let third = gma.alloc_max_speed(64).unwrap();
    assert_eq!(gma.region_of(third), Some(RegionTier::Stealable));
}

#[test]
fn test_boundaries() {
    let gma = allocator(1000);
    assert_eq!(gma.alloc_low_speed(0), Err(MemoryError::ZeroSizeRequest));
    gma.dealloc(NULL_ADDRESS).unwrap();

    let total = gma.config().layout.total_size();
    let result = gma.alloc_low_speed(total + 1);
    assert!(matches!(result, Err(MemoryError::RequestTooLarge { .. })));
    assert!(result.unwrap_err().is_exhaustion());
    assert_eq!(gma.stats().unwrap().cache.failed_allocations, 1);
}

#[test]
fn test_size_near_usize_max_fails_without_eviction() {
    let gma = allocator(1000);
    let log = new_log();
    let owner = Tracked::new("S", StealableQueue::NoSongSampleData, &log);
    let sample = gma.alloc_stealable(300, Box::new(owner), None).unwrap();

    for size in [usize::MAX, usize::MAX - 2] {
        assert!(matches!(
            gma.alloc(size, true, None),
            Err(MemoryError::RequestTooLarge { capacity: 1000, .. })
        ));
    }
    let owner = Tracked::new("T", StealableQueue::NoSongSampleData, &log);
    assert!(matches!(
        gma.alloc_stealable(usize::MAX, Box::new(owner), None),
        Err(MemoryError::RequestTooLarge { .. })
    ));
    assert!(gma.is_resident(sample.id));
    assert!(log.lock().is_empty());
    assert_eq!(gma.stats().unwrap().cache.steals, 0);
}

#[test]
fn test_stealable_memory_only_comes_from_stealable_tier() {
    let gma = allocator(1000);
    let log = new_log();
    let owner = Tracked::new("tiny", StealableQueue::NoSongSampleData, &log);
    let handle = gma.alloc_stealable(16, Box::new(owner), None).unwrap();
    assert_eq!(gma.region_of(handle.address), Some(RegionTier::Stealable));
    assert!(gma.is_resident(handle.id));
    assert_eq!(gma.reasons_to_be_loaded(handle.id).unwrap(), 0);
}

#[test]
fn test_freed_handles_go_stale() {
    let gma = allocator(1000);
    let log = new_log();
    let owner = Tracked::new("old", StealableQueue::NoSongSampleData, &log);
    let old = gma.alloc_stealable(100, Box::new(owner), None).unwrap();
    gma.dealloc(old.address).unwrap();

    let owner = Tracked::new("new", StealableQueue::NoSongSampleData, &log);
    let new = gma.alloc_stealable(100, Box::new(owner), None).unwrap();
    assert_ne!(old.id, new.id);
    assert_eq!(gma.add_reason(old.id), Err(MemoryError::StaleStealable(old.id)));
    assert_eq!(gma.add_reason(new.id).unwrap(), 1);
    // Freed, not stolen
    assert!(log.lock().is_empty());
}

#[test]
fn test_misuse_reported_when_not_trapped() {
    let gma = lenient(1000);
    let address = gma.alloc_low_speed(500).unwrap();
    gma.dealloc(address).unwrap();
    assert_eq!(gma.dealloc(address), Err(MemoryError::DoubleFree(address)));
    assert!(gma.shorten_right(0x10, 4).is_err());
}

#[test]
#[should_panic(expected = "allocator fault")]
fn test_misuse_trapped_in_strict_mode() {
    let gma = allocator(1000);
    let address = gma.alloc_low_speed(500).unwrap();
    gma.dealloc(address).unwrap();
    let _ = gma.dealloc(address);
}

#[test]
fn test_stats_and_pressure() {
    let gma = allocator(1000);
    gma.alloc_low_speed(800).unwrap();
    let stats = gma.stats().unwrap();
    let stealable = stats.region(RegionTier::Stealable).unwrap();
    assert_eq!(stealable.used_bytes, 800);
    assert_eq!(stats.used_memory, 800);
    assert_eq!(stats.memory_pressure(), MemoryPressure::Medium);

    let json = serde_json::to_value(&stats).unwrap();
    assert_eq!(json["used_memory"], 800);
    assert_eq!(json["regions"].as_array().unwrap().len(), RegionTier::COUNT);
}

#[test]
fn test_allocator_is_shareable_across_threads() {
    let sizes = [64 * 1024, 16 * 1024, 16 * 1024, 4096, 4096];
    let layout = MemoryLayout::packed(0x10_0000, sizes).unwrap();
    let gma = GeneralMemoryAllocator::new(AllocatorConfig::firmware().with_layout(layout)).unwrap();

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..200 {
                    // Other threads wait on the guard rather than seeing reentrancy
                    let address = gma.alloc_low_speed(256).unwrap();
                    gma.write_bytes(address, 0, &[0xAA; 256]).unwrap();
                    gma.dealloc(address).unwrap();
                }
            });
        }
    });

    let stats = gma.stats().unwrap();
    assert_eq!(stats.used_memory, 0);
    gma.check_invariants().unwrap();
}
