/*!
 * Property Tests
 * Coalescing, reason safety and resize bounds under random workloads
 */

use super::support::{allocator, new_log, Tracked};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use workstation_memory::memory::region::MemoryRegion;
use workstation_memory::{MemoryError, RegionConfig, RegionTier, StealableQueue};

fn region() -> MemoryRegion {
    MemoryRegion::new(RegionConfig::new(RegionTier::External, 0x8000, 4096))
}

proptest! {
    #[test]
    fn freeing_everything_leaves_one_block(
        order in prop::collection::vec(1usize..300, 1..24)
            .prop_flat_map(|sizes| {
                let len = sizes.len();
                (Just(sizes), Just((0..len).collect::<Vec<_>>()).prop_shuffle())
            })
    ) {
        let (sizes, permutation) = order;
        let mut region = region();
        let addresses: Vec<_> = sizes
            .iter()
            .map(|&size| region.alloc(size).map(|(address, _)| address))
            .collect();

        for &i in &permutation {
            if let Some(address) = addresses[i] {
                region.dealloc(address).unwrap();
            }
        }
        prop_assert!(region.check_invariants().is_ok());
        let stats = region.stats();
        prop_assert_eq!(stats.free_blocks, 1);
        prop_assert_eq!(stats.largest_free_block, 4096);
    }

    #[test]
    fn alloc_succeeds_up_to_largest_free_span(sizes in prop::collection::vec(1usize..200, 1..16)) {
        let mut region = region();
        for size in sizes {
            let fits = size <= region.largest_free_block();
            prop_assert_eq!(region.alloc(size).is_some(), fits);
        }
    }

    #[test]
    fn shorten_right_never_frees_more_than_asked(size in 1usize..1024, new_size in 0usize..1024) {
        let mut region = region();
        let (address, _) = region.alloc(size).unwrap();
        let current = region.allocated_size(address).unwrap();
        let freed = region.shorten_right(address, new_size).unwrap();
        prop_assert!(freed <= current.saturating_sub(new_size));
        prop_assert_eq!(region.allocated_size(address).unwrap(), current - freed);
    }

    #[test]
    fn extension_stays_within_ideal(
        before in 72usize..400,
        size in 72usize..400,
        min in 0usize..600,
        extra in 0usize..600,
    ) {
        // Too big for the direct tiers, so both land in the stealable region
        let gma = allocator(1000);
        let head = gma.alloc(before, false, None).unwrap();
        let buffer = gma.alloc(size, false, None).unwrap();
        gma.dealloc(head).unwrap();
        let original = gma.allocated_size(buffer).unwrap();

        let ideal = min + extra;
        let extension = gma.extend(buffer, min, ideal, None).unwrap();
        let grown = gma.allocated_size(extension.address).unwrap() - original;
        prop_assert!(extension.total() <= ideal);
        prop_assert_eq!(grown, extension.total());
        if extension.is_empty() {
            prop_assert_eq!(extension.address, buffer);
        } else {
            prop_assert!(extension.total() >= min);
        }
    }

    #[test]
    fn loaded_stealables_survive_pressure(
        claims in prop::collection::vec(any::<bool>(), 6),
        requests in prop::collection::vec(40usize..600, 1..6),
    ) {
        let gma = allocator(1000);
        let log = new_log();
        let handles: Vec<_> = (0..6u8)
            .map(|i| {
                let owner = Tracked::new("cluster", StealableQueue::NoSongSampleData, &log);
                let handle = gma.alloc_stealable(160, Box::new(owner), None).unwrap();
                gma.write_bytes(handle.address, 0, &[i; 160]).unwrap();
                handle
            })
            .collect();
        for (handle, &claimed) in handles.iter().zip(&claims) {
            if claimed {
                gma.add_reason(handle.id).unwrap();
            }
        }

        for size in requests {
            match gma.alloc(size, false, None) {
                Ok(address) => gma.write_bytes(address, 0, &vec![0xFF; size]).unwrap(),
                Err(e) => prop_assert!(e.is_exhaustion()),
            }
        }

        for (i, (handle, &claimed)) in handles.iter().zip(&claims).enumerate() {
            if claimed {
                prop_assert!(gma.is_resident(handle.id));
                let byte = i as u8;
                let intact = gma
                    .with_bytes(handle.address, |bytes| bytes.iter().all(|&b| b == byte))
                    .unwrap();
                prop_assert!(intact);
            }
        }
        prop_assert!(gma.check_invariants().is_ok());
    }
}

#[test]
fn test_random_workload_keeps_regions_consistent() {
    let mut rng = StdRng::seed_from_u64(0x5EED);
    let gma = allocator(64 * 1024);
    let mut live = Vec::new();

    for step in 0..4000 {
        if live.is_empty() || rng.gen_bool(0.55) {
            let size = rng.gen_range(1..2048);
            let on_chip = rng.gen_bool(0.3);
            match gma.alloc(size, on_chip, None) {
                Ok(address) => live.push(address),
                Err(e) => assert!(e.is_exhaustion(), "unexpected {}", e),
            }
        } else {
            let index = rng.gen_range(0..live.len());
            gma.dealloc(live.swap_remove(index)).unwrap();
        }
        if step % 500 == 0 {
            gma.check_invariants().unwrap();
        }
    }

    for address in live {
        gma.dealloc(address).unwrap();
    }
    let stats = gma.stats().unwrap();
    assert_eq!(stats.used_memory, 0);
    for region in &stats.regions {
        assert_eq!(region.free_blocks, 1);
    }
}

#[test]
fn test_reason_underflow_is_misuse() {
    let gma = super::support::lenient(1000);
    let log = new_log();
    let owner = Tracked::new("one", StealableQueue::NoSongSampleData, &log);
    let handle = gma.alloc_stealable(100, Box::new(owner), None).unwrap();
    let error = gma.remove_reason(handle.id).unwrap_err();
    assert_eq!(error, MemoryError::ReasonUnderflow(handle.id));
    assert!(error.is_misuse());
}
