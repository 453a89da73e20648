/*!
 * Memory Region Tests
 * Placement, coalescing and the block table seen through the public region API
 */

use pretty_assertions::assert_eq;
use workstation_memory::memory::region::{BlockKind, MemoryRegion};
use workstation_memory::{MemoryError, RegionConfig, RegionTier};

fn region(size: usize) -> MemoryRegion {
    MemoryRegion::new(RegionConfig::new(RegionTier::External, 0x4000, size))
}

#[test]
fn test_fresh_region_is_one_free_block() {
    let region = region(4096);
    let blocks: Vec<_> = region.blocks().collect();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].address, 0x4000);
    assert_eq!(blocks[0].size, 4096);
    assert!(blocks[0].kind.is_free());
    assert_eq!(region.largest_free_block(), 4096);
    region.check_invariants().unwrap();
}

#[test]
fn test_alloc_dealloc_alloc_reuses_address() {
    let mut region = region(4096);
    region.alloc(100).unwrap();
    let (address, _) = region.alloc(256).unwrap();
    region.dealloc(address).unwrap();
    let (again, _) = region.alloc(256).unwrap();
    assert_eq!(again, address);
    region.check_invariants().unwrap();
}

#[test]
fn test_best_fit_prefers_smallest_hole() {
    let mut region = region(4096);
    let a = region.alloc(512).unwrap().0;
    let _b = region.alloc(64).unwrap().0;
    let c = region.alloc(128).unwrap().0;
    let _d = region.alloc(64).unwrap().0;
    region.dealloc(a).unwrap();
    region.dealloc(c).unwrap();

    // The 128-byte hole fits better than the 512-byte one
    let (address, _) = region.alloc(120).unwrap();
    assert_eq!(address, c);
}

#[test]
fn test_freeing_in_any_order_coalesces() {
    let mut region = region(1024);
    let addresses: Vec<_> = (0..8).map(|_| region.alloc(128).unwrap().0).collect();
    assert_eq!(region.free_bytes(), 0);

    for &i in &[3usize, 1, 2, 7, 0, 5, 6, 4] {
        region.dealloc(addresses[i]).unwrap();
        region.check_invariants().unwrap();
    }
    let stats = region.stats();
    assert_eq!(stats.free_blocks, 1);
    assert_eq!(stats.largest_free_block, 1024);
}

#[test]
fn test_double_free_and_interior_pointer() {
    let mut region = region(1024);
    let (address, _) = region.alloc(64).unwrap();
    assert_eq!(region.dealloc(address + 8), Err(MemoryError::InvalidAddress(address + 8)));
    region.dealloc(address).unwrap();
    assert_eq!(region.dealloc(address), Err(MemoryError::DoubleFree(address)));
}

#[test]
fn test_block_ids_survive_resizing() {
    let mut region = region(1024);
    let (address, id) = region.alloc(256).unwrap();
    // 98 rounds up to the 4-byte granule
    assert_eq!(region.shorten_right(address, 98).unwrap(), 156);
    let block = region.block(id).unwrap();
    assert_eq!(block.size, 100);
    assert_eq!(block.kind, BlockKind::Used);

    let moved = region.shorten_left(address, 40, 0).unwrap();
    assert_eq!(moved, 40);
    assert_eq!(region.block(id).unwrap().address, address + 40);
    region.check_invariants().unwrap();
}

#[test]
fn test_shorten_left_moves_contents() {
    let mut region = region(1024);
    let (address, _) = region.alloc(64).unwrap();
    region.bytes_mut(address).unwrap()[..4].copy_from_slice(b"loop");
    let trimmed = region.shorten_left(address, 16, 4).unwrap();
    assert_eq!(trimmed, 16);
    assert_eq!(&region.bytes(address + 16).unwrap()[..4], b"loop");
    assert_eq!(region.allocated_size(address + 16).unwrap(), 48);
}

#[test]
fn test_extend_right_takes_only_free_neighbour() {
    let mut region = region(1024);
    let (a, _) = region.alloc(128).unwrap();
    let (b, _) = region.alloc(128).unwrap();
    assert_eq!(region.extend_right_as_much_as_easily_possible(a).unwrap(), 0);

    region.dealloc(b).unwrap();
    // b merged with the tail, so all of it is taken
    assert_eq!(region.extend_right_as_much_as_easily_possible(a).unwrap(), 1024 - 128);
    assert_eq!(region.free_bytes(), 0);
}

#[test]
fn test_verify_not_free() {
    let mut region = region(1024);
    let (address, _) = region.alloc(64).unwrap();
    region.verify_not_free(address + 8, 16).unwrap();
    assert!(region.verify_not_free(address + 60, 16).is_err());
    assert!(region.verify_not_free(address + 64, 4).is_err());
}
