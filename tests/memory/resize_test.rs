/*!
 * Resize Tests
 * In-place growth with eviction, and shrinking from either end
 */

use super::support::{allocator, new_log, Log, Tracked, BASE};
use pretty_assertions::assert_eq;
use workstation_memory::{
    Address, Extension, GeneralMemoryAllocator, RegionTier, StealableHandle, StealableQueue,
};

#[test]
fn test_extend_evicts_stealable_neighbour() {
    let gma = allocator(1000);
    let log = new_log();
    let buffer = gma.alloc(250, false, None).unwrap();
    assert_eq!(buffer, BASE);
    let owner = Tracked::new("S", StealableQueue::NoSongSampleData, &log);
    let neighbour = gma.alloc_stealable(300, Box::new(owner), None).unwrap();
    assert_eq!(neighbour.address, BASE + 252);

    let extension = gma.extend(buffer, 400, 400, None).unwrap();
    assert_eq!(
        extension,
        Extension {
            address: buffer,
            left: 0,
            right: 400
        }
    );
    assert_eq!(*log.lock(), vec!["S"]);
    assert_eq!(gma.allocated_size(buffer).unwrap(), 652);
    gma.check_invariants().unwrap();
}

#[test]
fn test_extend_prefers_free_space_to_eviction() {
    let gma = allocator(1000);
    let log = new_log();
    let buffer = gma.alloc(250, false, None).unwrap();
    let owner = Tracked::new("S", StealableQueue::NoSongSampleData, &log);
    let neighbour = gma.alloc_stealable(300, Box::new(owner), None).unwrap();
    let gap = gma.alloc(100, false, None).unwrap();

    // The stealable now has free space to its right
    gma.dealloc(gap).unwrap();
    let extension = gma.extend(neighbour.address, 8, 100, None).unwrap();
    assert_eq!(extension.right, 100);
    assert!(log.lock().is_empty());
    assert_eq!(gma.allocated_size(buffer).unwrap(), 252);
}

#[test]
fn test_extend_fails_without_change_when_min_unreachable() {
    let gma = allocator(1000);
    let log = new_log();
    let buffer = gma.alloc(250, false, None).unwrap();
    let owner = Tracked::new("S", StealableQueue::NoSongSampleData, &log);
    let neighbour = gma.alloc_stealable(300, Box::new(owner), None).unwrap();
    let _loan = gma.claim(neighbour.id).unwrap();

    let extension = gma.extend(buffer, 400, 800, None).unwrap();
    assert!(extension.is_empty());
    assert_eq!(extension.address, buffer);
    assert!(log.lock().is_empty());
    assert_eq!(gma.allocated_size(buffer).unwrap(), 252);
}

#[test]
fn test_extend_left_moves_start() {
    let gma = allocator(1000);
    let head = gma.alloc(200, false, None).unwrap();
    let buffer = gma.alloc(200, false, None).unwrap();
    let _tail = gma.alloc(600, false, None).unwrap();
    gma.write_bytes(buffer, 0, b"bass").unwrap();
    gma.dealloc(head).unwrap();

    let extension = gma.extend(buffer, 100, 120, None).unwrap();
    assert_eq!(extension.left, 120);
    assert_eq!(extension.right, 0);
    assert_eq!(extension.address, buffer - 120);

    // Contents stay where they were until the caller moves them
    gma.copy_within(extension.address, 120, 0, 4).unwrap();
    let mut buf = [0u8; 4];
    gma.read_bytes(extension.address, 0, &mut buf).unwrap();
    assert_eq!(&buf, b"bass");
}

/// Stealable `S`, then `buffer`, then a non-stealable tail filling the region
fn buffer_after_stealable(gma: &GeneralMemoryAllocator, log: &Log) -> (StealableHandle, Address) {
    let owner = Tracked::new("S", StealableQueue::NoSongSampleData, log);
    let sample = gma.alloc_stealable(300, Box::new(owner), None).unwrap();
    assert_eq!(sample.address, BASE);
    let buffer = gma.alloc(200, false, None).unwrap();
    assert_eq!(buffer, BASE + 300);
    gma.alloc(500, false, None).unwrap();
    assert_eq!(gma.stats().unwrap().region(RegionTier::Stealable).unwrap().free_bytes, 0);
    (sample, buffer)
}

#[test]
fn test_extend_evicts_stealable_on_the_left() {
    let gma = allocator(1000);
    let log = new_log();
    let (sample, buffer) = buffer_after_stealable(&gma, &log);
    gma.write_bytes(buffer, 0, b"pad!").unwrap();

    let extension = gma.extend(buffer, 300, 300, None).unwrap();
    assert_eq!(
        extension,
        Extension {
            address: BASE,
            left: 300,
            right: 0
        }
    );
    assert_eq!(extension.address, buffer - extension.left);
    assert_eq!(*log.lock(), vec!["S"]);
    assert!(!gma.is_resident(sample.id));
    assert_eq!(gma.allocated_size(extension.address).unwrap(), 500);

    gma.copy_within(extension.address, extension.left, 0, 4).unwrap();
    let mut buf = [0u8; 4];
    gma.read_bytes(extension.address, 0, &mut buf).unwrap();
    assert_eq!(&buf, b"pad!");
    gma.check_invariants().unwrap();
}

#[test]
fn test_extend_spares_thing_not_to_steal_from() {
    let gma = allocator(1000);
    let log = new_log();
    let (sample, buffer) = buffer_after_stealable(&gma, &log);

    let extension = gma.extend(buffer, 300, 300, Some(sample.id)).unwrap();
    assert!(extension.is_empty());
    assert_eq!(extension.address, buffer);
    assert!(log.lock().is_empty());
    assert!(gma.is_resident(sample.id));
    assert_eq!(gma.allocated_size(buffer).unwrap(), 200);
}

#[test]
fn test_sizes_near_usize_max_change_nothing() {
    let gma = allocator(1000);
    let log = new_log();
    let (sample, buffer) = buffer_after_stealable(&gma, &log);

    assert_eq!(gma.shorten_right(buffer, usize::MAX).unwrap(), 0);
    let extension = gma.extend(buffer, usize::MAX, usize::MAX, None).unwrap();
    assert!(extension.is_empty());
    let extension = gma.extend(buffer, usize::MAX - 1, usize::MAX, None).unwrap();
    assert!(extension.is_empty());

    assert!(log.lock().is_empty());
    assert!(gma.is_resident(sample.id));
    assert_eq!(gma.allocated_size(buffer).unwrap(), 200);
    gma.check_invariants().unwrap();
}

#[test]
fn test_shorten_both_ends() {
    let gma = allocator(1000);
    let buffer = gma.alloc(400, false, None).unwrap();
    gma.write_bytes(buffer, 0, b"hat!").unwrap();

    assert_eq!(gma.shorten_right(buffer, 200).unwrap(), 200);
    assert_eq!(gma.shorten_right(buffer, 300).unwrap(), 0);
    assert_eq!(gma.shorten_left(buffer, 100, 4).unwrap(), 100);

    let moved = buffer + 100;
    assert_eq!(gma.allocated_size(moved).unwrap(), 100);
    let mut buf = [0u8; 4];
    gma.read_bytes(moved, 0, &mut buf).unwrap();
    assert_eq!(&buf, b"hat!");
    assert_eq!(gma.extend_right_as_much_as_easily_possible(moved).unwrap(), 800);
}
