//! Anonymous allocation and free: placement policy, splitting,
//! coalescing, and failure modes.

mod common;

use bootmem::{layout, BootmemError, MemoryWindow, PhysAddr};
use common::{free_blocks, fresh, LOW_RESERVED, NAMED_ARRAY_BYTES, POOL};

/// Top of the initial free block: the pool minus the named directory.
const TOP: u64 = POOL - NAMED_ARRAY_BYTES;

#[test]
fn allocation_carves_from_the_top() {
    let bootmem = fresh();
    let at = bootmem.alloc(0x1000, 0x1000).unwrap();
    // align_down(TOP - 0x1000, 0x1000)
    assert_eq!(at, PhysAddr::new(0xF_C000));

    // The carve split the single free block in two: the bulk below and
    // the unaligned remainder above the allocation.
    assert_eq!(
        free_blocks(&bootmem),
        vec![
            (u64::from(LOW_RESERVED), 0xF_C000 - u64::from(LOW_RESERVED)),
            (0xF_D000, TOP - 0xF_D000),
        ]
    );
}

#[test]
fn last_fit_prefers_the_highest_eligible_block() {
    let bootmem = fresh();
    // Leave a small high fragment above a page-aligned allocation.
    bootmem.alloc(0x1000, 0x1000).unwrap();
    assert_eq!(free_blocks(&bootmem).len(), 2);

    // An unconstrained small request must come from the high fragment,
    // not the big low block.
    let at = bootmem.alloc(0x100, 0).unwrap();
    assert_eq!(at.as_u64(), TOP - 0x100);
}

#[test]
fn alloc_address_is_exact() {
    let bootmem = fresh();
    let at = bootmem.alloc_address(0x2000, PhysAddr::new(0x8000)).unwrap();
    assert_eq!(at, PhysAddr::new(0x8000));

    // That exact range is now occupied.
    assert_eq!(
        bootmem.alloc_address(0x10, PhysAddr::new(0x8000)),
        Err(BootmemError::NoFreeBlock)
    );
}

#[test]
fn alloc_range_respects_the_window() {
    let bootmem = fresh();
    let at = bootmem
        .alloc_range(0x1000, 0x1000, PhysAddr::new(0x4000), PhysAddr::new(0x10000))
        .unwrap();
    // Still end-allocated, but within the window.
    assert_eq!(at, PhysAddr::new(0xF000));

    assert_eq!(
        bootmem.alloc_range(0x1000, 0, PhysAddr::zero(), PhysAddr::new(0x1000)),
        Err(BootmemError::NoFreeBlock)
    );
}

#[test]
fn free_reassembles_the_original_block() {
    let bootmem = fresh();
    let before = free_blocks(&bootmem);

    let a = bootmem.alloc(0x3000, 0x1000).unwrap();
    bootmem.free(a, 0x3000).unwrap();
    assert_eq!(free_blocks(&bootmem), before);

    // Same constraints after a full round trip find the same address.
    let b = bootmem.alloc(0x3000, 0x1000).unwrap();
    assert_eq!(a, b);
}

#[test]
fn coalescing_works_in_either_order() {
    for reverse in [false, true] {
        let bootmem = fresh();
        let x = bootmem.alloc_address(0x1000, PhysAddr::new(0x2000)).unwrap();
        let y = bootmem.alloc_address(0x1000, PhysAddr::new(0x3000)).unwrap();
        assert_eq!(free_blocks(&bootmem).len(), 2);

        if reverse {
            bootmem.free(y, 0x1000).unwrap();
            bootmem.free(x, 0x1000).unwrap();
        } else {
            bootmem.free(x, 0x1000).unwrap();
            bootmem.free(y, 0x1000).unwrap();
        }
        // Both adjacency merges fired: one block again.
        assert_eq!(
            free_blocks(&bootmem),
            vec![(u64::from(LOW_RESERVED), TOP - u64::from(LOW_RESERVED))]
        );
    }
}

#[test]
fn freeing_below_the_head_prepends_or_merges() {
    let bootmem = fresh();
    // Simulate a lower range handed back later (e.g. reclaimed boot code).
    bootmem.free(PhysAddr::new(0x500), 0x200).unwrap();
    let blocks = free_blocks(&bootmem);
    assert_eq!(blocks[0], (0x500, 0x200));

    // [0x700, 0x1000) bridges the prepended range and the old head into
    // one contiguous block.
    bootmem.free(PhysAddr::new(0x700), 0x900).unwrap();
    assert_eq!(free_blocks(&bootmem), vec![(0x500, TOP - 0x500)]);
}

#[test]
fn freeing_over_the_head_block_is_rejected() {
    let bootmem = fresh();
    // [0x800, 0x1800) overlaps the head block starting at 0x1000.
    assert_eq!(
        bootmem.free(PhysAddr::new(0x800), 0x1000),
        Err(BootmemError::ImpossibleRange)
    );
}

#[test]
fn invalid_requests_are_rejected_up_front() {
    let bootmem = fresh();
    let before = free_blocks(&bootmem);

    assert_eq!(bootmem.alloc(0, 0), Err(BootmemError::ZeroSize));
    assert_eq!(
        bootmem.free(PhysAddr::new(0x8000), 0),
        Err(BootmemError::ZeroSize)
    );
    assert_eq!(
        bootmem.alloc_range(0x2000, 0, PhysAddr::new(0x1000), PhysAddr::new(0x2000)),
        Err(BootmemError::ImpossibleRange)
    );
    assert_eq!(free_blocks(&bootmem), before);
}

#[test]
fn oversized_requests_report_no_free_block() {
    let bootmem = fresh();
    assert_eq!(bootmem.alloc(POOL * 2, 0), Err(BootmemError::NoFreeBlock));
}

#[test]
fn corrupt_header_stops_the_scan() {
    let bootmem = fresh();
    let (head, _) = free_blocks(&bootmem)[0];

    // Scribble over the head block's size field.
    bootmem
        .window()
        .write_u64(PhysAddr::new(head + layout::block::SIZE), 8);

    match bootmem.alloc(0x100, 0) {
        Err(BootmemError::CorruptFreeList { at, .. }) => assert_eq!(at, head),
        other => panic!("expected corruption error, got {other:?}"),
    }
}

#[test]
fn available_mem_filters_small_blocks() {
    let bootmem = fresh();
    bootmem.alloc(0x1000, 0x1000).unwrap();
    let blocks = free_blocks(&bootmem);
    assert_eq!(blocks.len(), 2);
    let (big, small) = (blocks[0].1, blocks[1].1);

    assert_eq!(bootmem.available_mem(0), big + small);
    assert_eq!(bootmem.available_mem(small + 1), big);
    assert_eq!(bootmem.available_mem(big + 1), 0);
}

#[test]
fn size_rounds_to_the_minimum_granularity() {
    let bootmem = fresh();
    let before = bootmem.available_mem(0);
    let at = bootmem.alloc(1, 0).unwrap();
    assert_eq!(bootmem.available_mem(0), before - layout::MIN_ALIGN);
    // Freeing with the same (unrounded) size restores everything.
    bootmem.free(at, 1).unwrap();
    assert_eq!(bootmem.available_mem(0), before);
}
