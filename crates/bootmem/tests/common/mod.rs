#![allow(dead_code)]

use bootmem::{layout, Bootmem, MemoryWindow, PhysAddr};
use bootmem_window::ArenaWindow;

/// A 1 MiB memory image: plenty of room for the descriptor, the named
/// block directory, and a handful of allocations.
pub const POOL: u64 = 1 << 20;

/// Low memory kept off the free list, covering the descriptor.
pub const LOW_RESERVED: u32 = 0x1000;

/// Where the descriptor sits inside the low reserved bytes.
pub const DESC: u64 = 0x100;

/// Bytes the named-block directory consumes (64 slots of 144 bytes).
pub const NAMED_ARRAY_BYTES: u64 = 64 * 144;

pub fn fresh() -> Bootmem<ArenaWindow> {
    let window = ArenaWindow::new(PhysAddr::zero(), POOL);
    let mut bootmem = Bootmem::new(window);
    bootmem
        .mem_list_init(POOL, LOW_RESERVED, PhysAddr::new(DESC))
        .unwrap();
    bootmem
}

/// Walk the free list through raw window reads, independently of the
/// allocator's own accounting. Returns `(address, size)` pairs in list
/// order.
pub fn free_blocks<W: MemoryWindow>(bootmem: &Bootmem<W>) -> Vec<(u64, u64)> {
    let window = bootmem.window();
    let desc = bootmem.descriptor().unwrap();
    let mut blocks = Vec::new();
    let mut addr = window.read_u64(desc + layout::desc::HEAD_ADDR);
    while addr != 0 {
        let size = window.read_u64(PhysAddr::new(addr + layout::block::SIZE));
        let next = window.read_u64(PhysAddr::new(addr + layout::block::NEXT_ADDR));
        blocks.push((addr, size));
        addr = next;
    }
    blocks
}
