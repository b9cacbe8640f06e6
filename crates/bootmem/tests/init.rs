//! Initialization: descriptor layout, free-list seeding, idempotency, and
//! version gating.

mod common;

use bootmem::{layout, Bootmem, BootmemError, MemLayout, MemRegion, MemoryWindow, PhysAddr};
use bootmem_window::ArenaWindow;
use common::{free_blocks, fresh, DESC, LOW_RESERVED, NAMED_ARRAY_BYTES, POOL};

#[test]
fn init_writes_a_version_3_descriptor() {
    let bootmem = fresh();
    let window = bootmem.window();
    let desc = PhysAddr::new(DESC);

    assert_eq!(bootmem.descriptor(), Some(desc));
    assert_eq!(window.read_u32(desc + layout::desc::LOCK), 0);
    assert_eq!(window.read_u32(desc + layout::desc::MAJOR_VERSION), 3);
    assert_eq!(window.read_u32(desc + layout::desc::MINOR_VERSION), 0);
    assert_eq!(
        window.read_u32(desc + layout::desc::NAMED_NUM_BLOCKS),
        layout::NUM_NAMED_BLOCKS
    );
    assert_eq!(
        window.read_u32(desc + layout::desc::NAMED_NAME_LEN),
        layout::NAME_LEN as u32
    );
}

#[test]
fn init_reserves_low_memory_and_the_named_array() {
    let bootmem = fresh();

    // Everything except the low reservation and the named-block directory
    // (carved from the top of the pool) is free.
    let expected = POOL - u64::from(LOW_RESERVED) - NAMED_ARRAY_BYTES;
    assert_eq!(bootmem.available_mem(0), expected);

    let blocks = free_blocks(&bootmem);
    assert_eq!(blocks, vec![(u64::from(LOW_RESERVED), expected)]);

    // The directory sits below the early-mapping limit.
    let array_addr = bootmem
        .window()
        .read_u64(PhysAddr::new(DESC) + layout::desc::NAMED_ARRAY_ADDR);
    assert_eq!(array_addr, POOL - NAMED_ARRAY_BYTES);
    assert!(array_addr < layout::NAMED_ARRAY_MAX_ADDR);
}

#[test]
fn reinitialization_is_a_no_op() {
    let mut bootmem = fresh();
    let before = free_blocks(&bootmem);

    bootmem
        .mem_list_init(POOL / 2, 0x2000, PhysAddr::new(0x200))
        .unwrap();

    assert_eq!(bootmem.descriptor(), Some(PhysAddr::new(DESC)));
    assert_eq!(free_blocks(&bootmem), before);
}

#[test]
fn init_requires_a_descriptor_address() {
    let window = ArenaWindow::new(PhysAddr::zero(), POOL);
    let mut bootmem = Bootmem::new(window);
    assert_eq!(
        bootmem.mem_list_init(POOL, LOW_RESERVED, PhysAddr::zero()),
        Err(BootmemError::NotInitialized)
    );
}

#[test]
fn low_reservation_exceeding_memory_is_rejected() {
    let window = ArenaWindow::new(PhysAddr::zero(), POOL);
    let mut bootmem = Bootmem::new(window);
    // Reserving more low bytes than the node has memory cannot leave a
    // free list behind.
    assert_eq!(
        bootmem.mem_list_init(0x800, LOW_RESERVED, PhysAddr::new(DESC)),
        Err(BootmemError::ImpossibleRange)
    );
}

#[test]
fn uninitialized_handle_rejects_operations() {
    let bootmem = Bootmem::new(ArenaWindow::new(PhysAddr::zero(), 4096));
    assert_eq!(bootmem.alloc(16, 0), Err(BootmemError::NotInitialized));
    assert_eq!(
        bootmem.find_named("anything"),
        Err(BootmemError::NotInitialized)
    );
    assert_eq!(bootmem.available_mem(0), 0);
}

#[test]
fn layout_splits_memory_across_regions() {
    // A miniature map: two 64 KiB windows with a gap, then a large region.
    let map = MemLayout {
        regions: [
            MemRegion {
                base: 0,
                size: 0x1_0000,
            },
            MemRegion {
                base: 0x2_0000,
                size: 0x1_0000,
            },
            MemRegion {
                base: 0x4_0000,
                size: 0xC_0000,
            },
        ],
        max_size: 1 << 20,
    };
    let window = ArenaWindow::new(PhysAddr::zero(), 1 << 20);
    let mut bootmem = Bootmem::new(window);
    // 160 KiB of memory: fills region 0, region 1, and 32 KiB of region 2.
    bootmem
        .mem_list_init_with_layout(&map, 0x2_8000, LOW_RESERVED, PhysAddr::new(DESC))
        .unwrap();

    let blocks = free_blocks(&bootmem);
    // The named array was carved from the top of the last region.
    assert_eq!(
        blocks,
        vec![
            (0x1000, 0x1_0000 - 0x1000),
            (0x2_0000, 0x1_0000),
            (0x4_0000, 0x8000 - NAMED_ARRAY_BYTES),
        ]
    );
}

#[test]
fn engine_accepts_older_majors_but_rejects_newer() {
    let bootmem = fresh();
    let major_at = PhysAddr::new(DESC) + layout::desc::MAJOR_VERSION;

    bootmem.window().write_u32(major_at, 2);
    assert!(bootmem.alloc(0x100, 0).is_ok());
    // The named directory shape is tied to major 3 exactly.
    assert_eq!(
        bootmem.alloc_named(0x100, 0, "too-old"),
        Err(BootmemError::IncompatibleVersion { major: 2, minor: 0 })
    );

    bootmem.window().write_u32(major_at, 4);
    assert_eq!(
        bootmem.alloc(0x100, 0),
        Err(BootmemError::IncompatibleVersion { major: 4, minor: 0 })
    );
    assert_eq!(
        bootmem.find_named("anything"),
        Err(BootmemError::IncompatibleVersion { major: 4, minor: 0 })
    );
}

#[test]
fn app_data_round_trips() {
    let bootmem = fresh();
    assert_eq!(bootmem.app_data().unwrap(), (0, 0));
    bootmem.set_app_data(0x8000, 0x400).unwrap();
    assert_eq!(bootmem.app_data().unwrap(), (0x8000, 0x400));
}

/// Two address ranges backed by separate arenas, standing in for the
/// per-node memory of a two-node system.
struct SplitWindow {
    node0: ArenaWindow,
    node1: ArenaWindow,
}

impl SplitWindow {
    fn pick(&self, at: PhysAddr) -> &ArenaWindow {
        if at.as_u64() < 1 << layout::NODE_MEM_SHIFT {
            &self.node0
        } else {
            &self.node1
        }
    }
}

impl MemoryWindow for SplitWindow {
    fn read_u32(&self, at: PhysAddr) -> u32 {
        self.pick(at).read_u32(at)
    }
    fn read_u64(&self, at: PhysAddr) -> u64 {
        self.pick(at).read_u64(at)
    }
    fn write_u32(&self, at: PhysAddr, value: u32) {
        self.pick(at).write_u32(at, value);
    }
    fn write_u64(&self, at: PhysAddr, value: u64) {
        self.pick(at).write_u64(at, value);
    }
    fn compare_exchange_u32(&self, at: PhysAddr, current: u32, new: u32) -> Result<u32, u32> {
        self.pick(at).compare_exchange_u32(at, current, new)
    }
    fn store_u32_release(&self, at: PhysAddr, value: u32) {
        self.pick(at).store_u32_release(at, value);
    }
}

#[test]
fn multi_node_init_frees_each_nodes_memory() {
    let node_base = 1_u64 << layout::NODE_MEM_SHIFT;
    let window = SplitWindow {
        node0: ArenaWindow::new(PhysAddr::zero(), POOL),
        node1: ArenaWindow::new(PhysAddr::new(node_base), POOL),
    };
    let mut bootmem = Bootmem::new(window);
    bootmem
        .mem_list_init_multi(0b11, &[1, 1], LOW_RESERVED, PhysAddr::new(DESC))
        .unwrap();

    let blocks = free_blocks(&bootmem);
    assert_eq!(blocks.len(), 2);
    // Node 0 carries the low reservation and the named array; node 1's
    // megabyte is free end to end.
    assert_eq!(
        blocks[0],
        (
            u64::from(LOW_RESERVED),
            POOL - u64::from(LOW_RESERVED) - NAMED_ARRAY_BYTES
        )
    );
    assert_eq!(blocks[1], (node_base, POOL));

    // Node-scoped allocation lands in the right address window.
    let at = bootmem.alloc_node(1, 0x1000, 0x1000).unwrap();
    assert!(at.as_u64() >= node_base);
    let at0 = bootmem.alloc_node(0, 0x1000, 0x1000).unwrap();
    assert!(at0.as_u64() < node_base);
}
