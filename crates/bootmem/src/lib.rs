//! # Boot-Time Physical Memory Allocator
//!
//! An allocator for physical memory that is shared *across boot stages and
//! cores*: the boot ROM sets it up, later stages and application cores keep
//! using it, and every participant finds the same state because all of it —
//! a root descriptor, a free list threaded through the free memory itself,
//! and a directory of named blocks — lives inside the managed memory.
//!
//! ## Overview
//!
//! | Piece | Where it lives |
//! |-------|----------------|
//! | [`Bootmem`] | the accessing program (just a window + descriptor address) |
//! | root descriptor | managed memory, at a well-known address |
//! | free-list headers | the first 16 bytes of each free block |
//! | named-block directory | a low-memory array the descriptor points at |
//!
//! Allocated memory carries no header, so freeing anonymous memory takes an
//! explicit size. Named blocks remember their own extent and can be found
//! again by any stage via [`Bootmem::find_named`].
//!
//! Allocation is *last-fit*: the highest eligible free block is carved from
//! its top end, preserving low memory for callers with strict address
//! limits (32-bit DMA masks and the like).
//!
//! ## Typical Usage
//!
//! ```rust
//! use bootmem::{Bootmem, PhysAddr};
//! use bootmem_window::ArenaWindow;
//!
//! // A 1 MiB memory image with the descriptor inside the low reserved
//! // bytes, exactly where a boot ROM would put it.
//! let window = ArenaWindow::new(PhysAddr::zero(), 1 << 20);
//! let mut bootmem = Bootmem::new(window);
//! bootmem.mem_list_init(1 << 20, 0x1000, PhysAddr::new(0x100))?;
//!
//! let buffer = bootmem.alloc_named(0x2000, 0x1000, "packet-pool")?;
//! assert_eq!(bootmem.find_named("packet-pool")?.unwrap().base, buffer);
//! bootmem.free_named("packet-pool")?;
//! # Ok::<(), bootmem::BootmemError>(())
//! ```
//!
//! ## Concurrency
//!
//! A spinlock word in the descriptor serializes all mutation; it is taken
//! with a test-and-set loop and held by an RAII guard. A caller that needs
//! several operations to be atomic takes [`Bootmem::lock`] once and passes
//! [`AllocFlags::NO_LOCKING`] to the nested calls.

#![cfg_attr(not(any(test, doctest)), no_std)]

pub mod error;
mod freelist;
pub mod layout;
mod lock;
mod named;

use core::fmt::Write as _;

use bitflags::bitflags;
use log::{debug, error, info};

pub use bootmem_addresses::PhysAddr;
pub use bootmem_window::{DirectWindow, MemoryWindow};

pub use crate::error::BootmemError;
pub use crate::layout::{BlockName, MemLayout, MemRegion};
pub use crate::lock::BootmemLock;
pub use crate::named::NamedBlock;

use crate::freelist::AllocRequest;
use crate::layout::{BlockView, DescView, NamedView};

bitflags! {
    /// Flags accepted by the allocation entry points.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AllocFlags: u32 {
        /// Prefer the top of the eligible range (the default behavior
        /// already does; the flag exists for ABI completeness).
        const END_ALLOC = 1;
        /// Do not take the descriptor lock: the caller already holds it
        /// via [`Bootmem::lock`].
        const NO_LOCKING = 2;
    }
}

/// Name prefix used by [`Bootmem::reserve_memory`] when the caller does not
/// supply one.
pub const RESERVED_NAME_PREFIX: &str = "__bootmem_reserved";

/// Handle to the shared boot-memory state, as seen through a
/// [`MemoryWindow`].
///
/// The handle itself owns nothing but the window and the descriptor's
/// physical address; all real state is behind the window. Several handles
/// (in several programs, on several cores) may point at the same
/// descriptor — the in-memory spinlock serializes them.
pub struct Bootmem<W> {
    window: W,
    desc_addr: Option<PhysAddr>,
    reserved_blocks: u32,
}

impl<W: MemoryWindow> Bootmem<W> {
    /// A handle with no descriptor yet; point it somewhere with
    /// [`Bootmem::init`] or build fresh state with
    /// [`Bootmem::mem_list_init`].
    pub const fn new(window: W) -> Self {
        Self {
            window,
            desc_addr: None,
            reserved_blocks: 0,
        }
    }

    /// The memory window this handle reads and writes through.
    pub const fn window(&self) -> &W {
        &self.window
    }

    /// Physical address of the descriptor, if initialized.
    #[must_use]
    pub const fn descriptor(&self) -> Option<PhysAddr> {
        self.desc_addr
    }

    /// Attach to an existing descriptor. The first non-zero address wins;
    /// later calls are ignored, so boot code may call this from several
    /// paths without coordination.
    pub fn init(&mut self, desc_addr: PhysAddr) {
        if self.desc_addr.is_none() && !desc_addr.is_zero() {
            self.desc_addr = Some(desc_addr);
        }
    }

    fn desc_addr(&self) -> Result<PhysAddr, BootmemError> {
        self.desc_addr.ok_or(BootmemError::NotInitialized)
    }

    /// Version gate. The free-list format is stable across majors up to
    /// ours; the named-block directory additionally requires the exact
    /// major that introduced its current shape.
    fn check_version(
        &self,
        desc_addr: PhysAddr,
        exact_major: Option<u32>,
    ) -> Result<(), BootmemError> {
        let desc = DescView::new(&self.window, desc_addr);
        let major = desc.major_version();
        let minor = desc.minor_version();
        let ok = match exact_major {
            Some(wanted) => major == wanted,
            None => major <= layout::MAJOR_VERSION,
        };
        if !ok {
            error!("incompatible boot-memory descriptor version {major}.{minor}");
            return Err(BootmemError::IncompatibleVersion { major, minor });
        }
        Ok(())
    }

    // ---- initialization ------------------------------------------------

    /// Build fresh boot-memory state over the default memory map.
    ///
    /// `mem_size` is the installed memory in bytes; the low
    /// `low_reserved_bytes` stay out of the free list (exception vectors,
    /// the descriptor itself). A no-op if a descriptor is already attached.
    ///
    /// # Errors
    /// Fails if `desc_addr` is zero or region bookkeeping fails.
    pub fn mem_list_init(
        &mut self,
        mem_size: u64,
        low_reserved_bytes: u32,
        desc_addr: PhysAddr,
    ) -> Result<(), BootmemError> {
        self.mem_list_init_with_layout(&MemLayout::octeon(), mem_size, low_reserved_bytes, desc_addr)
    }

    /// [`Bootmem::mem_list_init`] over an explicit memory map.
    pub fn mem_list_init_with_layout(
        &mut self,
        map: &MemLayout,
        mem_size: u64,
        low_reserved_bytes: u32,
        desc_addr: PhysAddr,
    ) -> Result<(), BootmemError> {
        if self.desc_addr.is_some() {
            return Ok(());
        }
        if desc_addr.is_zero() {
            error!("no memory provided for the boot-memory descriptor");
            return Err(BootmemError::NotInitialized);
        }
        let mem_size = if mem_size > map.max_size {
            error!(
                "memory size {mem_size:#x} exceeds the map maximum, truncating to {:#x}",
                map.max_size
            );
            map.max_size
        } else {
            mem_size
        };

        self.init(desc_addr);
        self.write_fresh_descriptor(desc_addr);
        self.free_regions(map, 0, mem_size, u64::from(low_reserved_bytes))?;
        self.setup_named_array(desc_addr)
    }

    /// Build fresh state spanning several NUMA nodes. Bit `n` of
    /// `node_mask` enables node `n`, whose memory (given in MiB) appears at
    /// physical `n << 40`. Low-memory reservation applies to node 0 only.
    pub fn mem_list_init_multi(
        &mut self,
        node_mask: u8,
        mem_sizes_mb: &[u32],
        low_reserved_bytes: u32,
        desc_addr: PhysAddr,
    ) -> Result<(), BootmemError> {
        if self.desc_addr.is_some() {
            return Ok(());
        }
        if desc_addr.is_zero() {
            error!("no memory provided for the boot-memory descriptor");
            return Err(BootmemError::NotInitialized);
        }
        let map = MemLayout::octeon();

        self.init(desc_addr);
        self.write_fresh_descriptor(desc_addr);

        for node in 0..8_u32 {
            if node_mask & (1 << node) == 0 {
                continue;
            }
            let mut mem_size =
                u64::from(mem_sizes_mb.get(node as usize).copied().unwrap_or(0)) << 20;
            if mem_size > map.max_size {
                error!(
                    "node {node}: memory size {mem_size:#x} exceeds the map maximum, truncating"
                );
                mem_size = map.max_size;
            }
            let node_base = u64::from(node) << layout::NODE_MEM_SHIFT;
            let low_reserved = if node == 0 {
                u64::from(low_reserved_bytes)
            } else {
                0
            };
            self.free_regions(&map, node_base, mem_size, low_reserved)?;
        }
        self.setup_named_array(desc_addr)
    }

    fn write_fresh_descriptor(&self, desc_addr: PhysAddr) {
        let desc = DescView::new(&self.window, desc_addr);
        desc.set_lock(0);
        desc.set_flags(0);
        desc.set_head_addr(0);
        desc.set_major_version(layout::MAJOR_VERSION);
        desc.set_minor_version(layout::MINOR_VERSION);
        desc.set_app_data_addr(0);
        desc.set_app_data_size(0);
    }

    /// Seed the free list with one node's memory, split over the map's
    /// regions in order: region 0 first (minus the low reservation), then
    /// region 1, and any remainder into region 2.
    fn free_regions(
        &self,
        map: &MemLayout,
        node_base: u64,
        mem_size: u64,
        low_reserved: u64,
    ) -> Result<(), BootmemError> {
        let [r0, r1, r2] = map.regions;
        if mem_size <= r0.size {
            let usable = mem_size
                .checked_sub(low_reserved)
                .ok_or(BootmemError::ImpossibleRange)?;
            return self.phy_free(
                PhysAddr::new((r0.base | node_base) + low_reserved),
                usable,
                AllocFlags::empty(),
            );
        }
        let usable = r0.size
            .checked_sub(low_reserved)
            .ok_or(BootmemError::ImpossibleRange)?;
        self.phy_free(
            PhysAddr::new((r0.base | node_base) + low_reserved),
            usable,
            AllocFlags::empty(),
        )?;
        let remaining = mem_size - r0.size;
        if remaining > r1.size {
            self.phy_free(
                PhysAddr::new(r1.base | node_base),
                r1.size,
                AllocFlags::empty(),
            )?;
            self.phy_free(
                PhysAddr::new(r2.base | node_base),
                remaining - r1.size,
                AllocFlags::empty(),
            )
        } else {
            self.phy_free(
                PhysAddr::new(r1.base | node_base),
                remaining,
                AllocFlags::empty(),
            )
        }
    }

    /// Carve the named-block directory out of low memory and record it in
    /// the descriptor. Must run after the free list is seeded.
    fn setup_named_array(&self, desc_addr: PhysAddr) -> Result<(), BootmemError> {
        let desc = DescView::new(&self.window, desc_addr);
        desc.set_named_name_len(layout::NAME_LEN as u32);
        desc.set_named_num_blocks(layout::NUM_NAMED_BLOCKS);
        desc.set_named_array_addr(0);

        let array_bytes = u64::from(layout::NUM_NAMED_BLOCKS) * layout::named::BYTES;
        let array_addr = self
            .phy_alloc(
                array_bytes,
                0,
                layout::NAMED_ARRAY_MAX_ADDR,
                0,
                AllocFlags::END_ALLOC,
            )
            .inspect_err(|_| error!("fatal: unable to allocate the named block array"))?;
        desc.set_named_array_addr(array_addr.as_u64());
        debug!("named block array of {array_bytes:#x} bytes at {array_addr}");
        self.window.fill(array_addr, 0, array_bytes);
        Ok(())
    }

    // ---- anonymous allocation ------------------------------------------

    /// Allocate `size` bytes anywhere, aligned to `alignment`.
    ///
    /// # Errors
    /// See [`Bootmem::phy_alloc`].
    pub fn alloc(&self, size: u64, alignment: u64) -> Result<PhysAddr, BootmemError> {
        self.phy_alloc(size, 0, 0, alignment, AllocFlags::empty())
    }

    /// Allocate within `[min_addr, max_addr)`.
    pub fn alloc_range(
        &self,
        size: u64,
        alignment: u64,
        min_addr: PhysAddr,
        max_addr: PhysAddr,
    ) -> Result<PhysAddr, BootmemError> {
        self.phy_alloc(
            size,
            min_addr.as_u64(),
            max_addr.as_u64(),
            alignment,
            AllocFlags::empty(),
        )
    }

    /// Allocate exactly at `at` (which must carry the needed alignment).
    pub fn alloc_address(&self, size: u64, at: PhysAddr) -> Result<PhysAddr, BootmemError> {
        self.phy_alloc(size, at.as_u64(), 0, 0, AllocFlags::empty())
    }

    /// Allocate within NUMA node `node`'s address window.
    pub fn alloc_node(
        &self,
        node: u32,
        size: u64,
        alignment: u64,
    ) -> Result<PhysAddr, BootmemError> {
        let node_base = u64::from(node) << layout::NODE_MEM_SHIFT;
        self.phy_alloc(
            size,
            node_base,
            node_base + (1_u64 << layout::NODE_MEM_SHIFT),
            alignment,
            AllocFlags::empty(),
        )
    }

    /// Return anonymous memory to the free list. The caller must pass the
    /// same extent it allocated; allocated memory carries no header to
    /// check against.
    pub fn free(&self, at: PhysAddr, size: u64) -> Result<(), BootmemError> {
        self.phy_free(at, size, AllocFlags::empty())
    }

    /// The fully parameterized allocation entry point.
    ///
    /// Address conventions: `min_addr != 0` with `max_addr == 0` requests
    /// memory *exactly at* `min_addr`; both zero means anywhere.
    ///
    /// # Errors
    /// - [`BootmemError::NotInitialized`], [`BootmemError::IncompatibleVersion`]
    /// - [`BootmemError::ZeroSize`], [`BootmemError::ImpossibleRange`] for bad parameters
    /// - [`BootmemError::NoFreeBlock`] when nothing satisfies the request
    /// - [`BootmemError::CorruptFreeList`] when a block header fails validation
    pub fn phy_alloc(
        &self,
        size: u64,
        min_addr: u64,
        max_addr: u64,
        alignment: u64,
        flags: AllocFlags,
    ) -> Result<PhysAddr, BootmemError> {
        debug!(
            "phy_alloc: size {size:#x}, min {min_addr:#x}, max {max_addr:#x}, align {alignment:#x}"
        );
        let desc_addr = self.desc_addr()?;
        self.check_version(desc_addr, None)?;
        let req = AllocRequest::validate(size, min_addr, max_addr, alignment)?;

        let desc = DescView::new(&self.window, desc_addr);
        let _guard = BootmemLock::acquire(&self.window, desc_addr, flags);
        freelist::alloc_locked(&self.window, &desc, &req).map(PhysAddr::new)
    }

    /// The fully parameterized free entry point.
    pub fn phy_free(
        &self,
        at: PhysAddr,
        size: u64,
        flags: AllocFlags,
    ) -> Result<(), BootmemError> {
        debug!("phy_free: at {at}, size {size:#x}");
        let desc_addr = self.desc_addr()?;
        self.check_version(desc_addr, None)?;

        let desc = DescView::new(&self.window, desc_addr);
        let _guard = BootmemLock::acquire(&self.window, desc_addr, flags);
        freelist::free_locked(&self.window, &desc, at.as_u64(), size)
    }

    /// Total free bytes, counting only blocks of at least
    /// `min_block_size`. Returns 0 when uninitialized.
    #[must_use]
    pub fn available_mem(&self, min_block_size: u64) -> u64 {
        let Ok(desc_addr) = self.desc_addr() else {
            return 0;
        };
        let desc = DescView::new(&self.window, desc_addr);
        let _guard = BootmemLock::acquire(&self.window, desc_addr, AllocFlags::empty());
        freelist::available_locked(&self.window, &desc, min_block_size)
    }

    // ---- named blocks --------------------------------------------------

    /// Allocate a named block anywhere.
    ///
    /// # Errors
    /// [`BootmemError::NameExists`] and [`BootmemError::DirectoryFull`] on
    /// top of the anonymous-allocation errors.
    pub fn alloc_named(
        &self,
        size: u64,
        alignment: u64,
        name: &str,
    ) -> Result<PhysAddr, BootmemError> {
        self.alloc_named_range_flags(size, 0, 0, alignment, name, AllocFlags::empty())
    }

    /// [`Bootmem::alloc_named`] with explicit flags.
    pub fn alloc_named_flags(
        &self,
        size: u64,
        alignment: u64,
        name: &str,
        flags: AllocFlags,
    ) -> Result<PhysAddr, BootmemError> {
        self.alloc_named_range_flags(size, 0, 0, alignment, name, flags)
    }

    /// Allocate a named block exactly at `at`.
    pub fn alloc_named_address(
        &self,
        size: u64,
        at: PhysAddr,
        name: &str,
    ) -> Result<PhysAddr, BootmemError> {
        self.alloc_named_range_flags(size, at.as_u64(), 0, 0, name, AllocFlags::empty())
    }

    /// Allocate a named block within `[min_addr, max_addr)`.
    pub fn alloc_named_range(
        &self,
        size: u64,
        min_addr: u64,
        max_addr: u64,
        alignment: u64,
        name: &str,
    ) -> Result<PhysAddr, BootmemError> {
        self.alloc_named_range_flags(size, min_addr, max_addr, alignment, name, AllocFlags::empty())
    }

    /// The fully parameterized named allocation entry point.
    pub fn alloc_named_range_flags(
        &self,
        size: u64,
        min_addr: u64,
        max_addr: u64,
        alignment: u64,
        name: &str,
        flags: AllocFlags,
    ) -> Result<PhysAddr, BootmemError> {
        debug!(
            "alloc_named: {name:?}, size {size:#x}, min {min_addr:#x}, max {max_addr:#x}, \
             align {alignment:#x}"
        );
        let desc_addr = self.desc_addr()?;
        self.check_version(desc_addr, Some(layout::MAJOR_VERSION))?;

        let desc = DescView::new(&self.window, desc_addr);
        let _guard = BootmemLock::acquire(&self.window, desc_addr, flags);
        named::block_alloc(
            &self.window,
            &desc,
            size,
            min_addr,
            max_addr,
            alignment,
            name,
        )
        .map(PhysAddr::new)
    }

    /// Allocate a named block, or return the existing one if the name is
    /// already taken. Freshly allocated memory is zero-filled; an existing
    /// block is returned untouched.
    ///
    /// Idempotent across stages and cores: exactly one caller allocates,
    /// everyone else observes that block.
    pub fn alloc_named_once(
        &self,
        size: u64,
        min_addr: u64,
        max_addr: u64,
        alignment: u64,
        name: &str,
    ) -> Result<PhysAddr, BootmemError> {
        let desc_addr = self.desc_addr()?;
        self.check_version(desc_addr, Some(layout::MAJOR_VERSION))?;

        let desc = DescView::new(&self.window, desc_addr);
        let _guard = BootmemLock::acquire(&self.window, desc_addr, AllocFlags::empty());
        if let Some(slot_addr) = named::block_find(&self.window, &desc, Some(name)) {
            let slot = NamedView::new(&self.window, slot_addr);
            return Ok(PhysAddr::new(slot.base_addr()));
        }
        let base = named::block_alloc(
            &self.window,
            &desc,
            size,
            min_addr,
            max_addr,
            alignment,
            name,
        )?;
        self.window.fill(PhysAddr::new(base), 0, size);
        Ok(PhysAddr::new(base))
    }

    /// Free a named block and vacate its directory slot.
    pub fn free_named(&self, name: &str) -> Result<(), BootmemError> {
        debug!("free_named: {name:?}");
        let desc_addr = self.desc_addr()?;
        self.check_version(desc_addr, Some(layout::MAJOR_VERSION))?;

        let desc = DescView::new(&self.window, desc_addr);
        let _guard = BootmemLock::acquire(&self.window, desc_addr, AllocFlags::empty());
        let (base, size) = named::block_free(&self.window, &desc, name)?;
        debug!("freed named block {name:?} (base {base:#x}, size {size:#x})");
        Ok(())
    }

    /// Look up a named block.
    ///
    /// # Errors
    /// [`BootmemError::NotInitialized`] or
    /// [`BootmemError::IncompatibleVersion`]; an absent name is `Ok(None)`,
    /// not an error.
    pub fn find_named(&self, name: &str) -> Result<Option<NamedBlock>, BootmemError> {
        self.find_named_flags(name, AllocFlags::empty())
    }

    /// [`Bootmem::find_named`] with explicit flags, for nesting under a
    /// held [`Bootmem::lock`].
    pub fn find_named_flags(
        &self,
        name: &str,
        flags: AllocFlags,
    ) -> Result<Option<NamedBlock>, BootmemError> {
        let desc_addr = self.desc_addr()?;
        self.check_version(desc_addr, Some(layout::MAJOR_VERSION))?;

        let desc = DescView::new(&self.window, desc_addr);
        let _guard = BootmemLock::acquire(&self.window, desc_addr, flags);
        Ok(named::block_find(&self.window, &desc, Some(name)).map(|slot_addr| {
            let slot = NamedView::new(&self.window, slot_addr);
            NamedBlock {
                base: PhysAddr::new(slot.base_addr()),
                size: slot.size(),
                name: slot.name(desc.named_name_len() as usize),
            }
        }))
    }

    // ---- reservations --------------------------------------------------

    /// Withdraw every free byte overlapping `[start, start + size)` from
    /// the free list by turning the overlaps into named blocks.
    ///
    /// Each overlapping free block yields one reservation named
    /// `{prefix}_{start:012x}_{counter}` (prefix truncated to 32 bytes,
    /// default [`RESERVED_NAME_PREFIX`]). A block that merely straddles
    /// the range start is reserved from its own base, so the reservation
    /// may begin below `start`.
    ///
    /// Stops at the first failure, leaving earlier reservations in place.
    pub fn reserve_memory(
        &mut self,
        start: PhysAddr,
        size: u64,
        name_prefix: Option<&str>,
        flags: AllocFlags,
    ) -> Result<(), BootmemError> {
        let desc_addr = self.desc_addr()?;
        self.check_version(desc_addr, Some(layout::MAJOR_VERSION))?;
        if start.is_zero() || size == 0 {
            return Err(BootmemError::ZeroSize);
        }

        let prefix = name_prefix.unwrap_or(RESERVED_NAME_PREFIX);
        let start = start.as_u64();
        let desc = DescView::new(&self.window, desc_addr);
        let mut block_addr = desc.head_addr();
        if block_addr == 0 {
            return Err(BootmemError::NoFreeBlock);
        }

        while block_addr != 0 {
            let block = BlockView::new(&self.window, block_addr);
            let block_size = block.size();

            let reserve_size = if block_addr >= start && block_addr < start + size {
                // Block begins inside the range.
                core::cmp::min(block_size, size - (block_addr - start))
            } else if start > block_addr && start < block_addr + block_size {
                // Range begins inside the block; the reservation covers
                // from the block's base to whichever end comes first.
                block_size - (start - block_addr)
            } else {
                0
            };

            if reserve_size != 0 {
                let mut name = layout::NameBuf::new();
                let _ = write!(name, "{prefix:.32}_{start:012x}_{}", self.reserved_blocks);
                debug!(
                    "reserving {reserve_size:#x} bytes at {block_addr:#x} as {:?}",
                    name.as_str()
                );
                self.alloc_named_range_flags(
                    reserve_size,
                    block_addr,
                    0,
                    0,
                    name.as_str(),
                    flags,
                )
                .inspect_err(|err| {
                    error!("failed to reserve {reserve_size:#x} bytes at {block_addr:#x}: {err}");
                })?;
            }

            // The header is read back after the carve; a fully consumed
            // block's next pointer is stale but still valid, because
            // nothing clears headers on allocation.
            block_addr = block.next_addr();
            self.reserved_blocks += 1;
        }
        Ok(())
    }

    // ---- application data and diagnostics ------------------------------

    /// The opaque application scratch range recorded in the descriptor.
    pub fn app_data(&self) -> Result<(u64, u64), BootmemError> {
        let desc_addr = self.desc_addr()?;
        let desc = DescView::new(&self.window, desc_addr);
        Ok((desc.app_data_addr(), desc.app_data_size()))
    }

    /// Record an application scratch range in the descriptor. The
    /// allocator itself never interprets it.
    pub fn set_app_data(&self, addr: u64, size: u64) -> Result<(), BootmemError> {
        let desc_addr = self.desc_addr()?;
        let desc = DescView::new(&self.window, desc_addr);
        desc.set_app_data_addr(addr);
        desc.set_app_data_size(size);
        Ok(())
    }

    /// Log the descriptor and every free-list entry.
    ///
    /// Deliberately lock-free so it can run against wedged state; the
    /// output may be torn if the list mutates concurrently.
    pub fn dump_free_list(&self) {
        let Ok(desc_addr) = self.desc_addr() else {
            info!("boot-memory: not initialized");
            return;
        };
        let desc = DescView::new(&self.window, desc_addr);
        let major = desc.major_version();
        let minor = desc.minor_version();
        info!("boot-memory descriptor at {desc_addr}, version {major}.{minor}");
        if major > layout::MAJOR_VERSION {
            info!("descriptor version is newer than this code; dump may be wrong");
        }

        let mut ent_addr = desc.head_addr();
        if ent_addr == 0 {
            info!("free list is empty");
        }
        while ent_addr != 0 {
            let ent = BlockView::new(&self.window, ent_addr);
            let size = ent.size();
            let next = ent.next_addr();
            info!("free block at {ent_addr:#013x}: size {size:#013x}, next {next:#013x}");
            if ent_addr + size > next && next != 0 {
                info!("free list corrupt: block overlaps its successor");
                return;
            }
            ent_addr = next;
        }
    }

    /// Log every occupied named-block directory slot.
    pub fn dump_named_blocks(&self) {
        let Ok(desc_addr) = self.desc_addr() else {
            info!("boot-memory: not initialized");
            return;
        };
        if self
            .check_version(desc_addr, Some(layout::MAJOR_VERSION))
            .is_err()
        {
            info!("named block directory unavailable in this descriptor version");
            return;
        }
        let desc = DescView::new(&self.window, desc_addr);
        let name_len = desc.named_name_len() as usize;
        info!(
            "named block directory: {} slots of {name_len}-byte names",
            desc.named_num_blocks()
        );

        let mut slot_addr = desc.named_array_addr();
        for _ in 0..desc.named_num_blocks() {
            let slot = NamedView::new(&self.window, slot_addr);
            let size = slot.size();
            if size != 0 {
                info!(
                    "named block {}: base {:#x}, size {size:#x}",
                    slot.name(name_len),
                    slot.base_addr()
                );
            }
            slot_addr += layout::named::BYTES;
        }
    }

    /// Take the descriptor lock explicitly. Operations performed while the
    /// guard lives must pass [`AllocFlags::NO_LOCKING`] or they deadlock.
    pub fn lock(&self) -> Result<BootmemLock<'_, W>, BootmemError> {
        let desc_addr = self.desc_addr()?;
        Ok(BootmemLock::acquire(
            &self.window,
            desc_addr,
            AllocFlags::empty(),
        ))
    }
}
