//! The free-list engine: a singly linked list of free blocks, threaded
//! through the free memory itself and kept sorted by ascending address.
//!
//! Each free block stores a 16-byte header ([`crate::layout::block`]) in
//! its own first bytes; allocated memory carries no header at all, which is
//! why every free takes an explicit size. Allocation prefers the *highest*
//! eligible block and carves from its end, keeping low memory available
//! for callers with tight address limits.
//!
//! Everything here assumes the caller already holds the descriptor lock.

use bootmem_addresses::{align_down, align_up};
use bootmem_window::MemoryWindow;
use log::{debug, error};

use crate::error::BootmemError;
use crate::layout::{BlockView, DescView, MIN_ALIGN};

/// A validated allocation request: size rounded to [`MIN_ALIGN`], alignment
/// a power of two of at least [`MIN_ALIGN`], and the address window
/// normalized so `[min_addr, max_addr)` is the exact search range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AllocRequest {
    pub(crate) size: u64,
    pub(crate) min_addr: u64,
    pub(crate) max_addr: u64,
    pub(crate) align: u64,
}

impl AllocRequest {
    /// Normalize raw request parameters.
    ///
    /// An `alignment` of zero (or anything below [`MIN_ALIGN`]) becomes
    /// [`MIN_ALIGN`]; other values round up to the next power of two. The
    /// window conventions: `min != 0, max == 0` means "exactly at `min`"
    /// (the window is just large enough for the rounded size), and both
    /// zero means "anywhere".
    pub(crate) fn validate(
        size: u64,
        min_addr: u64,
        max_addr: u64,
        alignment: u64,
    ) -> Result<Self, BootmemError> {
        if size == 0 {
            return Err(BootmemError::ZeroSize);
        }
        let size = align_up(size, MIN_ALIGN);

        let mut align = MIN_ALIGN;
        while align < (1_u64 << 48) {
            if align >= alignment {
                break;
            }
            align <<= 1;
        }

        let min_addr = align_up(min_addr, align);
        let max_addr = if min_addr != 0 && max_addr == 0 {
            min_addr + size
        } else if min_addr == 0 && max_addr == 0 {
            u64::MAX
        } else {
            max_addr
        };

        match max_addr.checked_sub(min_addr) {
            Some(span) if span >= size => {}
            _ => return Err(BootmemError::ImpossibleRange),
        }

        Ok(Self {
            size,
            min_addr,
            max_addr,
            align,
        })
    }
}

/// Allocate per `req`, assuming the descriptor lock is held.
///
/// Scans the whole list, remembers the *last* (highest-address) block that
/// can satisfy the request, then carves the allocation from the top of its
/// usable sub-range. Splitting may leave a new free block below, above, or
/// on both sides of the carved range.
pub(crate) fn alloc_locked<W: MemoryWindow>(
    window: &W,
    desc: &DescView<'_, W>,
    req: &AllocRequest,
) -> Result<u64, BootmemError> {
    let align_mask = !(req.align - 1);

    let mut target_addr = 0_u64;
    let mut target_prev = 0_u64;
    let mut target_size = 0_u64;

    let mut prev_addr = 0_u64;
    let mut ent_addr = desc.head_addr();
    while ent_addr != 0 && ent_addr < req.max_addr {
        let ent = BlockView::new(window, ent_addr);
        let ent_size = ent.size();
        let next_addr = ent.next_addr();

        // A header that shrank below the minimum block size or points
        // backwards means something scribbled over free memory.
        if ent_size < MIN_ALIGN || (next_addr != 0 && ent_addr > next_addr) {
            error!("corrupt free list entry at {ent_addr:#x} (size {ent_size:#x}, next {next_addr:#x})");
            return Err(BootmemError::CorruptFreeList {
                at: ent_addr,
                next: next_addr,
            });
        }

        let free_start = align_up(ent_addr, req.align);
        let free_end = (ent_addr + ent_size) & align_mask;

        let usable = free_start
            .checked_add(req.size)
            .is_some_and(|end| end <= free_end)
            && free_end >= req.min_addr
            && free_start <= req.max_addr
            && free_end - req.min_addr >= req.size
            && req.max_addr - free_start >= req.size;
        if usable {
            // Keep scanning: a later (higher) block that fits wins.
            target_addr = ent_addr;
            target_prev = prev_addr;
            target_size = ent_size;
        }

        prev_addr = ent_addr;
        ent_addr = next_addr;
    }

    if target_addr == 0 {
        debug!(
            "no free block satisfies size {:#x} align {:#x} in [{:#x}, {:#x})",
            req.size, req.align, req.min_addr, req.max_addr
        );
        return Err(BootmemError::NoFreeBlock);
    }

    let mut ent_addr = target_addr;
    let mut ent_size = target_size;
    let mut prev_addr = target_prev;

    // Highest aligned address inside both the block and the window.
    let usable_max = core::cmp::min(req.max_addr, ent_addr + ent_size);
    let desired_min = align_down(usable_max - req.size, req.align);

    if desired_min > ent_addr {
        // Room below the carved range: split it off as its own free block
        // and continue with the upper part.
        let new_addr = desired_min;
        let new_size = ent_size - (new_addr - ent_addr);
        let ent = BlockView::new(window, ent_addr);
        let new = BlockView::new(window, new_addr);
        new.set_next_addr(ent.next_addr());
        new.set_size(new_size);
        ent.set_next_addr(new_addr);
        ent.set_size(ent_size - new_size);
        prev_addr = ent_addr;
        ent_addr = new_addr;
        ent_size = new_size;
    }

    if desired_min + req.size < ent_addr + ent_size {
        // Room above the carved range.
        let new_addr = ent_addr + req.size;
        let new_size = ent_size - req.size;
        let ent = BlockView::new(window, ent_addr);
        let new = BlockView::new(window, new_addr);
        new.set_next_addr(ent.next_addr());
        new.set_size(new_size);
        ent.set_next_addr(new_addr);
        ent.set_size(req.size);
        ent_size = req.size;
    }

    if desired_min != ent_addr || ent_size != req.size {
        error!("internal error carving block at {ent_addr:#x} for {desired_min:#x}");
    }

    // Unlink the carved block.
    let next_addr = BlockView::new(window, ent_addr).next_addr();
    if prev_addr != 0 {
        BlockView::new(window, prev_addr).set_next_addr(next_addr);
    } else {
        desc.set_head_addr(next_addr);
    }

    debug!("allocated {:#x} bytes at {desired_min:#x}", req.size);
    Ok(desired_min)
}

/// Return `[addr, addr + size)` to the free list, assuming the descriptor
/// lock is held. `size` rounds up to [`MIN_ALIGN`].
///
/// The range coalesces with an adjacent free block on either side when the
/// addresses line up exactly. Overlap with the middle of the list is the
/// caller's bug and goes undetected; overlap with the head block is caught
/// and rejected.
pub(crate) fn free_locked<W: MemoryWindow>(
    window: &W,
    desc: &DescView<'_, W>,
    addr: u64,
    size: u64,
) -> Result<(), BootmemError> {
    if addr == 0 || size == 0 {
        return Err(BootmemError::ZeroSize);
    }
    let size = align_up(size, MIN_ALIGN);

    let head_addr = desc.head_addr();
    if head_addr == 0 || addr < head_addr {
        // New first block: empty list, prepend, or merge into the old head.
        if head_addr != 0 && addr + size > head_addr {
            return Err(BootmemError::ImpossibleRange);
        }
        let new = BlockView::new(window, addr);
        if addr + size == head_addr {
            let head = BlockView::new(window, head_addr);
            new.set_next_addr(head.next_addr());
            new.set_size(head.size() + size);
        } else {
            new.set_next_addr(head_addr);
            new.set_size(size);
        }
        desc.set_head_addr(addr);
        return Ok(());
    }

    let mut prev_addr = 0_u64;
    let mut cur_addr = head_addr;
    while cur_addr != 0 && addr > cur_addr {
        prev_addr = cur_addr;
        cur_addr = BlockView::new(window, cur_addr).next_addr();
    }

    let prev = BlockView::new(window, prev_addr);
    if cur_addr == 0 {
        // Past the tail: extend the last block or append a new one.
        if prev_addr + prev.size() == addr {
            prev.set_size(prev.size() + size);
        } else {
            prev.set_next_addr(addr);
            let new = BlockView::new(window, addr);
            new.set_size(size);
            new.set_next_addr(0);
        }
        return Ok(());
    }

    let cur = BlockView::new(window, cur_addr);
    if prev_addr + prev.size() == addr {
        prev.set_size(prev.size() + size);
        if addr + size == cur_addr {
            // Freed range bridges prev and cur into one block.
            prev.set_size(prev.size() + cur.size());
            prev.set_next_addr(cur.next_addr());
        }
    } else if addr + size == cur_addr {
        let new = BlockView::new(window, addr);
        new.set_size(cur.size() + size);
        new.set_next_addr(cur.next_addr());
        prev.set_next_addr(addr);
    } else {
        let new = BlockView::new(window, addr);
        new.set_size(size);
        new.set_next_addr(cur_addr);
        prev.set_next_addr(addr);
    }
    Ok(())
}

/// Total bytes on the free list, counting only blocks of at least
/// `min_block_size`. Assumes the descriptor lock is held.
pub(crate) fn available_locked<W: MemoryWindow>(
    window: &W,
    desc: &DescView<'_, W>,
    min_block_size: u64,
) -> u64 {
    let mut total = 0_u64;
    let mut ent_addr = desc.head_addr();
    while ent_addr != 0 {
        let ent = BlockView::new(window, ent_addr);
        let ent_size = ent.size();
        if ent_size >= min_block_size {
            total += ent_size;
        }
        ent_addr = ent.next_addr();
    }
    total
}
