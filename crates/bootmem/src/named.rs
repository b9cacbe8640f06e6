//! The named-block directory: a fixed array of slots that gives stable,
//! name-keyed addresses to allocations shared across boot stages.
//!
//! The directory is itself carved out of managed memory at initialization
//! time; the descriptor records where it is and how it is shaped. A slot is
//! occupied exactly when its size field is nonzero — freeing clears only
//! the size, leaving the base address and name bytes stale.
//!
//! Everything here assumes the caller already holds the descriptor lock.

use bootmem_addresses::{align_up, PhysAddr};
use bootmem_window::MemoryWindow;
use log::debug;

use crate::error::BootmemError;
use crate::freelist::{self, AllocRequest};
use crate::layout::{self, BlockName, DescView, NamedView, MIN_ALIGN};

/// A snapshot of one occupied directory slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamedBlock {
    pub base: PhysAddr,
    pub size: u64,
    pub name: BlockName,
}

/// Locate a directory slot; returns the slot's physical address.
///
/// With `Some(name)`, finds the occupied slot whose name matches. With
/// `None`, finds the first vacant slot.
pub(crate) fn block_find<W: MemoryWindow>(
    window: &W,
    desc: &DescView<'_, W>,
    name: Option<&str>,
) -> Option<u64> {
    let name_len = desc.named_name_len() as usize;
    let mut slot_addr = desc.named_array_addr();
    for _ in 0..desc.named_num_blocks() {
        let slot = NamedView::new(window, slot_addr);
        let occupied = slot.size() != 0;
        match name {
            Some(needle) if occupied => {
                if slot.name(name_len).matches(needle, name_len) {
                    return Some(slot_addr);
                }
            }
            None if !occupied => return Some(slot_addr),
            _ => {}
        }
        slot_addr += layout::named::BYTES;
    }
    None
}

/// Allocate a named block: claim a vacant slot, allocate the memory, then
/// record base, size, and name in the slot.
pub(crate) fn block_alloc<W: MemoryWindow>(
    window: &W,
    desc: &DescView<'_, W>,
    size: u64,
    min_addr: u64,
    max_addr: u64,
    alignment: u64,
    name: &str,
) -> Result<u64, BootmemError> {
    if block_find(window, desc, Some(name)).is_some() {
        debug!("named block {name:?} already exists");
        return Err(BootmemError::NameExists);
    }
    let Some(slot_addr) = block_find(window, desc, None) else {
        debug!("no free named block slot for {name:?}");
        return Err(BootmemError::DirectoryFull);
    };

    // The directory records the rounded size; free uses it verbatim.
    let size = align_up(size, MIN_ALIGN);
    let req = AllocRequest::validate(size, min_addr, max_addr, alignment)?;
    let base = freelist::alloc_locked(window, desc, &req)?;

    let slot = NamedView::new(window, slot_addr);
    slot.set_base_addr(base);
    slot.set_size(size);
    slot.set_name(name, desc.named_name_len() as usize);
    Ok(base)
}

/// Free a named block, returning the `(base, size)` it occupied.
///
/// The slot is vacated by zeroing its size only; stale name and base bytes
/// remain visible to raw dumps until the slot is reused.
pub(crate) fn block_free<W: MemoryWindow>(
    window: &W,
    desc: &DescView<'_, W>,
    name: &str,
) -> Result<(u64, u64), BootmemError> {
    let Some(slot_addr) = block_find(window, desc, Some(name)) else {
        return Err(BootmemError::NotFound);
    };
    let slot = NamedView::new(window, slot_addr);
    let base = slot.base_addr();
    let size = slot.size();
    debug!("freeing named block {name:?}: base {base:#x}, size {size:#x}");

    if let Err(err) = freelist::free_locked(window, desc, base, size) {
        log::error!("failed to return named block {name:?} to the free list: {err}");
    }
    slot.set_size(0);
    Ok((base, size))
}
