//! Bit-exact layout of the shared boot-memory structures.
//!
//! Everything the allocator touches lives *inside* the managed memory and is
//! shared with other boot stages, so the byte layout here is a wire format,
//! not an internal representation. All multi-byte fields are read and
//! written through a [`MemoryWindow`] at fixed offsets; nothing in this
//! crate ever casts window memory to a Rust struct.
//!
//! Names in the directory are packed MSB-first into 64-bit words so that
//! the byte image is identical regardless of the accessing CPU's
//! endianness.

use core::fmt;

use bootmem_addresses::PhysAddr;
use bootmem_window::MemoryWindow;

/// Granularity of every allocation: sizes and addresses round to this.
pub const MIN_ALIGN: u64 = 16;

/// Capacity of a named-block name field, including the NUL terminator.
pub const NAME_LEN: usize = 128;

/// Number of slots in the named-block directory.
pub const NUM_NAMED_BLOCKS: u32 = 64;

/// Descriptor major version written by [`crate::Bootmem::mem_list_init`].
pub const MAJOR_VERSION: u32 = 3;

/// Descriptor minor version written by [`crate::Bootmem::mem_list_init`].
pub const MINOR_VERSION: u32 = 0;

/// Bit position of the node id within a physical address.
pub const NODE_MEM_SHIFT: u32 = 40;

/// The named-block directory itself must land below this address so that
/// every boot stage can reach it through its limited early mapping.
pub const NAMED_ARRAY_MAX_ADDR: u64 = 0x1000_0000;

/// Root descriptor field offsets. 56 bytes total.
pub mod desc {
    /// Spinlock word guarding the descriptor and everything it points at.
    pub const LOCK: u64 = 0;
    /// Descriptor-wide flags (reserved, written as zero).
    pub const FLAGS: u64 = 4;
    /// Physical address of the first free block, zero when empty.
    pub const HEAD_ADDR: u64 = 8;
    pub const MAJOR_VERSION: u64 = 16;
    pub const MINOR_VERSION: u64 = 20;
    /// Opaque application scratch range (address, size).
    pub const APP_DATA_ADDR: u64 = 24;
    pub const APP_DATA_SIZE: u64 = 32;
    /// Shape of the named-block directory this descriptor points at.
    pub const NAMED_NUM_BLOCKS: u64 = 40;
    pub const NAMED_NAME_LEN: u64 = 44;
    pub const NAMED_ARRAY_ADDR: u64 = 48;
    pub const BYTES: u64 = 56;
}

/// Free-block header field offsets, stored in the block's first bytes.
pub mod block {
    /// Physical address of the next free block, zero at the tail.
    pub const NEXT_ADDR: u64 = 0;
    pub const SIZE: u64 = 8;
    pub const BYTES: u64 = 16;
}

/// Named-block directory slot field offsets. A slot with `SIZE == 0` is
/// vacant; `BASE_ADDR` and the name bytes of a vacant slot are stale.
pub mod named {
    pub const BASE_ADDR: u64 = 0;
    pub const SIZE: u64 = 8;
    pub const NAME: u64 = 16;
    /// Slot stride: two 64-bit fields plus the 128-byte name.
    pub const BYTES: u64 = 16 + super::NAME_LEN as u64;
}

/// One physical DRAM region a memory map is split over.
#[derive(Debug, Clone, Copy)]
pub struct MemRegion {
    pub base: u64,
    pub size: u64,
}

/// The physical regions available memory is scattered across, in the order
/// they are consumed, plus the largest total a single node may carry.
#[derive(Debug, Clone, Copy)]
pub struct MemLayout {
    pub regions: [MemRegion; 3],
    pub max_size: u64,
}

impl MemLayout {
    /// The Octeon DRAM map: a low 256 MiB window, a second 256 MiB window
    /// high up, and the large middle region, 16 GiB per node in total.
    #[must_use]
    pub const fn octeon() -> Self {
        Self {
            regions: [
                MemRegion {
                    base: 0x0,
                    size: 0x1000_0000,
                },
                MemRegion {
                    base: 0x4_1000_0000,
                    size: 0x1000_0000,
                },
                MemRegion {
                    base: 0x2000_0000,
                    size: 0x3_E000_0000,
                },
            ],
            max_size: 16 * 1024 * 1024 * 1024,
        }
    }
}

impl Default for MemLayout {
    fn default() -> Self {
        Self::octeon()
    }
}

/// Typed accessors over the root descriptor.
pub(crate) struct DescView<'w, W> {
    window: &'w W,
    base: PhysAddr,
}

impl<'w, W: MemoryWindow> DescView<'w, W> {
    pub(crate) const fn new(window: &'w W, base: PhysAddr) -> Self {
        Self { window, base }
    }

    pub(crate) fn lock_addr(&self) -> PhysAddr {
        self.base + desc::LOCK
    }

    pub(crate) fn set_lock(&self, value: u32) {
        self.window.write_u32(self.base + desc::LOCK, value);
    }

    pub(crate) fn set_flags(&self, value: u32) {
        self.window.write_u32(self.base + desc::FLAGS, value);
    }

    pub(crate) fn head_addr(&self) -> u64 {
        self.window.read_u64(self.base + desc::HEAD_ADDR)
    }

    pub(crate) fn set_head_addr(&self, value: u64) {
        self.window.write_u64(self.base + desc::HEAD_ADDR, value);
    }

    pub(crate) fn major_version(&self) -> u32 {
        self.window.read_u32(self.base + desc::MAJOR_VERSION)
    }

    pub(crate) fn set_major_version(&self, value: u32) {
        self.window.write_u32(self.base + desc::MAJOR_VERSION, value);
    }

    pub(crate) fn minor_version(&self) -> u32 {
        self.window.read_u32(self.base + desc::MINOR_VERSION)
    }

    pub(crate) fn set_minor_version(&self, value: u32) {
        self.window.write_u32(self.base + desc::MINOR_VERSION, value);
    }

    pub(crate) fn app_data_addr(&self) -> u64 {
        self.window.read_u64(self.base + desc::APP_DATA_ADDR)
    }

    pub(crate) fn set_app_data_addr(&self, value: u64) {
        self.window.write_u64(self.base + desc::APP_DATA_ADDR, value);
    }

    pub(crate) fn app_data_size(&self) -> u64 {
        self.window.read_u64(self.base + desc::APP_DATA_SIZE)
    }

    pub(crate) fn set_app_data_size(&self, value: u64) {
        self.window.write_u64(self.base + desc::APP_DATA_SIZE, value);
    }

    pub(crate) fn named_num_blocks(&self) -> u32 {
        self.window.read_u32(self.base + desc::NAMED_NUM_BLOCKS)
    }

    pub(crate) fn set_named_num_blocks(&self, value: u32) {
        self.window.write_u32(self.base + desc::NAMED_NUM_BLOCKS, value);
    }

    pub(crate) fn named_name_len(&self) -> u32 {
        self.window.read_u32(self.base + desc::NAMED_NAME_LEN)
    }

    pub(crate) fn set_named_name_len(&self, value: u32) {
        self.window.write_u32(self.base + desc::NAMED_NAME_LEN, value);
    }

    pub(crate) fn named_array_addr(&self) -> u64 {
        self.window.read_u64(self.base + desc::NAMED_ARRAY_ADDR)
    }

    pub(crate) fn set_named_array_addr(&self, value: u64) {
        self.window.write_u64(self.base + desc::NAMED_ARRAY_ADDR, value);
    }
}

/// Typed accessors over a free-block header threaded through memory.
pub(crate) struct BlockView<'w, W> {
    window: &'w W,
    addr: u64,
}

impl<'w, W: MemoryWindow> BlockView<'w, W> {
    pub(crate) const fn new(window: &'w W, addr: u64) -> Self {
        Self { window, addr }
    }

    pub(crate) fn next_addr(&self) -> u64 {
        self.window.read_u64(PhysAddr::new(self.addr + block::NEXT_ADDR))
    }

    pub(crate) fn set_next_addr(&self, value: u64) {
        self.window
            .write_u64(PhysAddr::new(self.addr + block::NEXT_ADDR), value);
    }

    pub(crate) fn size(&self) -> u64 {
        self.window.read_u64(PhysAddr::new(self.addr + block::SIZE))
    }

    pub(crate) fn set_size(&self, value: u64) {
        self.window
            .write_u64(PhysAddr::new(self.addr + block::SIZE), value);
    }
}

/// Typed accessors over one named-block directory slot.
pub(crate) struct NamedView<'w, W> {
    window: &'w W,
    addr: u64,
}

impl<'w, W: MemoryWindow> NamedView<'w, W> {
    pub(crate) const fn new(window: &'w W, addr: u64) -> Self {
        Self { window, addr }
    }

    pub(crate) fn base_addr(&self) -> u64 {
        self.window.read_u64(PhysAddr::new(self.addr + named::BASE_ADDR))
    }

    pub(crate) fn set_base_addr(&self, value: u64) {
        self.window
            .write_u64(PhysAddr::new(self.addr + named::BASE_ADDR), value);
    }

    pub(crate) fn size(&self) -> u64 {
        self.window.read_u64(PhysAddr::new(self.addr + named::SIZE))
    }

    pub(crate) fn set_size(&self, value: u64) {
        self.window
            .write_u64(PhysAddr::new(self.addr + named::SIZE), value);
    }

    /// Unpack the slot's name. `name_len` is the directory's field width
    /// from the descriptor, normally [`NAME_LEN`].
    pub(crate) fn name(&self, name_len: usize) -> BlockName {
        let n = name_len.min(NAME_LEN);
        let mut bytes = [0_u8; NAME_LEN];
        let mut addr = self.addr + named::NAME;
        let mut i = 0;
        while i < n {
            let word = self.window.read_u64(PhysAddr::new(addr));
            addr += 8;
            let mut shift = 56_i32;
            while i < n && shift >= 0 {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                {
                    bytes[i] = (word >> shift) as u8;
                }
                shift -= 8;
                i += 1;
            }
        }
        BlockName { bytes }
    }

    /// Pack `name` into the slot, MSB-first per 64-bit word. The field's
    /// final byte is always forced to NUL, so at most `name_len - 1` name
    /// bytes survive; bytes past the end of `name` are written as NUL.
    pub(crate) fn set_name(&self, name: &str, name_len: usize) {
        let n = name_len.min(NAME_LEN);
        let src = name.as_bytes();
        let mut addr = self.addr + named::NAME;
        let mut i = 0;
        while i < n {
            let mut word = 0_u64;
            let mut shift = 56_i32;
            while i < n && shift >= 0 {
                // The last byte of the field terminates the name no matter
                // what the caller passed.
                let byte = if i + 1 == n {
                    0
                } else {
                    src.get(i).copied().unwrap_or(0)
                };
                word |= u64::from(byte) << shift;
                shift -= 8;
                i += 1;
            }
            self.window.write_u64(PhysAddr::new(addr), word);
            addr += 8;
        }
    }
}

/// A named-block name as stored in the directory: NUL-terminated bytes in
/// a fixed 128-byte field.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct BlockName {
    bytes: [u8; NAME_LEN],
}

impl BlockName {
    /// The name bytes up to (not including) the first NUL.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        let end = self
            .bytes
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(NAME_LEN);
        &self.bytes[..end]
    }

    /// The name as UTF-8 text; non-UTF-8 bytes render as an empty string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        core::str::from_utf8(self.as_bytes()).unwrap_or("")
    }

    /// Bounded comparison against a needle, stopping at the first NUL or
    /// after `name_len` bytes, whichever comes first.
    pub(crate) fn matches(&self, needle: &str, name_len: usize) -> bool {
        let n = name_len.min(NAME_LEN);
        let needle = needle.as_bytes();
        for i in 0..n {
            let stored = self.bytes[i];
            let wanted = needle.get(i).copied().unwrap_or(0);
            if stored != wanted {
                return false;
            }
            if stored == 0 {
                return true;
            }
        }
        true
    }
}

impl fmt::Debug for BlockName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockName({:?})", self.as_str())
    }
}

impl fmt::Display for BlockName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A small fixed formatting buffer for synthesizing block names without a
/// heap. Output past the capacity is silently truncated at a character
/// boundary.
pub(crate) struct NameBuf {
    buf: [u8; NAME_LEN],
    len: usize,
}

impl NameBuf {
    pub(crate) const fn new() -> Self {
        Self {
            buf: [0; NAME_LEN],
            len: 0,
        }
    }

    pub(crate) fn as_str(&self) -> &str {
        core::str::from_utf8(&self.buf[..self.len]).unwrap_or("")
    }
}

impl fmt::Write for NameBuf {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        // Leave room for the NUL the directory field appends.
        let avail = (NAME_LEN - 1).saturating_sub(self.len);
        let mut take = s.len().min(avail);
        while take > 0 && !s.is_char_boundary(take) {
            take -= 1;
        }
        self.buf[self.len..self.len + take].copy_from_slice(&s.as_bytes()[..take]);
        self.len += take;
        Ok(())
    }
}
