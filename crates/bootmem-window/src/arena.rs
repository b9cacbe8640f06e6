use crate::{MemoryWindow, PhysAddr};
use alloc::boxed::Box;
use core::sync::atomic::{AtomicU32, Ordering};

/// An owned, in-process stand-in for a span of physical memory.
///
/// Host-side tools and the test suites use this to run the allocator
/// against a memory image they own instead of real hardware. The backing
/// store is a slice of `AtomicU32` lanes, so an `ArenaWindow` is `Sync` and
/// several threads may drive the allocator concurrently exactly as several
/// cores would on hardware.
///
/// The window covers `[base, base + len)`. Access outside that range, or
/// misaligned for the access width, panics — the in-process analog of the
/// bus fault real hardware raises.
pub struct ArenaWindow {
    base: u64,
    lanes: Box<[AtomicU32]>,
}

impl ArenaWindow {
    /// A zero-filled window covering `[base, base + len)`.
    ///
    /// `len` is rounded up to a multiple of 8 so that every contained
    /// 64-bit field is backed in full.
    #[must_use]
    pub fn new(base: PhysAddr, len: u64) -> Self {
        let len = bootmem_addresses::align_up(len, 8);
        #[allow(clippy::cast_possible_truncation)]
        let lanes = (0..len / 4).map(|_| AtomicU32::new(0)).collect();
        Self {
            base: base.as_u64(),
            lanes,
        }
    }

    #[must_use]
    pub const fn base(&self) -> PhysAddr {
        PhysAddr::new(self.base)
    }

    #[must_use]
    pub fn len(&self) -> u64 {
        (self.lanes.len() as u64) * 4
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    #[inline]
    fn lane(&self, at: PhysAddr, width: u64) -> &AtomicU32 {
        let addr = at.as_u64();
        assert!(
            addr >= self.base && addr + width <= self.base + self.len(),
            "access at {at} outside arena window"
        );
        assert!(addr % width == 0, "misaligned {width}-byte access at {at}");
        #[allow(clippy::cast_possible_truncation)]
        let index = ((addr - self.base) / 4) as usize;
        &self.lanes[index]
    }
}

impl MemoryWindow for ArenaWindow {
    fn read_u32(&self, at: PhysAddr) -> u32 {
        self.lane(at, 4).load(Ordering::Relaxed)
    }

    fn read_u64(&self, at: PhysAddr) -> u64 {
        let lo = self.lane(at, 8).load(Ordering::Relaxed);
        let hi = self.lane(at + 4, 4).load(Ordering::Relaxed);
        u64::from(lo) | (u64::from(hi) << 32)
    }

    fn write_u32(&self, at: PhysAddr, value: u32) {
        self.lane(at, 4).store(value, Ordering::Relaxed);
    }

    fn write_u64(&self, at: PhysAddr, value: u64) {
        #[allow(clippy::cast_possible_truncation)]
        let lo = value as u32;
        let hi = (value >> 32) as u32;
        self.lane(at, 8).store(lo, Ordering::Relaxed);
        self.lane(at + 4, 4).store(hi, Ordering::Relaxed);
    }

    fn compare_exchange_u32(&self, at: PhysAddr, current: u32, new: u32) -> Result<u32, u32> {
        self.lane(at, 4)
            .compare_exchange(current, new, Ordering::Acquire, Ordering::Relaxed)
    }

    fn store_u32_release(&self, at: PhysAddr, value: u32) {
        self.lane(at, 4).store(value, Ordering::Release);
    }
}
