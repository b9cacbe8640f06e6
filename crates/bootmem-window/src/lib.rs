//! # Memory Windows: Typed Access to Possibly-Remote Physical Memory
//!
//! The boot-memory allocator keeps *all* of its control structures — the
//! root descriptor, the free-list block headers, the named-block directory —
//! inside the physical memory it manages. Depending on who is running, that
//! memory may be:
//!
//! - directly addressable through an identity or fixed-offset mapping
//!   (the firmware itself, pre-MMU), or
//! - a buffer owned by a host-side tool inspecting another machine's memory
//!   image, or a test harness.
//!
//! [`MemoryWindow`] is the seam between those worlds: a byte-addressable
//! window keyed by [`PhysAddr`], with typed 32- and 64-bit accesses. Every
//! access hits the backing memory directly — no caching, no buffering —
//! because the structures behind the window are shared with other cores and
//! boot stages that are not in any cache-coherency agreement with us.
//!
//! Two implementations ship here:
//!
//! | Type | Backing |
//! |------|---------|
//! | [`DirectWindow`] | real memory reachable at `phys + offset` (firmware) |
//! | [`ArenaWindow`] | an owned in-process buffer (host tools, tests; `alloc` feature) |
//!
//! Multi-byte values compose little-endian across the window's bytes; all
//! accesses must be naturally aligned for their width. A bad address is a
//! programming error on the caller's side and is *not* reported through a
//! `Result` — on hardware it faults, in the arena it panics.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

#[cfg(feature = "alloc")]
extern crate alloc;

use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};

pub use bootmem_addresses::PhysAddr;

#[cfg(feature = "alloc")]
mod arena;
#[cfg(feature = "alloc")]
pub use arena::ArenaWindow;

/// A byte-addressable window onto physical memory.
///
/// Field widths are fixed at 4 and 8 bytes — the only widths the descriptor
/// ABI uses. Addresses must be naturally aligned for the access width.
///
/// The compare-exchange / release-store pair exists solely so that a lock
/// word stored *inside* the window (the descriptor's spinlock field) can be
/// operated with real acquire/release semantics; plain reads and writes
/// carry no ordering guarantees beyond the atomicity of the single access.
pub trait MemoryWindow {
    /// Read a 32-bit field. `at` must be 4-byte aligned.
    fn read_u32(&self, at: PhysAddr) -> u32;

    /// Read a 64-bit field. `at` must be 8-byte aligned.
    fn read_u64(&self, at: PhysAddr) -> u64;

    /// Write a 32-bit field. `at` must be 4-byte aligned.
    fn write_u32(&self, at: PhysAddr, value: u32);

    /// Write a 64-bit field. `at` must be 8-byte aligned.
    fn write_u64(&self, at: PhysAddr, value: u64);

    /// Atomic compare-exchange on a 32-bit word, acquire ordering on
    /// success. Returns the previous value as `Err` on failure.
    ///
    /// # Errors
    /// The observed value if it did not match `current`.
    fn compare_exchange_u32(&self, at: PhysAddr, current: u32, new: u32) -> Result<u32, u32>;

    /// Release-ordered store to a 32-bit word (lock release).
    fn store_u32_release(&self, at: PhysAddr, value: u32);

    /// Fill `len` bytes starting at `at` with `value`.
    ///
    /// Provided in terms of the word accessors with read-modify-write at
    /// unaligned edges, so implementors only supply the four typed accesses.
    fn fill(&self, at: PhysAddr, value: u8, len: u64) {
        let mut addr = at.as_u64();
        let mut rem = len;
        let pattern = u64::from(value) * 0x0101_0101_0101_0101;

        // Leading partial word.
        let lead = addr % 8;
        if lead != 0 && rem > 0 {
            let word_addr = PhysAddr::new(addr - lead);
            let mut word = self.read_u64(word_addr);
            let n = core::cmp::min(8 - lead, rem);
            let mut i = 0;
            while i < n {
                let shift = 8 * (lead + i);
                word = (word & !(0xFF << shift)) | (u64::from(value) << shift);
                i += 1;
            }
            self.write_u64(word_addr, word);
            addr += n;
            rem -= n;
        }

        while rem >= 8 {
            self.write_u64(PhysAddr::new(addr), pattern);
            addr += 8;
            rem -= 8;
        }

        // Trailing partial word.
        if rem > 0 {
            let word_addr = PhysAddr::new(addr);
            let mut word = self.read_u64(word_addr);
            let mut i = 0;
            while i < rem {
                let shift = 8 * i;
                word = (word & !(0xFF << shift)) | (u64::from(value) << shift);
                i += 1;
            }
            self.write_u64(word_addr, word);
        }
    }
}

/// Physical memory reachable at a fixed offset from the physical address.
///
/// Covers the identity map of early firmware (`offset == 0`) as well as
/// fixed direct-mapped windows such as a higher-half or XKPHYS-style
/// segment, where every physical byte appears at `phys + offset`.
///
/// All accesses are performed through atomics of the access width, so
/// concurrent cores operating on the same shared structures observe
/// tear-free values.
#[derive(Clone, Copy)]
pub struct DirectWindow {
    virt_offset: u64,
}

impl DirectWindow {
    /// Window where every physical address maps to `phys + virt_offset`.
    ///
    /// # Safety
    /// The caller must guarantee that every address this window is used
    /// with maps to real, writable memory at `phys + virt_offset` for the
    /// lifetime of the window, and that nothing outside the allocator's
    /// locking discipline mutates the structures behind it.
    #[must_use]
    pub const unsafe fn new(virt_offset: u64) -> Self {
        Self { virt_offset }
    }

    /// Identity-mapped window (`virtual == physical`).
    ///
    /// # Safety
    /// See [`DirectWindow::new`].
    #[must_use]
    pub const unsafe fn identity() -> Self {
        unsafe { Self::new(0) }
    }

    #[inline]
    fn ptr(&self, at: PhysAddr) -> *mut u8 {
        self.virt_offset.wrapping_add(at.as_u64()) as *mut u8
    }
}

impl MemoryWindow for DirectWindow {
    #[inline]
    fn read_u32(&self, at: PhysAddr) -> u32 {
        debug_assert!(at.is_aligned_to(4));
        // Safety: constructor contract guarantees a valid mapping.
        unsafe { AtomicU32::from_ptr(self.ptr(at).cast()) }.load(Ordering::Relaxed)
    }

    #[inline]
    fn read_u64(&self, at: PhysAddr) -> u64 {
        debug_assert!(at.is_aligned_to(8));
        unsafe { AtomicU64::from_ptr(self.ptr(at).cast()) }.load(Ordering::Relaxed)
    }

    #[inline]
    fn write_u32(&self, at: PhysAddr, value: u32) {
        debug_assert!(at.is_aligned_to(4));
        unsafe { AtomicU32::from_ptr(self.ptr(at).cast()) }.store(value, Ordering::Relaxed);
    }

    #[inline]
    fn write_u64(&self, at: PhysAddr, value: u64) {
        debug_assert!(at.is_aligned_to(8));
        unsafe { AtomicU64::from_ptr(self.ptr(at).cast()) }.store(value, Ordering::Relaxed);
    }

    #[inline]
    fn compare_exchange_u32(&self, at: PhysAddr, current: u32, new: u32) -> Result<u32, u32> {
        debug_assert!(at.is_aligned_to(4));
        unsafe { AtomicU32::from_ptr(self.ptr(at).cast()) }.compare_exchange(
            current,
            new,
            Ordering::Acquire,
            Ordering::Relaxed,
        )
    }

    #[inline]
    fn store_u32_release(&self, at: PhysAddr, value: u32) {
        debug_assert!(at.is_aligned_to(4));
        unsafe { AtomicU32::from_ptr(self.ptr(at).cast()) }.store(value, Ordering::Release);
    }
}
