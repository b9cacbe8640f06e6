//! # Physical Address Type for Boot-Time Memory Management
//!
//! A strongly typed wrapper for raw physical addresses plus the alignment
//! helpers the boot-memory allocator leans on.
//!
//! ## Overview
//!
//! Boot-stage code juggles three kinds of 64-bit values that must never be
//! confused: physical addresses, byte sizes, and packed field words. This
//! crate pins down the first kind with a zero-cost newtype:
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`PhysAddr`] | A raw 64-bit physical address (RAM or MMIO). |
//!
//! The address is *not* required to be dereferenceable: before the MMU is up,
//! or when a host tool inspects a remote memory image, a `PhysAddr` is merely
//! a coordinate into some memory window.
//!
//! ## Typical Usage
//!
//! ```rust
//! # use bootmem_addresses::*;
//! let pa = PhysAddr::new(0x0000_0000_0012_3450);
//! assert!(pa.is_aligned_to(16));
//! assert_eq!(pa.align_up(4096).as_u64(), 0x12_4000);
//! assert_eq!((pa + 0x10).as_u64(), 0x12_3460);
//! ```
//!
//! ## Design Notes
//!
//! - `#[repr(transparent)]`, `Copy`, `Ord`, `Hash`: suitable as a map key
//!   or for packing straight into descriptor fields.
//! - All helpers are `const fn` and zero-cost in release builds.

#![cfg_attr(not(any(test, doctest)), no_std)]

use core::fmt;
use core::ops::{Add, AddAssign};

/// Align `value` upwards to `align`, which must be a power of two.
#[inline]
#[must_use]
pub const fn align_up(value: u64, align: u64) -> u64 {
    debug_assert!(align.is_power_of_two());
    (value + (align - 1)) & !(align - 1)
}

/// Align `value` downwards to `align`, which must be a power of two.
#[inline]
#[must_use]
pub const fn align_down(value: u64, align: u64) -> u64 {
    debug_assert!(align.is_power_of_two());
    value & !(align - 1)
}

/// Physical memory address.
///
/// A thin wrapper around `u64` that carries intent: this value locates a
/// byte in the machine's physical address space. It prevents accidental
/// mix-ups between addresses and sizes and keeps descriptor-field
/// arithmetic explicit.
///
/// ### Semantics
/// - Address zero is a valid representation but is used throughout the
///   allocator as the "null" link / "uninitialized" sentinel; see
///   [`PhysAddr::is_zero`].
/// - Ordering is plain numeric ordering, which the free list relies on for
///   its ascending-address invariant.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysAddr(u64);

impl PhysAddr {
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Whether this is the all-zero address (the list/handle sentinel).
    #[inline]
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Whether the address is a multiple of `align` (a power of two).
    #[inline]
    #[must_use]
    pub const fn is_aligned_to(self, align: u64) -> bool {
        debug_assert!(align.is_power_of_two());
        self.0 & (align - 1) == 0
    }

    /// Round up to the next multiple of `align` (a power of two).
    #[inline]
    #[must_use]
    pub const fn align_up(self, align: u64) -> Self {
        Self(align_up(self.0, align))
    }

    /// Round down to the previous multiple of `align` (a power of two).
    #[inline]
    #[must_use]
    pub const fn align_down(self, align: u64) -> Self {
        Self(align_down(self.0, align))
    }

    /// Checked addition of a byte offset, `None` on overflow.
    #[inline]
    #[must_use]
    pub const fn checked_add(self, rhs: u64) -> Option<Self> {
        match self.0.checked_add(rhs) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }
}

impl fmt::Debug for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PA(0x{:016X})", self.0)
    }
}

impl fmt::Display for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.0)
    }
}

impl From<u64> for PhysAddr {
    #[inline]
    fn from(v: u64) -> Self {
        Self::new(v)
    }
}

impl From<PhysAddr> for u64 {
    #[inline]
    fn from(a: PhysAddr) -> Self {
        a.as_u64()
    }
}

impl Add<u64> for PhysAddr {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl AddAssign<u64> for PhysAddr {
    #[inline]
    fn add_assign(&mut self, rhs: u64) {
        self.0 += rhs;
    }
}
