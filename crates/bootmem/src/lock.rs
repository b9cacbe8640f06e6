//! RAII guard over the descriptor's in-memory spinlock word.

use core::hint::spin_loop;

use bootmem_addresses::PhysAddr;
use bootmem_window::MemoryWindow;

use crate::AllocFlags;
use crate::layout::DescView;

/// Holds the descriptor spinlock for as long as the guard lives.
///
/// The lock word lives in the descriptor itself so that every core and
/// every boot stage contends on the same word. Acquisition is test-and-set
/// with a read-only spin between attempts; release is a plain
/// release-ordered store of zero in [`Drop`].
///
/// When the caller passes [`AllocFlags::NO_LOCKING`] the guard is created
/// disengaged: it acquires nothing and releases nothing. That is how a
/// caller already holding the lock (via [`crate::Bootmem::lock`]) nests
/// allocator calls without deadlocking.
#[must_use = "the lock is released when the guard is dropped"]
pub struct BootmemLock<'w, W: MemoryWindow> {
    window: &'w W,
    lock_addr: PhysAddr,
    engaged: bool,
}

impl<'w, W: MemoryWindow> BootmemLock<'w, W> {
    pub(crate) fn acquire(window: &'w W, desc_addr: PhysAddr, flags: AllocFlags) -> Self {
        let lock_addr = DescView::new(window, desc_addr).lock_addr();
        let engaged = !flags.contains(AllocFlags::NO_LOCKING);
        if engaged {
            while window.compare_exchange_u32(lock_addr, 0, 1).is_err() {
                while window.read_u32(lock_addr) != 0 {
                    spin_loop();
                }
            }
        }
        Self {
            window,
            lock_addr,
            engaged,
        }
    }
}

impl<W: MemoryWindow> Drop for BootmemLock<'_, W> {
    fn drop(&mut self) {
        if self.engaged {
            self.window.store_u32_release(self.lock_addr, 0);
        }
    }
}
