//! Direct-mapped user address space
//!
//! When the kernel runs with the user page tables active, a validated
//! user address can be dereferenced as-is. This is the `AddressSpace`
//! used on real hardware; the page-table walk itself is supplied by the
//! caller as a lookup function.

use super::{AddressSpace, PageFlags, VirtAddr};

/// User memory reachable through the currently active page tables.
pub struct DirectAddressSpace<L> {
    lookup: L,
}

impl<L> DirectAddressSpace<L>
where
    L: Fn(VirtAddr) -> PageFlags,
{
    /// Wrap a page-table lookup.
    ///
    /// # Safety
    /// Every address for which `lookup` reports `PRESENT` must be
    /// dereferenceable from the current context for as long as this value
    /// is alive, with write access wherever it reports `WRITABLE`.
    pub const unsafe fn new(lookup: L) -> Self {
        Self { lookup }
    }
}

impl<L> AddressSpace for DirectAddressSpace<L>
where
    L: Fn(VirtAddr) -> PageFlags,
{
    fn page_flags(&self, addr: VirtAddr) -> PageFlags {
        (self.lookup)(addr)
    }

    fn copy_in(&self, src: VirtAddr, dst: &mut [u8]) {
        if dst.is_empty() {
            return;
        }
        // SAFETY:
        // - The validator checked every page of [src, src + len) before
        //   this call
        // - `new` guarantees present pages are dereferenceable
        // - dst is a kernel buffer and cannot overlap user memory
        // Audited: 2025-01-04
        unsafe {
            core::ptr::copy_nonoverlapping(src.as_usize() as *const u8, dst.as_mut_ptr(), dst.len());
        }
    }

    fn copy_out(&mut self, dst: VirtAddr, src: &[u8]) {
        if src.is_empty() {
            return;
        }
        // SAFETY: Same as copy_in; the validator additionally required
        // WRITABLE on every destination page.
        unsafe {
            core::ptr::copy_nonoverlapping(src.as_ptr(), dst.as_usize() as *mut u8, src.len());
        }
    }
}
