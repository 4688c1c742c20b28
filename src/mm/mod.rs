//! Memory management interface for the syscall layer
//!
//! Provides:
//! - Virtual address types
//! - Page flags as reported by the page tables
//! - The `AddressSpace` contract the validator relies on
//!
//! Page-table internals live outside this crate. All the syscall layer
//! needs is "is this page mapped, and with which permissions", plus a
//! way to move bytes across the boundary once a range has been validated.

mod address;
mod direct;

pub use address::{VirtAddr, PAGE_MASK, PAGE_SHIFT, PAGE_SIZE};
pub use direct::DirectAddressSpace;

bitflags::bitflags! {
    /// Permissions of a single mapped page.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PageFlags: u8 {
        /// The page is backed by a frame.
        const PRESENT = 1 << 0;
        /// The page may be written.
        const WRITABLE = 1 << 1;
        /// The page is accessible from EL0.
        const USER = 1 << 2;
    }
}

impl PageFlags {
    /// Flags a page must carry for the kernel to read it on behalf of a process.
    pub const USER_READ: Self = Self::PRESENT.union(Self::USER);
    /// Flags a page must carry for the kernel to write it on behalf of a process.
    pub const USER_WRITE: Self = Self::USER_READ.union(Self::WRITABLE);
}

/// The calling process's view of memory.
///
/// `copy_in` and `copy_out` are only ever called on ranges that the
/// validator has already proven accessible, so implementations may treat
/// an out-of-range access as a kernel bug.
pub trait AddressSpace {
    /// Flags of the page containing `addr`, or empty if it is unmapped.
    fn page_flags(&self, addr: VirtAddr) -> PageFlags;

    /// Copy `dst.len()` bytes starting at `src` into kernel memory.
    fn copy_in(&self, src: VirtAddr, dst: &mut [u8]);

    /// Copy `src` into user memory starting at `dst`.
    fn copy_out(&mut self, dst: VirtAddr, src: &[u8]);
}
