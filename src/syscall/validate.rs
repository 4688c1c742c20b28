//! System Call Input Validation
//!
//! Every word of a call record, and every byte a pointer argument refers
//! to, is checked here before the kernel touches it.
//!
//! # Security Principles
//! - Validate ALL inputs before use
//! - Fail-secure: anything not provably accessible is a fault
//! - Never hand a raw user address to a syscall implementation: pointer
//!   arguments come out of here as `UserPtr`, and only become readable or
//!   writable as a `UserBuffer` after their whole range has been checked
//! - Copy to kernel space before use (no TOCTOU on user memory)

use alloc::vec::Vec;
use core::mem::size_of;

use super::handler::SyscallError;
use crate::mm::{AddressSpace, PageFlags, VirtAddr, PAGE_SIZE};

/// User-space memory regions
pub mod regions {
    /// Lowest user address.
    pub const USER_START: usize = 0;
    /// End of the lower canonical half; everything at or above belongs
    /// to the kernel.
    pub const USER_END: usize = 0x0000_8000_0000_0000;
}

/// Argument limits
pub mod limits {
    /// Longest string accepted from user space, including its terminator.
    pub const MAX_USER_STRING: usize = crate::mm::PAGE_SIZE;
    /// Size of one call-record word.
    pub const WORD_SIZE: usize = core::mem::size_of::<usize>();
}

/// What the kernel is going to do with a user region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// The kernel reads from the region.
    Read,
    /// The kernel writes into the region.
    Write,
}

impl Access {
    fn required(self) -> PageFlags {
        match self {
            Access::Read => PageFlags::USER_READ,
            Access::Write => PageFlags::USER_WRITE,
        }
    }
}

/// The user half of the address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserLayout {
    start: VirtAddr,
    end: VirtAddr,
}

impl UserLayout {
    /// User space is `[start, end)`.
    pub const fn new(start: usize, end: usize) -> Self {
        Self {
            start: VirtAddr::new(start),
            end: VirtAddr::new(end),
        }
    }

    /// Check whether `[base, base + len)` can be accessed by the kernel on
    /// behalf of the process owning `memory`.
    ///
    /// A zero-length region is checked as its first byte.
    ///
    /// # Security Checks
    /// 1. The region does not wrap around the address space
    /// 2. Both ends are below the user/kernel split
    /// 3. Every page the region touches is mapped with the flags `access`
    ///    needs
    pub fn is_accessible<A>(&self, memory: &A, base: VirtAddr, len: usize, access: Access) -> bool
    where
        A: AddressSpace + ?Sized,
    {
        let Some(last) = base.checked_add(len.max(1) - 1) else {
            return false;
        };
        if base < self.start || last >= self.end {
            return false;
        }

        let required = access.required();
        let mut page = base.align_down();
        loop {
            let probe = if page < base { base } else { page };
            if !memory.page_flags(probe).contains(required) {
                return false;
            }
            match page.checked_add(PAGE_SIZE) {
                Some(next) if next <= last => page = next,
                _ => return true,
            }
        }
    }
}

impl Default for UserLayout {
    fn default() -> Self {
        Self::new(regions::USER_START, regions::USER_END)
    }
}

/// A pointer argument whose pointee has not been validated yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserPtr(VirtAddr);

impl UserPtr {
    /// Check if the process passed a null pointer.
    pub fn is_null(self) -> bool {
        self.0.is_null()
    }
}

/// A user buffer whose whole range has been validated.
#[derive(Debug)]
pub struct UserBuffer {
    base: VirtAddr,
    len: usize,
}

impl UserBuffer {
    /// Declared buffer size.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check for a zero-length buffer.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copy the buffer into kernel memory.
    pub fn copy_in<A: AddressSpace + ?Sized>(&self, memory: &A) -> Vec<u8> {
        let mut data = alloc::vec![0u8; self.len];
        memory.copy_in(self.base, &mut data);
        data
    }

    /// Copy `data` into the start of the buffer. Anything beyond the
    /// declared size is dropped.
    pub fn copy_out<A: AddressSpace + ?Sized>(&self, memory: &mut A, data: &[u8]) {
        let len = data.len().min(self.len);
        memory.copy_out(self.base, &data[..len]);
    }
}

/// Typed reader over the call record at the user stack pointer.
///
/// Word 0 is the syscall number, words 1.. are its arguments. Each word
/// is validated as it is read.
pub struct CallRecord<'a, A: ?Sized> {
    memory: &'a A,
    layout: &'a UserLayout,
    sp: VirtAddr,
}

impl<'a, A> CallRecord<'a, A>
where
    A: AddressSpace + ?Sized,
{
    /// Read a call record at `sp`.
    pub fn new(memory: &'a A, layout: &'a UserLayout, sp: VirtAddr) -> Self {
        Self { memory, layout, sp }
    }

    fn word(&self, index: usize) -> Result<usize, SyscallError> {
        let addr = index
            .checked_mul(limits::WORD_SIZE)
            .and_then(|offset| self.sp.checked_add(offset))
            .ok_or(SyscallError::BadAddress(self.sp))?;
        if !self
            .layout
            .is_accessible(self.memory, addr, limits::WORD_SIZE, Access::Read)
        {
            return Err(SyscallError::BadAddress(addr));
        }

        let mut bytes = [0u8; size_of::<usize>()];
        self.memory.copy_in(addr, &mut bytes);
        Ok(usize::from_ne_bytes(bytes))
    }

    /// The syscall number.
    pub fn number(&self) -> Result<usize, SyscallError> {
        self.word(0)
    }

    /// Argument `arg` as a signed 32-bit integer.
    pub fn int(&self, arg: usize) -> Result<i32, SyscallError> {
        Ok(self.word(arg)? as u32 as i32)
    }

    /// Argument `arg` as an unsigned 32-bit integer.
    pub fn uint(&self, arg: usize) -> Result<u32, SyscallError> {
        Ok(self.word(arg)? as u32)
    }

    /// Argument `arg` as a pointer.
    pub fn ptr(&self, arg: usize) -> Result<UserPtr, SyscallError> {
        Ok(UserPtr(VirtAddr::new(self.word(arg)?)))
    }

    /// Copy in the NUL-terminated string `ptr` points to, without the
    /// terminator.
    ///
    /// Every page is checked before it is read, so the scan never runs
    /// off the end of the process's mapped memory.
    pub fn string(&self, ptr: UserPtr) -> Result<Vec<u8>, SyscallError> {
        if ptr.is_null() {
            return Err(SyscallError::NullName);
        }

        let mut bytes = Vec::new();
        let mut addr = ptr.0;
        loop {
            let budget = limits::MAX_USER_STRING - bytes.len();
            if budget == 0 {
                return Err(SyscallError::StringTooLong(ptr.0));
            }
            if addr >= self.layout.end {
                return Err(SyscallError::BadAddress(addr));
            }
            let chunk = (PAGE_SIZE - addr.page_offset())
                .min(budget)
                .min(self.layout.end.as_usize() - addr.as_usize());
            if !self.layout.is_accessible(self.memory, addr, chunk, Access::Read) {
                return Err(SyscallError::BadAddress(addr));
            }

            let start = bytes.len();
            bytes.resize(start + chunk, 0);
            self.memory.copy_in(addr, &mut bytes[start..]);
            if let Some(nul) = bytes[start..].iter().position(|&b| b == 0) {
                bytes.truncate(start + nul);
                return Ok(bytes);
            }
            addr = addr
                .checked_add(chunk)
                .ok_or(SyscallError::BadAddress(addr))?;
        }
    }

    /// Validate `len` bytes at `ptr` for `access`.
    pub fn buffer(&self, ptr: UserPtr, len: usize, access: Access) -> Result<UserBuffer, SyscallError> {
        if !self.layout.is_accessible(self.memory, ptr.0, len, access) {
            return Err(SyscallError::BadAddress(ptr.0));
        }
        Ok(UserBuffer { base: ptr.0, len })
    }
}
