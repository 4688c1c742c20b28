//! Per-process descriptor table
//!
//! Maps small integers to open file handles.
//!
//! # Invariants
//! - 0 (console input) and 1 (console output) are reserved and never stored
//! - Numbers are handed out by a strictly increasing counter and are
//!   never reused within the lifetime of the table
//! - Entries are kept ordered by descriptor number

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::fmt;

/// A file descriptor number as seen by user space.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Fd(i32);

impl Fd {
    /// Console input stream.
    pub const STDIN: Self = Self(0);
    /// Console output stream.
    pub const STDOUT: Self = Self(1);

    /// Wrap a raw descriptor number.
    #[inline]
    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    /// Get the raw descriptor number.
    #[inline]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// Check if this is one of the two console descriptors.
    #[inline]
    pub const fn is_reserved(self) -> bool {
        self.0 == Self::STDIN.0 || self.0 == Self::STDOUT.0
    }
}

impl fmt::Debug for Fd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fd({})", self.0)
    }
}

impl fmt::Display for Fd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Counter value before the first allocation. Pre-incremented, so the
/// first descriptor handed out is 3.
const INITIAL_COUNTER: i32 = 2;

/// Ordered descriptor table with monotonic allocation.
pub struct DescriptorTable<H> {
    entries: BTreeMap<Fd, H>,
    next_fd: i32,
}

impl<H> DescriptorTable<H> {
    /// Create an empty table.
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_fd: INITIAL_COUNTER,
        }
    }

    /// Store `handle` under the next descriptor number.
    ///
    /// Gives the handle back if the counter is exhausted.
    pub fn insert(&mut self, handle: H) -> Result<Fd, H> {
        let Some(raw) = self.next_fd.checked_add(1) else {
            return Err(handle);
        };
        self.next_fd = raw;
        let fd = Fd(raw);
        self.entries.insert(fd, handle);
        Ok(fd)
    }

    /// Find the handle behind `fd`.
    pub fn get(&self, fd: Fd) -> Option<&H> {
        if fd.is_reserved() || self.entries.is_empty() {
            return None;
        }
        self.entries.get(&fd)
    }

    /// Find the handle behind `fd` for mutation.
    pub fn get_mut(&mut self, fd: Fd) -> Option<&mut H> {
        if fd.is_reserved() || self.entries.is_empty() {
            return None;
        }
        self.entries.get_mut(&fd)
    }

    /// Take the handle behind `fd` out of the table.
    pub fn remove(&mut self, fd: Fd) -> Option<H> {
        if fd.is_reserved() {
            return None;
        }
        self.entries.remove(&fd)
    }

    /// Take every handle out of the table, lowest descriptor first.
    ///
    /// The counter is left untouched, so numbers stay unique even if the
    /// table is used again.
    pub fn drain(&mut self) -> Vec<H> {
        core::mem::take(&mut self.entries).into_values().collect()
    }

    /// Number of open descriptors.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no descriptors are open.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Open descriptor numbers in ascending order.
    pub fn descriptors(&self) -> impl Iterator<Item = Fd> + '_ {
        self.entries.keys().copied()
    }
}

impl<H> Default for DescriptorTable<H> {
    fn default() -> Self {
        Self::new()
    }
}
