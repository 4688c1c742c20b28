//! PantherOS user-program trap boundary
//!
//! Everything a user program can reach by trapping into the kernel:
//! - Syscall decoding and dispatch
//! - Validation of every user-supplied address before it is dereferenced
//! - Per-process file descriptor tables
//! - Process lifecycle: spawn, exit status handoff, wait
//!
//! # Security Features
//! - A typed call-record reader; syscall code never sees a raw user pointer
//! - Faults kill the offending process before any side effect
//! - Descriptor numbers are never reused within a process
//! - Console access is serialized across processes
//!
//! # Collaborators
//! The file system, scheduler, console driver and page tables are outside
//! this crate. They plug in through the `FileSystem`, `Scheduler`,
//! `Machine`, `Console` and `AddressSpace` traits.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

pub mod console;
pub mod fs;
pub mod logger;
pub mod mm;
pub mod process;
pub mod syscall;
pub mod trap;

#[cfg(test)]
mod testing;

pub use console::{Console, LockedConsole};
pub use fs::FileSystem;
pub use process::{Fd, Machine, Pid, Process, ProcessState, Scheduler};
pub use syscall::{Dispatcher, Disposition, SyscallError, UserLayout};
pub use trap::{handle_syscall, TrapFrame};
