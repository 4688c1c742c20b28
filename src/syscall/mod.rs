//! System Call Interface
//!
//! The trap boundary between user programs and the kernel.
//!
//! # Security Model
//! - Whitelist approach: only explicitly implemented syscalls are allowed
//! - All parameters, and everything they point to, are validated before use
//! - Any invalid input terminates the caller with status -1; the kernel
//!   never panics on user input
//!
//! # Current Syscalls
//! - 0: halt() - power off
//! - 1: exit(status) - terminate the current process
//! - 2: exec(cmdline) - spawn a child process
//! - 3: wait(pid) - collect a child's exit status
//! - 4: create(name, size) / 5: remove(name) - manage files
//! - 6: open(name) / 12: close(fd) - manage descriptors
//! - 7: filesize(fd) / 10: seek(fd, pos) / 11: tell(fd)
//! - 8: read(fd, buf, len) / 9: write(fd, buf, len)

mod handler;
mod request;
mod validate;

pub use handler::{numbers, Dispatcher, Disposition, SyscallError};
pub use request::Request;
pub use validate::{limits, regions, Access, CallRecord, UserBuffer, UserLayout, UserPtr};
