//! System Call Handler
//!
//! Dispatches system calls and implements individual syscall handlers.
//!
//! # Flow
//! ```text
//! decode ─▶ validate ─▶ execute ─▶ reply
//!    │          │          │
//!    └──────────┴──────────┴──fault──▶ terminate (exit -1)
//! ```
//!
//! # Security Considerations
//! - Unknown syscall numbers terminate the caller
//! - Every argument and pointee is validated before any handler runs,
//!   so a faulting call has no side effects
//! - The caller's process record is passed in; nothing here looks up a
//!   "current process" behind the caller's back

use alloc::format;
use alloc::sync::Arc;
use alloc::vec;
use core::fmt;

use super::request::Request;
use super::validate::{CallRecord, UserBuffer, UserLayout};
use crate::console::{Console, LockedConsole};
use crate::fs::FileSystem;
use crate::mm::{AddressSpace, VirtAddr};
use crate::process::{Fd, Process, Scheduler};

/// System call numbers
pub mod numbers {
    pub const SYS_HALT: usize = 0;
    pub const SYS_EXIT: usize = 1;
    pub const SYS_EXEC: usize = 2;
    pub const SYS_WAIT: usize = 3;
    pub const SYS_CREATE: usize = 4;
    pub const SYS_REMOVE: usize = 5;
    pub const SYS_OPEN: usize = 6;
    pub const SYS_FILESIZE: usize = 7;
    pub const SYS_READ: usize = 8;
    pub const SYS_WRITE: usize = 9;
    pub const SYS_SEEK: usize = 10;
    pub const SYS_TELL: usize = 11;
    pub const SYS_CLOSE: usize = 12;
}

/// Faults that terminate the calling process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallError {
    /// An argument word or pointee is outside user space or unmapped.
    BadAddress(VirtAddr),
    /// A string argument has no terminator within the length limit.
    StringTooLong(VirtAddr),
    /// A name argument that must be present was null.
    NullName,
    /// The descriptor is not open in the calling process.
    BadDescriptor(Fd),
    /// The syscall number is not implemented.
    UnknownSyscall(usize),
}

impl SyscallError {
    /// Exit status of a process killed by a fault.
    pub const EXIT_STATUS: i32 = -1;
}

impl fmt::Display for SyscallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadAddress(addr) => write!(f, "bad user address {}", addr),
            Self::StringTooLong(addr) => write!(f, "unterminated string at {}", addr),
            Self::NullName => write!(f, "null name"),
            Self::BadDescriptor(fd) => write!(f, "bad file descriptor {}", fd),
            Self::UnknownSyscall(num) => write!(f, "unknown syscall {}", num),
        }
    }
}

/// What the trap handler must do once a call has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Store the value in the return slot and resume the process.
    Return(usize),
    /// Resume the process without touching the return slot.
    Resume,
    /// The process has been torn down; end its thread with this status.
    Exit(i32),
    /// Power the machine off.
    Halt,
}

/// Encode a signed result for the return slot.
#[inline]
fn ret_i32(value: i32) -> usize {
    value as isize as usize
}

/// Syscall dispatcher shared by every process.
pub struct Dispatcher<F, S, C> {
    fs: F,
    scheduler: S,
    console: LockedConsole<C>,
    layout: UserLayout,
}

impl<F, S, C> Dispatcher<F, S, C>
where
    F: FileSystem,
    S: Scheduler<F::Handle>,
    C: Console,
{
    /// Create a dispatcher over its collaborators.
    pub fn new(fs: F, scheduler: S, console: C, layout: UserLayout) -> Self {
        Self {
            fs,
            scheduler,
            console: LockedConsole::new(console),
            layout,
        }
    }

    pub fn file_system(&self) -> &F {
        &self.fs
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn console(&self) -> &LockedConsole<C> {
        &self.console
    }

    pub fn layout(&self) -> &UserLayout {
        &self.layout
    }

    /// Dispatch a system call
    ///
    /// # Arguments
    /// * `current` - The process that trapped
    /// * `memory` - Its address space
    /// * `sp` - Its user stack pointer (start of the call record)
    ///
    /// # Returns
    /// What the trap handler must do next. Faults have already torn the
    /// process down when this returns `Disposition::Exit`.
    pub fn dispatch<A>(
        &self,
        current: &Arc<Process<F::Handle>>,
        memory: &mut A,
        sp: VirtAddr,
    ) -> Disposition
    where
        A: AddressSpace + ?Sized,
    {
        let request = {
            let record = CallRecord::new(&*memory, &self.layout, sp);
            Request::decode(&record)
        };

        let result = request.and_then(|request| {
            log::debug!("[SYSCALL] pid {}: {:?}", current.pid(), request);
            self.execute(current, memory, request)
        });

        match result {
            Ok(disposition) => disposition,
            Err(err) => {
                log::warn!("[SYSCALL] pid {}: {}, terminating", current.pid(), err);
                self.exit(current, SyscallError::EXIT_STATUS)
            }
        }
    }

    fn execute<A>(
        &self,
        current: &Arc<Process<F::Handle>>,
        memory: &mut A,
        request: Request,
    ) -> Result<Disposition, SyscallError>
    where
        A: AddressSpace + ?Sized,
    {
        let disposition = match request {
            Request::Halt => {
                log::info!("[SYSCALL] halt requested by pid {}", current.pid());
                Disposition::Halt
            }
            Request::Exit { status } => self.exit(current, status),
            Request::Exec { cmdline } => Disposition::Return(ret_i32(self.exec(current, &cmdline))),
            Request::Wait { pid } => Disposition::Return(ret_i32(current.wait(pid, &self.scheduler))),
            Request::Create { name, initial_size } => {
                let created = core::str::from_utf8(&name)
                    .map(|name| self.fs.create(name, initial_size))
                    .unwrap_or(false);
                Disposition::Return(created as usize)
            }
            Request::Remove { name } => {
                let removed = core::str::from_utf8(&name)
                    .map(|name| self.fs.remove(name))
                    .unwrap_or(false);
                Disposition::Return(removed as usize)
            }
            Request::Open { name } => Disposition::Return(ret_i32(self.open(current, name.as_deref()))),
            Request::Filesize { fd } => Disposition::Return(ret_i32(self.filesize(current, fd)? as i32)),
            Request::Read { fd, buffer } => Disposition::Return(self.read(current, memory, fd, &buffer)?),
            Request::Write { fd, buffer } => Disposition::Return(self.write(current, memory, fd, &buffer)),
            Request::Seek { fd, position } => {
                self.seek(current, fd, position)?;
                Disposition::Resume
            }
            Request::Tell { fd } => Disposition::Return(ret_i32(self.tell(current, fd)? as i32)),
            Request::Close { fd } => {
                self.close(current, fd);
                Disposition::Resume
            }
        };
        Ok(disposition)
    }

    /// Tear `current` down with `status`.
    ///
    /// Closes every descriptor it still holds, prints the exit status
    /// line, and publishes the status to the parent. Running this twice
    /// for the same process is a no-op.
    pub fn exit(&self, current: &Process<F::Handle>, status: i32) -> Disposition {
        if let Some(handles) = current.begin_exit() {
            for handle in handles {
                self.fs.close(handle);
            }
            let line = format!("{}: exit({})\n", current.name(), status);
            self.console.write_all(line.as_bytes());
            current.finish_exit(status);
            log::info!("[PROCESS] pid {} exited with status {}", current.pid(), status);
        }
        Disposition::Exit(status)
    }

    fn exec(&self, current: &Arc<Process<F::Handle>>, cmdline: &[u8]) -> i32 {
        let Ok(cmdline) = core::str::from_utf8(cmdline) else {
            return -1;
        };
        let Some(pid) = self.scheduler.spawn(cmdline) else {
            log::debug!("[PROCESS] spawn failed: {:?}", cmdline);
            return -1;
        };
        let Some(child) = self.scheduler.lookup(pid) else {
            return -1;
        };
        current.adopt(&child);
        log::info!("[PROCESS] pid {} spawned pid {}", current.pid(), pid);
        pid.as_i32()
    }

    fn open(&self, current: &Process<F::Handle>, name: Option<&[u8]>) -> i32 {
        let Some(name) = name.and_then(|name| core::str::from_utf8(name).ok()) else {
            return -1;
        };
        let Some(handle) = self.fs.open(name) else {
            return -1;
        };

        let inserted = current.descriptors().insert(handle);
        match inserted {
            Ok(fd) => {
                log::debug!("[FD] pid {}: {:?} -> {}", current.pid(), name, fd);
                fd.as_i32()
            }
            Err(handle) => {
                log::warn!("[FD] pid {}: descriptor numbers exhausted", current.pid());
                self.fs.close(handle);
                -1
            }
        }
    }

    fn filesize(&self, current: &Process<F::Handle>, fd: Fd) -> Result<u32, SyscallError> {
        let table = current.descriptors();
        let file = table.get(fd).ok_or(SyscallError::BadDescriptor(fd))?;
        Ok(self.fs.length(file))
    }

    fn read<A>(
        &self,
        current: &Process<F::Handle>,
        memory: &mut A,
        fd: Fd,
        buffer: &UserBuffer,
    ) -> Result<usize, SyscallError>
    where
        A: AddressSpace + ?Sized,
    {
        if fd == Fd::STDIN {
            if buffer.is_empty() {
                return Ok(0);
            }
            let mut data = vec![0u8; buffer.len()];
            self.console.read_exact(&mut data);
            buffer.copy_out(memory, &data);
            return Ok(data.len());
        }

        let mut table = current.descriptors();
        let file = table.get_mut(fd).ok_or(SyscallError::BadDescriptor(fd))?;
        let mut data = vec![0u8; buffer.len()];
        let count = self.fs.read(file, &mut data).min(data.len());
        drop(table);

        buffer.copy_out(memory, &data[..count]);
        Ok(count)
    }

    /// Writes to a descriptor that is not open return 0 rather than
    /// killing the caller, unlike read.
    fn write<A>(&self, current: &Process<F::Handle>, memory: &A, fd: Fd, buffer: &UserBuffer) -> usize
    where
        A: AddressSpace + ?Sized,
    {
        if fd == Fd::STDOUT {
            let data = buffer.copy_in(memory);
            self.console.write_all(&data);
            return data.len();
        }

        let mut table = current.descriptors();
        match table.get_mut(fd) {
            Some(file) => self.fs.write(file, &buffer.copy_in(memory)),
            None => 0,
        }
    }

    fn seek(&self, current: &Process<F::Handle>, fd: Fd, position: u32) -> Result<(), SyscallError> {
        let mut table = current.descriptors();
        let file = table.get_mut(fd).ok_or(SyscallError::BadDescriptor(fd))?;
        self.fs.seek(file, position);
        Ok(())
    }

    fn tell(&self, current: &Process<F::Handle>, fd: Fd) -> Result<u32, SyscallError> {
        let table = current.descriptors();
        let file = table.get(fd).ok_or(SyscallError::BadDescriptor(fd))?;
        Ok(self.fs.tell(file))
    }

    fn close(&self, current: &Process<F::Handle>, fd: Fd) {
        let removed = current.descriptors().remove(fd);
        if let Some(handle) = removed {
            self.fs.close(handle);
        }
    }
}
