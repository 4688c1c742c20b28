//! Call-record decoding
//!
//! Turns the raw call record into a typed `Request`. All argument words
//! and all pointees are validated here, so by the time a request exists
//! nothing left to execute can fault on user memory.

use alloc::vec::Vec;

use super::handler::{numbers, SyscallError};
use super::validate::{Access, CallRecord, UserBuffer};
use crate::mm::AddressSpace;
use crate::process::{Fd, Pid};

/// A fully validated system call.
#[derive(Debug)]
pub enum Request {
    Halt,
    Exit { status: i32 },
    Exec { cmdline: Vec<u8> },
    Wait { pid: Pid },
    Create { name: Vec<u8>, initial_size: u32 },
    Remove { name: Vec<u8> },
    /// `None` when the process passed a null name.
    Open { name: Option<Vec<u8>> },
    Filesize { fd: Fd },
    Read { fd: Fd, buffer: UserBuffer },
    Write { fd: Fd, buffer: UserBuffer },
    Seek { fd: Fd, position: u32 },
    Tell { fd: Fd },
    Close { fd: Fd },
}

impl Request {
    /// Decode and validate the call record.
    pub fn decode<A>(record: &CallRecord<'_, A>) -> Result<Self, SyscallError>
    where
        A: AddressSpace + ?Sized,
    {
        let number = record.number()?;
        let request = match number {
            numbers::SYS_HALT => Self::Halt,
            numbers::SYS_EXIT => Self::Exit {
                status: record.int(1)?,
            },
            numbers::SYS_EXEC => Self::Exec {
                cmdline: record.string(record.ptr(1)?)?,
            },
            numbers::SYS_WAIT => Self::Wait {
                pid: Pid::new(record.int(1)?),
            },
            numbers::SYS_CREATE => {
                let name = record.ptr(1)?;
                let initial_size = record.uint(2)?;
                Self::Create {
                    name: record.string(name)?,
                    initial_size,
                }
            }
            numbers::SYS_REMOVE => Self::Remove {
                name: record.string(record.ptr(1)?)?,
            },
            numbers::SYS_OPEN => {
                let name = record.ptr(1)?;
                let name = if name.is_null() {
                    None
                } else {
                    Some(record.string(name)?)
                };
                Self::Open { name }
            }
            numbers::SYS_FILESIZE => Self::Filesize {
                fd: Fd::new(record.int(1)?),
            },
            numbers::SYS_READ | numbers::SYS_WRITE => {
                let fd = Fd::new(record.int(1)?);
                let ptr = record.ptr(2)?;
                let size = record.uint(3)? as usize;
                if number == numbers::SYS_READ {
                    // The kernel stores into a read buffer
                    Self::Read {
                        fd,
                        buffer: record.buffer(ptr, size, Access::Write)?,
                    }
                } else {
                    Self::Write {
                        fd,
                        buffer: record.buffer(ptr, size, Access::Read)?,
                    }
                }
            }
            numbers::SYS_SEEK => Self::Seek {
                fd: Fd::new(record.int(1)?),
                position: record.uint(2)?,
            },
            numbers::SYS_TELL => Self::Tell {
                fd: Fd::new(record.int(1)?),
            },
            numbers::SYS_CLOSE => Self::Close {
                fd: Fd::new(record.int(1)?),
            },
            _ => return Err(SyscallError::UnknownSyscall(number)),
        };
        Ok(request)
    }
}
