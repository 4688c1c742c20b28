//! Syscall trap entry
//!
//! Glue between the architecture's exception vector and the dispatcher.
//! The vector saves the user context into a `TrapFrame` and calls
//! `handle_syscall` with the process that trapped.
//!
//! # Security Considerations
//! - The stack pointer is taken from the saved frame and validated like
//!   any other user address
//! - A terminated process never returns to user mode

use alloc::sync::Arc;

use crate::console::Console;
use crate::fs::FileSystem;
use crate::mm::{AddressSpace, VirtAddr};
use crate::process::{Machine, Process, Scheduler};
use crate::syscall::{Dispatcher, Disposition};

/// User context saved on syscall entry
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct TrapFrame {
    /// User stack pointer; the call record starts here
    pub sp: usize,
    /// Return value slot
    pub ret: usize,
}

/// Handle a syscall trap from user mode.
///
/// Returns only if the process is to be resumed.
pub fn handle_syscall<F, S, C, M, A>(
    dispatcher: &Dispatcher<F, S, C>,
    machine: &M,
    frame: &mut TrapFrame,
    current: &Arc<Process<F::Handle>>,
    memory: &mut A,
) where
    F: FileSystem,
    S: Scheduler<F::Handle>,
    C: Console,
    M: Machine,
    A: AddressSpace + ?Sized,
{
    match dispatcher.dispatch(current, memory, VirtAddr::new(frame.sp)) {
        Disposition::Return(value) => frame.ret = value,
        Disposition::Resume => {}
        Disposition::Exit(status) => dispatcher.scheduler().terminate_current(status),
        Disposition::Halt => {
            log::info!("[TRAP] powering off");
            machine.power_off()
        }
    }
}
