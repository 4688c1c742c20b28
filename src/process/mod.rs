//! Process Lifecycle Tracking
//!
//! The scheduler owns process records; the syscall layer only tracks the
//! parts of a record that cross the trap boundary:
//! - parent/child linkage (spawn registers, wait consumes)
//! - exit status handoff from child to parent
//! - the descriptor table
//!
//! # State Machine
//! ```text
//! Running ──exit / fatal fault──▶ Exiting ──resources released,
//!                                           status published──▶ Terminated
//! ```
//!
//! # Status Handoff
//! Each process carries a one-shot exit slot shared (via `Arc`) with its
//! parent's child list. The child fills it exactly once during teardown;
//! the parent reads it from its own copy, so it neither observes a status
//! before it is published nor depends on the child record still existing.

pub mod fdtable;

use alloc::string::String;
use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::{AtomicI32, Ordering};

use spin::{Mutex, MutexGuard, Once};

pub use fdtable::{DescriptorTable, Fd};

/// Process identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Pid(i32);

impl Pid {
    /// Wrap a raw process id.
    #[inline]
    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    /// Get the raw process id.
    #[inline]
    pub const fn as_i32(self) -> i32 {
        self.0
    }
}

impl fmt::Debug for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pid({})", self.0)
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Executing user code or inside a syscall.
    Running,
    /// Teardown in progress.
    Exiting,
    /// Resources released and status published.
    Terminated,
}

/// Parent-side record of a spawned child.
struct Child {
    pid: Pid,
    status: Arc<Once<i32>>,
}

/// Mutable part of a process record.
struct ProcessInner<H> {
    state: ProcessState,
    parent: Weak<Process<H>>,
    children: Vec<Child>,
}

/// A process as seen by the syscall layer.
pub struct Process<H> {
    pid: Pid,
    name: String,
    exit_status: Arc<Once<i32>>,
    last_child_status: AtomicI32,
    inner: Mutex<ProcessInner<H>>,
    // Only the owning thread takes this, and it may hold it across file I/O
    descriptors: Mutex<DescriptorTable<H>>,
}

impl<H> Process<H> {
    /// Create a running process with no parent, no children and an empty
    /// descriptor table.
    pub fn new(pid: Pid, name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            pid,
            name: name.into(),
            exit_status: Arc::new(Once::new()),
            last_child_status: AtomicI32::new(0),
            inner: Mutex::new(ProcessInner {
                state: ProcessState::Running,
                parent: Weak::new(),
                children: Vec::new(),
            }),
            descriptors: Mutex::new(DescriptorTable::new()),
        })
    }

    /// Process id.
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Name printed in the exit status line.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ProcessState {
        self.inner.lock().state
    }

    /// The parent, if it is still alive.
    pub fn parent(&self) -> Option<Arc<Self>> {
        self.inner.lock().parent.upgrade()
    }

    /// Pids of children that have not been waited on yet, in spawn order.
    pub fn children(&self) -> Vec<Pid> {
        self.inner.lock().children.iter().map(|child| child.pid).collect()
    }

    /// Most recent exit status reported by any child.
    pub fn last_child_status(&self) -> i32 {
        self.last_child_status.load(Ordering::Acquire)
    }

    /// This process's own exit status, once published.
    pub fn exit_status(&self) -> Option<i32> {
        self.exit_status.get().copied()
    }

    /// Exclusive access to the descriptor table.
    ///
    /// Separate from the lifecycle lock, so a parent or the scheduler can
    /// inspect this process while it is blocked in a file operation.
    pub fn descriptors(&self) -> MutexGuard<'_, DescriptorTable<H>> {
        self.descriptors.lock()
    }

    /// Register `child` as a child of this process.
    pub fn adopt(self: &Arc<Self>, child: &Process<H>) {
        child.inner.lock().parent = Arc::downgrade(self);
        self.inner.lock().children.push(Child {
            pid: child.pid,
            status: Arc::clone(&child.exit_status),
        });
    }

    /// Remove `pid` from the child list and return its exit slot.
    ///
    /// Returns `None` if `pid` is not a child or was already waited on.
    fn take_child(&self, pid: Pid) -> Option<Arc<Once<i32>>> {
        let mut inner = self.inner.lock();
        let index = inner.children.iter().position(|child| child.pid == pid)?;
        Some(inner.children.remove(index).status)
    }

    /// Wait for child `pid` to exit and return its status.
    ///
    /// Returns -1 if `pid` is not a child of this process or has already
    /// been waited on. Otherwise yields through `scheduler` until the
    /// child publishes its status.
    pub fn wait<S: Scheduler<H>>(&self, pid: Pid, scheduler: &S) -> i32 {
        let Some(slot) = self.take_child(pid) else {
            log::debug!("[PROCESS] {}: wait({}) on non-child", self.pid, pid);
            return -1;
        };
        loop {
            if let Some(&status) = slot.get() {
                return status;
            }
            scheduler.yield_now();
        }
    }

    /// Move Running -> Exiting and take every open handle.
    ///
    /// Returns `None` if teardown has already started.
    pub(crate) fn begin_exit(&self) -> Option<Vec<H>> {
        let mut inner = self.inner.lock();
        if inner.state != ProcessState::Running {
            return None;
        }
        inner.state = ProcessState::Exiting;
        drop(inner);
        Some(self.descriptors.lock().drain())
    }

    /// Publish `status` to the parent and move Exiting -> Terminated.
    pub(crate) fn finish_exit(&self, status: i32) {
        let parent = {
            let inner = self.inner.lock();
            inner.parent.upgrade()
        };
        self.exit_status.call_once(|| status);
        if let Some(parent) = parent {
            parent.last_child_status.store(status, Ordering::Release);
        }
        self.inner.lock().state = ProcessState::Terminated;
    }
}

/// Scheduler collaborator.
pub trait Scheduler<H> {
    /// Start a new process from a command line.
    fn spawn(&self, cmdline: &str) -> Option<Pid>;

    /// Find a live process record.
    fn lookup(&self, pid: Pid) -> Option<Arc<Process<H>>>;

    /// Give up the CPU and come back later.
    fn yield_now(&self);

    /// Tear down the current thread. Never returns.
    fn terminate_current(&self, status: i32) -> !;
}

/// Whole-machine control.
pub trait Machine {
    /// Power the machine off. Never returns.
    fn power_off(&self) -> !;
}
