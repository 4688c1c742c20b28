//! Console I/O
//!
//! The console driver only knows how to move bytes. Serializing access
//! between processes is this layer's job: `LockedConsole` holds a read
//! lock for the whole of a console read and a write lock for the whole of
//! a console write, so two processes can never interleave their bytes.

use spin::Mutex;

/// Console collaborator.
pub trait Console {
    /// Write a buffer to the console output stream in one piece.
    fn write_bytes(&self, bytes: &[u8]);

    /// Block until a key is available and return it.
    fn read_byte(&self) -> u8;
}

/// A console with process-wide read and write serialization.
pub struct LockedConsole<C> {
    inner: C,
    read_lock: Mutex<()>,
    write_lock: Mutex<()>,
}

impl<C: Console> LockedConsole<C> {
    /// Wrap a console driver.
    pub const fn new(inner: C) -> Self {
        Self {
            inner,
            read_lock: Mutex::new(()),
            write_lock: Mutex::new(()),
        }
    }

    /// Access the underlying driver.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Write the whole buffer while holding the write lock.
    pub fn write_all(&self, bytes: &[u8]) {
        let _guard = self.write_lock.lock();
        self.inner.write_bytes(bytes);
    }

    /// Fill `buf` one keystroke at a time while holding the read lock.
    pub fn read_exact(&self, buf: &mut [u8]) {
        let _guard = self.read_lock.lock();
        for byte in buf.iter_mut() {
            *byte = self.inner.read_byte();
        }
    }
}
