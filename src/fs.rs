//! File System Contract
//!
//! The syscall layer never looks inside a file. It hands names to the
//! file system, stores whatever handle comes back in the caller's
//! descriptor table, and passes that handle back for every later
//! operation. Ownership of a handle moves back to the file system on
//! `close`.

/// File-system collaborator.
pub trait FileSystem {
    /// Opaque open-file handle.
    type Handle;

    /// Create a file of `initial_size` bytes. Returns false if it could
    /// not be created (already exists, no space, bad name).
    fn create(&self, name: &str, initial_size: u32) -> bool;

    /// Remove a file by name.
    fn remove(&self, name: &str) -> bool;

    /// Open a file by name.
    fn open(&self, name: &str) -> Option<Self::Handle>;

    /// Length of the file in bytes.
    fn length(&self, file: &Self::Handle) -> u32;

    /// Read up to `buf.len()` bytes at the current position.
    fn read(&self, file: &mut Self::Handle, buf: &mut [u8]) -> usize;

    /// Write up to `buf.len()` bytes at the current position.
    fn write(&self, file: &mut Self::Handle, buf: &[u8]) -> usize;

    /// Move the current position.
    fn seek(&self, file: &mut Self::Handle, position: u32);

    /// Current position.
    fn tell(&self, file: &Self::Handle) -> u32;

    /// Release the handle.
    fn close(&self, file: Self::Handle);
}
