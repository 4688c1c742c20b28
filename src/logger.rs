//! Kernel log sink
//!
//! Routes `log` records to a console as `[LEVEL] message` lines. The
//! syscall layer itself only uses the `log` macros; whoever boots the
//! kernel decides where they end up by installing a logger here.
//!
//! The logger writes through a `LockedConsole`, normally the one owned by
//! the dispatcher, so a log line can never land in the middle of a
//! process's console output.

use alloc::string::String;
use core::fmt::Write;

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

use crate::console::{Console, LockedConsole};

/// A `log::Log` implementation writing to a locked console.
pub struct ConsoleLogger<'a, C> {
    console: &'a LockedConsole<C>,
    level: LevelFilter,
}

impl<'a, C: Console> ConsoleLogger<'a, C> {
    /// Create a logger emitting records up to `level`.
    pub const fn new(console: &'a LockedConsole<C>, level: LevelFilter) -> Self {
        Self { console, level }
    }
}

impl<C> Log for ConsoleLogger<'_, C>
where
    C: Console + Sync,
{
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let mut line = String::new();
        // Formatting into a String cannot fail
        let _ = writeln!(line, "[{}] {}", record.level(), record.args());
        self.console.write_all(line.as_bytes());
    }

    fn flush(&self) {}
}

/// Install `logger` as the global log sink.
///
/// Can only succeed once per boot.
pub fn init<C>(logger: &'static ConsoleLogger<'static, C>) -> Result<(), SetLoggerError>
where
    C: Console + Sync,
{
    log::set_logger(logger)?;
    log::set_max_level(logger.level);
    Ok(())
}
