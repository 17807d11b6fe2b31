//! Capacities of the open-file subsystem.
//!
//! Both tables have a fixed capacity for the lifetime of a
//! [`FileDescriptorService`]. The defaults below are used unless the service
//! is built with a [`FileTableConfig`] that says otherwise.

use crate::service::FileDescriptorService;
use alloc::sync::Arc;
use kern::{KernelError, fs::FileSystem, teletype::Teletype};

/// Default number of entries in the system open table.
pub const SYSTEM_OPEN_MAX: usize = 64;

/// Default number of handles per process, including the standard streams.
pub const OPEN_MAX: usize = 32;

/// Handle of the standard input.
pub const STDIN_FILENO: i32 = 0;
/// Handle of the standard output.
pub const STDOUT_FILENO: i32 = 1;
/// Handle of the standard error.
pub const STDERR_FILENO: i32 = 2;

/// Number of handles bound to the standard streams at process creation.
pub const RESERVED_FDS: usize = 3;

/// A builder for the capacities of a [`FileDescriptorService`].
///
/// ```ignore
/// let service = FileTableConfig::new()
///     .system_open_max(128)
///     .open_max(16)
///     .build(fs, tty)?;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileTableConfig {
    pub(crate) system_open_max: usize,
    pub(crate) open_max: usize,
}

impl Default for FileTableConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl FileTableConfig {
    /// Starts from [`SYSTEM_OPEN_MAX`] and [`OPEN_MAX`].
    pub const fn new() -> Self {
        Self {
            system_open_max: SYSTEM_OPEN_MAX,
            open_max: OPEN_MAX,
        }
    }

    /// Sets the capacity of the system open table.
    pub const fn system_open_max(mut self, n: usize) -> Self {
        self.system_open_max = n;
        self
    }

    /// Sets the capacity of every per-process table.
    pub const fn open_max(mut self, n: usize) -> Self {
        self.open_max = n;
        self
    }

    /// Checks the capacities.
    ///
    /// The system table must hold at least one entry, and a process table
    /// must have room beyond the standard streams. Handles are `i32`, so the
    /// process table cannot exceed `i32::MAX` slots.
    pub fn validate(&self) -> Result<(), KernelError> {
        if self.system_open_max == 0
            || self.open_max <= RESERVED_FDS
            || self.open_max > i32::MAX as usize
        {
            return Err(KernelError::InvalidArgument);
        }
        Ok(())
    }

    /// Builds the subsystem on top of `fs`, routing the standard streams to
    /// `tty`.
    pub fn build(
        self,
        fs: FileSystem,
        tty: Arc<dyn Teletype>,
    ) -> Result<FileDescriptorService, KernelError> {
        self.validate()?;
        FileDescriptorService::with_config(self, fs, tty)
    }
}
