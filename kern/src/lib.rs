//! # Kernel support layer
//!
//! This crate collects everything the open-file subsystem consumes from the
//! rest of the kernel:
//!
//! - [`KernelError`]: every failure a kernel operation can report, together
//!   with its POSIX error number.
//! - [`sync`]: the SMP-supported [`SpinLock`](sync::SpinLock).
//! - [`fs`]: the storage/object layer contract. Files, directories and devices
//!   are reached through [`fs::FileSystem`] and handled as [`fs::Object`]s.
//! - [`teletype`]: the console device behind the standard streams.
//! - [`mm`] and [`syscall::uaccess`]: checked access to user memory.
//! - [`syscall`]: the register frame a system call arrives with, and the flag
//!   types user programs pass.
//! - [`task`]: the [`Task`](task::Task) trait a process implements to serve
//!   system calls.
//!
//! Kernel messages go through [`print!`], [`info!`], [`warning!`] and
//! [`debug!`]. Register a sink with [`kprint::register_sink`] to see them.

#![cfg_attr(not(test), no_std)]
#![deny(missing_docs, rustdoc::broken_intra_doc_links)]

extern crate alloc;

pub mod fs;
pub mod mm;
pub mod sync;
pub mod syscall;
pub mod task;
pub mod teletype;

pub use hal::{QUITE, debug, info, kprint, print, println, warning};

/// Maximum length of a path, including the terminating NUL.
pub const PATH_MAX: usize = 1024;

/// Maximum length of a single path component.
pub const NAME_MAX: usize = 255;

/// Enum representing errors that can occur during a kernel operation.
///
/// This enum is used to categorize errors encountered by the kernel operation.
/// Each variant corresponds to a specific type of error that might
/// occur during the handling of a kernel operation. These errors can be
/// returned to the user program to indicate the nature of the failure.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum KernelError {
    /// Operation is not permitted. (EPERM)
    OperationNotPermitted,
    /// No such file or directory. (ENOENT)
    NoSuchEntry,
    /// IO Error. (EIO)
    IOError,
    /// BAD file descriptor. (EBADF)
    BadFileDescriptor,
    /// The descriptor was not opened for the requested direction. (EBADF)
    BadAccessMode,
    /// Out of memory. (ENOMEM)
    NoMemory,
    /// Permission denied. (EACCES)
    InvalidAccess,
    /// Bad address. (EFAULT)
    BadAddress,
    /// Device or resource busy. (EBUSY)
    Busy,
    /// File exists. (EEXIST)
    FileExist,
    /// Not a directory. (ENOTDIR)
    NotDirectory,
    /// Is a directory. (EISDIR)
    IsDirectory,
    /// Invalid arguement. (EINVAL)
    InvalidArgument,
    /// Too many open files in system. (ENFILE)
    TooManyOpenFileInSystem,
    /// Too many open files. (EMFILE)
    TooManyOpenFile,
    /// No space left on device. (ENOSPC)
    NoSpace,
    /// Illegal seek. (ESPIPE)
    IllegalSeek,
    /// File name too long. (ENAMETOOLONG)
    NameTooLong,
    /// Invalid system call number. (ENOSYS)
    NoSuchSyscall,
    /// Directory not empty (ENOTEMPTY)
    DirectoryNotEmpty,
}

impl KernelError {
    /// Converts the [`KernelError`] enum into the corresponding positive
    /// error number that is reported to the user program.
    pub fn into_errno(self) -> usize {
        match self {
            KernelError::OperationNotPermitted => 1,
            KernelError::NoSuchEntry => 2,
            KernelError::IOError => 5,
            KernelError::BadFileDescriptor | KernelError::BadAccessMode => 9,
            KernelError::NoMemory => 12,
            KernelError::InvalidAccess => 13,
            KernelError::BadAddress => 14,
            KernelError::Busy => 16,
            KernelError::FileExist => 17,
            KernelError::NotDirectory => 20,
            KernelError::IsDirectory => 21,
            KernelError::InvalidArgument => 22,
            KernelError::TooManyOpenFileInSystem => 23,
            KernelError::TooManyOpenFile => 24,
            KernelError::NoSpace => 28,
            KernelError::IllegalSeek => 29,
            KernelError::NameTooLong => 36,
            KernelError::NoSuchSyscall => 38,
            KernelError::DirectoryNotEmpty => 39,
        }
    }
}

/// The given `usize` does not indicate an [`KernelError`].
#[derive(Debug, Eq, PartialEq)]
pub struct TryFromError {
    e: usize,
}

impl TryFrom<usize> for KernelError {
    type Error = TryFromError;

    // EBADF always decodes to `BadFileDescriptor`.
    fn try_from(value: usize) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::OperationNotPermitted),
            2 => Ok(Self::NoSuchEntry),
            5 => Ok(Self::IOError),
            9 => Ok(Self::BadFileDescriptor),
            12 => Ok(Self::NoMemory),
            13 => Ok(Self::InvalidAccess),
            14 => Ok(Self::BadAddress),
            16 => Ok(Self::Busy),
            17 => Ok(Self::FileExist),
            20 => Ok(Self::NotDirectory),
            21 => Ok(Self::IsDirectory),
            22 => Ok(Self::InvalidArgument),
            23 => Ok(Self::TooManyOpenFileInSystem),
            24 => Ok(Self::TooManyOpenFile),
            28 => Ok(Self::NoSpace),
            29 => Ok(Self::IllegalSeek),
            36 => Ok(Self::NameTooLong),
            38 => Ok(Self::NoSuchSyscall),
            39 => Ok(Self::DirectoryNotEmpty),
            e => Err(TryFromError { e }),
        }
    }
}
