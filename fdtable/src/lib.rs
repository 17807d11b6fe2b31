//! # The dual-level open-file table
//!
//! This crate tracks which underlying objects are open, how many
//! process-level handles refer to each of them, and how reads, writes and
//! seeks through a handle turn into operations on the object.
//!
//! It is built from two levels of tables:
//!
//! - The [`SystemOpenTable`] has one entry per distinct open object, shared
//!   by every process through a reference count. See [`open_file_table`].
//! - Each process has a [`FileStruct`] that maps small integers, the
//!   [`FileDescriptor`]s, to entries. Descriptors produced from one open by
//!   `dup2` or `fork` form a duplicate group and share one cursor. See
//!   [`file_struct`].
//!
//! The [`FileDescriptorService`] composes the two under one lock and exposes
//! the operations: open, close, read, write, seek, `dup2`, getcwd and remove,
//! plus the process lifecycle hooks that populate and drain a table. See
//! [`service`].
//!
//! User programs reach the service through system calls. A [`Process`]
//! implements [`Task`]: it decodes the registers with [`SyscallAbi`], moves
//! buffers across the user boundary, and dispatches on [`SyscallNumber`].
//!
//! ## Error numbers
//!
//! | Condition                                   | Error                      |
//! |---------------------------------------------|----------------------------|
//! | descriptor out of range or unused           | `EBADF`                    |
//! | direction not allowed by the access mode    | `EBADF`                    |
//! | seek on a standard stream or a device       | `ESPIPE`                   |
//! | negative offset, bad `whence` or open flags | `EINVAL`                   |
//! | system table full                           | `ENFILE`                   |
//! | process table full                          | `EMFILE`                   |
//! | bad user pointer                            | `EFAULT`                   |
//! | remove failed                               | `EPERM`                    |
//! | filesystem error on open                    | propagated, e.g. `ENOENT`  |
//!
//! [`SystemOpenTable`]: open_file_table::SystemOpenTable
//! [`FileStruct`]: file_struct::FileStruct
//! [`FileDescriptor`]: file_struct::FileDescriptor
//! [`FileDescriptorService`]: service::FileDescriptorService
//! [`SyscallAbi`]: syscall::SyscallAbi

#![cfg_attr(not(test), no_std)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

extern crate alloc;

pub mod config;
pub mod file_struct;
pub mod open_file_table;
pub mod process;
pub mod service;
pub mod syscall;

use kern::{KernelError, syscall::Registers, task::Task};
use num_enum::TryFromPrimitive;
use syscall::SyscallAbi;

pub use config::FileTableConfig;
pub use file_struct::{FileDescriptor, Pid};
pub use process::Process;
pub use service::FileDescriptorService;

/// Represents system call numbers.
///
/// Each variant corresponds to a specific system call that can be invoked
/// using the system call interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(usize)]
pub enum SyscallNumber {
    /// Opens a file and returns a file descriptor.
    Open = 1,
    /// Reads data from a file descriptor.
    Read = 2,
    /// Writes data to a file descriptor.
    Write = 3,
    /// Moves the file offset of an open file.
    Lseek = 4,
    /// Closes an open file descriptor.
    Close = 5,
    /// Duplicates a file descriptor onto another.
    Dup2 = 6,
    /// Copies the working directory into a buffer.
    Getcwd = 7,
    /// Removes a directory entry.
    Remove = 8,
    /// Duplicates the file table into a new process.
    Fork = 9,
    /// Returns the pid of the caller.
    Getpid = 10,
    /// Closes every descriptor of the caller.
    Exit = 11,
}

impl Task for Process {
    /// Handles a system call request from a user program.
    ///
    /// The number and arguments are taken from `regs` with
    /// [`SyscallAbi::from_registers`]. An unknown number fails with
    /// [`KernelError::NoSuchSyscall`]. The result is stored back with
    /// [`SyscallAbi::set_return_value`].
    fn syscall(&mut self, regs: &mut Registers) {
        let abi = SyscallAbi::from_registers(regs);
        let return_val = SyscallNumber::try_from(abi.sysno)
            .map_err(|_| KernelError::NoSuchSyscall)
            .and_then(|no| match no {
                SyscallNumber::Open => self.open(&abi),
                SyscallNumber::Read => self.read(&abi),
                SyscallNumber::Write => self.write(&abi),
                SyscallNumber::Lseek => self.lseek(&abi),
                SyscallNumber::Close => self.close(&abi),
                SyscallNumber::Dup2 => self.dup2(&abi),
                SyscallNumber::Getcwd => self.getcwd(&abi),
                SyscallNumber::Remove => self.remove(&abi),
                SyscallNumber::Fork => self.fork(&abi),
                SyscallNumber::Getpid => self.getpid(&abi),
                SyscallNumber::Exit => self.exit(&abi),
            });
        abi.set_return_value(return_val);
    }
}
