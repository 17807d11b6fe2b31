//! System call infrastructure.
//!
//! A system call arrives as a [`Registers`] frame. The number is passed in
//! `%rax` and the arguments in `%rdi`, `%rsi`, `%rdx`, `%r10`, `%r8` and
//! `%r9`. On return `%rax` holds the status, `0` on success or a positive
//! error number, and `%rdx` holds the result value.

pub mod uaccess;

/// General purpose registers of the x86_64 architecture.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct GeneralPurposeRegisters {
    pub r15: usize,
    pub r14: usize,
    pub r13: usize,
    pub r12: usize,
    pub r11: usize,
    pub r10: usize,
    pub r9: usize,
    pub r8: usize,
    pub rsi: usize,
    pub rdi: usize,
    pub rbp: usize,
    pub rdx: usize,
    pub rcx: usize,
    pub rbx: usize,
    pub rax: usize,
}

/// The register state captured when a user program enters the kernel.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Registers {
    /// General purpose registers.
    pub gprs: GeneralPurposeRegisters,
}

impl Registers {
    /// Builds the frame of a system call with number `sysno` and up to six
    /// arguments.
    pub fn for_syscall(sysno: usize, args: [usize; 6]) -> Self {
        let mut regs = Self::default();
        regs.gprs.rax = sysno;
        regs.gprs.rdi = args[0];
        regs.gprs.rsi = args[1];
        regs.gprs.rdx = args[2];
        regs.gprs.r10 = args[3];
        regs.gprs.r8 = args[4];
        regs.gprs.r9 = args[5];
        regs
    }
}

/// Flags for system calls.
pub mod flags {
    use crate::KernelError;
    use num_enum::{IntoPrimitive, TryFromPrimitive};

    bitflags::bitflags! {
        /// Flags of the `open` system call.
        pub struct OpenFlags: usize {
            /// Open for reading only.
            const O_RDONLY = 0;
            /// Open for writing only.
            const O_WRONLY = 1;
            /// Open for reading and writing.
            const O_RDWR = 2;
            /// Mask of the access mode bits.
            const O_ACCMODE = 3;
            /// Create the file if it does not exist.
            const O_CREAT = 4;
            /// With `O_CREAT`, fail if the file already exists.
            const O_EXCL = 8;
            /// Truncate the file to length 0 upon open.
            const O_TRUNC = 16;
            /// Every write goes to the end of the file.
            const O_APPEND = 32;
            /// Do not become the controlling terminal.
            const O_NOCTTY = 64;
        }
    }

    impl OpenFlags {
        /// Parses the raw `flags` argument of `open`.
        ///
        /// Fails with [`KernelError::InvalidArgument`] if an unknown bit is
        /// set or the access mode is not one of [`FileMode`].
        pub fn parse(raw: usize) -> Result<Self, KernelError> {
            let flags = Self::from_bits(raw).ok_or(KernelError::InvalidArgument)?;
            flags.file_mode()?;
            Ok(flags)
        }

        /// The access mode encoded in the flags.
        pub fn file_mode(&self) -> Result<FileMode, KernelError> {
            FileMode::try_from((*self & Self::O_ACCMODE).bits())
                .map_err(|_| KernelError::InvalidArgument)
        }
    }

    /// The [`FileMode`] enum represents the access modes available when opening
    /// a file.
    ///
    /// This enum is used by user program to specify how a file is opened,
    /// determining which operations can be performed on the file. It
    /// defines three basic modes:
    /// - [`FileMode::Read`]: The file is opened for reading only.
    /// - [`FileMode::Write`]: The file is opened for writing only.
    /// - [`FileMode::ReadWrite`]: The file is opened for both reading and
    ///   writing.
    #[derive(Debug, PartialEq, PartialOrd, Ord, Eq, Clone, Copy, TryFromPrimitive)]
    #[repr(usize)]
    pub enum FileMode {
        /// Read-only access to the file.
        Read = 0,
        /// Write-only access to the file.
        Write = 1,
        /// Both Read and Write access to the file.
        ReadWrite = 2,
    }

    impl FileMode {
        /// Whether the mode permits reading.
        pub fn readable(&self) -> bool {
            matches!(self, FileMode::Read | FileMode::ReadWrite)
        }

        /// Whether the mode permits writing.
        pub fn writable(&self) -> bool {
            matches!(self, FileMode::Write | FileMode::ReadWrite)
        }
    }

    /// The reference point of a seek.
    #[derive(Debug, PartialEq, Eq, Clone, Copy, TryFromPrimitive, IntoPrimitive)]
    #[repr(usize)]
    pub enum Whence {
        /// The offset is relative to the beginning of the file. (SEEK_SET)
        Set = 0,
        /// The offset is relative to the current position. (SEEK_CUR)
        Current = 1,
        /// The offset is relative to the end of the file. (SEEK_END)
        End = 2,
    }
}
