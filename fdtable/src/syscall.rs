//! # System call ABI for x86_64.
//!
//! A user program requests a service from the kernel with the `syscall`
//! instruction. Before executing it, the program places:
//!
//! 1. the **system call number** in `%rax`,
//! 2. the **arguments** in `%rdi`, `%rsi`, `%rdx`, `%r10`, `%r8` and `%r9`, in
//!    that order.
//!
//! The kernel reports back through two registers. `%rax` holds the status:
//! `0` on success or a positive error number (see
//! [`KernelError::into_errno`]) on failure. `%rdx` holds the result value on
//! success and `usize::MAX` otherwise, which reads as `-1` to a C program.
//!
//! | Syscall  | rdi    | rsi    | rdx   | Result in rdx        |
//! |----------|--------|--------|-------|----------------------|
//! | open     | path   | flags  | mode  | descriptor           |
//! | read     | fd     | buf    | len   | bytes read           |
//! | write    | fd     | buf    | len   | bytes written        |
//! | lseek    | fd     | offset | whence| new offset           |
//! | close    | fd     |        |       | 0                    |
//! | dup2     | oldfd  | newfd  |       | newfd                |
//! | getcwd   | buf    | len    |       | bytes written        |
//! | remove   | path   |        |       | 0                    |
//! | fork     |        |        |       | child pid            |
//! | getpid   |        |        |       | pid                  |
//! | exit     | status |        |       | 0                    |

use kern::{KernelError, syscall::Registers};

/// A struct representing the system call ABI (Application Binary Interface).
///
/// It holds the system call number and the six arguments taken from the
/// registers, together with the registers themselves so that the result can
/// be stored back.
pub struct SyscallAbi<'a> {
    /// The system call number that identifies the requested system service.
    pub sysno: usize,
    /// First argument for the system call.
    pub arg1: usize,
    /// Second argument for the system call.
    pub arg2: usize,
    /// Third argument for the system call.
    pub arg3: usize,
    /// Fourth argument for the system call.
    pub arg4: usize,
    /// Fifth argument for the system call.
    pub arg5: usize,
    /// Sixth argument for the system call.
    pub arg6: usize,
    /// The registers of the calling program. The return value is written
    /// here.
    pub regs: &'a mut Registers,
}

impl<'a> SyscallAbi<'a> {
    /// Constructs a [`SyscallAbi`] instance from the provided registers.
    pub fn from_registers(regs: &'a mut Registers) -> Self {
        let gprs = regs.gprs;
        Self {
            sysno: gprs.rax,
            arg1: gprs.rdi,
            arg2: gprs.rsi,
            arg3: gprs.rdx,
            arg4: gprs.r10,
            arg5: gprs.r8,
            arg6: gprs.r9,
            regs,
        }
    }

    /// Sets the return value for the system call.
    ///
    /// On success `%rax` becomes `0` and `%rdx` the value. On failure `%rax`
    /// becomes the error number and `%rdx` `usize::MAX`.
    pub fn set_return_value(self, return_val: Result<usize, KernelError>) {
        let (status, value) = match return_val {
            Ok(value) => (0, value),
            Err(e) => (e.into_errno(), usize::MAX),
        };
        self.regs.gprs.rax = status;
        self.regs.gprs.rdx = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arguments_and_return_value() {
        let mut regs = Registers::for_syscall(4, [3, 10, 1, 0, 0, 7]);
        let abi = SyscallAbi::from_registers(&mut regs);
        assert_eq!(
            (abi.sysno, abi.arg1, abi.arg2, abi.arg3, abi.arg6),
            (4, 3, 10, 1, 7)
        );
        abi.set_return_value(Ok(42));
        assert_eq!((regs.gprs.rax, regs.gprs.rdx), (0, 42));

        let abi = SyscallAbi::from_registers(&mut regs);
        abi.set_return_value(Err(KernelError::IllegalSeek));
        assert_eq!((regs.gprs.rax, regs.gprs.rdx), (29, usize::MAX));
    }
}
