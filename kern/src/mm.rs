//! User address space access.
//!
//! The kernel never dereferences a user pointer directly. Every access goes
//! through an [`AddressSpace`], which first validates the range with
//! [`AddressSpace::access_ok`] and then copies the bytes in or out. The
//! checked wrappers in [`uaccess`](crate::syscall::uaccess) combine both
//! steps.

use crate::KernelError;
use core::ops::Range;

/// The user-visible memory of a process.
pub trait AddressSpace
where
    Self: Send + Sync,
{
    /// Validates a given **memory address range** before use.
    ///
    /// - `addr`: The range of virtual addresses being accessed.
    /// - `is_write`: Indicates whether the memory is being **read** (`false`)
    ///   or **written to** (`true`).
    ///
    /// The null page is never accessible.
    fn access_ok(&self, addr: Range<usize>, is_write: bool) -> bool;

    /// Copies `buf.len()` bytes starting at user address `addr` into `buf`.
    ///
    /// Callers validate the range with [`AddressSpace::access_ok`] first.
    fn copy_in(&self, addr: usize, buf: &mut [u8]) -> Result<(), KernelError>;

    /// Copies `data` to user address `addr`.
    ///
    /// Callers validate the range with [`AddressSpace::access_ok`] first.
    fn copy_out(&self, addr: usize, data: &[u8]) -> Result<(), KernelError>;
}
