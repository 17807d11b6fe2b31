//! The `uaccess` module provides abstractions for interacting with user-space
//! memory in a kernel context.
//!
//! The types provided by this module include:
//!
//! - [`UserPtrRO`]: A one-time, read-only pointer to a user-space object of
//!   type `T`.
//! - [`UserU8SliceRO`]: A one-time, read-only pointer to a slice of `u8` in
//!   user-space.
//! - [`UserU8SliceWO`]: A one-time, write-only pointer to a slice of `u8` in
//!   user-space.
//! - [`UserCString`]: A utility to handle C-style null-terminated strings from
//!   user-space, bounded in length.
//!
//! Every access first asks the [`AddressSpace`] of the calling process with
//! [`AddressSpace::access_ok`] whether the whole range is accessible. If it is
//! not, the operation fails with [`KernelError::BadAddress`] instead of
//! touching memory.
use crate::{KernelError, mm::AddressSpace};
use alloc::vec::Vec;
use arrayvec::ArrayString;
use core::mem::MaybeUninit;

/// Marker for plain-old-data types that can be copied from and to user-space
/// byte by byte.
///
/// # Safety
/// Every bit pattern of `size_of::<Self>()` bytes must be a valid `Self`.
pub unsafe trait Pod: Copy {}

macro_rules! impl_pod {
    ($($t:ty),*) => {
        $(unsafe impl Pod for $t {})*
    };
}

impl_pod!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);

fn checked_range(
    aspace: &dyn AddressSpace,
    addr: usize,
    len: usize,
    is_write: bool,
) -> Result<(), KernelError> {
    let end = addr.checked_add(len).ok_or(KernelError::BadAddress)?;
    if addr != 0 && aspace.access_ok(addr..end, is_write) {
        Ok(())
    } else {
        Err(KernelError::BadAddress)
    }
}

/// A one-time, read-only pointer to a user-space object of type `T`.
///
/// Takes ownership of the pointer during operations, so a checked address
/// cannot be reused for a second, unchecked access.
#[derive(PartialEq, PartialOrd, Eq, Ord, Debug)]
pub struct UserPtrRO<T>
where
    T: Pod,
{
    addr: usize,
    _ty: core::marker::PhantomData<T>,
}

impl<T> UserPtrRO<T>
where
    T: Pod,
{
    /// Creates a new `UserPtrRO` instance with the given user-space address.
    pub fn new(addr: usize) -> Self {
        UserPtrRO {
            addr,
            _ty: core::marker::PhantomData,
        }
    }

    /// Reads a value of type `T` from the user-space address.
    ///
    /// Returns `Ok(T)` if successful, otherwise
    /// `Err(KernelError::BadAddress)`.
    pub fn get(self, aspace: &dyn AddressSpace) -> Result<T, KernelError> {
        let size = core::mem::size_of::<T>();
        checked_range(aspace, self.addr, size, false)?;
        let mut value = MaybeUninit::<T>::zeroed();
        // Safety: `value` is zero-initialized and exactly `size` bytes long.
        let bytes =
            unsafe { core::slice::from_raw_parts_mut(value.as_mut_ptr() as *mut u8, size) };
        aspace.copy_in(self.addr, bytes)?;
        // Safety: `T: Pod` accepts any bit pattern.
        Ok(unsafe { value.assume_init() })
    }
}

/// A one-time, read-only pointer to a slice of `u8` in user-space.
#[derive(PartialEq, PartialOrd, Eq, Ord, Debug)]
pub struct UserU8SliceRO {
    addr: usize,
    len: usize,
}

impl UserU8SliceRO {
    /// Creates a new `UserU8SliceRO` instance with the given user-space address
    /// and length.
    pub fn new(addr: usize, len: usize) -> Self {
        UserU8SliceRO { addr, len }
    }

    /// Reads data from the user-space buffer into a `Vec<u8>`.
    ///
    /// Returns `Err(KernelError::BadAddress)` if the buffer is not readable,
    /// or `Err(KernelError::NoMemory)` if the staging buffer cannot be
    /// allocated. An empty slice is never dereferenced.
    pub fn get(self, aspace: &dyn AddressSpace) -> Result<Vec<u8>, KernelError> {
        if self.len == 0 {
            return Ok(Vec::new());
        }
        checked_range(aspace, self.addr, self.len, false)?;
        let mut result = Vec::new();
        result
            .try_reserve_exact(self.len)
            .map_err(|_| KernelError::NoMemory)?;
        result.resize(self.len, 0);
        aspace.copy_in(self.addr, &mut result)?;
        Ok(result)
    }
}

/// A one-time, write-only pointer to a slice of `u8` in user-space.
#[derive(PartialEq, PartialOrd, Eq, Ord, Debug)]
pub struct UserU8SliceWO {
    addr: usize,
    len: usize,
}

impl UserU8SliceWO {
    /// Creates a new `UserU8SliceWO` instance with the given user-space address
    /// and length.
    pub fn new(addr: usize, len: usize) -> Self {
        UserU8SliceWO { addr, len }
    }

    /// The length of the user buffer.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the user buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Checks that the whole user buffer is writable without writing to it.
    pub fn check(&self, aspace: &dyn AddressSpace) -> Result<(), KernelError> {
        if self.len == 0 {
            return Ok(());
        }
        checked_range(aspace, self.addr, self.len, true)
    }

    /// Writes data from a slice to the user-space buffer.
    ///
    /// At most `len` bytes are written.
    ///
    /// Returns `Ok(usize)` indicating the number of bytes written, or
    /// `Err(KernelError::BadAddress)` on failure.
    pub fn put(self, aspace: &dyn AddressSpace, other: &[u8]) -> Result<usize, KernelError> {
        let size = self.len.min(other.len());
        if size == 0 {
            return Ok(0);
        }
        checked_range(aspace, self.addr, self.len, true)?;
        aspace.copy_out(self.addr, &other[..size])?;
        Ok(size)
    }
}

/// A pointer to a null-terminated C-style string in user-space.
#[derive(PartialEq, PartialOrd, Eq, Ord, Debug)]
pub struct UserCString {
    addr: usize,
}

impl UserCString {
    /// Creates a new `UserCString` instance with the given user-space address.
    pub fn new(addr: usize) -> Self {
        Self { addr }
    }

    /// Reads a null-terminated string of at most `N` bytes, excluding the
    /// terminator.
    ///
    /// # Returns
    /// - `Err(KernelError::BadAddress)`: a byte before the terminator is not
    ///   accessible.
    /// - `Err(KernelError::NameTooLong)`: no terminator within `N` bytes.
    /// - `Err(KernelError::InvalidArgument)`: the bytes are not UTF-8.
    pub fn read<const N: usize>(
        self,
        aspace: &dyn AddressSpace,
    ) -> Result<ArrayString<N>, KernelError> {
        let mut bytes = arrayvec::ArrayVec::<u8, N>::new();
        let mut ptr = self.addr;
        loop {
            match UserPtrRO::<u8>::new(ptr).get(aspace)? {
                0 => break,
                b => bytes.try_push(b).map_err(|_| KernelError::NameTooLong)?,
            }
            ptr = ptr.checked_add(1).ok_or(KernelError::BadAddress)?;
        }
        let s = core::str::from_utf8(&bytes).map_err(|_| KernelError::InvalidArgument)?;
        ArrayString::from(s).map_err(|_| KernelError::NameTooLong)
    }
}
