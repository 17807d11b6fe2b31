//! Storage/object layer abstraction.
//!
//! The open-file subsystem does not know how objects are stored. It reaches
//! them through two contracts:
//!
//! - [`traits::FileSystem`]: resolves a path into an [`Object`], removes a
//!   path, and reports the working directory.
//! - [`traits::Object`]: one open underlying object (regular file, directory
//!   or device) that can be read, written and queried at byte granularity.
//!
//! Both are wrapped into reference-counted handles, [`FileSystem`] and
//! [`Object`], which are what the rest of the kernel passes around.

/// Defines traits for storage operations.
pub mod traits {
    use super::{InodeNumber, ObjectKind};
    use crate::{KernelError, syscall::flags::OpenFlags};
    use alloc::string::String;

    /// Trait representing a filesystem.
    ///
    /// A filesystem resolves paths into objects. Resolving the same
    /// underlying object twice must yield objects that compare equal, i.e.
    /// that report the same [`InodeNumber`].
    pub trait FileSystem
    where
        Self: Sync + Send,
    {
        /// Opens the object at `path`.
        ///
        /// `flags` carries the creation, truncation and access-mode bits the
        /// user program asked for. `mode` is the permission of a newly created
        /// object.
        ///
        /// # Returns
        /// - `Ok(Object)`: The opened object.
        /// - `Err(KernelError)`: The reason the path could not be opened,
        ///   e.g. [`KernelError::NoSuchEntry`].
        fn open(
            &self,
            path: &str,
            flags: OpenFlags,
            mode: u32,
        ) -> Result<super::Object, KernelError>;

        /// Removes the directory entry at `path`.
        fn remove(&self, path: &str) -> Result<(), KernelError>;

        /// Returns the path of the current working directory.
        fn getcwd(&self) -> Result<String, KernelError>;
    }

    /// Trait representing an open object of the storage layer.
    pub trait Object
    where
        Self: Send + Sync,
    {
        /// Returns the inode number of the object.
        fn ino(&self) -> InodeNumber;

        /// Returns the type of the object.
        fn kind(&self) -> ObjectKind;

        /// Returns the size of the object in bytes.
        fn size(&self) -> usize;

        /// Reads data starting at byte `position` into `buf`.
        ///
        /// # Returns
        /// - `Ok(usize)`: The number of bytes read. Reading at or past the end
        ///   of the object reads zero bytes.
        /// - `Err(KernelError)`: An error occured while the read operation.
        fn read_at(&self, position: usize, buf: &mut [u8]) -> Result<usize, KernelError>;

        /// Writes `buf` starting at byte `position`.
        ///
        /// If the write position is beyond the current size, the object is
        /// extended to the minimum size required to reflect the update.
        ///
        /// # Returns
        /// - `Ok(usize)`: The number of bytes written.
        /// - `Err(KernelError)`: An error occured while the write operation.
        fn write_at(&self, position: usize, buf: &[u8]) -> Result<usize, KernelError>;

        /// Releases the object.
        ///
        /// The kernel calls this exactly once, when the last reference to the
        /// object in the system open table goes away.
        fn close(&self) {}
    }
}

use crate::{KernelError, syscall::flags::OpenFlags};
use alloc::{string::String, sync::Arc};
use core::num::NonZeroU32;

/// A handle to a filesystem.
///
/// The handle is cheap to clone; all clones refer to the same filesystem.
#[derive(Clone)]
pub struct FileSystem(pub Arc<dyn traits::FileSystem>);

impl FileSystem {
    /// Creates a new [`FileSystem`] handle from an implementation of
    /// [`traits::FileSystem`].
    pub fn new(fs: impl traits::FileSystem + 'static) -> Self {
        Self(Arc::new(fs))
    }

    /// Opens the object at `path`.
    #[inline]
    pub fn open(&self, path: &str, flags: OpenFlags, mode: u32) -> Result<Object, KernelError> {
        self.0.open(path, flags, mode)
    }

    /// Removes the directory entry at `path`.
    #[inline]
    pub fn remove(&self, path: &str) -> Result<(), KernelError> {
        self.0.remove(path)
    }

    /// Returns the path of the current working directory.
    #[inline]
    pub fn getcwd(&self) -> Result<String, KernelError> {
        self.0.getcwd()
    }
}

/// A handle to an open object.
///
/// This struct provides a reference-counted handle to an object that supports
/// reading and writing operations at the kernel level. Two handles are equal
/// when they refer to the same underlying object.
#[derive(Clone)]
pub struct Object(pub Arc<dyn traits::Object>);

impl Object {
    /// Creates a new [`Object`] handle from a given implementation of
    /// [`traits::Object`].
    pub fn new(r: impl traits::Object + 'static) -> Self {
        Self(Arc::new(r))
    }

    /// Inode number of the object.
    #[inline]
    pub fn ino(&self) -> InodeNumber {
        self.0.ino()
    }

    /// Type of the object.
    #[inline]
    pub fn kind(&self) -> ObjectKind {
        self.0.kind()
    }

    /// Returns the size of the object in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.0.size()
    }

    /// Returns the metadata of the object.
    pub fn stat(&self) -> Stat {
        Stat {
            ino: self.ino(),
            size: self.size(),
            kind: self.kind(),
        }
    }

    /// Reads data starting at `position` into `buf`.
    ///
    /// # Returns
    /// - `Ok(usize)`: The number of bytes read.
    /// - `Err(Error)`: An error if the read operation fails.
    #[inline]
    pub fn read(&self, position: usize, buf: &mut [u8]) -> Result<usize, KernelError> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.0.read_at(position, buf)
    }

    /// Writes `buf` into the object starting at `position`.
    ///
    /// # Returns
    /// - `Ok(usize)`: The number of bytes written.
    /// - `Err(Error)`: An error if the write operation fails.
    #[inline]
    pub fn write(&self, position: usize, buf: &[u8]) -> Result<usize, KernelError> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.0.write_at(position, buf)
    }

    /// Releases the underlying object.
    pub fn close(&self) {
        self.0.close()
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.ino() == other.ino()
    }
}

impl Eq for Object {}

impl core::fmt::Debug for Object {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Object")
            .field("ino", &self.ino())
            .field("kind", &self.kind())
            .finish()
    }
}

/// The type of an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    /// A regular file.
    RegularFile,
    /// A directory.
    Directory,
    /// A character device, e.g. a terminal.
    CharDevice,
    /// A block device.
    BlockDevice,
}

impl ObjectKind {
    /// Whether a cursor into the object is meaningful.
    ///
    /// Device objects are streams: they have no position to seek to.
    pub fn is_seekable(&self) -> bool {
        matches!(self, ObjectKind::RegularFile | ObjectKind::Directory)
    }
}

/// Metadata of an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    /// The inode number.
    pub ino: InodeNumber,
    /// The size in bytes.
    pub size: usize,
    /// The type of the object.
    pub kind: ObjectKind,
}

/// A type representing an inode number of the storage layer.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InodeNumber(NonZeroU32);

impl InodeNumber {
    /// Create a new inode number. Returns `None` for zero.
    pub const fn new(n: u32) -> Option<Self> {
        match NonZeroU32::new(n) {
            Some(n) => Some(Self(n)),
            None => None,
        }
    }

    /// Cast into u32.
    #[inline]
    pub fn into_u32(&self) -> u32 {
        self.0.get()
    }
}
