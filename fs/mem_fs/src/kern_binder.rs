//! Binds [`MemFs`] to the storage contract of the kernel.

use crate::{Error, MemFs, MemObject};
use alloc::string::String;
use kern::{
    KernelError,
    fs::{Object, ObjectKind},
    syscall::flags::OpenFlags,
};

impl From<Error> for KernelError {
    fn from(e: Error) -> Self {
        match e {
            Error::NotFound | Error::InvalidPath => KernelError::NoSuchEntry,
            Error::Exists => KernelError::FileExist,
            Error::NotDirectory => KernelError::NotDirectory,
            Error::IsDirectory => KernelError::IsDirectory,
            Error::NotEmpty => KernelError::DirectoryNotEmpty,
            Error::Busy => KernelError::Busy,
        }
    }
}

impl kern::fs::traits::FileSystem for MemFs {
    fn open(&self, path: &str, flags: OpenFlags, mode: u32) -> Result<Object, KernelError> {
        let file_mode = flags.file_mode()?;
        let node = self.resolve(
            path,
            flags.contains(OpenFlags::O_CREAT),
            flags.contains(OpenFlags::O_EXCL),
            mode,
        )?;
        if node.kind == ObjectKind::Directory && file_mode.writable() {
            return Err(Error::IsDirectory.into());
        }
        if node.kind == ObjectKind::RegularFile
            && flags.contains(OpenFlags::O_TRUNC)
            && file_mode.writable()
        {
            node.replace(&[]);
        }
        node.opened();
        Ok(Object::new(MemObject(node)))
    }

    fn remove(&self, path: &str) -> Result<(), KernelError> {
        Ok(self.unlink(path)?)
    }

    fn getcwd(&self) -> Result<String, KernelError> {
        Ok(self.cwd())
    }
}
