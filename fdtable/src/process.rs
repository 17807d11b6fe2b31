//! The process model.
//!
//! A [`Process`] is the user-facing side of one file table: it decodes the
//! arguments of a system call, moves data across the user boundary through
//! its [`AddressSpace`], and forwards the request to the shared
//! [`FileDescriptorService`].

use crate::{
    file_struct::{AccessMode, FileDescriptor, Pid},
    service::FileDescriptorService,
    syscall::SyscallAbi,
};
use alloc::{sync::Arc, vec::Vec};
use kern::{
    KernelError, NAME_MAX, PATH_MAX, debug,
    mm::AddressSpace,
    syscall::{
        flags::OpenFlags,
        uaccess::{UserCString, UserU8SliceRO, UserU8SliceWO},
    },
};

/// A process, as far as its open files are concerned.
pub struct Process {
    pid: Pid,
    service: Arc<FileDescriptorService>,
    aspace: Arc<dyn AddressSpace>,
}

impl Process {
    /// Creates a process under a fresh pid, with the standard streams bound.
    pub fn spawn(
        service: Arc<FileDescriptorService>,
        aspace: Arc<dyn AddressSpace>,
    ) -> Result<Self, KernelError> {
        let pid = service.spawn()?;
        Ok(Self::attach(service, pid, aspace))
    }

    /// Attaches to the file table of an existing `pid`, e.g. a forked child.
    pub fn attach(
        service: Arc<FileDescriptorService>,
        pid: Pid,
        aspace: Arc<dyn AddressSpace>,
    ) -> Self {
        Self {
            pid,
            service,
            aspace,
        }
    }

    /// The pid of the process.
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// `open(path, flags, mode)`
    pub fn open(&mut self, abi: &SyscallAbi) -> Result<usize, KernelError> {
        let path = UserCString::new(abi.arg1).read::<{ PATH_MAX - 1 }>(self.aspace.as_ref())?;
        let flags = OpenFlags::parse(abi.arg2)?;
        self.service
            .open(self.pid, &path, flags, abi.arg3 as u32)
            .map(|fd| fd.0 as usize)
    }

    /// `read(fd, buf, len)`
    pub fn read(&mut self, abi: &SyscallAbi) -> Result<usize, KernelError> {
        let fd = FileDescriptor::from_raw(abi.arg1);
        self.service.check_access(self.pid, fd, AccessMode::READ)?;
        let dest = UserU8SliceWO::new(abi.arg2, abi.arg3);
        dest.check(self.aspace.as_ref())?;
        let mut staging = Vec::new();
        staging
            .try_reserve_exact(dest.len())
            .map_err(|_| KernelError::NoMemory)?;
        staging.resize(dest.len(), 0);
        let n = self.service.read(self.pid, fd, &mut staging)?;
        dest.put(self.aspace.as_ref(), &staging[..n])
    }

    /// `write(fd, buf, len)`
    pub fn write(&mut self, abi: &SyscallAbi) -> Result<usize, KernelError> {
        let fd = FileDescriptor::from_raw(abi.arg1);
        self.service.check_access(self.pid, fd, AccessMode::WRITE)?;
        let data = UserU8SliceRO::new(abi.arg2, abi.arg3).get(self.aspace.as_ref())?;
        self.service.write(self.pid, fd, &data)
    }

    /// `lseek(fd, offset, whence)`
    pub fn lseek(&mut self, abi: &SyscallAbi) -> Result<usize, KernelError> {
        let fd = FileDescriptor::from_raw(abi.arg1);
        self.service.seek(self.pid, fd, abi.arg2 as isize, abi.arg3)
    }

    /// `close(fd)`
    pub fn close(&mut self, abi: &SyscallAbi) -> Result<usize, KernelError> {
        self.service
            .close(self.pid, FileDescriptor::from_raw(abi.arg1))
            .map(|_| 0)
    }

    /// `dup2(oldfd, newfd)`
    pub fn dup2(&mut self, abi: &SyscallAbi) -> Result<usize, KernelError> {
        self.service
            .dup2(
                self.pid,
                FileDescriptor::from_raw(abi.arg1),
                FileDescriptor::from_raw(abi.arg2),
            )
            .map(|fd| fd.0 as usize)
    }

    /// `getcwd(buf, len)`
    ///
    /// The path is truncated to `len` bytes and is not NUL-terminated.
    pub fn getcwd(&mut self, abi: &SyscallAbi) -> Result<usize, KernelError> {
        let cwd = self.service.getcwd()?;
        UserU8SliceWO::new(abi.arg1, abi.arg2).put(self.aspace.as_ref(), cwd.as_bytes())
    }

    /// `remove(path)`
    pub fn remove(&mut self, abi: &SyscallAbi) -> Result<usize, KernelError> {
        let path = UserCString::new(abi.arg1)
            .read::<NAME_MAX>(self.aspace.as_ref())
            .map_err(|_| KernelError::OperationNotPermitted)?;
        self.service.remove(&path).map(|_| 0)
    }

    /// `fork()`
    ///
    /// Only the file table is duplicated. The caller attaches a [`Process`]
    /// to the returned pid to run the child.
    pub fn fork(&mut self, _abi: &SyscallAbi) -> Result<usize, KernelError> {
        self.service.fork(self.pid).map(|child| child.0)
    }

    /// `getpid()`
    pub fn getpid(&mut self, _abi: &SyscallAbi) -> Result<usize, KernelError> {
        Ok(self.pid.0)
    }

    /// `exit(status)`
    pub fn exit(&mut self, abi: &SyscallAbi) -> Result<usize, KernelError> {
        debug!("fdtable: pid {} exits with {}.", self.pid.0, abi.arg1 as isize);
        self.service.teardown_process(self.pid).map(|_| 0)
    }
}
