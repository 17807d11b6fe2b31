//! Test & bootstrap fixtures of the file table graders.
//!
//! [`Kernel::boot`] brings up a [`MemFs`] with a few well-known files, the
//! open-file subsystem on top of it, and the hooked console of the
//! [`grading`] crate. Each [`Kernel::process`] gets its own [`UserMemory`],
//! which stands in for the user half of an address space.

use fdtable::{FileDescriptorService, FileTableConfig, Pid, Process};
use kern::{
    KernelError,
    fs::FileSystem,
    mm::AddressSpace,
    sync::SpinLock,
};
use mem_fs::MemFs;
use std::{
    ops::Range,
    sync::{
        Arc, Once,
        atomic::{AtomicUsize, Ordering},
    },
};

/// Contents of `/hello`.
pub const HELLO: &[u8] = b"Welcome to the open-file table!\n\nEvery handle counts.\n";

/// Base address of every [`UserMemory`].
pub const USER_BASE: usize = 0x4000_0000;

/// The user memory of one test process.
///
/// Addresses `USER_BASE..USER_BASE + size` are accessible; everything else,
/// including the null page, is not. Memory is handed out with a bump
/// allocator.
pub struct UserMemory {
    bytes: SpinLock<Vec<u8>>,
    next: AtomicUsize,
}

impl UserMemory {
    /// Creates `size` bytes of zeroed user memory.
    pub fn new(size: usize) -> Arc<Self> {
        Arc::new(Self {
            bytes: SpinLock::new(vec![0; size]),
            next: AtomicUsize::new(USER_BASE),
        })
    }

    fn size(&self) -> usize {
        let bytes = self.bytes.lock();
        let size = bytes.len();
        bytes.unlock();
        size
    }

    /// Reserves `len` zeroed bytes and returns their address.
    pub fn alloc(&self, len: usize) -> usize {
        let addr = self.next.fetch_add(len.max(1), Ordering::SeqCst);
        assert!(
            addr + len <= USER_BASE + self.size(),
            "user memory exhausted"
        );
        addr
    }

    /// Copies `data` into fresh user memory and returns its address.
    pub fn place(&self, data: &[u8]) -> usize {
        let addr = self.alloc(data.len());
        self.copy_out(addr, data).unwrap();
        addr
    }

    /// Places `s` as a NUL-terminated string and returns its address.
    pub fn cstr(&self, s: &str) -> usize {
        let mut data = s.as_bytes().to_vec();
        data.push(0);
        self.place(&data)
    }

    /// Reads `len` bytes at `addr`.
    pub fn read(&self, addr: usize, len: usize) -> Vec<u8> {
        let mut buf = vec![0; len];
        self.copy_in(addr, &mut buf).unwrap();
        buf
    }

    fn offsets(&self, addr: usize, len: usize) -> Result<Range<usize>, KernelError> {
        let end = addr.checked_add(len).ok_or(KernelError::BadAddress)?;
        if self.access_ok(addr..end, false) {
            Ok(addr - USER_BASE..end - USER_BASE)
        } else {
            Err(KernelError::BadAddress)
        }
    }
}

impl AddressSpace for UserMemory {
    fn access_ok(&self, addr: Range<usize>, _is_write: bool) -> bool {
        addr.start != 0
            && addr.start >= USER_BASE
            && addr.start <= addr.end
            && addr.end <= USER_BASE + self.size()
    }

    fn copy_in(&self, addr: usize, buf: &mut [u8]) -> Result<(), KernelError> {
        let range = self.offsets(addr, buf.len())?;
        let bytes = self.bytes.lock();
        buf.copy_from_slice(&bytes[range]);
        bytes.unlock();
        Ok(())
    }

    fn copy_out(&self, addr: usize, data: &[u8]) -> Result<(), KernelError> {
        let range = self.offsets(addr, data.len())?;
        let mut bytes = self.bytes.lock();
        bytes[range].copy_from_slice(data);
        bytes.unlock();
        Ok(())
    }
}

/// A booted kernel.
pub struct Kernel {
    /// The filesystem the subsystem runs on.
    pub fs: MemFs,
    /// The open-file subsystem.
    pub service: Arc<FileDescriptorService>,
}

static LOG: Once = Once::new();

impl Kernel {
    /// Boots with the default capacities.
    pub fn boot() -> Self {
        Self::boot_with(FileTableConfig::new())
    }

    /// Boots with the given capacities.
    pub fn boot_with(config: FileTableConfig) -> Self {
        LOG.call_once(|| kern::kprint::register_sink(|args| eprint!("{}", args)));
        let fs = MemFs::new();
        fs.create_file("/hello", HELLO).unwrap();
        fs.create_file("/empty", b"").unwrap();
        fs.mkdir("/home").unwrap();
        let service = config
            .build(
                FileSystem::new(fs.clone()),
                Arc::new(grading::HookedConsole),
            )
            .unwrap();
        Self {
            fs,
            service: Arc::new(service),
        }
    }

    /// Spawns a process with 64 KiB of user memory.
    pub fn process(&self) -> (Process, Arc<UserMemory>) {
        let mem = UserMemory::new(0x10000);
        let process = Process::spawn(self.service.clone(), mem.clone()).unwrap();
        (process, mem)
    }

    /// Runs `pid` in the given user memory, e.g. a forked child.
    pub fn attach(&self, pid: Pid, mem: Arc<UserMemory>) -> Process {
        Process::attach(self.service.clone(), pid, mem)
    }
}
