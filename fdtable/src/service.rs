//! # The file-descriptor service.
//!
//! [`FileDescriptorService`] is the operation surface of the open-file
//! subsystem. It owns the [`SystemOpenTable`], the [`DupGroups`] and the
//! [`FileStruct`] of every process, all behind one [`SpinLock`]. Every
//! operation takes the lock for its whole bookkeeping, including the transfer
//! against the underlying object, so that the two table levels are only ever
//! seen in a consistent state:
//!
//! - two concurrent opens of one object either coalesce onto one entry or
//!   serialize,
//! - an append always lands at the end the object has at that moment,
//! - close and `dup2` never interleave with each other or with open.
//!
//! The standard streams are the exception. Their slot is checked under the
//! lock, but the console transfer happens after the lock is released because
//! reading the console may block for as long as the user wants.
//!
//! No operation leaves a partial update behind. When a step fails, the steps
//! already done are undone before the error is returned.
//!
//! The service is constructed once, usually through
//! [`FileTableConfig::build`], and shared by reference.

use crate::{
    config::FileTableConfig,
    file_struct::{
        AccessMode, DupGroupId, DupGroups, FileDescriptor, FileSlot, FileStruct, Pid,
    },
    open_file_table::{EntryId, SystemOpenTable},
};
use alloc::{collections::BTreeMap, string::String, sync::Arc, vec, vec::Vec};
use core::sync::atomic::{AtomicUsize, Ordering};
use kern::{
    KernelError, debug,
    fs::{FileSystem, Object},
    info,
    sync::SpinLock,
    syscall::flags::{OpenFlags, Whence},
    teletype::Teletype,
    warning,
};

/// Every table of the subsystem. Only reachable with the subsystem lock held.
struct FileTables {
    system: SystemOpenTable,
    groups: DupGroups,
    processes: BTreeMap<Pid, FileStruct>,
}

/// What a read or write resolved to under the lock.
enum Transfer {
    Done(usize),
    Console,
}

impl FileTables {
    fn process(&self, pid: Pid) -> Result<&FileStruct, KernelError> {
        self.processes.get(&pid).ok_or(KernelError::NoSuchEntry)
    }

    fn slot(&self, pid: Pid, fd: FileDescriptor) -> Result<FileSlot, KernelError> {
        self.process(pid)?.get(fd)
    }

    fn object_of(&self, gid: DupGroupId) -> Result<Object, KernelError> {
        self.system
            .object(self.groups.get(gid).entry)
            .map(Object::clone)
    }

    /// Installs a fresh duplicate group at the lowest free descriptor.
    fn install_new(
        &mut self,
        pid: Pid,
        entry: EntryId,
        offset: usize,
        mode: AccessMode,
    ) -> Result<FileDescriptor, KernelError> {
        let table = self
            .processes
            .get_mut(&pid)
            .ok_or(KernelError::NoSuchEntry)?;
        let fd = table.lowest_free()?;
        let gid = self.groups.create(entry, offset, mode, (pid, fd))?;
        if let Err(e) = table.install(fd, FileSlot::Open(gid)) {
            self.groups.leave(gid, (pid, fd));
            return Err(e);
        }
        Ok(fd)
    }

    fn close_fd(&mut self, pid: Pid, fd: FileDescriptor) -> Result<(), KernelError> {
        let table = self
            .processes
            .get_mut(&pid)
            .ok_or(KernelError::NoSuchEntry)?;
        match table.take(fd)? {
            FileSlot::Stdio(_) => Ok(()),
            FileSlot::Open(gid) => {
                let entry = self.groups.leave(gid, (pid, fd));
                if self.system.release_entry(entry) {
                    debug!("fdtable: entry {} released", entry.index());
                }
                Ok(())
            }
        }
    }

    fn dup2(
        &mut self,
        pid: Pid,
        old: FileDescriptor,
        new: FileDescriptor,
    ) -> Result<FileDescriptor, KernelError> {
        let table = self.process(pid)?;
        table.check_range(old)?;
        table.check_range(new)?;
        let slot = table.get(old)?;
        if old == new {
            return Ok(new);
        }
        if table.is_open(new) {
            // The slot was just seen populated; a failure here has nothing
            // left to undo.
            let _ = self.close_fd(pid, new);
        }
        self.processes
            .get_mut(&pid)
            .ok_or(KernelError::NoSuchEntry)?
            .install(new, slot)?;
        if let FileSlot::Open(gid) = slot {
            self.system.retain(self.groups.get(gid).entry);
            self.groups.join(gid, (pid, new));
        }
        Ok(new)
    }

    fn seek(
        &mut self,
        pid: Pid,
        fd: FileDescriptor,
        position: isize,
        whence: usize,
    ) -> Result<usize, KernelError> {
        let gid = match self.slot(pid, fd)? {
            FileSlot::Stdio(_) => return Err(KernelError::IllegalSeek),
            FileSlot::Open(gid) => gid,
        };
        let stat = self.object_of(gid)?.stat();
        if !stat.kind.is_seekable() {
            return Err(KernelError::IllegalSeek);
        }
        let whence = Whence::try_from(whence).map_err(|_| KernelError::InvalidArgument)?;
        let base = match whence {
            Whence::Set => 0,
            Whence::Current => self.groups.get(gid).offset,
            Whence::End => stat.size,
        };
        let offset = base as i128 + position as i128;
        if offset < 0 {
            return Err(KernelError::InvalidArgument);
        }
        let offset = usize::try_from(offset).map_err(|_| KernelError::InvalidArgument)?;
        self.groups.get_mut(gid).offset = offset;
        Ok(offset)
    }

    fn fork(&mut self, parent: Pid, child: Pid) -> Result<usize, KernelError> {
        let table = self.process(parent)?.clone();
        if self.processes.contains_key(&child) {
            return Err(KernelError::Busy);
        }
        let mut inherited = 0;
        for (fd, slot) in table.iter() {
            if let FileSlot::Open(gid) = slot {
                self.system.retain(self.groups.get(gid).entry);
                self.groups.join(gid, (child, fd));
                inherited += 1;
            }
        }
        self.processes.insert(child, table);
        Ok(inherited)
    }

    fn teardown(&mut self, pid: Pid) -> Result<usize, KernelError> {
        let table = self
            .processes
            .remove(&pid)
            .ok_or(KernelError::NoSuchEntry)?;
        let mut closed = 0;
        for (fd, slot) in table.iter() {
            if let FileSlot::Open(gid) = slot {
                let entry = self.groups.leave(gid, (pid, fd));
                self.system.release_entry(entry);
                closed += 1;
            }
        }
        Ok(closed)
    }
}

/// The open-file subsystem.
pub struct FileDescriptorService {
    config: FileTableConfig,
    fs: FileSystem,
    tty: Arc<dyn Teletype>,
    tables: SpinLock<FileTables>,
    next_pid: AtomicUsize,
}

impl FileDescriptorService {
    /// Builds the subsystem with the default capacities.
    pub fn new(fs: FileSystem, tty: Arc<dyn Teletype>) -> Result<Self, KernelError> {
        FileTableConfig::new().build(fs, tty)
    }

    pub(crate) fn with_config(
        config: FileTableConfig,
        fs: FileSystem,
        tty: Arc<dyn Teletype>,
    ) -> Result<Self, KernelError> {
        let system = SystemOpenTable::new(config.system_open_max)?;
        info!(
            "fdtable: {} system entries, {} handles per process.",
            config.system_open_max, config.open_max
        );
        Ok(Self {
            config,
            fs,
            tty,
            tables: SpinLock::new(FileTables {
                system,
                groups: DupGroups::new(),
                processes: BTreeMap::new(),
            }),
            next_pid: AtomicUsize::new(1),
        })
    }

    /// The capacities the subsystem was built with.
    pub fn config(&self) -> FileTableConfig {
        self.config
    }

    fn with_tables<R>(
        &self,
        f: impl FnOnce(&mut FileTables) -> Result<R, KernelError>,
    ) -> Result<R, KernelError> {
        let mut guard = self.tables.lock();
        let result = f(&mut guard);
        guard.unlock();
        result
    }

    /// Opens `path` for process `pid` and returns the new descriptor.
    ///
    /// The descriptor is the lowest unused one above the standard streams. If
    /// the object is already open anywhere in the system, the open coalesces
    /// onto its entry. With `O_APPEND` the cursor starts at the end of the
    /// object.
    ///
    /// # Errors
    /// - Whatever the filesystem reports for `path`, unchanged.
    /// - [`KernelError::TooManyOpenFileInSystem`]: the system table is full.
    /// - [`KernelError::TooManyOpenFile`]: the process table is full.
    pub fn open(
        &self,
        pid: Pid,
        path: &str,
        flags: OpenFlags,
        mode: u32,
    ) -> Result<FileDescriptor, KernelError> {
        let access = AccessMode::from_open_flags(flags)?;
        self.with_tables(|t| {
            t.process(pid)?;
            let object = self.fs.open(path, flags, mode).inspect_err(|e| {
                debug!("fdtable: open({}) failed: {:?}", path, e);
            })?;
            let entry = match t.system.acquire_entry(&object) {
                Ok(entry) => entry,
                Err(e) => {
                    warning!("fdtable: system open table is full.");
                    object.close();
                    return Err(e);
                }
            };
            let offset = if access.contains(AccessMode::APPEND) {
                object.size()
            } else {
                0
            };
            match t.install_new(pid, entry, offset, access) {
                Ok(fd) => {
                    debug!(
                        "fdtable: pid {} opened {} as fd {} (entry {}).",
                        pid.0,
                        path,
                        fd.0,
                        entry.index()
                    );
                    Ok(fd)
                }
                Err(e) => {
                    if e == KernelError::TooManyOpenFile {
                        warning!("fdtable: pid {} has no free descriptor.", pid.0);
                    }
                    t.system.release_entry(entry);
                    Err(e)
                }
            }
        })
    }

    /// Closes `fd` of process `pid`.
    ///
    /// Closing a standard stream frees its slot without touching the system
    /// table. Closing an unused descriptor fails with
    /// [`KernelError::BadFileDescriptor`].
    pub fn close(&self, pid: Pid, fd: FileDescriptor) -> Result<(), KernelError> {
        self.with_tables(|t| t.close_fd(pid, fd))
    }

    /// Checks that `fd` of `pid` is open for every direction in `access`.
    pub fn check_access(
        &self,
        pid: Pid,
        fd: FileDescriptor,
        access: AccessMode,
    ) -> Result<(), KernelError> {
        self.with_tables(|t| {
            let mode = match t.slot(pid, fd)? {
                FileSlot::Stdio(stream) => stream.access_mode(),
                FileSlot::Open(gid) => t.groups.get(gid).mode,
            };
            if mode.contains(access) {
                Ok(())
            } else {
                Err(KernelError::BadAccessMode)
            }
        })
    }

    /// Reads from `fd` into `buf` and advances the shared cursor.
    ///
    /// Returns the number of bytes read, which is 0 at or past the end of the
    /// object. The standard input reads until `buf` is full or a newline has
    /// been delivered.
    pub fn read(&self, pid: Pid, fd: FileDescriptor, buf: &mut [u8]) -> Result<usize, KernelError> {
        let transfer = self.with_tables(|t| match t.slot(pid, fd)? {
            FileSlot::Stdio(stream) => {
                if !stream.access_mode().contains(AccessMode::READ) {
                    return Err(KernelError::BadAccessMode);
                }
                Ok(Transfer::Console)
            }
            FileSlot::Open(gid) => {
                let group = t.groups.get(gid);
                if !group.mode.contains(AccessMode::READ) {
                    return Err(KernelError::BadAccessMode);
                }
                if buf.is_empty() {
                    return Ok(Transfer::Done(0));
                }
                let offset = group.offset;
                let n = t.object_of(gid)?.read(offset, buf)?;
                t.groups.get_mut(gid).offset = offset + n;
                Ok(Transfer::Done(n))
            }
        })?;
        match transfer {
            Transfer::Done(n) => Ok(n),
            Transfer::Console => self.tty.read(buf),
        }
    }

    /// Writes `buf` to `fd` and advances the shared cursor.
    ///
    /// For a descriptor opened with `O_APPEND` the write goes to the size the
    /// object has right before the write. Returns the number of bytes
    /// written.
    pub fn write(&self, pid: Pid, fd: FileDescriptor, buf: &[u8]) -> Result<usize, KernelError> {
        let transfer = self.with_tables(|t| match t.slot(pid, fd)? {
            FileSlot::Stdio(stream) => {
                if !stream.access_mode().contains(AccessMode::WRITE) {
                    return Err(KernelError::BadAccessMode);
                }
                Ok(Transfer::Console)
            }
            FileSlot::Open(gid) => {
                let group = t.groups.get(gid);
                if !group.mode.contains(AccessMode::WRITE) {
                    return Err(KernelError::BadAccessMode);
                }
                if buf.is_empty() {
                    return Ok(Transfer::Done(0));
                }
                let append = group.mode.contains(AccessMode::APPEND);
                let object = t.object_of(gid)?;
                let offset = if append {
                    object.size()
                } else {
                    t.groups.get(gid).offset
                };
                let n = object.write(offset, buf)?;
                t.groups.get_mut(gid).offset = offset + n;
                Ok(Transfer::Done(n))
            }
        })?;
        match transfer {
            Transfer::Done(n) => Ok(n),
            Transfer::Console => self.tty.write(buf),
        }
    }

    /// Moves the shared cursor of `fd` and returns the new offset.
    ///
    /// `whence` is the raw value passed by the user, one of [`Whence`]. The
    /// errors are checked in this order:
    ///
    /// # Errors
    /// - [`KernelError::BadFileDescriptor`]: `fd` is out of range or unused.
    /// - [`KernelError::IllegalSeek`]: `fd` is a standard stream or a device.
    /// - [`KernelError::InvalidArgument`]: `whence` is unknown, or the offset
    ///   would be negative. The cursor is left where it was.
    pub fn seek(
        &self,
        pid: Pid,
        fd: FileDescriptor,
        position: isize,
        whence: usize,
    ) -> Result<usize, KernelError> {
        self.with_tables(|t| t.seek(pid, fd, position, whence))
    }

    /// Returns the cursor of `fd`.
    pub fn tell(&self, pid: Pid, fd: FileDescriptor) -> Result<usize, KernelError> {
        self.with_tables(|t| match t.slot(pid, fd)? {
            FileSlot::Stdio(_) => Err(KernelError::IllegalSeek),
            FileSlot::Open(gid) => Ok(t.groups.get(gid).offset),
        })
    }

    /// Makes `new` refer to what `old` refers to.
    ///
    /// `new` joins the duplicate group of `old`. If `new` was open it is
    /// closed first, after `old` has been validated. Duplicating a descriptor
    /// onto itself does nothing.
    pub fn dup2(
        &self,
        pid: Pid,
        old: FileDescriptor,
        new: FileDescriptor,
    ) -> Result<FileDescriptor, KernelError> {
        self.with_tables(|t| t.dup2(pid, old, new))
    }

    /// Returns the working directory.
    pub fn getcwd(&self) -> Result<String, KernelError> {
        self.with_tables(|_| self.fs.getcwd())
    }

    /// Removes `path`.
    ///
    /// Any failure of the filesystem is reported as
    /// [`KernelError::OperationNotPermitted`].
    pub fn remove(&self, path: &str) -> Result<(), KernelError> {
        self.with_tables(|_| {
            self.fs.remove(path).map_err(|e| {
                warning!("fdtable: remove({}) failed: {:?}", path, e);
                KernelError::OperationNotPermitted
            })
        })
    }

    /// Creates the file table of process `pid` with the standard streams
    /// bound.
    ///
    /// Fails with [`KernelError::Busy`] if `pid` already has one.
    pub fn create_process(&self, pid: Pid) -> Result<(), KernelError> {
        let open_max = self.config.open_max;
        self.with_tables(|t| {
            if t.processes.contains_key(&pid) {
                return Err(KernelError::Busy);
            }
            t.processes.insert(pid, FileStruct::new(open_max)?);
            Ok(())
        })?;
        debug!("fdtable: pid {} created.", pid.0);
        Ok(())
    }

    /// Gives process `child` every descriptor of `parent`.
    ///
    /// Each inherited descriptor joins the duplicate group of the parent's,
    /// so the two processes share cursors.
    pub fn fork_process(&self, parent: Pid, child: Pid) -> Result<(), KernelError> {
        let inherited = self.with_tables(|t| t.fork(parent, child))?;
        debug!(
            "fdtable: pid {} forked into pid {} ({} shared).",
            parent.0, child.0, inherited
        );
        Ok(())
    }

    /// Closes every descriptor of `pid` and drops its table.
    pub fn teardown_process(&self, pid: Pid) -> Result<(), KernelError> {
        let closed = self.with_tables(|t| t.teardown(pid))?;
        debug!("fdtable: pid {} torn down ({} closed).", pid.0, closed);
        Ok(())
    }

    fn allocate_pid(
        &self,
        mut attempt: impl FnMut(Pid) -> Result<(), KernelError>,
    ) -> Result<Pid, KernelError> {
        loop {
            let pid = Pid(self.next_pid.fetch_add(1, Ordering::SeqCst));
            match attempt(pid) {
                Err(KernelError::Busy) => continue,
                r => return r.map(|_| pid),
            }
        }
    }

    /// Creates a process under a fresh pid.
    pub fn spawn(&self) -> Result<Pid, KernelError> {
        self.allocate_pid(|pid| self.create_process(pid))
    }

    /// Forks `parent` into a fresh pid.
    pub fn fork(&self, parent: Pid) -> Result<Pid, KernelError> {
        self.allocate_pid(|child| self.fork_process(parent, child))
    }

    /// Number of handles that point at the entry of `object`. 0 if the object
    /// is not open.
    pub fn entry_refcount(&self, object: &Object) -> usize {
        self.with_tables(|t| {
            Ok(t.system
                .find(object)
                .map(|id| t.system.get(id).ref_count())
                .unwrap_or(0))
        })
        .unwrap_or(0)
    }

    /// Number of entries in use in the system open table.
    pub fn open_entries(&self) -> usize {
        self.with_tables(|t| Ok(t.system.in_use())).unwrap_or(0)
    }

    /// The descriptors that share the cursor of `fd`, including `fd` itself.
    pub fn group_members(
        &self,
        pid: Pid,
        fd: FileDescriptor,
    ) -> Result<Vec<(Pid, FileDescriptor)>, KernelError> {
        self.with_tables(|t| match t.slot(pid, fd)? {
            FileSlot::Stdio(_) => Ok(vec![(pid, fd)]),
            FileSlot::Open(gid) => Ok(t.groups.get(gid).members().copied().collect()),
        })
    }
}
