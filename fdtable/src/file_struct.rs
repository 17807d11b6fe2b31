//! # Per-process file tables and duplicate groups.
//!
//! A process names its open files with small integers, the
//! [`FileDescriptor`]s. Each process owns a [`FileStruct`] with a fixed number
//! of slots, one per descriptor. A populated slot is either one of the
//! standard streams, which go straight to the console, or a member of a
//! [`DupGroup`].
//!
//! A duplicate group is the record that an `open` produces: which system
//! entry the handle refers to, the cursor into the object, and the access
//! mode. Every descriptor later made from it by `dup2` or by `fork` joins the
//! same group instead of copying it, so moving the cursor through any member
//! is seen by all of them, in every process that holds one.
//!
//! ```text
//!   pid 1 fd 3 ---+
//!   pid 1 fd 5 ---+--> DupGroup { entry: #0, offset: 42, mode: RW }
//!   pid 2 fd 3 ---+
//! ```
//!
//! Groups live in the [`DupGroups`] arena and are named by [`DupGroupId`].
//! A group is dissolved when its last member is closed.
//!
//! The standard streams are bound at process creation:
//!
//! | Descriptor | Stream | Direction  |
//! |------------|--------|------------|
//! | 0          | stdin  | read-only  |
//! | 1          | stdout | write-only |
//! | 2          | stderr | write-only |
//!
//! They have no system entry and no cursor.

use crate::{
    config::{RESERVED_FDS, STDERR_FILENO, STDIN_FILENO, STDOUT_FILENO},
    open_file_table::EntryId,
};
use alloc::{collections::BTreeSet, vec::Vec};
use kern::{KernelError, syscall::flags::OpenFlags};

/// Identifier of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(pub usize);

/// A handle that a process uses to name an open file.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
pub struct FileDescriptor(pub i32);

impl FileDescriptor {
    /// Interprets a raw syscall argument as a descriptor.
    ///
    /// Arguments that do not fit in an `i32` become `-1`, which no table
    /// accepts.
    pub fn from_raw(raw: usize) -> Self {
        Self(i32::try_from(raw as isize).unwrap_or(-1))
    }
}

bitflags::bitflags! {
    /// Access mode of a duplicate group, fixed at open time.
    pub struct AccessMode: u8 {
        /// Reads are allowed.
        const READ = 1;
        /// Writes are allowed.
        const WRITE = 2;
        /// Every write lands at the end of the object.
        const APPEND = 4;
    }
}

impl AccessMode {
    /// Derives the access mode from the flags passed to `open`.
    pub fn from_open_flags(flags: OpenFlags) -> Result<Self, KernelError> {
        let file_mode = flags.file_mode()?;
        let mut mode = AccessMode::empty();
        mode.set(AccessMode::READ, file_mode.readable());
        mode.set(AccessMode::WRITE, file_mode.writable());
        mode.set(AccessMode::APPEND, flags.contains(OpenFlags::O_APPEND));
        Ok(mode)
    }
}

/// One of the standard streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stdio {
    /// Standard input.
    Stdin,
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

impl Stdio {
    /// The direction the stream may be used in.
    pub fn access_mode(&self) -> AccessMode {
        match self {
            Stdio::Stdin => AccessMode::READ,
            Stdio::Stdout | Stdio::Stderr => AccessMode::WRITE,
        }
    }
}

/// A populated slot of a [`FileStruct`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSlot {
    /// A standard stream, routed to the console.
    Stdio(Stdio),
    /// A member of a duplicate group.
    Open(DupGroupId),
}

/// The file table of one process.
///
/// Slot `i` holds descriptor `i`. The table never grows or shrinks.
#[derive(Debug, Clone)]
pub struct FileStruct {
    slots: Vec<Option<FileSlot>>,
}

impl FileStruct {
    /// Creates a table with `open_max` slots and the standard streams bound to
    /// descriptors 0, 1 and 2.
    pub fn new(open_max: usize) -> Result<Self, KernelError> {
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(open_max)
            .map_err(|_| KernelError::NoMemory)?;
        slots.resize(open_max, None);
        for (fd, stream) in [
            (STDIN_FILENO, Stdio::Stdin),
            (STDOUT_FILENO, Stdio::Stdout),
            (STDERR_FILENO, Stdio::Stderr),
        ] {
            if let Some(slot) = slots.get_mut(fd as usize) {
                *slot = Some(FileSlot::Stdio(stream));
            }
        }
        Ok(Self { slots })
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn index(&self, fd: FileDescriptor) -> Result<usize, KernelError> {
        usize::try_from(fd.0)
            .ok()
            .filter(|idx| *idx < self.slots.len())
            .ok_or(KernelError::BadFileDescriptor)
    }

    /// Checks that `fd` is within the table.
    pub fn check_range(&self, fd: FileDescriptor) -> Result<(), KernelError> {
        self.index(fd).map(|_| ())
    }

    /// Returns the slot of `fd`.
    ///
    /// Fails with [`KernelError::BadFileDescriptor`] if `fd` is out of range
    /// or unused.
    pub fn get(&self, fd: FileDescriptor) -> Result<FileSlot, KernelError> {
        let idx = self.index(fd)?;
        self.slots[idx].ok_or(KernelError::BadFileDescriptor)
    }

    /// Whether `fd` is populated.
    pub fn is_open(&self, fd: FileDescriptor) -> bool {
        self.get(fd).is_ok()
    }

    /// The lowest unused descriptor above the standard streams.
    pub fn lowest_free(&self) -> Result<FileDescriptor, KernelError> {
        self.slots
            .iter()
            .enumerate()
            .skip(RESERVED_FDS)
            .find(|(_, slot)| slot.is_none())
            .map(|(idx, _)| FileDescriptor(idx as i32))
            .ok_or(KernelError::TooManyOpenFile)
    }

    /// Populates `fd`, which must be in range and unused.
    pub fn install(&mut self, fd: FileDescriptor, slot: FileSlot) -> Result<(), KernelError> {
        let idx = self.index(fd)?;
        match self.slots[idx] {
            Some(_) => Err(KernelError::Busy),
            None => {
                self.slots[idx] = Some(slot);
                Ok(())
            }
        }
    }

    /// Empties `fd` and returns what it held.
    pub fn take(&mut self, fd: FileDescriptor) -> Result<FileSlot, KernelError> {
        let idx = self.index(fd)?;
        self.slots[idx].take().ok_or(KernelError::BadFileDescriptor)
    }

    /// Iterates over the populated slots in descriptor order.
    pub fn iter(&self) -> impl Iterator<Item = (FileDescriptor, FileSlot)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.map(|slot| (FileDescriptor(idx as i32), slot)))
    }
}

/// Index of a [`DupGroup`] in the [`DupGroups`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DupGroupId(usize);

/// The offset and mode shared by every descriptor duplicated from one open.
#[derive(Debug)]
pub struct DupGroup {
    /// The system entry the members refer to.
    pub entry: EntryId,
    /// Cursor into the object.
    pub offset: usize,
    /// Access mode, fixed at open time.
    pub mode: AccessMode,
    members: BTreeSet<(Pid, FileDescriptor)>,
}

impl DupGroup {
    /// The descriptors that share this group.
    pub fn members(&self) -> impl Iterator<Item = &(Pid, FileDescriptor)> {
        self.members.iter()
    }
}

/// Arena of the live [`DupGroup`]s.
///
/// Freed indices are reused lowest first.
#[derive(Debug, Default)]
pub struct DupGroups {
    groups: Vec<Option<DupGroup>>,
    free: BTreeSet<usize>,
}

impl DupGroups {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a group for a fresh open, with `member` as its only member.
    pub fn create(
        &mut self,
        entry: EntryId,
        offset: usize,
        mode: AccessMode,
        member: (Pid, FileDescriptor),
    ) -> Result<DupGroupId, KernelError> {
        let mut members = BTreeSet::new();
        members.insert(member);
        let group = DupGroup {
            entry,
            offset,
            mode,
            members,
        };
        if let Some(idx) = self.free.pop_first() {
            self.groups[idx] = Some(group);
            return Ok(DupGroupId(idx));
        }
        self.groups
            .try_reserve(1)
            .map_err(|_| KernelError::NoMemory)?;
        self.groups.push(Some(group));
        Ok(DupGroupId(self.groups.len() - 1))
    }

    /// Returns the group `id`.
    pub fn get(&self, id: DupGroupId) -> &DupGroup {
        self.groups[id.0]
            .as_ref()
            .unwrap_or_else(|| panic!("{:?} is not a live group", id))
    }

    /// Returns the group `id` mutably.
    pub fn get_mut(&mut self, id: DupGroupId) -> &mut DupGroup {
        self.groups[id.0]
            .as_mut()
            .unwrap_or_else(|| panic!("{:?} is not a live group", id))
    }

    /// Adds `member` to the group `id`.
    pub fn join(&mut self, id: DupGroupId, member: (Pid, FileDescriptor)) {
        self.get_mut(id).members.insert(member);
    }

    /// Removes `member` from the group `id`, dissolving the group when it was
    /// the last one.
    ///
    /// Returns the system entry of the group.
    pub fn leave(&mut self, id: DupGroupId, member: (Pid, FileDescriptor)) -> EntryId {
        let group = self.get_mut(id);
        let removed = group.members.remove(&member);
        assert!(removed, "{:?} is not a member of {:?}", member, id);
        let entry = group.entry;
        if group.members.is_empty() {
            self.groups[id.0] = None;
            self.free.insert(id.0);
        }
        entry
    }

    /// Number of live groups.
    pub fn len(&self) -> usize {
        self.groups.iter().filter(|g| g.is_some()).count()
    }

    /// Whether no group is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
