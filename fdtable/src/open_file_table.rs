//! # The system open table.
//!
//! Every underlying object that is open anywhere in the system has exactly
//! one [`OpenFileEntry`] in the [`SystemOpenTable`]. Opening an object that
//! already has an entry does not create a second one: the open coalesces onto
//! the existing entry and bumps its reference count. Two objects are the same
//! when they compare equal, which is by inode identity and never by the path
//! they were opened through.
//!
//! The reference count of an entry is the number of process-level handles
//! that point at it, across every process. When the last handle goes away
//! the object is released with [`Object::close`] and the slot becomes free.
//!
//! ```text
//!  pid 1          pid 2              system open table
//! +-----+       +-----+         +------------------------+
//! |  3  |--+    |  3  |-------->| [0] /a   ref_count = 3 |
//! |  4  |--+--->+-----+    +--->| [1] /b   ref_count = 1 |
//! |  5  |------------------+    | [2] free               |
//! +-----+                       +------------------------+
//! ```
//!
//! The table is not synchronized on its own. It lives inside the subsystem
//! lock together with every per-process table, so both are always updated as
//! one unit.

use alloc::vec::Vec;
use kern::{KernelError, fs::Object};

/// Index of an [`OpenFileEntry`] in the [`SystemOpenTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EntryId(pub(crate) usize);

impl EntryId {
    /// The slot index of the entry.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// One slot of the system open table.
///
/// `ref_count == 0` if and only if `object` is `None`.
#[derive(Debug, Default)]
pub struct OpenFileEntry {
    object: Option<Object>,
    ref_count: usize,
}

impl OpenFileEntry {
    /// The object held by the entry, if the slot is in use.
    pub fn object(&self) -> Option<&Object> {
        self.object.as_ref()
    }

    /// Number of handles that point at this entry.
    pub fn ref_count(&self) -> usize {
        self.ref_count
    }
}

/// A fixed-capacity registry of [`OpenFileEntry`]s.
pub struct SystemOpenTable {
    entries: Vec<OpenFileEntry>,
}

impl SystemOpenTable {
    /// Creates a table of `capacity` free entries.
    pub fn new(capacity: usize) -> Result<Self, KernelError> {
        let mut entries = Vec::new();
        entries
            .try_reserve_exact(capacity)
            .map_err(|_| KernelError::NoMemory)?;
        entries.resize_with(capacity, OpenFileEntry::default);
        Ok(Self { entries })
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Registers a handle to `object`.
    ///
    /// If an entry already holds an object equal to `object`, its reference
    /// count is incremented and that entry is returned. Otherwise the lowest
    /// free slot takes `object` with a reference count of 1.
    ///
    /// Fails with [`KernelError::TooManyOpenFileInSystem`] when `object` is
    /// new and no slot is free. The caller still owns `object` in that case
    /// and must release it.
    pub fn acquire_entry(&mut self, object: &Object) -> Result<EntryId, KernelError> {
        if let Some(idx) = self
            .entries
            .iter()
            .position(|e| e.object.as_ref() == Some(object))
        {
            self.entries[idx].ref_count += 1;
            return Ok(EntryId(idx));
        }
        let idx = self
            .entries
            .iter()
            .position(|e| e.object.is_none())
            .ok_or(KernelError::TooManyOpenFileInSystem)?;
        let entry = &mut self.entries[idx];
        entry.object = Some(object.clone());
        entry.ref_count = 1;
        Ok(EntryId(idx))
    }

    /// Adds one more handle to an entry that is already in use.
    pub fn retain(&mut self, id: EntryId) {
        let entry = &mut self.entries[id.0];
        assert!(entry.ref_count > 0, "retain of a free entry {:?}", id);
        entry.ref_count += 1;
    }

    /// Drops one handle of the entry.
    ///
    /// When the count reaches zero the object is released and the slot is
    /// freed. Releasing more times than the entry was acquired is a bug in the
    /// caller and panics.
    ///
    /// Returns `true` if the object was released.
    pub fn release_entry(&mut self, id: EntryId) -> bool {
        let entry = &mut self.entries[id.0];
        assert!(entry.ref_count > 0, "double release of entry {:?}", id);
        entry.ref_count -= 1;
        if entry.ref_count == 0 {
            if let Some(object) = entry.object.take() {
                object.close();
            }
            true
        } else {
            false
        }
    }

    /// Returns the entry with the given id.
    pub fn get(&self, id: EntryId) -> &OpenFileEntry {
        &self.entries[id.0]
    }

    /// Returns the object of an entry in use.
    ///
    /// Every handle keeps its entry alive, so an [`EntryId`] taken from a
    /// populated slot always names an entry in use.
    pub fn object(&self, id: EntryId) -> Result<&Object, KernelError> {
        self.entries[id.0]
            .object
            .as_ref()
            .ok_or(KernelError::BadFileDescriptor)
    }

    /// Finds the entry holding `object`.
    pub fn find(&self, object: &Object) -> Option<EntryId> {
        self.entries
            .iter()
            .position(|e| e.object.as_ref() == Some(object))
            .map(EntryId)
    }

    /// Number of entries in use.
    pub fn in_use(&self) -> usize {
        self.entries.iter().filter(|e| e.object.is_some()).count()
    }
}
