//! A memory-resident filesystem.
//!
//! `mem_fs` keeps a tree of directories, regular files and device nodes in
//! kernel memory. It is the storage layer the open-file subsystem is booted
//! with when no disk is attached, and it records how often every inode was
//! opened and released so that reference counting above it can be checked.
//!
//! Paths are `/`-separated. Relative paths resolve against the working
//! directory, which starts at `/`. `.` and `..` are honored; `..` of the root
//! is the root.
//!
//! The filesystem is bound to the kernel's storage contract in
//! [`kern_binder`].
#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod kern_binder;
mod node;

pub use node::{MemObject, NodeStats};

use alloc::{
    collections::BTreeMap,
    string::{String, ToString},
    sync::Arc,
    vec::Vec,
};
use core::sync::atomic::{AtomicU32, Ordering};
use kern::{
    fs::{InodeNumber, ObjectKind},
    sync::SpinLock,
};
use node::Node;

/// Errors of the memory filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The path does not name an existing node.
    NotFound,
    /// The node to create already exists.
    Exists,
    /// A path component that must be a directory is not one.
    NotDirectory,
    /// A directory was opened for writing.
    IsDirectory,
    /// The directory to remove still has entries.
    NotEmpty,
    /// The root directory cannot be removed.
    Busy,
    /// The path is empty.
    InvalidPath,
}

struct Inner {
    // Absolute, normalized path to node. The root is "/".
    tree: SpinLock<BTreeMap<String, Arc<Node>>>,
    // Every inode ever created, including unlinked ones.
    inodes: SpinLock<BTreeMap<u32, Arc<Node>>>,
    cwd: SpinLock<String>,
    next_ino: AtomicU32,
}

/// A memory-resident filesystem.
///
/// Clones share the same tree.
#[derive(Clone)]
pub struct MemFs(Arc<Inner>);

impl Default for MemFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemFs {
    /// Creates a filesystem holding the root directory, `/dev`, and the
    /// character devices `/dev/null` and `/dev/tty`.
    pub fn new() -> Self {
        let fs = MemFs(Arc::new(Inner {
            tree: SpinLock::new(BTreeMap::new()),
            inodes: SpinLock::new(BTreeMap::new()),
            cwd: SpinLock::new(String::from("/")),
            next_ino: AtomicU32::new(1),
        }));
        let root = fs.alloc_node(ObjectKind::Directory, 0o755);
        let mut tree = fs.0.tree.lock();
        tree.insert(String::from("/"), root);
        tree.unlock();
        // The fresh tree only holds the root, so these cannot collide.
        let _ = fs.mkdir("/dev");
        let _ = fs.mknod("/dev/null", ObjectKind::CharDevice);
        let _ = fs.mknod("/dev/tty", ObjectKind::CharDevice);
        fs
    }

    fn alloc_node(&self, kind: ObjectKind, perm: u32) -> Arc<Node> {
        let ino = loop {
            if let Some(ino) = InodeNumber::new(self.0.next_ino.fetch_add(1, Ordering::SeqCst)) {
                break ino;
            }
        };
        let node = Arc::new(Node::new(ino, kind, perm));
        let mut inodes = self.0.inodes.lock();
        inodes.insert(ino.into_u32(), node.clone());
        inodes.unlock();
        node
    }

    /// Normalizes `path` into an absolute path against the working directory.
    pub fn absolute(&self, path: &str) -> Result<String, Error> {
        if path.is_empty() {
            return Err(Error::InvalidPath);
        }
        let mut parts: Vec<&str> = Vec::new();
        let cwd_guard = self.0.cwd.lock();
        let cwd = cwd_guard.clone();
        cwd_guard.unlock();
        let joined;
        let full = if path.starts_with('/') {
            path
        } else {
            joined = alloc::format!("{}/{}", cwd, path);
            joined.as_str()
        };
        for part in full.split('/') {
            match part {
                "" | "." => (),
                ".." => {
                    parts.pop();
                }
                p => parts.push(p),
            }
        }
        let mut out = String::new();
        for part in parts {
            out.push('/');
            out.push_str(part);
        }
        if out.is_empty() {
            out.push('/');
        }
        Ok(out)
    }

    fn parent_of(abs: &str) -> &str {
        match abs.rfind('/') {
            Some(0) | None => "/",
            Some(i) => &abs[..i],
        }
    }

    fn lookup_locked(tree: &BTreeMap<String, Arc<Node>>, abs: &str) -> Result<Arc<Node>, Error> {
        tree.get(abs).cloned().ok_or(Error::NotFound)
    }

    fn create_locked(
        &self,
        tree: &mut BTreeMap<String, Arc<Node>>,
        abs: &str,
        kind: ObjectKind,
        perm: u32,
    ) -> Result<Arc<Node>, Error> {
        if tree.contains_key(abs) {
            return Err(Error::Exists);
        }
        let parent = Self::lookup_locked(tree, Self::parent_of(abs))?;
        if parent.kind != ObjectKind::Directory {
            return Err(Error::NotDirectory);
        }
        let node = self.alloc_node(kind, perm);
        tree.insert(abs.to_string(), node.clone());
        Ok(node)
    }

    fn create(&self, path: &str, kind: ObjectKind, perm: u32) -> Result<Arc<Node>, Error> {
        let abs = self.absolute(path)?;
        let mut tree = self.0.tree.lock();
        let result = self.create_locked(&mut tree, &abs, kind, perm);
        tree.unlock();
        result
    }

    /// Creates a directory.
    pub fn mkdir(&self, path: &str) -> Result<(), Error> {
        self.create(path, ObjectKind::Directory, 0o755).map(|_| ())
    }

    /// Creates a device node of the given kind.
    ///
    /// Device nodes read as empty and discard writes.
    pub fn mknod(&self, path: &str, kind: ObjectKind) -> Result<(), Error> {
        self.create(path, kind, 0o666).map(|_| ())
    }

    /// Creates a regular file holding `data`, replacing nothing.
    pub fn create_file(&self, path: &str, data: &[u8]) -> Result<(), Error> {
        let node = self.create(path, ObjectKind::RegularFile, 0o644)?;
        node.replace(data);
        Ok(())
    }

    /// Changes the working directory.
    pub fn chdir(&self, path: &str) -> Result<(), Error> {
        let abs = self.absolute(path)?;
        let tree = self.0.tree.lock();
        let result = Self::lookup_locked(&tree, &abs);
        tree.unlock();
        if result?.kind != ObjectKind::Directory {
            return Err(Error::NotDirectory);
        }
        let mut cwd = self.0.cwd.lock();
        *cwd = abs;
        cwd.unlock();
        Ok(())
    }

    /// Returns the working directory.
    pub fn cwd(&self) -> String {
        let cwd = self.0.cwd.lock();
        let path = cwd.clone();
        cwd.unlock();
        path
    }

    /// Looks up `path`, creating a regular file when `create` is set.
    ///
    /// With `exclusive`, an existing node fails with [`Error::Exists`].
    pub(crate) fn resolve(
        &self,
        path: &str,
        create: bool,
        exclusive: bool,
        perm: u32,
    ) -> Result<Arc<Node>, Error> {
        let abs = self.absolute(path)?;
        let mut tree = self.0.tree.lock();
        let result = match Self::lookup_locked(&tree, &abs) {
            Ok(_) if create && exclusive => Err(Error::Exists),
            Ok(node) => Ok(node),
            Err(Error::NotFound) if create => {
                self.create_locked(&mut tree, &abs, ObjectKind::RegularFile, perm)
            }
            Err(e) => Err(e),
        };
        tree.unlock();
        result
    }

    /// Unlinks `path`. Open objects of the node stay usable.
    pub fn unlink(&self, path: &str) -> Result<(), Error> {
        let abs = self.absolute(path)?;
        if abs == "/" {
            return Err(Error::Busy);
        }
        let mut tree = self.0.tree.lock();
        let result = Self::lookup_locked(&tree, &abs).and_then(|node| {
            if node.kind == ObjectKind::Directory {
                let prefix = alloc::format!("{}/", abs);
                if tree.keys().any(|k| k.starts_with(&prefix)) {
                    return Err(Error::NotEmpty);
                }
            }
            tree.remove(&abs);
            Ok(node)
        });
        tree.unlock();
        result.map(|node| node.mark_unlinked())
    }

    /// Returns the contents of the regular file at `path`.
    pub fn contents(&self, path: &str) -> Result<Vec<u8>, Error> {
        let abs = self.absolute(path)?;
        let tree = self.0.tree.lock();
        let result = Self::lookup_locked(&tree, &abs);
        tree.unlock();
        Ok(result?.snapshot())
    }

    /// Returns the statistics of the node currently at `path`.
    pub fn stats(&self, path: &str) -> Result<NodeStats, Error> {
        let abs = self.absolute(path)?;
        let tree = self.0.tree.lock();
        let result = Self::lookup_locked(&tree, &abs);
        tree.unlock();
        Ok(result?.stats())
    }

    /// Returns the statistics of inode `ino`, even if it has been unlinked.
    ///
    /// An unlinked inode keeps its counters for the lifetime of the
    /// filesystem, but its contents are freed once its last object is closed.
    pub fn stats_of(&self, ino: u32) -> Option<NodeStats> {
        let inodes = self.0.inodes.lock();
        let stats = inodes.get(&ino).map(|node| node.stats());
        inodes.unlock();
        stats
    }
}
