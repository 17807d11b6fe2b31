use alloc::{sync::Arc, vec::Vec};
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use kern::{
    KernelError,
    fs::{InodeNumber, ObjectKind},
    sync::SpinLock,
};

/// Counters of one inode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeStats {
    /// Inode number.
    pub ino: u32,
    /// Type of the node.
    pub kind: ObjectKind,
    /// Current size in bytes.
    pub size: usize,
    /// Permission bits given at creation.
    pub perm: u32,
    /// How many times the node was opened.
    pub opens: usize,
    /// How many times an object of the node was released.
    pub closes: usize,
}

pub(crate) struct Node {
    pub(crate) ino: InodeNumber,
    pub(crate) kind: ObjectKind,
    perm: u32,
    data: SpinLock<Vec<u8>>,
    opens: AtomicUsize,
    closes: AtomicUsize,
    unlinked: AtomicBool,
}

impl Node {
    pub(crate) fn new(ino: InodeNumber, kind: ObjectKind, perm: u32) -> Self {
        Self {
            ino,
            kind,
            perm,
            data: SpinLock::new(Vec::new()),
            opens: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            unlinked: AtomicBool::new(false),
        }
    }

    pub(crate) fn size(&self) -> usize {
        let data = self.data.lock();
        let size = data.len();
        data.unlock();
        size
    }

    pub(crate) fn replace(&self, contents: &[u8]) {
        let mut data = self.data.lock();
        data.clear();
        data.extend_from_slice(contents);
        data.unlock();
    }

    pub(crate) fn snapshot(&self) -> Vec<u8> {
        let data = self.data.lock();
        let contents = data.clone();
        data.unlock();
        contents
    }

    pub(crate) fn opened(&self) {
        self.opens.fetch_add(1, Ordering::SeqCst);
    }

    /// Marks the node as removed from the tree.
    pub(crate) fn mark_unlinked(&self) {
        self.unlinked.store(true, Ordering::SeqCst);
        self.reclaim();
    }

    // An unlinked node with no live object keeps only its counters.
    fn reclaim(&self) {
        if self.unlinked.load(Ordering::SeqCst)
            && self.closes.load(Ordering::SeqCst) >= self.opens.load(Ordering::SeqCst)
        {
            let mut data = self.data.lock();
            *data = Vec::new();
            data.unlock();
        }
    }

    pub(crate) fn stats(&self) -> NodeStats {
        NodeStats {
            ino: self.ino.into_u32(),
            kind: self.kind,
            size: self.size(),
            perm: self.perm,
            opens: self.opens.load(Ordering::SeqCst),
            closes: self.closes.load(Ordering::SeqCst),
        }
    }
}

/// An open node of [`MemFs`](crate::MemFs).
pub struct MemObject(pub(crate) Arc<Node>);

impl kern::fs::traits::Object for MemObject {
    fn ino(&self) -> InodeNumber {
        self.0.ino
    }

    fn kind(&self) -> ObjectKind {
        self.0.kind
    }

    fn size(&self) -> usize {
        self.0.size()
    }

    fn read_at(&self, position: usize, buf: &mut [u8]) -> Result<usize, KernelError> {
        match self.0.kind {
            ObjectKind::Directory => Err(KernelError::IsDirectory),
            ObjectKind::CharDevice | ObjectKind::BlockDevice => Ok(0),
            ObjectKind::RegularFile => {
                let data = self.0.data.lock();
                let n = if position >= data.len() {
                    0
                } else {
                    let n = buf.len().min(data.len() - position);
                    buf[..n].copy_from_slice(&data[position..position + n]);
                    n
                };
                data.unlock();
                Ok(n)
            }
        }
    }

    fn write_at(&self, position: usize, buf: &[u8]) -> Result<usize, KernelError> {
        match self.0.kind {
            ObjectKind::Directory => Err(KernelError::IsDirectory),
            ObjectKind::CharDevice | ObjectKind::BlockDevice => Ok(buf.len()),
            ObjectKind::RegularFile => {
                let end = position
                    .checked_add(buf.len())
                    .ok_or(KernelError::InvalidArgument)?;
                let mut data = self.0.data.lock();
                let len = data.len();
                let result = if end > len {
                    data.try_reserve(end - len)
                        .map_err(|_| KernelError::NoSpace)
                } else {
                    Ok(())
                };
                if result.is_ok() {
                    if end > data.len() {
                        data.resize(end, 0);
                    }
                    data[position..end].copy_from_slice(buf);
                }
                data.unlock();
                result.map(|_| buf.len())
            }
        }
    }

    fn close(&self) {
        self.0.closes.fetch_add(1, Ordering::SeqCst);
        self.0.reclaim();
    }
}
