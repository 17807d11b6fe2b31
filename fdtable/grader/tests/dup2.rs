//! Duplicating descriptors with `dup2`.

use fdtable::{FileDescriptor, SyscallNumber};
use fdtable_grader::{HELLO, Kernel};
use grading::syscall;
use kern::KernelError;

const O_RDONLY: usize = 0;
const O_RDWR: usize = 2;
const SEEK_SET: usize = 0;
const SEEK_CUR: usize = 1;

/// A duplicate shares the cursor of its original.
#[test]
fn dup2_shares_cursor() {
    let kernel = Kernel::boot();
    let (mut p, mem) = kernel.process();
    let buf = mem.alloc(8);

    let fd = syscall!(p, SyscallNumber::Open, mem.cstr("hello"), O_RDONLY).unwrap();
    assert_eq!(
        syscall!(p, SyscallNumber::Dup2, fd, 7),
        Ok(7),
        "dup2 should return the new descriptor."
    );

    // Reading through the duplicate moves the original as well.
    assert_eq!(syscall!(p, SyscallNumber::Read, 7, buf, 8), Ok(8));
    assert_eq!(mem.read(buf, 8), &HELLO[..8]);
    assert_eq!(syscall!(p, SyscallNumber::Read, fd, buf, 8), Ok(8));
    assert_eq!(mem.read(buf, 8), &HELLO[8..16]);

    // And so does seeking.
    assert_eq!(syscall!(p, SyscallNumber::Lseek, fd, 2, SEEK_SET), Ok(2));
    assert_eq!(
        syscall!(p, SyscallNumber::Lseek, 7, 0, SEEK_CUR),
        Ok(2),
        "The duplicate should observe the seek of the original."
    );

    let mut members = kernel.service.group_members(p.pid(), FileDescriptor(7)).unwrap();
    members.sort();
    assert_eq!(
        members,
        [(p.pid(), FileDescriptor(3)), (p.pid(), FileDescriptor(7))]
    );
    // One entry, two handles.
    assert_eq!(kernel.service.open_entries(), 1);
}

/// Separate opens of one file coalesce but keep their own cursors.
#[test]
fn separate_opens_keep_cursors() {
    let kernel = Kernel::boot();
    let (mut p, mem) = kernel.process();
    let buf = mem.alloc(8);
    let hello = mem.cstr("hello");

    let a = syscall!(p, SyscallNumber::Open, hello, O_RDONLY).unwrap();
    let b = syscall!(p, SyscallNumber::Open, hello, O_RDONLY).unwrap();
    assert_eq!(kernel.service.open_entries(), 1);

    assert_eq!(syscall!(p, SyscallNumber::Read, a, buf, 8), Ok(8));
    assert_eq!(
        syscall!(p, SyscallNumber::Lseek, b, 0, SEEK_CUR),
        Ok(0),
        "An independent open must not share the cursor."
    );
    assert_eq!(syscall!(p, SyscallNumber::Read, b, buf, 8), Ok(8));
    assert_eq!(mem.read(buf, 8), &HELLO[..8]);
}

/// dup2 onto an open descriptor closes it first.
#[test]
fn dup2_replaces_open_descriptor() {
    let kernel = Kernel::boot();
    let (mut p, mem) = kernel.process();

    let hello = syscall!(p, SyscallNumber::Open, mem.cstr("hello"), O_RDONLY).unwrap();
    let empty = syscall!(p, SyscallNumber::Open, mem.cstr("empty"), O_RDWR).unwrap();
    assert_eq!(kernel.service.open_entries(), 2);

    assert_eq!(syscall!(p, SyscallNumber::Dup2, hello, empty), Ok(empty));
    assert_eq!(
        kernel.fs.stats("/empty").unwrap().closes,
        1,
        "The replaced file should be released."
    );
    assert_eq!(kernel.service.open_entries(), 1);

    // Both descriptors now refer to /hello; it is released with the last.
    assert_eq!(syscall!(p, SyscallNumber::Close, hello), Ok(0));
    assert_eq!(kernel.fs.stats("/hello").unwrap().closes, 0);
    assert_eq!(syscall!(p, SyscallNumber::Close, empty), Ok(0));
    assert_eq!(kernel.fs.stats("/hello").unwrap().closes, 1);
    assert_eq!(kernel.service.open_entries(), 0);
}

/// dup2 onto itself and with bad descriptors.
#[test]
fn dup2_invalid() {
    let kernel = Kernel::boot();
    let (mut p, mem) = kernel.process();

    let fd = syscall!(p, SyscallNumber::Open, mem.cstr("hello"), O_RDONLY).unwrap();
    assert_eq!(
        syscall!(p, SyscallNumber::Dup2, fd, fd),
        Ok(fd),
        "Duplicating onto itself returns the descriptor."
    );
    assert_eq!(
        kernel.service.group_members(p.pid(), FileDescriptor(fd as i32)).unwrap().len(),
        1,
        "Duplicating onto itself changes nothing."
    );

    assert_eq!(
        syscall!(p, SyscallNumber::Dup2, 9, fd),
        Err(KernelError::BadFileDescriptor),
        "Duplicating a closed descriptor should fail."
    );
    assert_eq!(
        syscall!(p, SyscallNumber::Lseek, fd, 0, SEEK_CUR),
        Ok(0),
        "A failed dup2 must leave the target open."
    );
    assert_eq!(
        syscall!(p, SyscallNumber::Dup2, fd, 32),
        Err(KernelError::BadFileDescriptor),
        "The target must be below OPEN_MAX."
    );
    assert_eq!(
        syscall!(p, SyscallNumber::Dup2, fd, -1isize),
        Err(KernelError::BadFileDescriptor),
        "The target must not be negative."
    );
    assert_eq!(
        syscall!(p, SyscallNumber::Dup2, -1isize, fd),
        Err(KernelError::BadFileDescriptor),
        "The source must not be negative."
    );
    assert_eq!(kernel.service.open_entries(), 1);
}

/// A duplicate keeps the file open after the original is closed.
#[test]
fn dup2_outlives_original() {
    let kernel = Kernel::boot();
    let (mut p, mem) = kernel.process();
    let buf = mem.alloc(HELLO.len());

    let fd = syscall!(p, SyscallNumber::Open, mem.cstr("hello"), O_RDONLY).unwrap();
    assert_eq!(syscall!(p, SyscallNumber::Dup2, fd, 20), Ok(20));
    assert_eq!(syscall!(p, SyscallNumber::Close, fd), Ok(0));
    assert_eq!(
        syscall!(p, SyscallNumber::Read, 20, buf, HELLO.len()),
        Ok(HELLO.len())
    );
    assert_eq!(mem.read(buf, HELLO.len()), HELLO);

    // The freed number is reused by the next open.
    assert_eq!(
        syscall!(p, SyscallNumber::Open, mem.cstr("empty"), O_RDONLY),
        Ok(fd)
    );
}
