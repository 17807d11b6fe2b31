//! Process lifecycle: `fork`, `getpid` and `exit`.

use fdtable::{Pid, SyscallNumber};
use fdtable_grader::{HELLO, Kernel};
use grading::syscall;
use kern::KernelError;

const O_RDONLY: usize = 0;
const O_RDWR: usize = 2;
const O_CREAT: usize = 4;
const SEEK_CUR: usize = 1;

/// fork creates a process with its own pid.
#[test]
fn fork_getpid() {
    let kernel = Kernel::boot();
    let (mut parent, mem) = kernel.process();

    let pid = syscall!(parent, SyscallNumber::Getpid).unwrap();
    assert_eq!(Pid(pid), parent.pid());
    let child = syscall!(parent, SyscallNumber::Fork).unwrap();
    assert_ne!(child, pid, "The child must get a fresh pid.");

    let mut child = kernel.attach(Pid(child), mem);
    assert_eq!(syscall!(child, SyscallNumber::Getpid), Ok(child.pid().0));
    assert_eq!(syscall!(parent, SyscallNumber::Getpid), Ok(pid));
}

/// Inherited descriptors share the cursor with the parent.
#[test]
fn fork_shares_cursor() {
    let kernel = Kernel::boot();
    let (mut parent, mem) = kernel.process();
    let buf = mem.alloc(8);

    let fd = syscall!(parent, SyscallNumber::Open, mem.cstr("hello"), O_RDONLY).unwrap();
    let child = syscall!(parent, SyscallNumber::Fork).unwrap();
    let mut child = kernel.attach(Pid(child), mem.clone());

    assert_eq!(syscall!(child, SyscallNumber::Read, fd, buf, 8), Ok(8));
    assert_eq!(mem.read(buf, 8), &HELLO[..8]);
    assert_eq!(
        syscall!(parent, SyscallNumber::Read, fd, buf, 8),
        Ok(8),
        "The parent should continue where the child stopped."
    );
    assert_eq!(mem.read(buf, 8), &HELLO[8..16]);
    assert_eq!(kernel.service.open_entries(), 1);
}

/// Closing in the child leaves the parent's descriptor alone.
#[test]
fn fork_close_is_local() {
    let kernel = Kernel::boot();
    let (mut parent, mem) = kernel.process();

    let fd = syscall!(parent, SyscallNumber::Open, mem.cstr("hello"), O_RDONLY).unwrap();
    let child = syscall!(parent, SyscallNumber::Fork).unwrap();
    let mut child = kernel.attach(Pid(child), mem.clone());

    assert_eq!(syscall!(child, SyscallNumber::Close, fd), Ok(0));
    assert_eq!(
        syscall!(child, SyscallNumber::Close, fd),
        Err(KernelError::BadFileDescriptor)
    );
    assert_eq!(
        syscall!(parent, SyscallNumber::Lseek, fd, 0, SEEK_CUR),
        Ok(0),
        "The parent's descriptor must survive the child's close."
    );
    assert_eq!(kernel.fs.stats("/hello").unwrap().closes, 0);

    assert_eq!(syscall!(parent, SyscallNumber::Close, fd), Ok(0));
    assert_eq!(kernel.fs.stats("/hello").unwrap().closes, 1);
}

/// Opens after the fork are private to each process.
#[test]
fn fork_then_open_is_private() {
    let kernel = Kernel::boot();
    let (mut parent, mem) = kernel.process();
    let child = syscall!(parent, SyscallNumber::Fork).unwrap();
    let mut child = kernel.attach(Pid(child), mem.clone());

    let fd = syscall!(child, SyscallNumber::Open, mem.cstr("hello"), O_RDONLY).unwrap();
    assert_eq!(fd, 3);
    assert_eq!(
        syscall!(parent, SyscallNumber::Close, fd),
        Err(KernelError::BadFileDescriptor),
        "The parent must not see the child's descriptor."
    );
    assert_eq!(
        syscall!(parent, SyscallNumber::Open, mem.cstr("hello"), O_RDONLY),
        Ok(3)
    );
    // The two opens coalesce on one entry.
    assert_eq!(kernel.service.open_entries(), 1);
}

/// exit releases every descriptor of the process.
#[test]
fn exit_releases_descriptors() {
    let kernel = Kernel::boot();
    let (mut parent, mem) = kernel.process();

    let hello = syscall!(parent, SyscallNumber::Open, mem.cstr("hello"), O_RDONLY).unwrap();
    let child = syscall!(parent, SyscallNumber::Fork).unwrap();
    let mut child = kernel.attach(Pid(child), mem.clone());
    let log = syscall!(child, SyscallNumber::Open, mem.cstr("log"), O_RDWR | O_CREAT).unwrap();
    assert_eq!(syscall!(child, SyscallNumber::Dup2, log, 10), Ok(10));
    assert_eq!(kernel.service.open_entries(), 2);

    assert_eq!(syscall!(child, SyscallNumber::Exit, 0), Ok(0));
    assert_eq!(kernel.fs.stats("/log").unwrap().closes, 1);
    assert_eq!(
        kernel.fs.stats("/hello").unwrap().closes,
        0,
        "The parent still holds /hello."
    );
    assert_eq!(
        syscall!(child, SyscallNumber::Getpid),
        Ok(child.pid().0),
        "getpid does not touch the file table."
    );
    assert_eq!(
        syscall!(child, SyscallNumber::Close, hello),
        Err(KernelError::NoSuchEntry),
        "An exited process has no file table."
    );

    assert_eq!(syscall!(parent, SyscallNumber::Exit, 0), Ok(0));
    assert_eq!(kernel.fs.stats("/hello").unwrap().closes, 1);
    assert_eq!(kernel.service.open_entries(), 0);
}
