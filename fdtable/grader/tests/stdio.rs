//! The standard streams.

use fdtable::SyscallNumber;
use fdtable_grader::Kernel;
use grading::{assert_output, stdin, syscall};
use kern::KernelError;

const O_RDONLY: usize = 0;

/// Reading from the standard input stops after a line.
#[test]
#[stdin(b"hello\nworld\n")]
fn read_stdin() {
    let kernel = Kernel::boot();
    let (mut p, mem) = kernel.process();
    let buf = mem.alloc(16);

    assert_eq!(
        syscall!(p, SyscallNumber::Read, 0, buf, 16),
        Ok(6),
        "A console read returns one line."
    );
    assert_eq!(mem.read(buf, 6), b"hello\n");
    assert_eq!(syscall!(p, SyscallNumber::Read, 0, buf, 3), Ok(3));
    assert_eq!(mem.read(buf, 3), b"wor");
    assert_eq!(syscall!(p, SyscallNumber::Read, 0, buf, 16), Ok(3));
    assert_eq!(mem.read(buf, 3), b"ld\n");
    assert_eq!(
        syscall!(p, SyscallNumber::Read, 0, buf, 16),
        Err(KernelError::IOError),
        "The input is exhausted."
    );
}

/// Writing to the standard output and error.
#[test]
#[stdin(b"")]
#[assert_output(b"Hello, world!\nto stderr\n")]
fn write_stdout_stderr() {
    let kernel = Kernel::boot();
    let (mut p, mem) = kernel.process();
    let out = mem.place(b"Hello, world!\n");
    let err = mem.place(b"to stderr\n");

    assert_eq!(syscall!(p, SyscallNumber::Write, 1, out, 14), Ok(14));
    assert_eq!(syscall!(p, SyscallNumber::Write, 2, err, 10), Ok(10));
}

/// The standard streams are one-directional.
#[test]
#[stdin(b"input\n")]
#[assert_output(b"")]
fn stdio_directions() {
    let kernel = Kernel::boot();
    let (mut p, mem) = kernel.process();
    let buf = mem.place(b"input\n");

    assert_eq!(
        syscall!(p, SyscallNumber::Write, 0, buf, 6),
        Err(KernelError::BadFileDescriptor),
        "The standard input cannot be written."
    );
    assert_eq!(
        syscall!(p, SyscallNumber::Read, 1, buf, 6),
        Err(KernelError::BadFileDescriptor),
        "The standard output cannot be read."
    );
    assert_eq!(
        syscall!(p, SyscallNumber::Read, 2, buf, 6),
        Err(KernelError::BadFileDescriptor),
        "The standard error cannot be read."
    );
}

/// A duplicate of the standard output writes to the console.
#[test]
#[stdin(b"")]
#[assert_output(b"via five\nvia one\n")]
fn dup2_stdout() {
    let kernel = Kernel::boot();
    let (mut p, mem) = kernel.process();
    let five = mem.place(b"via five\n");
    let one = mem.place(b"via one\n");

    assert_eq!(syscall!(p, SyscallNumber::Dup2, 1, 5), Ok(5));
    assert_eq!(syscall!(p, SyscallNumber::Write, 5, five, 9), Ok(9));
    assert_eq!(syscall!(p, SyscallNumber::Close, 1), Ok(0));
    assert_eq!(
        syscall!(p, SyscallNumber::Write, 1, one, 8),
        Err(KernelError::BadFileDescriptor),
        "A closed standard stream cannot be written."
    );
    assert_eq!(syscall!(p, SyscallNumber::Dup2, 5, 1), Ok(1));
    assert_eq!(syscall!(p, SyscallNumber::Write, 1, one, 8), Ok(8));
    // Standard streams never touch the system table.
    assert_eq!(kernel.service.open_entries(), 0);
}

/// Closing a standard stream does not hand its number to open.
#[test]
fn closed_stdio_is_not_reused() {
    let kernel = Kernel::boot();
    let (mut p, mem) = kernel.process();

    for fd in 0..3 {
        assert_eq!(syscall!(p, SyscallNumber::Close, fd), Ok(0));
    }
    assert_eq!(
        syscall!(p, SyscallNumber::Open, mem.cstr("hello"), O_RDONLY),
        Ok(3),
        "open allocates above the standard streams."
    );
    assert_eq!(
        syscall!(p, SyscallNumber::Close, 0),
        Err(KernelError::BadFileDescriptor)
    );
    // dup2 may still bind a file to a standard number.
    assert_eq!(syscall!(p, SyscallNumber::Dup2, 3, 0), Ok(0));
    assert_eq!(kernel.service.open_entries(), 1);
}

/// A forked child writes to the same console.
#[test]
#[stdin(b"")]
#[assert_output(b"parent\nchild\n")]
fn fork_inherits_stdio() {
    let kernel = Kernel::boot();
    let (mut parent, mem) = kernel.process();
    let a = mem.place(b"parent\n");
    let b = mem.place(b"child\n");

    let child = syscall!(parent, SyscallNumber::Fork).unwrap();
    let mut child = kernel.attach(fdtable::Pid(child), mem.clone());
    assert_eq!(syscall!(parent, SyscallNumber::Write, 1, a, 7), Ok(7));
    assert_eq!(syscall!(child, SyscallNumber::Write, 1, b, 6), Ok(6));
}
