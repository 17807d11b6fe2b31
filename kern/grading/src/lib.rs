//! Test support for the graders.
//!
//! - `#[stdin(b"...")]` hooks the console of the running test thread: reads
//!   from the standard input consume the given bytes and everything written
//!   to the standard output or error is captured.
//! - `#[assert_output(b"...")]` compares the captured output once the test
//!   body returns.
//! - [`syscall!`] issues a system call against a [`Task`] and decodes the
//!   result.
//!
//! The kernel under test must be booted with [`HookedConsole`] as its
//! teletype for the hooks to take effect.
extern crate grading_derive;

pub use grading_derive::*;

use kern::{
    KernelError,
    syscall::Registers,
    task::Task,
    teletype::{Loopback, Teletype},
};
use std::{cell::RefCell, sync::Arc};

thread_local! {
    static TTY_HOOK: RefCell<Option<Arc<Loopback>>> = const { RefCell::new(None) };
}

/// Hooks the console of the current thread with `input`.
pub fn hook_stdin(input: &[u8]) {
    let tty = Arc::new(Loopback::new(input.len().max(1)));
    tty.push_input(input);
    tty.hang_up();
    TTY_HOOK.with(|hook| *hook.borrow_mut() = Some(tty));
}

/// Removes the hook of the current thread and returns the captured output.
pub fn finish_hook() -> Option<Vec<u8>> {
    TTY_HOOK
        .with(|hook| hook.borrow_mut().take())
        .map(|tty| tty.take_output())
}

fn current_hook() -> Option<Arc<Loopback>> {
    TTY_HOOK.with(|hook| hook.borrow().clone())
}

/// The console of the graders.
///
/// Routes to the hook of the calling thread. Without a hook, output goes to
/// the kernel print sink and input is unavailable.
#[derive(Default)]
pub struct HookedConsole;

impl Teletype for HookedConsole {
    fn read_byte(&self) -> Result<u8, KernelError> {
        match current_hook() {
            Some(tty) => tty.read_byte(),
            None => Err(KernelError::IOError),
        }
    }

    fn write_byte(&self, byte: u8) -> Result<(), KernelError> {
        match current_hook() {
            Some(tty) => tty.write_byte(byte),
            None => {
                kern::print!("{}", byte as char);
                Ok(())
            }
        }
    }
}

/// Decodes the return registers of a system call.
///
/// `%rax` holds `0` on success, with the value in `%rdx`, or the error
/// number.
pub fn decode(regs: &Registers) -> Result<usize, KernelError> {
    match regs.gprs.rax {
        0 => Ok(regs.gprs.rdx),
        errno => Err(KernelError::try_from(errno)
            .unwrap_or_else(|_| panic!("{errno} is not an error number."))),
    }
}

#[doc(hidden)]
pub fn __invoke<T: Task + ?Sized>(
    task: &mut T,
    sysno: usize,
    args: &[usize],
) -> Result<usize, KernelError> {
    assert!(args.len() <= 6, "A system call takes at most 6 arguments.");
    let mut frame = [0; 6];
    frame[..args.len()].copy_from_slice(args);
    let mut regs = Registers::for_syscall(sysno, frame);
    task.syscall(&mut regs);
    decode(&regs)
}

/// Execute a syscall with given arguments on a task.
///
/// Evaluates to `Result<usize, KernelError>`.
#[macro_export]
macro_rules! syscall {
    ($task:expr, $nr:expr $(, $arg:expr)* $(,)?) => {
        $crate::__invoke(&mut $task, $nr as usize, &[$(($arg) as usize),*])
    };
}
