//! Task trait for interact with user process.

use crate::syscall::Registers;

/// Represents a **task** executed by a thread.
///
/// This trait defines the core functionality required for handling events
/// triggered by a user process, such as **system calls**.
pub trait Task {
    /// Handles a **system call** triggered by the user program.
    ///
    /// - The `registers` parameter contains the state of the CPU registers at
    ///   the time of the system call.
    /// - Implementations of this function should parse the system call
    ///   arguments, execute the corresponding operation, and store the result
    ///   back in `registers`.
    fn syscall(&mut self, registers: &mut Registers);
}
