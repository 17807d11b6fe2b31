//! A teletype (TTY) interface for character-based I/O.
//!
//! This module provides a trait [`Teletype`] that defines an interface for
//! reading from and writing to a teletype device, such as a serial port. The
//! standard streams of every process are routed to one.
//!
//! [`Loopback`] implements the interface with an in-memory input queue and a
//! captured output buffer.

use crate::{KernelError, sync::SpinLock};
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, Ordering};
use crossbeam_queue::ArrayQueue;
use crossbeam_utils::Backoff;

/// The `Teletype` trait represents a generic character-based input/output
/// device.
///
/// Implementations provide the byte primitives; [`Teletype::read`] and
/// [`Teletype::write`] transfer whole buffers on top of them.
pub trait Teletype
where
    Self: Send + Sync,
{
    /// Reads one byte, blocking until one is available.
    fn read_byte(&self) -> Result<u8, KernelError>;

    /// Writes one byte.
    fn write_byte(&self, byte: u8) -> Result<(), KernelError>;

    /// Writes data to the teletype.
    ///
    /// # Returns
    /// - `Ok(usize)`: The number of bytes successfully written.
    /// - `Err(KernelError)`: If the first byte could not be written.
    fn write(&self, data: &[u8]) -> Result<usize, KernelError> {
        for (i, b) in data.iter().enumerate() {
            if let Err(e) = self.write_byte(*b) {
                return if i == 0 { Err(e) } else { Ok(i) };
            }
        }
        Ok(data.len())
    }

    /// Reads data from the teletype.
    ///
    /// Reading stops once `data` is full or a newline has been delivered.
    ///
    /// # Returns
    /// - `Ok(usize)`: The number of bytes successfully read.
    /// - `Err(KernelError)`: If the first byte could not be read.
    fn read(&self, data: &mut [u8]) -> Result<usize, KernelError> {
        let mut n = 0;
        while n < data.len() {
            match self.read_byte() {
                Ok(b) => {
                    data[n] = b;
                    n += 1;
                    if b == b'\n' {
                        break;
                    }
                }
                Err(e) if n == 0 => return Err(e),
                Err(_) => break,
            }
        }
        Ok(n)
    }
}

/// A console backed by memory.
///
/// Input is pushed with [`Loopback::push_input`] and consumed by reads; every
/// written byte is captured and retrieved with [`Loopback::take_output`].
pub struct Loopback {
    input: ArrayQueue<u8>,
    output: SpinLock<Vec<u8>>,
    hung_up: AtomicBool,
}

impl Loopback {
    /// Creates a console that buffers up to `capacity` pending input bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            input: ArrayQueue::new(capacity.max(1)),
            output: SpinLock::new(Vec::new()),
            hung_up: AtomicBool::new(false),
        }
    }

    /// Queues `data` as console input.
    ///
    /// Returns the number of bytes queued, which is short if the queue fills.
    pub fn push_input(&self, data: &[u8]) -> usize {
        data.iter()
            .take_while(|b| self.input.push(**b).is_ok())
            .count()
    }

    /// Ends the input. Once the queue drains, reads fail instead of blocking.
    pub fn hang_up(&self) {
        self.hung_up.store(true, Ordering::Release);
    }

    /// Takes every byte written so far.
    pub fn take_output(&self) -> Vec<u8> {
        let mut guard = self.output.lock();
        let output = core::mem::take(&mut *guard);
        guard.unlock();
        output
    }
}

impl Teletype for Loopback {
    fn read_byte(&self) -> Result<u8, KernelError> {
        let backoff = Backoff::new();
        loop {
            if let Some(b) = self.input.pop() {
                return Ok(b);
            }
            if self.hung_up.load(Ordering::Acquire) {
                return Err(KernelError::IOError);
            }
            backoff.snooze();
        }
    }

    fn write_byte(&self, byte: u8) -> Result<(), KernelError> {
        let mut guard = self.output.lock();
        guard.push(byte);
        guard.unlock();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_stops_at_newline() {
        let tty = Loopback::new(16);
        assert_eq!(tty.push_input(b"ab\ncd"), 5);
        let mut buf = [0; 8];
        assert_eq!(tty.read(&mut buf), Ok(3));
        assert_eq!(&buf[..3], b"ab\n");
        assert_eq!(tty.read(&mut buf[..1]), Ok(1));
        assert_eq!(buf[0], b'c');
    }

    #[test]
    fn hung_up_console() {
        let tty = Loopback::new(4);
        tty.push_input(b"x");
        tty.hang_up();
        let mut buf = [0; 4];
        assert_eq!(tty.read(&mut buf), Ok(1));
        assert_eq!(tty.read(&mut buf), Err(KernelError::IOError));
    }

    #[test]
    fn output_is_captured() {
        let tty = Loopback::new(1);
        assert_eq!(tty.write(b"hello"), Ok(5));
        assert_eq!(tty.take_output(), b"hello");
        assert!(tty.take_output().is_empty());
    }
}
