//! Kernel print utilities.
//!
//! The kernel does not own a console of its own at this layer. Whoever boots
//! the kernel registers a print sink with [`register_sink`]; until then every
//! message is discarded.

use crate::spinlock::SpinLock;
use core::fmt::Arguments;

/// A function that consumes one formatted message.
pub type Sink = fn(Arguments<'_>);

static SINK: SpinLock<Option<Sink>> = SpinLock::new(None);

/// Registers the function that receives every kernel message.
///
/// Registering again replaces the previous sink.
pub fn register_sink(sink: Sink) {
    let mut guard = SINK.lock();
    *guard = Some(sink);
    guard.unlock();
}

#[doc(hidden)]
pub fn _print(fmt: Arguments<'_>) {
    let guard = SINK.lock();
    let sink = *guard;
    guard.unlock();
    // The sink runs unlocked; it may itself print.
    if let Some(sink) = sink {
        sink(fmt);
    }
}

/// Prints out the message.
///
/// Use the format! syntax to write data to the registered sink.
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => ($crate::kprint::_print(format_args!($($arg)*)));
}

/// Prints out the message with a newline.
///
/// Use the format! syntax to write data to the registered sink.
#[macro_export]
macro_rules! println {
    () => ($crate::print!("\n"));
    ($($arg:tt)*) => ($crate::print!("{}\n", format_args!($($arg)*)));
}

/// Display an information message.
#[macro_export]
macro_rules! info {
    () => (if !$crate::QUITE.load(core::sync::atomic::Ordering::SeqCst) { $crate::print!("[INFO]\n") });
    ($($arg:tt)*) => (if !$crate::QUITE.load(core::sync::atomic::Ordering::SeqCst) { $crate::print!("[INFO] {}\n", format_args!($($arg)*)) });
}

/// Display a warning message.
#[macro_export]
macro_rules! warning {
    () => (if !$crate::QUITE.load(core::sync::atomic::Ordering::SeqCst) { $crate::print!("[WARN]\n") });
    ($($arg:tt)*) => (if !$crate::QUITE.load(core::sync::atomic::Ordering::SeqCst) { $crate::print!("[WARN] {}\n", format_args!($($arg)*)) });
}

/// Display a debug message.
#[macro_export]
macro_rules! debug {
    () => (if !$crate::QUITE.load(core::sync::atomic::Ordering::SeqCst) { $crate::print!("[DEBUG]\n") });
    ($($arg:tt)*) => (if !$crate::QUITE.load(core::sync::atomic::Ordering::SeqCst) { $crate::print!("[DEBUG] {}\n", format_args!($($arg)*))} );
}
