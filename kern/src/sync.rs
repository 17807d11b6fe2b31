//! Synchronization primitives.
//!
//! The open-file subsystem serializes on a single [`SpinLock`]. Unlike
//! `std::sync::Mutex`, the guard of a [`SpinLock`] must be released by calling
//! [`SpinLockGuard::unlock`]; dropping a held guard panics. This makes every
//! critical section visible at the call site.

pub use hal::spinlock::{SpinLock, SpinLockGuard};
