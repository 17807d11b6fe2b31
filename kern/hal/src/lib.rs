//! The lowest layer of the kernel.
//!
//! This crate contains the primitives every other kernel crate builds on: the
//! SMP-supported [`SpinLock`] and the kernel print sink behind the
//! [`print!`], [`info!`], [`warning!`] and [`debug!`] macros.
//!
//! You are **not** supposed to use this crate directly. The [`kern`] crate
//! re-exports everything the file table subsystem needs.
//!
//! [`kern`]: ../kern/index.html
#![cfg_attr(not(test), no_std)]

use core::sync::atomic::AtomicBool;

#[doc(hidden)]
#[macro_use]
pub mod kprint;
pub mod spinlock;

pub use spinlock::SpinLock;

/// Silences the leveled log macros ([`info!`], [`warning!`], [`debug!`])
/// when set.
#[doc(hidden)]
pub static QUITE: AtomicBool = AtomicBool::new(false);
