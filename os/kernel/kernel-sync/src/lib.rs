//! # Kernel synchronization primitives
//!
//! A single spin lock, used wherever the kernel needs mutual exclusion
//! without a scheduler. Its guard can be temporarily released with
//! [`SpinLockGuard::unlocked`] to call out into code that may itself take
//! the lock.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod spin_lock;

pub use spin_lock::{SpinLock, SpinLockGuard};
