//! # Extension syscalls
//!
//! The kernel side of the extension ABI. A trap stub saves the caller's
//! registers and hands the syscall number and the six argument registers to
//! [`Syscalls::dispatch`]:
//!
//! | [`Sysno`]                   | arguments                 | returns                 |
//! |-----------------------------|---------------------------|-------------------------|
//! | `DebugWriteByte`            | byte                      | `0`                     |
//! | `Ping`                      | none                      | [`PING_REPLY`]          |
//! | `ExtLoad`                   | code, length, `*mut` handle | `0`, handle written   |
//! | `ExtAttach`                 | handle                    | `0`                     |
//!
//! Any failure returns [`SYSCALL_FAILED`]. `Ping` is the hooked call: on
//! entry it fires the extension table's hook, which runs every attached
//! extension before the call completes.
//!
//! Arguments arrive as raw words and are only interpreted through
//! [`SyscallArgs`]; user memory is only touched through the calling
//! process's [`Caller::memory`].

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod args;
mod caller;
mod error;
pub mod example_extension;
mod ext;
pub mod kernel;
mod syscall;

pub use args::SyscallArgs;
pub use caller::Caller;
pub use error::SyscallError;
pub use stdlib::syscall_abi::{PING_REPLY, SYSCALL_FAILED, Sysno};
pub use syscall::Syscalls;
