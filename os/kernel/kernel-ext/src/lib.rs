//! # Kernel Extensions
//!
//! This crate lets a process hand the kernel a small blob of machine code,
//! have it installed as a privileged *extension*, and have the kernel invoke
//! it from a hook on every subsequent entry into a chosen system call.
//!
//! ## Overview
//!
//! ```text
//! user process
//!     ↓ ExtLoad(code, len, &handle)        ExtAttach(handle)
//! Extensions::load                         Extensions::attach
//!     ↓ claim slot, copy into a page          ↓ install hook, mark Attached
//! ┌──────────────────────────────────────────────────────────┐
//! │ Extension table (one SpinLock, N records)                │
//! │  [Loaded] [Attached] [Unused] [Attached] ...             │
//! └──────────────────────────────────────────────────────────┘
//!     ↑ scan in slot order
//! Extensions::dispatch  ←  trampoline  ←  hook site in the hooked syscall
//! ```
//!
//! ## Components
//!
//! ### Extension table ([`Extensions`])
//! A fixed-capacity array of records behind a single [`SpinLock`]. Each record
//! moves monotonically through [`ExtState::Unused`] → [`ExtState::Loaded`] →
//! [`ExtState::Attached`]. There is no unload path: only a load that could not
//! be reported to its requester ([`Extensions::abandon`]) returns a slot to
//! `Unused`, and an attached slot never does.
//!
//! ### Loader ([`Extensions::load`])
//! Validates the code length against [`PAGE_SIZE`], claims the first free
//! slot under the lock, then allocates and fills one zeroed [`CodePage`]
//! *outside* the lock. A failed allocation or copy rolls the claim back.
//!
//! ### Attacher ([`Extensions::attach`])
//! Resolves the opaque [`ExtHandle`], checks the record is loaded, installs
//! the table's [`HookSite`] and only then flags the record attached, all
//! while holding the lock.
//!
//! ### Dispatcher ([`Extensions::dispatch`])
//! Scans the table in slot order and invokes every attached extension. The
//! lock is dropped around each invocation since extension code is arbitrary
//! and of unknown duration.
//!
//! ### Hooks ([`hook`], [`patch`])
//! [`IndirectHook`] is an atomic function-pointer slot read by the hooked
//! syscall; attaching is a single store. [`PatchedHook`] instead rewrites a
//! reserved run of NOPs inside compiled code with a relative `call`, fixing
//! up the branch displacement for the address it is installed at.
//!
//! ## Trust model
//!
//! Extensions run with full kernel privilege. Nothing here verifies the
//! injected code; callers gate access to loading before reaching this crate.
//!
//! [`SpinLock`]: kernel_sync::SpinLock

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

#[cfg(any(test, feature = "emulated"))]
extern crate alloc;

mod attach;
mod dispatch;
#[cfg(any(test, feature = "emulated"))]
pub mod emulated;
mod error;
pub mod hook;
mod load;
mod page;
pub mod patch;
mod pool;
mod record;
mod table;

pub use error::ExtError;
pub use hook::{HookRegion, HookSite, IndirectHook, PatchedHook, Trampoline};
pub use load::CodeLength;
pub use page::{CodeAllocator, CodePage, UserMemory};
pub use pool::{PagePool, PoolPage};
pub use record::{EntryPoint, ExtHandle, ExtInfo, ExtName, ExtState, ExtensionFn};
pub use table::Extensions;

/// Size of one code container in bytes; also the upper bound on code length.
pub const PAGE_SIZE: usize = 4096;

/// Default number of extension records in a table.
pub const MAX_EXTENSIONS: usize = 16;

/// Size of the debug label stored with every record, including the NUL.
pub const NAME_LEN: usize = 16;

/// Bytes reserved at a patchable hook site: one `call rel32`.
pub const HOOK_SITE_LEN: usize = patch::BRANCH_LEN;
