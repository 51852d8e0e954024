use crate::NAME_LEN;
use core::fmt;

/// Signature of extension code: no arguments, one machine word back.
pub type ExtensionFn = unsafe extern "C" fn() -> usize;

/// Lifecycle of one extension record.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub enum ExtState {
    /// Free slot.
    #[default]
    Unused,
    /// Claimed by a loader that is still allocating or copying.
    Reserved,
    /// Code is in place; not yet reachable from the hook.
    Loaded,
    /// Invoked by the dispatcher on every hook entry.
    Attached,
}

/// Callable address of a code container.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct EntryPoint(usize);

impl EntryPoint {
    pub const NULL: Self = Self(0);

    #[must_use]
    pub const fn from_addr(addr: usize) -> Self {
        Self(addr)
    }

    #[must_use]
    pub const fn addr(self) -> usize {
        self.0
    }

    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Reinterprets the address as native extension code.
    ///
    /// # Safety
    /// The address must point at executable code following the
    /// [`ExtensionFn`] ABI.
    #[must_use]
    pub unsafe fn as_fn(self) -> ExtensionFn {
        unsafe { core::mem::transmute::<usize, ExtensionFn>(self.0) }
    }
}

impl fmt::LowerHex for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

/// Opaque handle naming one record of an extension table.
///
/// The raw value is the kernel address of the record; user space only ever
/// passes it back to `ExtAttach`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ExtHandle(usize);

impl ExtHandle {
    /// The value written to user space when no handle was produced.
    pub const NULL: Self = Self(0);

    #[must_use]
    pub const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn as_raw(self) -> usize {
        self.0
    }
}

/// Fixed-size, NUL-padded debug label.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct ExtName([u8; NAME_LEN]);

impl ExtName {
    pub const EMPTY: Self = Self([0; NAME_LEN]);

    /// Builds a label from `name`, truncated to `NAME_LEN - 1` bytes on a
    /// character boundary.
    #[must_use]
    pub fn new(name: &str) -> Self {
        let mut len = name.len().min(NAME_LEN - 1);
        while !name.is_char_boundary(len) {
            len -= 1;
        }
        let mut bytes = [0; NAME_LEN];
        bytes[..len].copy_from_slice(&name.as_bytes()[..len]);
        Self(bytes)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        let len = self.0.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
        // Only ever filled from a &str cut on a char boundary.
        core::str::from_utf8(&self.0[..len]).unwrap_or_default()
    }
}

impl Default for ExtName {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Debug for ExtName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl fmt::Display for ExtName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time copy of one record, for diagnostics.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct ExtInfo {
    pub slot: usize,
    pub state: ExtState,
    pub entry: Option<EntryPoint>,
    pub name: ExtName,
}
