/// Returned in `rax` by every call that fails.
pub const SYSCALL_FAILED: u64 = u64::MAX;

/// Returned by [`Sysno::Ping`] after the hook has run.
pub const PING_REPLY: u64 = 0xd34d_c0d3;

#[repr(u64)]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Sysno {
    /// Write a single byte to a kernel-chosen “debug” sink.
    DebugWriteByte = 1,
    /// The hooked call: runs attached extensions, then returns [`PING_REPLY`].
    Ping = 2,
    /// `(code, len, *mut handle)`: copy `len` bytes of code into the kernel.
    ExtLoad = 3,
    /// `(handle)`: have the kernel invoke a loaded extension from the hook.
    ExtAttach = 4,
}

impl TryFrom<u64> for Sysno {
    /// The unknown number.
    type Error = u64;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Ok(match value {
            1 => Self::DebugWriteByte,
            2 => Self::Ping,
            3 => Self::ExtLoad,
            4 => Self::ExtAttach,
            other => return Err(other),
        })
    }
}
