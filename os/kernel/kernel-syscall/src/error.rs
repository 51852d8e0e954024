use kernel_ext::ExtError;

/// Why a syscall failed. User code only ever sees
/// [`SYSCALL_FAILED`](crate::SYSCALL_FAILED).
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyscallError {
    #[error("unknown syscall number {0}")]
    UnknownSyscall(u64),
    #[error("argument {0} does not exist")]
    NoSuchArgument(usize),
    #[error("{len} bytes at {addr:#x} are not in the caller's address space")]
    BadUserPointer { addr: u64, len: usize },
    #[error("{0:#x} does not point into the permitted kernel region")]
    BadKernelPointer(u64),
    #[error("caller may not load extensions")]
    PermissionDenied,
    #[error(transparent)]
    Ext(#[from] ExtError),
}
