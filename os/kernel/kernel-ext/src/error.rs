use crate::ExtState;
use crate::patch::PatchError;

/// Why an extension operation was rejected.
///
/// None of these are fatal to the kernel; the requesting call fails and the
/// table is left as it was.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtError {
    #[error("code length {0} is outside 0..={max}", max = crate::PAGE_SIZE)]
    InvalidLength(i64),
    #[error("no free extension slot")]
    TableFull,
    #[error("out of code pages")]
    OutOfPages,
    #[error("faulted copying {len} bytes at user address {addr:#x}")]
    CopyFault { addr: usize, len: usize },
    #[error("{0:#x} is not an extension handle")]
    BadHandle(usize),
    #[error("extension is {0:?}, expected Loaded")]
    NotLoaded(ExtState),
    #[error("failed to patch hook site: {0}")]
    Patch(#[from] PatchError),
}
