/// Integrity failures while walking firmware tables. Boot code treats all of
/// them as fatal.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AcpiError {
    #[error("null RSDP address")]
    NullPointer,
    #[error("no RSDP in the EBDA or the BIOS area")]
    RsdpNotFound,
    #[error("no \"RSD PTR \" signature at {0:#x}")]
    BadRsdpSignature(u64),
    #[error("checksum mismatch in structure at {0:#x}")]
    BadChecksum(u64),
    #[error("structure at {addr:#x} claims an implausible length of {len} bytes")]
    BadLength { addr: u64, len: u32 },
    #[error("table at {addr:#x} has signature {found:?}, expected {expected:?}")]
    UnexpectedTable {
        addr: u64,
        expected: [u8; 4],
        found: [u8; 4],
    },
    #[error("no table with signature {0:?}")]
    TableNotFound([u8; 4]),
}
