//! # System description tables
//!
//! Every table starts with the same 36-byte header:
//!
//! ```text
//! offset  size  field
//!      0     4  signature ("RSDT", "XSDT", "APIC", "FACP", ...)
//!      4     4  length of the whole table, header included
//!      8     1  revision
//!      9     1  checksum over `length` bytes
//!     10     6  OEM id
//!     16     8  OEM table id
//!     24     4  OEM revision
//!     28     4  creator id
//!     32     4  creator revision
//! ```
//!
//! The RSDT body is an array of 32-bit table addresses, the XSDT body an
//! array of 64-bit ones.

use crate::rsdp::AcpiRoots;
use crate::{AcpiError, PhysMapRo, le_u32, le_u64, sum};
use log::{debug, warn};

pub const HEADER_LEN: usize = 36;

/// Upper bound on any table we are willing to map.
const MAX_TABLE_LEN: u32 = 1 << 20;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SdtHeader {
    pub signature: [u8; 4],
    pub length: u32,
    pub revision: u8,
    pub oem_id: [u8; 6],
    pub oem_table_id: [u8; 8],
}

impl SdtHeader {
    fn read(bytes: &[u8]) -> Self {
        let mut header = Self {
            signature: [0; 4],
            length: le_u32(bytes, 4),
            revision: bytes[8],
            oem_id: [0; 6],
            oem_table_id: [0; 8],
        };
        header.signature.copy_from_slice(&bytes[..4]);
        header.oem_id.copy_from_slice(&bytes[10..16]);
        header.oem_table_id.copy_from_slice(&bytes[16..24]);
        header
    }
}

/// A checksummed table found in physical memory.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Table {
    pub addr: u64,
    pub header: SdtHeader,
}

/// Maps the table at `addr` and validates its length and checksum.
///
/// # Errors
/// * [`AcpiError::BadLength`] if the length is below the header size or
///   absurdly large.
/// * [`AcpiError::BadChecksum`] if the table does not sum to zero.
///
/// # Safety
/// `map` must be able to map the table at `addr`.
pub unsafe fn load_table<'a>(map: &impl PhysMapRo, addr: u64) -> Result<(Table, &'a [u8]), AcpiError> {
    let head = unsafe { map.map_ro(addr, HEADER_LEN) };
    let header = SdtHeader::read(head);
    if (header.length as usize) < HEADER_LEN || header.length > MAX_TABLE_LEN {
        return Err(AcpiError::BadLength {
            addr,
            len: header.length,
        });
    }

    let bytes = unsafe { map.map_ro(addr, header.length as usize) };
    if sum(bytes) != 0 {
        warn!("acpi: table {:?} at {addr:#x} fails its checksum", Sig(&header.signature));
        return Err(AcpiError::BadChecksum(addr));
    }
    Ok((Table { addr, header }, bytes))
}

/// Finds the table with the given signature through the XSDT, or the RSDT
/// on ACPI 1.0 firmware.
///
/// # Errors
/// * Any error of [`load_table`] for the root table or for the match.
/// * [`AcpiError::UnexpectedTable`] if the root table has the wrong
///   signature.
/// * [`AcpiError::TableNotFound`] if no entry carries `signature`.
///
/// # Safety
/// `map` must be able to map every table reachable from `roots`.
pub unsafe fn find_table(
    map: &impl PhysMapRo,
    roots: &AcpiRoots,
    signature: [u8; 4],
) -> Result<Table, AcpiError> {
    let (root_addr, expected, entry_len) = match (roots.xsdt_addr, roots.rsdt_addr) {
        (Some(xsdt), _) => (xsdt, *b"XSDT", 8),
        (None, Some(rsdt)) => (rsdt, *b"RSDT", 4),
        (None, None) => return Err(AcpiError::NullPointer),
    };

    let (root, bytes) = unsafe { load_table(map, root_addr) }?;
    if root.header.signature != expected {
        return Err(AcpiError::UnexpectedTable {
            addr: root_addr,
            expected,
            found: root.header.signature,
        });
    }

    for entry in bytes[HEADER_LEN..].chunks_exact(entry_len) {
        let addr = if entry_len == 8 {
            le_u64(entry, 0)
        } else {
            u64::from(le_u32(entry, 0))
        };
        if addr == 0 {
            continue;
        }

        let head = unsafe { map.map_ro(addr, 4) };
        if head != signature {
            continue;
        }
        let (table, _) = unsafe { load_table(map, addr) }?;
        debug!("acpi: {:?} at {addr:#x}", Sig(&signature));
        return Ok(table);
    }

    Err(AcpiError::TableNotFound(signature))
}

/// Prints a signature as text when it is ASCII.
struct Sig<'a>(&'a [u8; 4]);

impl core::fmt::Debug for Sig<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match core::str::from_utf8(self.0) {
            Ok(s) => write!(f, "\"{s}\""),
            Err(_) => write!(f, "{:?}", self.0),
        }
    }
}
