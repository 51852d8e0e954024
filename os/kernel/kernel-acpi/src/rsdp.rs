//! # RSDP/XSDP (Root/Extended System Description Pointer)
//!
//! ```text
//! offset  size  field
//!      0     8  "RSD PTR "
//!      8     1  checksum over bytes 0..20
//!      9     6  OEM id
//!     15     1  revision (0 = ACPI 1.0, 2 = ACPI 2.0+)
//!     16     4  RSDT address
//!   ---- ACPI 2.0+ ----
//!     20     4  length of the whole structure
//!     24     8  XSDT address
//!     32     1  checksum over all `length` bytes
//!     33     3  reserved
//! ```

use crate::{AcpiError, PhysMapRo, le_u32, le_u64, sum};
use log::{debug, warn};

pub const SIGNATURE: &[u8; 8] = b"RSD PTR ";

/// Size of the ACPI 1.0 structure.
pub const RSDP_V1_LEN: usize = 20;

/// Size of the ACPI 2.0 structure.
pub const XSDP_LEN: usize = 36;

/// Longest XSDP we are willing to map. Later revisions may grow the
/// structure, but never past a page.
const MAX_XSDP_LEN: usize = 4096;

/// Where the system description tables start.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct AcpiRoots {
    pub rsdp_addr: u64,
    pub revision: u8,
    pub xsdt_addr: Option<u64>,
    pub rsdt_addr: Option<u64>,
}

impl AcpiRoots {
    /// Validate the RSDP/XSDP at the physical address.
    ///
    /// The ACPI 1.0 checksum always has to hold; revision 2 and up must
    /// additionally pass the extended checksum over the whole structure.
    ///
    /// # Errors
    /// * [`AcpiError::NullPointer`] for address zero.
    /// * [`AcpiError::BadRsdpSignature`] if the signature does not match.
    /// * [`AcpiError::BadChecksum`] if either checksum fails.
    /// * [`AcpiError::BadLength`] if the XSDP length is too short.
    ///
    /// # Safety
    /// `map` must be able to map at least [`XSDP_LEN`] bytes at `rsdp_addr`.
    #[allow(clippy::similar_names)]
    pub unsafe fn parse(map: &impl PhysMapRo, rsdp_addr: u64) -> Result<Self, AcpiError> {
        if rsdp_addr == 0 {
            return Err(AcpiError::NullPointer);
        }

        let v1 = unsafe { map.map_ro(rsdp_addr, RSDP_V1_LEN) };
        if &v1[..8] != SIGNATURE {
            return Err(AcpiError::BadRsdpSignature(rsdp_addr));
        }
        if sum(v1) != 0 {
            warn!("acpi: RSDP at {rsdp_addr:#x} fails its checksum");
            return Err(AcpiError::BadChecksum(rsdp_addr));
        }

        let revision = v1[15];
        let rsdt_addr = match le_u32(v1, 16) {
            0 => None,
            addr => Some(u64::from(addr)),
        };

        if revision < 2 {
            debug!("acpi: ACPI 1.0 RSDP at {rsdp_addr:#x}");
            return Ok(Self {
                rsdp_addr,
                revision,
                xsdt_addr: None,
                rsdt_addr,
            });
        }

        // Need full v2 to read length + xsdt
        let v2 = unsafe { map.map_ro(rsdp_addr, XSDP_LEN) };
        let len = le_u32(v2, 20);
        if !(XSDP_LEN..=MAX_XSDP_LEN).contains(&(len as usize)) {
            return Err(AcpiError::BadLength { addr: rsdp_addr, len });
        }
        let full = unsafe { map.map_ro(rsdp_addr, len as usize) };
        if sum(full) != 0 {
            warn!("acpi: XSDP at {rsdp_addr:#x} fails its extended checksum");
            return Err(AcpiError::BadChecksum(rsdp_addr));
        }

        debug!("acpi: ACPI {revision} XSDP at {rsdp_addr:#x}");
        Ok(Self {
            rsdp_addr,
            revision,
            xsdt_addr: match le_u64(v2, 24) {
                0 => None,
                addr => Some(addr),
            },
            rsdt_addr,
        })
    }
}
