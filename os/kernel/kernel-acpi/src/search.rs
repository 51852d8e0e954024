//! Locating the RSDP on BIOS machines.

use crate::rsdp::{AcpiRoots, SIGNATURE};
use crate::{AcpiError, PhysMapRo};
use core::ops::Range;
use log::{debug, info};

/// Physical address of the real-mode segment of the EBDA.
pub const EBDA_SEGMENT_PTR: u64 = 0x40E;

/// Read-only BIOS area searched when the EBDA has no RSDP.
pub const BIOS_AREA: Range<u64> = 0xE_0000..0x10_0000;

/// The RSDP only ever starts on a 16-byte boundary.
const STRIDE: usize = 16;

/// Only the first KiB of the EBDA is searched.
const EBDA_SEARCH_LEN: u64 = 1024;

/// Searches the EBDA, then the BIOS area, for a valid RSDP.
///
/// Candidates whose signature matches but which fail validation are
/// skipped.
///
/// # Errors
/// [`AcpiError::RsdpNotFound`] if neither area holds a valid RSDP.
///
/// # Safety
/// `map` must be able to map the first MiB of physical memory.
pub unsafe fn find_rsdp(map: &impl PhysMapRo) -> Result<AcpiRoots, AcpiError> {
    let segment = unsafe { map.map_ro(EBDA_SEGMENT_PTR, 2) };
    let ebda = u64::from(u16::from_le_bytes([segment[0], segment[1]])) << 4;

    if ebda != 0 {
        debug!("acpi: searching EBDA at {ebda:#x}");
        if let Some(roots) = unsafe { scan(map, ebda..ebda + EBDA_SEARCH_LEN) } {
            return Ok(roots);
        }
    }

    debug!("acpi: searching {:#x}..{:#x}", BIOS_AREA.start, BIOS_AREA.end);
    unsafe { scan(map, BIOS_AREA) }.ok_or(AcpiError::RsdpNotFound)
}

unsafe fn scan(map: &impl PhysMapRo, area: Range<u64>) -> Option<AcpiRoots> {
    let start = area.start.next_multiple_of(STRIDE as u64);
    for addr in (start..area.end).step_by(STRIDE) {
        let head = unsafe { map.map_ro(addr, SIGNATURE.len()) };
        if head != SIGNATURE {
            continue;
        }
        match unsafe { AcpiRoots::parse(map, addr) } {
            Ok(roots) => {
                info!("acpi: RSDP at {addr:#x}, revision {}", roots.revision);
                return Some(roots);
            }
            Err(e) => debug!("acpi: skipping candidate: {e}"),
        }
    }
    None
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fake::{Ram, rsdp_v1, xsdp};

    #[test]
    fn finds_the_rsdp_in_the_ebda_first() {
        let mut ram = Ram::new();
        ram.write(EBDA_SEGMENT_PTR, &0x9FC0u16.to_le_bytes());
        ram.write(0x9_FC00 + 0x40, &xsdp(0x1000, 0x2000));
        ram.write(0xF_0000, &rsdp_v1(0x3000));

        let roots = unsafe { find_rsdp(&ram) }.unwrap();
        assert_eq!(roots.rsdp_addr, 0x9_FC40);
        assert_eq!(roots.xsdt_addr, Some(0x2000));
    }

    #[test]
    fn falls_back_to_the_bios_area() {
        let mut ram = Ram::new();
        ram.write(EBDA_SEGMENT_PTR, &0x9FC0u16.to_le_bytes());
        ram.write(0xF_5A30, &rsdp_v1(0x3000));

        let roots = unsafe { find_rsdp(&ram) }.unwrap();
        assert_eq!(roots.rsdp_addr, 0xF_5A30);
        assert_eq!(roots.rsdt_addr, Some(0x3000));
    }

    #[test]
    fn skips_misaligned_and_corrupt_candidates() {
        let mut ram = Ram::new();
        ram.write(0xE_0008, &rsdp_v1(0x1000));
        let mut corrupt = rsdp_v1(0x2000);
        corrupt[8] ^= 0xFF;
        ram.write(0xE_0010, &corrupt);
        ram.write(0xE_0020, &rsdp_v1(0x3000));

        let roots = unsafe { find_rsdp(&ram) }.unwrap();
        assert_eq!(roots.rsdp_addr, 0xE_0020);
    }

    #[test]
    fn reports_a_missing_rsdp() {
        let ram = Ram::new();
        assert_eq!(unsafe { find_rsdp(&ram) }, Err(AcpiError::RsdpNotFound));
    }
}
